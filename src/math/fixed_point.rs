//! Scaled-integer value types.
//!
//! Prices are plain `U256` values in Q96. Supply and demand quantities carry
//! one (`ValueX7`) or two (`ValueX7X7`) factors of [`MPS`] so that per-block
//! issuance fractions can be applied without losing precision. Conversions
//! between scales are always explicit.

use crate::error::MathError;
use crate::math::math_helpers::{Rounding, div_rounding_up, mul_div, mul_div_with};
use crate::{MPS, Q96, Q192, U256_MPS, U256_MPS_SQUARED};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// A quantity multiplied by [`MPS`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueX7(U256);

/// A quantity multiplied by [`MPS`] squared.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueX7X7(U256);

impl ValueX7 {
    pub const ZERO: Self = Self(U256::ZERO);

    /// Wraps a value that is already scaled by `MPS`.
    #[inline]
    pub const fn from_scaled(scaled: U256) -> Self {
        Self(scaled)
    }

    /// Scales a raw value up by `MPS`.
    pub fn scale_up(raw: U256) -> Result<Self, MathError> {
        raw.checked_mul(U256_MPS).map(Self).ok_or(MathError::Overflow)
    }

    #[inline]
    pub const fn get(self) -> U256 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Drops the `MPS` factor, rounding down.
    #[inline]
    pub fn scale_down(self) -> U256 {
        self.0 / U256_MPS
    }

    pub fn checked_add(self, other: Self) -> Result<Self, MathError> {
        self.0.checked_add(other.0).map(Self).ok_or(MathError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, MathError> {
        self.0.checked_sub(other.0).map(Self).ok_or(MathError::Underflow)
    }

    /// Subtracts, flooring at zero instead of underflowing.
    #[inline]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Applies an issuance fraction `delta_mps / MPS`, keeping the extra
    /// `MPS` factor in the result.
    pub fn mul_mps(self, delta_mps: u32) -> Result<ValueX7X7, MathError> {
        self.0
            .checked_mul(U256::from(delta_mps))
            .map(ValueX7X7)
            .ok_or(MathError::Overflow)
    }
}

impl ValueX7X7 {
    pub const ZERO: Self = Self(U256::ZERO);

    /// Wraps a value that is already scaled by `MPS` squared.
    #[inline]
    pub const fn from_scaled(scaled: U256) -> Self {
        Self(scaled)
    }

    /// Scales a raw value up by `MPS` squared.
    pub fn scale_up(raw: U256) -> Result<Self, MathError> {
        raw.checked_mul(U256_MPS_SQUARED)
            .map(Self)
            .ok_or(MathError::Overflow)
    }

    #[inline]
    pub const fn get(self) -> U256 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Drops both `MPS` factors, rounding down.
    #[inline]
    pub fn scale_down(self) -> U256 {
        self.0 / U256_MPS_SQUARED
    }

    /// Drops both `MPS` factors, rounding up.
    pub fn scale_down_rounding_up(self) -> Result<U256, MathError> {
        div_rounding_up(self.0, U256_MPS_SQUARED)
    }

    pub fn checked_add(self, other: Self) -> Result<Self, MathError> {
        self.0.checked_add(other.0).map(Self).ok_or(MathError::Overflow)
    }

    #[inline]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

/// A bid's remaining claim on the schedule, in both currency and tokens.
///
/// `currency_demand_x7` is the Q96 currency the bid would spend over a full
/// `MPS` of issuance, times `MPS`. `token_demand_x7` is the same demand
/// valued at the bid's own max price.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub currency_demand_x7: ValueX7,
    pub token_demand_x7: ValueX7,
}

impl Demand {
    pub const ZERO: Self = Self {
        currency_demand_x7: ValueX7::ZERO,
        token_demand_x7: ValueX7::ZERO,
    };

    /// Demand of a bid that spends `amount` uniformly over the
    /// `mps_remaining` issuance left after it was submitted.
    pub fn from_bid(amount: u128, max_price: U256, mps_remaining: u32) -> Result<Self, MathError> {
        if mps_remaining == 0 || max_price.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let amount_q96 = U256::from(amount) << 96;
        let currency = mul_div(amount_q96, U256_MPS_SQUARED, U256::from(mps_remaining))?;
        Ok(Self {
            currency_demand_x7: ValueX7(currency),
            token_demand_x7: ValueX7(currency / max_price),
        })
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.currency_demand_x7.is_zero()
    }

    pub fn checked_add(self, other: Self) -> Result<Self, MathError> {
        Ok(Self {
            currency_demand_x7: self.currency_demand_x7.checked_add(other.currency_demand_x7)?,
            token_demand_x7: self.token_demand_x7.checked_add(other.token_demand_x7)?,
        })
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            currency_demand_x7: self.currency_demand_x7.saturating_sub(other.currency_demand_x7),
            token_demand_x7: self.token_demand_x7.saturating_sub(other.token_demand_x7),
        }
    }
}

/// `delta_mps * 2^192 / price`: the per-price issuance increment accumulated
/// into a checkpoint. Rounds down so token fills never exceed what was sold.
pub fn mps_per_price(delta_mps: u32, price: U256) -> Result<U256, MathError> {
    mul_div(U256::from(delta_mps), Q192, price)
}

/// Converts a Q96 currency amount scaled by `MPS` squared into raw currency.
pub fn currency_from_q96_x7x7(value: ValueX7X7, rounding: Rounding) -> Result<U256, MathError> {
    mul_div_with(value.get(), U256::ONE, Q96 * U256_MPS_SQUARED, rounding)
}

/// Fraction of issuance not yet sold, `MPS - cumulative_mps`.
#[inline]
pub fn mps_remaining(cumulative_mps: u32) -> u32 {
    MPS.saturating_sub(cumulative_mps)
}
