//! Construction parameters.

use crate::error::ConfigError;
use crate::{MAX_BID_PRICE_CAP, MAX_TOTAL_SUPPLY, U256_MPS, U256_MPS_SQUARED};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use super::schedule::IssuanceSchedule;

/// 2^112: a liquidity root at or above this bound never constrains the price.
const LIQUIDITY_ROOT_BOUND: U256 = U256::from_limbs([0, 1 << 48, 0, 0]);
/// 2^176.
const LIQUIDITY_NUMERATOR: U256 = U256::from_limbs([0, 0, 1 << 48, 0]);

/// Immutable auction configuration, consumed once by [`super::Auction::new`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionParameters {
    /// Lowest clearing price, Q96.
    pub floor_price: U256,
    /// Distance between adjacent tick prices, Q96.
    pub tick_spacing: U256,
    /// Packed issuance steps, see [`super::schedule::encode_steps`].
    pub auction_steps_data: Bytes,
    pub start_block: u64,
    pub end_block: u64,
    pub claim_block: u64,
    /// Tokens offered over the whole auction.
    pub total_supply: u128,
    /// Currency that must be raised for the auction to graduate.
    pub required_currency_raised: u128,
    /// Receives unsold tokens.
    pub tokens_recipient: Address,
    /// Receives raised currency.
    pub funds_recipient: Address,
}

impl AuctionParameters {
    /// Parses parameters from JSON. Validation is left to [`Self::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Runs every construction check and returns the decoded schedule.
    pub fn validate(&self) -> Result<IssuanceSchedule, ConfigError> {
        if self.floor_price.is_zero() {
            return Err(ConfigError::FloorPriceIsZero);
        }
        if self.tick_spacing.is_zero() {
            return Err(ConfigError::TickSpacingIsZero);
        }
        if self.total_supply == 0 {
            return Err(ConfigError::TotalSupplyIsZero);
        }
        if self.total_supply > MAX_TOTAL_SUPPLY {
            return Err(ConfigError::TotalSupplyTooLarge(self.total_supply));
        }
        if self.end_block <= self.start_block {
            return Err(ConfigError::EndBlockNotAfterStart {
                start_block: self.start_block,
                end_block: self.end_block,
            });
        }
        if self.claim_block < self.end_block {
            return Err(ConfigError::ClaimBlockBeforeEnd {
                end_block: self.end_block,
                claim_block: self.claim_block,
            });
        }

        let max_bid_price = max_bid_price(self.total_supply);
        let lowest_bid = self
            .floor_price
            .checked_add(self.tick_spacing)
            .ok_or(ConfigError::FloorPriceTooHigh { max_bid_price })?;
        if lowest_bid > max_bid_price {
            return Err(ConfigError::FloorPriceTooHigh { max_bid_price });
        }

        Ok(IssuanceSchedule::new(
            &self.auction_steps_data,
            self.start_block,
            self.end_block,
        )?)
    }
}

/// Highest admissible bid price for `total_supply`, Q96.
///
/// The minimum of three bounds: a fixed 2^224 cap, the price at which
/// `total_supply * price * MPS^2` would no longer fit in 255 bits, and the
/// price at which a full-range liquidity of `total_supply * sqrt(price)`
/// would no longer fit in 128 bits.
pub fn max_bid_price(total_supply: u128) -> U256 {
    if total_supply == 0 {
        return MAX_BID_PRICE_CAP;
    }
    let supply = U256::from(total_supply);

    let by_currency = (U256::MAX >> 1) / (supply * U256_MPS_SQUARED);

    let root = LIQUIDITY_NUMERATOR / supply;
    let by_liquidity = if root >= LIQUIDITY_ROOT_BOUND {
        MAX_BID_PRICE_CAP
    } else {
        root * root
    };

    MAX_BID_PRICE_CAP.min(by_currency).min(by_liquidity)
}

/// `total_supply * MPS`: the supply side of the clearing price quotient.
#[inline]
pub(crate) fn supply_x7(total_supply: u128) -> U256 {
    U256::from(total_supply) * U256_MPS
}
