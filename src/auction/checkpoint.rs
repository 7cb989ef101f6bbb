//! Checkpoint chain and lazy fill accounting.
//!
//! A checkpoint is a snapshot of running sums taken at a block. A bid's fill
//! over any span where its max price stayed above the clearing price is the
//! difference of two snapshots scaled by the bid amount, so exits never walk
//! the blocks in between.

use crate::FastMap;
use crate::error::{AuctionError, Error, MathError};
use crate::math::fixed_point::{ValueX7X7, mps_remaining};
use crate::math::math_helpers::{div_rounding_up, mul_div, mul_div_rounding_up, to_u128};
use crate::{Q96, U256_MPS_SQUARED};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bid::Bid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block_number: u64,
    pub clearing_price: U256,
    /// Tokens sold so far, times `MPS` squared.
    pub total_cleared: ValueX7X7,
    /// Issuance sold so far, in mps.
    pub cumulative_mps: u32,
    /// Issuance rate of the active step when the checkpoint was taken.
    pub mps: u32,
    /// Sum of `delta_mps * 2^192 / clearing_price` over every sold span.
    pub cumulative_mps_per_price: U256,
    /// Q96 currency times `MPS` squared raised from bids at exactly the
    /// clearing price since it last changed.
    pub currency_raised_at_clearing_price: ValueX7X7,
    /// Q96 currency times `MPS` squared raised so far.
    pub currency_raised: ValueX7X7,
    pub prev: Option<u64>,
    pub next: Option<u64>,
}

impl Checkpoint {
    /// The empty snapshot an auction starts from.
    pub fn initial(block_number: u64, floor_price: U256, mps: u32) -> Self {
        Self {
            block_number,
            clearing_price: floor_price,
            total_cleared: ValueX7X7::ZERO,
            cumulative_mps: 0,
            mps,
            cumulative_mps_per_price: U256::ZERO,
            currency_raised_at_clearing_price: ValueX7X7::ZERO,
            currency_raised: ValueX7X7::ZERO,
            prev: None,
            next: None,
        }
    }

    /// Issuance not yet sold at this checkpoint.
    #[inline]
    pub fn mps_remaining(&self) -> u32 {
        mps_remaining(self.cumulative_mps)
    }
}

/// Block-keyed checkpoint chain. Blocks strictly increase from first to
/// latest.
#[derive(Clone, Debug, Default)]
pub struct CheckpointLedger {
    checkpoints: FastMap<u64, Checkpoint>,
    first: Option<u64>,
    latest: Option<u64>,
}

impl CheckpointLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn get(&self, block_number: u64) -> Option<&Checkpoint> {
        self.checkpoints.get(&block_number)
    }

    /// Like [`Self::get`], but a missing block is an error.
    pub fn try_get(&self, block_number: u64) -> Result<&Checkpoint, AuctionError> {
        self.get(block_number)
            .ok_or(AuctionError::CheckpointNotFound(block_number))
    }

    pub fn latest(&self) -> Option<&Checkpoint> {
        self.latest.and_then(|block| self.checkpoints.get(&block))
    }

    pub fn first(&self) -> Option<&Checkpoint> {
        self.first.and_then(|block| self.checkpoints.get(&block))
    }

    /// Appends `checkpoint` after the latest one, linking both directions.
    ///
    /// Inserting at the latest block replaces nothing and is a no-op; the
    /// caller checkpoints at most once per block.
    pub fn insert(&mut self, mut checkpoint: Checkpoint) {
        let block = checkpoint.block_number;
        if let Some(latest) = self.latest {
            if block <= latest {
                debug!(block, latest, "Stale checkpoint ignored");
                return;
            }
            if let Some(prev) = self.checkpoints.get_mut(&latest) {
                prev.next = Some(block);
            }
            checkpoint.prev = Some(latest);
        } else {
            checkpoint.prev = None;
            self.first = Some(block);
        }
        checkpoint.next = None;

        debug!(
            block,
            clearing_price = %checkpoint.clearing_price,
            cumulative_mps = checkpoint.cumulative_mps,
            "Checkpoint inserted"
        );
        self.latest = Some(block);
        self.checkpoints.insert(block, checkpoint);
    }

    /// Iterates the chain from first to latest.
    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> + '_ {
        let mut next = self.first;
        std::iter::from_fn(move || {
            let checkpoint = self.checkpoints.get(&next?)?;
            next = checkpoint.next;
            Some(checkpoint)
        })
    }
}

/// Tokens and currency attributed to a bid over some span of checkpoints.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Fill {
    pub tokens_filled: u128,
    pub currency_spent: u128,
}

impl Fill {
    pub fn checked_add(self, other: Self) -> Result<Self, Error> {
        Ok(Self {
            tokens_filled: self
                .tokens_filled
                .checked_add(other.tokens_filled)
                .ok_or(MathError::Overflow)?,
            currency_spent: self
                .currency_spent
                .checked_add(other.currency_spent)
                .ok_or(MathError::Overflow)?,
        })
    }
}

/// Fill of `bid` between `lower` and `upper`, valid only while the bid's max
/// price stayed strictly above every clearing price in that span.
///
/// Tokens round down and currency rounds up.
pub fn account_fully_filled(
    upper: &Checkpoint,
    lower: &Checkpoint,
    bid: &Bid,
) -> Result<Fill, Error> {
    let remaining = bid.mps_remaining();
    if remaining == 0 {
        return Err(AuctionError::ZeroMpsRemaining.into());
    }
    let remaining = U256::from(remaining);
    let amount = U256::from(bid.amount);

    let delta_mps_per_price = upper
        .cumulative_mps_per_price
        .saturating_sub(lower.cumulative_mps_per_price);
    let delta_mps = U256::from(upper.cumulative_mps.saturating_sub(lower.cumulative_mps));

    let tokens = mul_div(amount, delta_mps_per_price, Q96 * remaining)?;
    let spent = mul_div_rounding_up(amount, delta_mps, remaining)?;

    Ok(Fill {
        tokens_filled: to_u128(tokens)?,
        currency_spent: to_u128(spent)?,
    })
}

/// Pro-rata fill of `bid` from the currency raised at its tick while the
/// tick's price was the clearing price.
///
/// The bid's share of `raised_at_clearing_price` is
/// `bid demand / tick demand`. Tokens round down; currency rounds up, so a
/// share too small to buy one token still costs at least one unit.
pub fn account_partially_filled(
    bid: &Bid,
    tick_demand: U256,
    raised_at_clearing_price: ValueX7X7,
) -> Result<Fill, Error> {
    if tick_demand.is_zero() {
        return Ok(Fill::default());
    }
    let bid_demand = bid.demand()?.currency_demand_x7.get();
    let raised = raised_at_clearing_price.get();

    let share_down = mul_div(bid_demand, raised, tick_demand)?;
    let share_up = mul_div_rounding_up(bid_demand, raised, tick_demand)?;

    let tokens = share_down / bid.max_price / U256_MPS_SQUARED;
    let spent = div_rounding_up(share_up, Q96 * U256_MPS_SQUARED)?;

    Ok(Fill {
        tokens_filled: to_u128(tokens)?,
        currency_spent: to_u128(spent)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MPS;
    use crate::math::fixed_point::mps_per_price;
    use alloy_primitives::Address;

    fn checkpoint(block: u64, cumulative_mps: u32, cumulative_mps_per_price: U256) -> Checkpoint {
        Checkpoint {
            cumulative_mps,
            cumulative_mps_per_price,
            ..Checkpoint::initial(block, Q96, 0)
        }
    }

    fn bid(amount: u128, max_price: U256, start_cumulative_mps: u32) -> Bid {
        Bid::new(max_price, amount, Address::ZERO, 0, start_cumulative_mps)
    }

    #[test]
    fn ledger_links_both_directions() {
        let mut ledger = CheckpointLedger::new();
        ledger.insert(Checkpoint::initial(100, Q96, 0));
        ledger.insert(Checkpoint::initial(103, Q96, 0));
        ledger.insert(Checkpoint::initial(107, Q96, 0));

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.first().unwrap().block_number, 100);
        assert_eq!(ledger.latest().unwrap().block_number, 107);

        let middle = ledger.get(103).unwrap();
        assert_eq!(middle.prev, Some(100));
        assert_eq!(middle.next, Some(107));
        assert_eq!(ledger.get(100).unwrap().prev, None);
        assert_eq!(ledger.get(107).unwrap().next, None);

        let blocks: Vec<u64> = ledger.iter().map(|c| c.block_number).collect();
        assert_eq!(blocks, vec![100, 103, 107]);
    }

    #[test]
    fn ledger_ignores_stale_insert() {
        let mut ledger = CheckpointLedger::new();
        ledger.insert(Checkpoint::initial(100, Q96, 0));
        ledger.insert(Checkpoint::initial(100, Q96 * U256::from(2u8), 0));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.latest().unwrap().clearing_price, Q96);
        assert_eq!(
            ledger.try_get(99).unwrap_err(),
            AuctionError::CheckpointNotFound(99)
        );
    }

    #[test]
    fn fully_filled_over_whole_auction() {
        // 1000 currency at a constant price of 2.0 buys 500 tokens
        let price = Q96 * U256::from(2u8);
        let lower = checkpoint(0, 0, U256::ZERO);
        let upper = checkpoint(10, MPS, mps_per_price(MPS, price).unwrap());

        let bid = bid(1_000, price * U256::from(2u8), 0);
        let fill = account_fully_filled(&upper, &lower, &bid).unwrap();
        assert_eq!(fill.tokens_filled, 500);
        assert_eq!(fill.currency_spent, 1_000);
    }

    #[test]
    fn fully_filled_spreads_over_remaining_issuance() {
        // Submitted with half the issuance already sold: the whole amount is
        // spent over the second half.
        let lower = checkpoint(5, MPS / 2, mps_per_price(MPS / 2, Q96).unwrap());
        let upper = checkpoint(10, MPS, mps_per_price(MPS, Q96).unwrap());

        let bid = bid(800, Q96 * U256::from(3u8), MPS / 2);
        let fill = account_fully_filled(&upper, &lower, &bid).unwrap();
        assert_eq!(fill.tokens_filled, 800);
        assert_eq!(fill.currency_spent, 800);
    }

    #[test]
    fn fully_filled_rounding_favors_the_auction() {
        // amount 1 over half the remaining issuance: 0.5 currency, 0.5 tokens
        let lower = checkpoint(0, 0, U256::ZERO);
        let upper = checkpoint(5, MPS / 2, mps_per_price(MPS / 2, Q96).unwrap());

        let fill = account_fully_filled(&upper, &lower, &bid(1, Q96 * U256::from(2u8), 0)).unwrap();
        assert_eq!(fill.currency_spent, 1);
        assert_eq!(fill.tokens_filled, 0);
    }

    #[test]
    fn fully_filled_rejects_zero_remaining() {
        let lower = checkpoint(0, MPS, U256::ZERO);
        let upper = checkpoint(1, MPS, U256::ZERO);
        assert_eq!(
            account_fully_filled(&upper, &lower, &bid(1, Q96, MPS)).unwrap_err(),
            Error::AuctionError(AuctionError::ZeroMpsRemaining)
        );
    }

    #[test]
    fn partially_filled_pro_rata() {
        // Two bids of 120 and 60 at price 1.5 share 150 raised at that price
        let price = Q96 * U256::from(3u8) / U256::from(2u8);
        let first = bid(120, price, 0);
        let second = bid(60, price, 0);
        let tick_demand = first
            .demand()
            .unwrap()
            .checked_add(second.demand().unwrap())
            .unwrap()
            .currency_demand_x7
            .get();
        let raised = ValueX7X7::from_scaled(U256::from(150u8) * Q96 * U256_MPS_SQUARED);

        let a = account_partially_filled(&first, tick_demand, raised).unwrap();
        let b = account_partially_filled(&second, tick_demand, raised).unwrap();
        assert_eq!(a, Fill { tokens_filled: 66, currency_spent: 100 });
        assert_eq!(b, Fill { tokens_filled: 33, currency_spent: 50 });
    }

    #[test]
    fn partially_filled_tiny_share_costs_one_unit() {
        let price = U256::from(110u8);
        let only = bid(5_000, price, 0);
        let tick_demand = only.demand().unwrap().currency_demand_x7.get();
        // 1000 tokens at a raw Q96 price of 110 raise far less than one unit
        let raised = ValueX7X7::from_scaled(U256::from(1_000u64) * price * U256_MPS_SQUARED);

        let fill = account_partially_filled(&only, tick_demand, raised).unwrap();
        assert_eq!(fill, Fill { tokens_filled: 1_000, currency_spent: 1 });
    }

    #[test]
    fn partially_filled_zero_tick_demand_is_empty() {
        let fill = account_partially_filled(&bid(10, Q96, 0), U256::ZERO, ValueX7X7::ZERO).unwrap();
        assert_eq!(fill, Fill::default());
    }
}
