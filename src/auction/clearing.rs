//! Price discovery and checkpointing.
//!
//! A checkpoint at block `b` first discovers the clearing price over every
//! bid admitted before `b`, then sells the issuance of `[last, b)` at that
//! price. Bids admitted during `b` only take part from the next checkpoint.
//!
//! Discovery walks the tick book without touching it. The walk, the schedule
//! cursor and the new checkpoint are committed together once every fallible
//! step has succeeded, so a failed checkpoint leaves the auction unchanged.

use crate::MAX_TICK_PTR;
use crate::U256_MPS;
use crate::error::{AuctionError, Error, MathError};
use crate::math::fixed_point::{Demand, ValueX7X7, mps_per_price};
use crate::math::math_helpers::div_rounding_up;
use alloy_primitives::U256;
use tracing::{debug, info};

use super::checkpoint::Checkpoint;
use super::hooks::{Settlement, ValidationHook};
use super::params::supply_x7;
use super::state::{Auction, CallContext};

/// Ticks the demand above the clearing price can afford, found but not yet
/// applied to the book.
#[derive(Clone, Debug)]
struct TickWalk {
    /// Number of ticks crossed from `next_active`.
    crossed: usize,
    /// Highest tick crossed, or zero if none was.
    highest_crossed: U256,
    /// Lowest tick left above the walk.
    next_active_price: U256,
    /// Demand above the clearing price once the crossed ticks are removed.
    remaining: Demand,
}

impl<H: ValidationHook, S: Settlement> Auction<H, S> {
    /// Checkpoints the auction at the caller's block, clamped to the end
    /// block. Repeated calls within a block return the same checkpoint.
    pub fn checkpoint(&mut self, ctx: &CallContext) -> Result<Checkpoint, Error> {
        if !self.is_started(ctx.block_number) {
            return Err(AuctionError::AuctionNotStarted.into());
        }
        self.checkpoint_at(ctx.block_number)
    }

    pub(super) fn checkpoint_at(&mut self, block_number: u64) -> Result<Checkpoint, Error> {
        let block_number = block_number.min(self.params.end_block);
        let latest = self.latest_checkpoint()?.clone();
        if block_number <= latest.block_number {
            return Ok(latest);
        }

        let (clearing_price, walk) = self.iterate_over_ticks(latest.clearing_price)?;

        let mut checkpoint = latest.clone();
        checkpoint.block_number = block_number;
        if clearing_price != latest.clearing_price {
            checkpoint.clearing_price = clearing_price;
            checkpoint.currency_raised_at_clearing_price = ValueX7X7::ZERO;
        }

        let mut schedule = self.schedule.clone();
        let delta_mps = schedule.mps_between(latest.block_number, block_number)?;
        if delta_mps > 0 {
            self.sell(&mut checkpoint, &walk, delta_mps)?;
        }
        checkpoint.mps = schedule.rate_at(block_number);

        self.apply_walk(&walk);
        self.min_clearing_price = self.params.floor_price;
        self.schedule = schedule;
        if clearing_price != latest.clearing_price {
            info!(
                block = block_number,
                from = %latest.clearing_price,
                to = %clearing_price,
                "Clearing price updated"
            );
        }
        self.checkpoints.insert(checkpoint.clone());
        Ok(checkpoint)
    }

    /// Finds the clearing price over every admitted bid: the highest of the
    /// demand quotient left after crossing every affordable tick, the last
    /// tick crossed, any floor left by forced iteration, the current clearing
    /// price and the floor price. The walk is returned for the caller to
    /// commit.
    fn iterate_over_ticks(&self, current_clearing: U256) -> Result<(U256, TickWalk), Error> {
        let walk = self.walk_ticks(MAX_TICK_PTR)?;
        let clearing_price = demand_quotient(&walk.remaining, self.params.total_supply)?
            .max(walk.highest_crossed)
            .max(self.min_clearing_price)
            .max(current_clearing)
            .max(self.params.floor_price);
        Ok((clearing_price, walk))
    }

    /// Crosses ticks up to and including `until_price` without checkpointing,
    /// so a long tick walk can be split across calls.
    ///
    /// Returns the highest tick crossed so far. New bids must bid above it.
    pub fn force_iterate_over_ticks(
        &mut self,
        ctx: &CallContext,
        until_price: U256,
    ) -> Result<U256, Error> {
        if !self.is_started(ctx.block_number) {
            return Err(AuctionError::AuctionNotStarted.into());
        }
        if self.is_over(ctx.block_number) {
            return Err(AuctionError::AuctionIsOver.into());
        }
        if until_price <= self.bid_price_floor() {
            return Err(AuctionError::ForceIterateTargetTooLow(until_price).into());
        }

        let walk = self.walk_ticks(until_price)?;
        self.apply_walk(&walk);
        self.min_clearing_price = self.min_clearing_price.max(walk.highest_crossed);

        info!(
            until_price = %until_price,
            min_clearing_price = %self.min_clearing_price,
            next_active_tick = %self.ticks.next_active_price(),
            "Ticks force iterated"
        );
        Ok(self.min_clearing_price)
    }

    /// Rejects demand the auction could not clear within its price range:
    /// the aggregate above the clearing price, or a single tick, must leave
    /// room for a full `MPS` of issuance, and the price that demand implies
    /// must not exceed the maximum bid price.
    pub(super) fn check_clearable(&self, above: &Demand, tick: &Demand) -> Result<(), Error> {
        let limit = U256::MAX / U256_MPS;
        if above.currency_demand_x7.get() > limit
            || tick.currency_demand_x7.get() > limit
            || demand_quotient(above, self.params.total_supply)? > self.max_bid_price
        {
            return Err(AuctionError::InvalidBidUnableToClear.into());
        }
        Ok(())
    }

    /// Walks ticks forward from `next_active` while the demand quotient
    /// reaches the next tick and that tick is at most `until_price`.
    fn walk_ticks(&self, until_price: U256) -> Result<TickWalk, Error> {
        let mut walk = TickWalk {
            crossed: 0,
            highest_crossed: U256::ZERO,
            next_active_price: MAX_TICK_PTR,
            remaining: self.sum_demand_above_clearing,
        };
        for tick in self.ticks.iter_active() {
            if tick.price > until_price
                || demand_quotient(&walk.remaining, self.params.total_supply)? < tick.price
            {
                walk.next_active_price = tick.price;
                break;
            }
            walk.remaining = walk.remaining.saturating_sub(tick.demand);
            walk.highest_crossed = tick.price;
            walk.crossed += 1;
        }
        Ok(walk)
    }

    fn apply_walk(&mut self, walk: &TickWalk) {
        for _ in 0..walk.crossed {
            self.ticks.advance_next_active();
        }
        self.sum_demand_above_clearing = walk.remaining;
        if walk.crossed > 0 {
            debug!(
                crossed = walk.crossed,
                highest = %walk.highest_crossed,
                "Ticks crossed"
            );
        }
    }

    /// Sells `delta_mps` of issuance at the checkpoint's clearing price,
    /// given the book as it stands after `walk`.
    ///
    /// Demand above the price is filled in full. Bids at exactly the price
    /// share whatever supply remains.
    fn sell(
        &self,
        checkpoint: &mut Checkpoint,
        walk: &TickWalk,
        delta_mps: u32,
    ) -> Result<(), Error> {
        let price = checkpoint.clearing_price;

        let above = walk.remaining.currency_demand_x7.mul_mps(delta_mps)?;
        let capacity = U256::from(self.params.total_supply)
            .checked_mul(price)
            .and_then(|v| v.checked_mul(U256::from(delta_mps) * U256_MPS))
            .map(ValueX7X7::from_scaled)
            .ok_or(MathError::Overflow)?;

        let at_price = match self.ticks.get(price) {
            Some(tick) if !tick.demand.is_zero() && price < walk.next_active_price => {
                let demand = tick.demand.currency_demand_x7.mul_mps(delta_mps)?;
                demand.min(capacity.saturating_sub(above))
            }
            _ => ValueX7X7::ZERO,
        };

        let raised = above.checked_add(at_price)?;
        let tokens = ValueX7X7::from_scaled(raised.get() / price);

        checkpoint.total_cleared = checkpoint.total_cleared.checked_add(tokens)?;
        checkpoint.cumulative_mps = checkpoint
            .cumulative_mps
            .checked_add(delta_mps)
            .ok_or(MathError::Overflow)?;
        checkpoint.cumulative_mps_per_price = checkpoint
            .cumulative_mps_per_price
            .checked_add(mps_per_price(delta_mps, price)?)
            .ok_or(MathError::Overflow)?;
        checkpoint.currency_raised_at_clearing_price = checkpoint
            .currency_raised_at_clearing_price
            .checked_add(at_price)?;
        checkpoint.currency_raised = checkpoint.currency_raised.checked_add(raised)?;

        debug!(
            block = checkpoint.block_number,
            delta_mps,
            price = %price,
            raised = %raised.get(),
            "Issuance sold"
        );
        Ok(())
    }
}

/// `ceil(demand / (total supply * MPS))`: the price at which `demand` buys
/// exactly the supply.
fn demand_quotient(demand: &Demand, total_supply: u128) -> Result<U256, MathError> {
    div_rounding_up(demand.currency_demand_x7.get(), supply_x7(total_supply))
}
