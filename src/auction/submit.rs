use crate::error::{AuctionError, Error};
use crate::math::fixed_point::Demand;
use alloy_primitives::{Address, Bytes, U256};
use tracing::{info, warn};

use super::bid::{Bid, BidId};
use super::hooks::{BidRequest, Settlement, ValidationHook};
use super::state::{Auction, CallContext};

impl<H: ValidationHook, S: Settlement> Auction<H, S> {
    /// Admits a bid of `amount` currency at up to `max_price` per token.
    ///
    /// `prev_tick_price` must be an initialized tick below `max_price`; the
    /// tick directly below keeps initialization to a single step. The
    /// validation hook runs after every local check and before any bid
    /// state is written.
    pub fn submit_bid(
        &mut self,
        ctx: &CallContext,
        max_price: U256,
        amount: u128,
        owner: Address,
        prev_tick_price: U256,
        hook_data: Bytes,
    ) -> Result<BidId, Error> {
        let block_number = ctx.block_number;
        if !self.is_started(block_number) {
            return Err(AuctionError::AuctionNotStarted.into());
        }
        if !self.tokens_received {
            return Err(AuctionError::TokensNotReceived.into());
        }
        if self.is_over(block_number) {
            return Err(AuctionError::AuctionIsOver.into());
        }
        if amount == 0 {
            return Err(AuctionError::BidAmountTooSmall.into());
        }

        let checkpoint = self.checkpoint_at(block_number)?;

        let clearing_price = self.bid_price_floor();
        if max_price <= clearing_price {
            return Err(AuctionError::BidMustBeAboveClearingPrice { clearing_price }.into());
        }
        if max_price > self.max_bid_price {
            return Err(AuctionError::InvalidBidPriceTooHigh {
                max_bid_price: self.max_bid_price,
            }
            .into());
        }
        self.ticks.validate_price(max_price)?;

        let mps_remaining = checkpoint.mps_remaining();
        if mps_remaining == 0 {
            return Err(AuctionError::ZeroMpsRemaining.into());
        }
        let demand = Demand::from_bid(amount, max_price, mps_remaining)?;
        let sum_demand_above_clearing = self.sum_demand_above_clearing.checked_add(demand)?;
        let tick_demand = self
            .ticks
            .get(max_price)
            .map_or(Demand::ZERO, |tick| tick.demand)
            .checked_add(demand)?;
        self.check_clearable(&sum_demand_above_clearing, &tick_demand)?;

        let request = BidRequest {
            max_price,
            amount,
            owner,
            sender: ctx.sender,
            block_number,
            hook_data,
        };
        if let Err(e) = self.hook.validate(&request) {
            warn!(owner = %owner, reason = %e.reason, "Bid rejected by hook");
            return Err(e.into());
        }

        self.ticks.get_or_init_tick(prev_tick_price, max_price)?;
        self.ticks.add_demand(max_price, demand)?;
        self.sum_demand_above_clearing = sum_demand_above_clearing;

        let id = self.bids.create(Bid::new(
            max_price,
            amount,
            owner,
            checkpoint.block_number,
            checkpoint.cumulative_mps,
        ));

        info!(
            bid_id = %id,
            owner = %owner,
            max_price = %max_price,
            amount,
            block = block_number,
            "Bid submitted"
        );
        Ok(id)
    }
}
