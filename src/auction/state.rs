//! Auction state and read-only queries.

use crate::error::{AuctionError, Error};
use crate::math::fixed_point::{Demand, currency_from_q96_x7x7};
use crate::math::math_helpers::{Rounding, to_u128};
use alloy_primitives::{Address, U256};
use tracing::info;

use super::bid::{Bid, BidId, BidLedger};
use super::checkpoint::{Checkpoint, CheckpointLedger};
use super::hooks::{AcceptAllBids, InMemorySettlement, Settlement, ValidationHook};
use super::params::{AuctionParameters, max_bid_price};
use super::schedule::IssuanceSchedule;
use super::tick_book::TickBook;

/// Context provided by the caller for each operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block number
    pub block_number: u64,
}

impl CallContext {
    pub fn new(sender: Address, block_number: u64) -> Self {
        Self {
            sender,
            block_number,
        }
    }
}

/// A single auction instance.
///
/// Every entry point takes `&mut self` and runs to completion; the hook and
/// the settlement collaborator only ever see plain data.
#[derive(Debug)]
pub struct Auction<H = AcceptAllBids, S = InMemorySettlement> {
    pub(super) params: AuctionParameters,
    pub(super) max_bid_price: U256,
    pub(super) schedule: IssuanceSchedule,
    pub(super) ticks: TickBook,
    pub(super) checkpoints: CheckpointLedger,
    pub(super) bids: BidLedger,
    /// Demand of every bid whose max price is above the clearing price.
    pub(super) sum_demand_above_clearing: Demand,
    /// Highest tick crossed by forced iteration since the last checkpoint.
    pub(super) min_clearing_price: U256,
    pub(super) tokens_received: bool,
    pub(super) currency_swept: bool,
    pub(super) tokens_swept: bool,
    pub(super) hook: H,
    pub(super) settlement: S,
}

impl Auction<AcceptAllBids, InMemorySettlement> {
    /// An auction that admits every bid and settles in memory.
    pub fn with_parameters(params: AuctionParameters) -> Result<Self, Error> {
        Self::new(params, AcceptAllBids, InMemorySettlement::new())
    }
}

impl<H: ValidationHook, S: Settlement> Auction<H, S> {
    pub fn new(params: AuctionParameters, hook: H, settlement: S) -> Result<Self, Error> {
        let schedule = params.validate()?;
        let max_bid_price = max_bid_price(params.total_supply);

        let mut checkpoints = CheckpointLedger::new();
        checkpoints.insert(Checkpoint::initial(
            params.start_block,
            params.floor_price,
            schedule.rate_at(params.start_block),
        ));

        info!(
            start_block = params.start_block,
            end_block = params.end_block,
            total_supply = params.total_supply,
            floor_price = %params.floor_price,
            "Auction created"
        );

        Ok(Self {
            ticks: TickBook::new(params.floor_price, params.tick_spacing),
            min_clearing_price: params.floor_price,
            max_bid_price,
            schedule,
            checkpoints,
            bids: BidLedger::new(),
            sum_demand_above_clearing: Demand::ZERO,
            tokens_received: false,
            currency_swept: false,
            tokens_swept: false,
            hook,
            settlement,
            params,
        })
    }

    /// Records the auction's token balance. The auction becomes active once
    /// the balance covers the total supply.
    pub fn on_tokens_received(&mut self, balance: u128) -> Result<(), AuctionError> {
        if self.tokens_received {
            return Err(AuctionError::TokensAlreadyReceived);
        }
        if balance < self.params.total_supply {
            return Err(AuctionError::InvalidTokenAmountReceived {
                required: self.params.total_supply,
                got: balance,
            });
        }
        self.tokens_received = true;
        info!(balance, "Tokens received");
        Ok(())
    }
}

impl<H, S> Auction<H, S> {
    pub fn parameters(&self) -> &AuctionParameters {
        &self.params
    }

    pub fn max_bid_price(&self) -> U256 {
        self.max_bid_price
    }

    pub fn tokens_received(&self) -> bool {
        self.tokens_received
    }

    pub fn is_started(&self, block_number: u64) -> bool {
        block_number >= self.params.start_block
    }

    pub fn is_over(&self, block_number: u64) -> bool {
        block_number >= self.params.end_block
    }

    pub fn is_claimable(&self, block_number: u64) -> bool {
        block_number >= self.params.claim_block
    }

    /// The latest checkpoint. One exists from construction onward.
    pub fn latest_checkpoint(&self) -> Result<&Checkpoint, AuctionError> {
        self.checkpoints
            .latest()
            .ok_or(AuctionError::CheckpointNotFound(self.params.start_block))
    }

    pub fn get_checkpoint(&self, block_number: u64) -> Option<&Checkpoint> {
        self.checkpoints.get(block_number)
    }

    pub fn checkpoints(&self) -> &CheckpointLedger {
        &self.checkpoints
    }

    /// Clearing price as of the latest checkpoint.
    pub fn clearing_price(&self) -> U256 {
        self.checkpoints
            .latest()
            .map_or(self.params.floor_price, |checkpoint| checkpoint.clearing_price)
    }

    /// Lowest price a new bid must exceed: the clearing price, or a tick
    /// already crossed by forced iteration if that is higher.
    pub fn bid_price_floor(&self) -> U256 {
        self.clearing_price().max(self.min_clearing_price)
    }

    pub fn next_active_tick_price(&self) -> U256 {
        self.ticks.next_active_price()
    }

    pub fn sum_demand_above_clearing(&self) -> Demand {
        self.sum_demand_above_clearing
    }

    pub fn ticks(&self) -> &TickBook {
        &self.ticks
    }

    pub fn bid(&self, id: BidId) -> Result<&Bid, AuctionError> {
        self.bids.get(id)
    }

    pub fn bids(&self) -> &BidLedger {
        &self.bids
    }

    /// Currency raised as of the latest checkpoint, rounded down.
    pub fn currency_raised(&self) -> Result<u128, Error> {
        let raised = self.latest_checkpoint()?.currency_raised;
        Ok(to_u128(currency_from_q96_x7x7(raised, Rounding::Down)?)?)
    }

    /// Tokens sold as of the latest checkpoint, rounded up.
    pub fn total_cleared(&self) -> Result<u128, Error> {
        let cleared = self.latest_checkpoint()?.total_cleared;
        Ok(to_u128(cleared.scale_down_rounding_up()?)?)
    }

    /// Whether the currency raised so far meets the graduation threshold.
    pub fn is_graduated(&self) -> Result<bool, Error> {
        Ok(self.currency_raised()? >= self.params.required_currency_raised)
    }

    pub fn currency_swept(&self) -> bool {
        self.currency_swept
    }

    pub fn tokens_swept(&self) -> bool {
        self.tokens_swept
    }

    pub fn hook_mut(&mut self) -> &mut H {
        &mut self.hook
    }

    pub fn settlement(&self) -> &S {
        &self.settlement
    }

    pub fn settlement_mut(&mut self) -> &mut S {
        &mut self.settlement
    }
}
