//! Post-auction settlement: bid exits, token claims and sweeps.
//!
//! State is written before the settlement collaborator is called. A failed
//! transfer restores the previous state and returns the error.

use crate::error::{AuctionError, Error};
use alloy_primitives::{Address, U256};
use tracing::{info, warn};

use super::bid::{Bid, BidId};
use super::checkpoint::{Checkpoint, Fill, account_fully_filled, account_partially_filled};
use super::hooks::{Settlement, ValidationHook};
use super::state::{Auction, CallContext};

/// Outcome of exiting a bid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BidExit {
    pub tokens_filled: u128,
    pub currency_spent: u128,
    pub currency_refunded: u128,
}

impl<H: ValidationHook, S: Settlement> Auction<H, S> {
    /// Exits a bid that was either above the final clearing price, or
    /// outbid at the first checkpoint after it was admitted. Every bid is
    /// refunded in full when the auction did not graduate.
    pub fn exit_bid(&mut self, ctx: &CallContext, id: BidId) -> Result<BidExit, Error> {
        let bid = self.exitable_bid(ctx, id)?;
        let final_checkpoint = self.checkpoint_at(self.params.end_block)?;

        let fill = if !self.is_graduated()? {
            Fill::default()
        } else {
            let start = self.checkpoints.try_get(bid.start_block)?;
            if bid.max_price > final_checkpoint.clearing_price {
                account_fully_filled(&final_checkpoint, start, &bid)?
            } else if self
                .next_checkpoint(start)
                .is_some_and(|next| next.clearing_price > bid.max_price)
            {
                Fill::default()
            } else {
                return Err(AuctionError::CannotExitBid(id.0).into());
            }
        };

        self.settle_exit(ctx, id, bid, fill)
    }

    /// Exits a bid whose max price was reached by the clearing price.
    ///
    /// `last_fully_filled_block` is the last checkpoint with a clearing price
    /// below the bid's max price. `outbid_block` is the first checkpoint with
    /// a clearing price above it, or `None` if the auction ended at exactly
    /// the bid's price.
    pub fn exit_partially_filled_bid(
        &mut self,
        ctx: &CallContext,
        id: BidId,
        last_fully_filled_block: u64,
        outbid_block: Option<u64>,
    ) -> Result<BidExit, Error> {
        let bid = self.exitable_bid(ctx, id)?;
        let final_checkpoint = self.checkpoint_at(self.params.end_block)?;

        if !self.is_graduated()? {
            return self.settle_exit(ctx, id, bid, Fill::default());
        }

        let start = self.checkpoints.try_get(bid.start_block)?;
        let lower = self
            .checkpoints
            .get(last_fully_filled_block)
            .ok_or(AuctionError::InvalidLastFullyFilledCheckpointHint)?;
        let lower_is_valid = lower.clearing_price < bid.max_price
            && lower.block_number >= bid.start_block
            && self
                .next_checkpoint(lower)
                .is_some_and(|next| next.clearing_price >= bid.max_price);
        if !lower_is_valid {
            return Err(AuctionError::InvalidLastFullyFilledCheckpointHint.into());
        }

        let mut fill = account_fully_filled(lower, start, &bid)?;

        let at_price = match outbid_block {
            Some(block) => {
                let upper = self
                    .checkpoints
                    .get(block)
                    .ok_or(AuctionError::InvalidOutbidBlockCheckpointHint)?;
                let prev = self
                    .prev_checkpoint(upper)
                    .filter(|prev| {
                        upper.clearing_price > bid.max_price && prev.clearing_price <= bid.max_price
                    })
                    .ok_or(AuctionError::InvalidOutbidBlockCheckpointHint)?;
                (prev.clearing_price == bid.max_price).then_some(prev)
            }
            None => {
                if final_checkpoint.clearing_price != bid.max_price {
                    return Err(AuctionError::InvalidOutbidBlockCheckpointHint.into());
                }
                Some(&final_checkpoint)
            }
        };

        if let Some(checkpoint) = at_price {
            let tick_demand = self
                .ticks
                .get(bid.max_price)
                .map_or(U256::ZERO, |tick| tick.demand.currency_demand_x7.get());
            let partial = account_partially_filled(
                &bid,
                tick_demand,
                checkpoint.currency_raised_at_clearing_price,
            )?;
            fill = fill.checked_add(partial)?;
        }

        self.settle_exit(ctx, id, bid, fill)
    }

    /// Sends an exited bid's tokens to its owner. Anyone may call this.
    pub fn claim_tokens(&mut self, ctx: &CallContext, id: BidId) -> Result<u128, Error> {
        if !self.is_claimable(ctx.block_number) {
            return Err(AuctionError::NotClaimable.into());
        }
        let bid = self.bids.get(id)?;
        Self::check_claimable(id, bid)?;
        let (owner, tokens) = (bid.owner, bid.tokens_filled);

        self.bids.get_mut(id)?.claimed_block = Some(ctx.block_number);
        if tokens > 0 {
            if let Err(e) = self.settlement.transfer_tokens(owner, tokens) {
                warn!(bid_id = %id, error = %e, "Token claim failed");
                self.bids.get_mut(id)?.claimed_block = None;
                return Err(e.into());
            }
        }

        info!(bid_id = %id, owner = %owner, tokens, "Tokens claimed");
        Ok(tokens)
    }

    /// Claims several bids of one owner with a single transfer.
    pub fn claim_tokens_batch(
        &mut self,
        ctx: &CallContext,
        owner: Address,
        ids: &[BidId],
    ) -> Result<u128, Error> {
        if !self.is_claimable(ctx.block_number) {
            return Err(AuctionError::NotClaimable.into());
        }

        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(AuctionError::BidAlreadyClaimed(pair[0].0).into());
        }

        let mut tokens: u128 = 0;
        for &id in ids {
            let bid = self.bids.get(id)?;
            if bid.owner != owner {
                return Err(AuctionError::BatchClaimDifferentOwner.into());
            }
            Self::check_claimable(id, bid)?;
            tokens = tokens.saturating_add(bid.tokens_filled);
        }

        for &id in ids {
            self.bids.get_mut(id)?.claimed_block = Some(ctx.block_number);
        }
        if tokens > 0 {
            if let Err(e) = self.settlement.transfer_tokens(owner, tokens) {
                warn!(owner = %owner, error = %e, "Batch token claim failed");
                for &id in ids {
                    self.bids.get_mut(id)?.claimed_block = None;
                }
                return Err(e.into());
            }
        }

        info!(owner = %owner, bids = ids.len(), tokens, "Tokens claimed in batch");
        Ok(tokens)
    }

    /// Sends the currency raised to the funds recipient, once, after a
    /// graduated auction ends.
    pub fn sweep_currency(&mut self, ctx: &CallContext) -> Result<u128, Error> {
        if !self.is_over(ctx.block_number) {
            return Err(AuctionError::AuctionIsNotOver.into());
        }
        if self.currency_swept {
            return Err(AuctionError::CurrencyAlreadySwept.into());
        }
        self.checkpoint_at(self.params.end_block)?;
        if !self.is_graduated()? {
            return Err(AuctionError::NotGraduated.into());
        }

        let amount = self.currency_raised()?;
        let recipient = self.params.funds_recipient;
        self.currency_swept = true;
        if let Err(e) = self.settlement.transfer_currency(recipient, amount) {
            warn!(error = %e, "Currency sweep failed");
            self.currency_swept = false;
            return Err(e.into());
        }

        info!(recipient = %recipient, amount, "Currency swept");
        Ok(amount)
    }

    /// Sends unsold tokens to the tokens recipient, once. Nothing is sold
    /// when the auction did not graduate.
    pub fn sweep_unsold_tokens(&mut self, ctx: &CallContext) -> Result<u128, Error> {
        if !self.is_over(ctx.block_number) {
            return Err(AuctionError::AuctionIsNotOver.into());
        }
        if self.tokens_swept {
            return Err(AuctionError::TokensAlreadySwept.into());
        }
        self.checkpoint_at(self.params.end_block)?;

        let supply = self.params.total_supply;
        let unsold = if self.is_graduated()? {
            supply.saturating_sub(self.total_cleared()?)
        } else {
            supply
        };
        let recipient = self.params.tokens_recipient;
        self.tokens_swept = true;
        if unsold > 0 {
            if let Err(e) = self.settlement.transfer_tokens(recipient, unsold) {
                warn!(error = %e, "Unsold token sweep failed");
                self.tokens_swept = false;
                return Err(e.into());
            }
        }

        info!(recipient = %recipient, unsold, "Unsold tokens swept");
        Ok(unsold)
    }

    fn exitable_bid(&self, ctx: &CallContext, id: BidId) -> Result<Bid, Error> {
        if !self.is_over(ctx.block_number) {
            return Err(AuctionError::AuctionIsNotOver.into());
        }
        let bid = self.bids.get(id)?;
        if bid.is_exited() {
            return Err(AuctionError::BidAlreadyExited(id.0).into());
        }
        Ok(bid.clone())
    }

    fn check_claimable(id: BidId, bid: &Bid) -> Result<(), AuctionError> {
        if !bid.is_exited() {
            return Err(AuctionError::BidNotExited(id.0));
        }
        if bid.is_claimed() {
            return Err(AuctionError::BidAlreadyClaimed(id.0));
        }
        Ok(())
    }

    fn next_checkpoint(&self, checkpoint: &Checkpoint) -> Option<&Checkpoint> {
        checkpoint.next.and_then(|block| self.checkpoints.get(block))
    }

    fn prev_checkpoint(&self, checkpoint: &Checkpoint) -> Option<&Checkpoint> {
        checkpoint.prev.and_then(|block| self.checkpoints.get(block))
    }

    /// Marks the bid exited and refunds unspent currency.
    fn settle_exit(
        &mut self,
        ctx: &CallContext,
        id: BidId,
        bid: Bid,
        fill: Fill,
    ) -> Result<BidExit, Error> {
        let refund = bid.amount.saturating_sub(fill.currency_spent);
        let exit = BidExit {
            tokens_filled: fill.tokens_filled,
            currency_spent: bid.amount - refund,
            currency_refunded: refund,
        };

        {
            let stored = self.bids.get_mut(id)?;
            stored.exited_block = Some(ctx.block_number);
            stored.tokens_filled = fill.tokens_filled;
        }
        if refund > 0 {
            if let Err(e) = self.settlement.transfer_currency(bid.owner, refund) {
                warn!(bid_id = %id, error = %e, "Bid refund failed");
                *self.bids.get_mut(id)? = bid;
                return Err(e.into());
            }
        }

        info!(
            bid_id = %id,
            tokens_filled = exit.tokens_filled,
            currency_spent = exit.currency_spent,
            currency_refunded = exit.currency_refunded,
            "Bid exited"
        );
        Ok(exit)
    }
}
