//! Collaborators the auction calls out to: a bid validation predicate run
//! before admission, and the transfer primitive used by exits, claims and
//! sweeps.

use crate::FastMap;
use crate::error::{HookError, SettlementError};
use alloy_primitives::{Address, Bytes, U256};
use tracing::debug;

/// Full context of a bid handed to the validation hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidRequest {
    pub max_price: U256,
    pub amount: u128,
    pub owner: Address,
    pub sender: Address,
    pub block_number: u64,
    pub hook_data: Bytes,
}

pub trait ValidationHook {
    /// Accepts the bid or rejects it with a reason that is returned to the
    /// bidder unchanged.
    fn validate(&mut self, request: &BidRequest) -> Result<(), HookError>;
}

impl<F> ValidationHook for F
where
    F: FnMut(&BidRequest) -> Result<(), HookError>,
{
    fn validate(&mut self, request: &BidRequest) -> Result<(), HookError> {
        self(request)
    }
}

/// Admits every bid.
#[derive(Copy, Clone, Debug, Default)]
pub struct AcceptAllBids;

impl ValidationHook for AcceptAllBids {
    fn validate(&mut self, _request: &BidRequest) -> Result<(), HookError> {
        Ok(())
    }
}

/// Moves currency and tokens out of the auction. A transfer either fully
/// succeeds or leaves balances untouched.
pub trait Settlement {
    fn transfer_currency(&mut self, to: Address, amount: u128) -> Result<(), SettlementError>;

    fn transfer_tokens(&mut self, to: Address, amount: u128) -> Result<(), SettlementError>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Asset {
    Currency,
    Token,
}

impl Asset {
    fn name(self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Token => "token",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub asset: Asset,
    pub to: Address,
    pub amount: u128,
}

/// Settlement backed by two in-memory balances held by the auction.
///
/// Each transfer is checked against the held balance and recorded; received
/// amounts are credited per recipient.
#[derive(Clone, Debug, Default)]
pub struct InMemorySettlement {
    currency_held: u128,
    tokens_held: u128,
    received: FastMap<(Asset, Address), u128>,
    transfers: Vec<Transfer>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits currency escrowed by a bid.
    pub fn deposit_currency(&mut self, amount: u128) {
        self.currency_held = self.currency_held.saturating_add(amount);
    }

    /// Credits tokens minted or sent to the auction.
    pub fn deposit_tokens(&mut self, amount: u128) {
        self.tokens_held = self.tokens_held.saturating_add(amount);
    }

    pub fn currency_held(&self) -> u128 {
        self.currency_held
    }

    pub fn tokens_held(&self) -> u128 {
        self.tokens_held
    }

    /// Total `asset` transferred to `to` so far.
    pub fn received(&self, asset: Asset, to: Address) -> u128 {
        self.received.get(&(asset, to)).copied().unwrap_or(0)
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    fn transfer(&mut self, asset: Asset, to: Address, amount: u128) -> Result<(), SettlementError> {
        let held = match asset {
            Asset::Currency => &mut self.currency_held,
            Asset::Token => &mut self.tokens_held,
        };
        if *held < amount {
            return Err(SettlementError::InsufficientBalance {
                asset: asset.name(),
                required: amount,
                available: *held,
            });
        }
        *held -= amount;

        let entry = self.received.entry((asset, to)).or_insert(0);
        *entry = entry.saturating_add(amount);
        self.transfers.push(Transfer { asset, to, amount });

        debug!(asset = asset.name(), to = %to, amount, "Transfer settled");
        Ok(())
    }
}

impl Settlement for InMemorySettlement {
    fn transfer_currency(&mut self, to: Address, amount: u128) -> Result<(), SettlementError> {
        self.transfer(Asset::Currency, to, amount)
    }

    fn transfer_tokens(&mut self, to: Address, amount: u128) -> Result<(), SettlementError> {
        self.transfer(Asset::Token, to, amount)
    }
}
