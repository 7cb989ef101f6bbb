use crate::error::{AuctionError, MathError};
use crate::math::fixed_point::{Demand, mps_remaining};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Sequential bid identifier, starting at zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BidId(pub u64);

impl std::fmt::Display for BidId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub max_price: U256,
    /// Currency committed, in raw units.
    pub amount: u128,
    pub owner: Address,
    pub start_block: u64,
    /// Cumulative issuance already sold when the bid was admitted.
    pub start_cumulative_mps: u32,
    pub exited_block: Option<u64>,
    /// Written once at exit.
    pub tokens_filled: u128,
    pub claimed_block: Option<u64>,
}

impl Bid {
    pub fn new(
        max_price: U256,
        amount: u128,
        owner: Address,
        start_block: u64,
        start_cumulative_mps: u32,
    ) -> Self {
        Self {
            max_price,
            amount,
            owner,
            start_block,
            start_cumulative_mps,
            exited_block: None,
            tokens_filled: 0,
            claimed_block: None,
        }
    }

    /// Issuance left to spread the bid over.
    #[inline]
    pub fn mps_remaining(&self) -> u32 {
        mps_remaining(self.start_cumulative_mps)
    }

    pub fn demand(&self) -> Result<Demand, MathError> {
        Demand::from_bid(self.amount, self.max_price, self.mps_remaining())
    }

    #[inline]
    pub fn is_exited(&self) -> bool {
        self.exited_block.is_some()
    }

    #[inline]
    pub fn is_claimed(&self) -> bool {
        self.claimed_block.is_some()
    }
}

/// Append-only bid store.
#[derive(Clone, Debug, Default)]
pub struct BidLedger {
    bids: Vec<Bid>,
}

impl BidLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    /// Stores `bid` under the next id.
    pub fn create(&mut self, bid: Bid) -> BidId {
        let id = BidId(self.bids.len() as u64);
        self.bids.push(bid);
        id
    }

    pub fn get(&self, id: BidId) -> Result<&Bid, AuctionError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.bids.get(index))
            .ok_or(AuctionError::BidNotFound(id.0))
    }

    pub(crate) fn get_mut(&mut self, id: BidId) -> Result<&mut Bid, AuctionError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.bids.get_mut(index))
            .ok_or(AuctionError::BidNotFound(id.0))
    }

    pub fn iter(&self) -> impl Iterator<Item = (BidId, &Bid)> {
        self.bids
            .iter()
            .enumerate()
            .map(|(index, bid)| (BidId(index as u64), bid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MPS, Q96};

    fn bid(amount: u128) -> Bid {
        Bid::new(Q96, amount, Address::repeat_byte(0x11), 7, 0)
    }

    #[test]
    fn ids_are_sequential() {
        let mut ledger = BidLedger::new();
        assert_eq!(ledger.create(bid(1)), BidId(0));
        assert_eq!(ledger.create(bid(2)), BidId(1));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(BidId(1)).unwrap().amount, 2);
    }

    #[test]
    fn missing_bid_is_an_error() {
        let ledger = BidLedger::new();
        assert_eq!(ledger.get(BidId(3)).unwrap_err(), AuctionError::BidNotFound(3));
    }

    #[test]
    fn fresh_bid_is_open() {
        let bid = bid(10);
        assert!(!bid.is_exited());
        assert!(!bid.is_claimed());
        assert_eq!(bid.mps_remaining(), MPS);
        assert_eq!(bid.demand().unwrap(), Demand::from_bid(10, Q96, MPS).unwrap());
    }

    #[test]
    fn late_bid_has_less_remaining() {
        let late = Bid::new(Q96, 10, Address::ZERO, 50, MPS / 4);
        assert_eq!(late.mps_remaining(), MPS - MPS / 4);
    }
}
