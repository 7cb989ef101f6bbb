//! Ordered book of price levels.
//!
//! Ticks live in an arena and are indexed by price; each tick links to the
//! next higher initialized tick, giving an ascending singly-linked chain
//! rooted at the floor price.

use crate::FastMap;
use crate::MAX_TICK_PTR;
use crate::error::{Error, TickError};
use crate::math::fixed_point::Demand;
use alloy_primitives::U256;
use tracing::debug;

/// Arena index of a tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TickId(usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tick {
    pub price: U256,
    /// Aggregate demand of every bid whose max price is exactly `price`.
    pub demand: Demand,
    next: Option<TickId>,
}

#[derive(Clone, Debug)]
pub struct TickBook {
    ticks: Vec<Tick>,
    index: FastMap<U256, TickId>,
    floor_price: U256,
    tick_spacing: U256,
    next_active: Option<TickId>,
}

impl TickBook {
    /// Creates a book holding only the floor tick.
    pub fn new(floor_price: U256, tick_spacing: U256) -> Self {
        let mut book = Self {
            ticks: Vec::new(),
            index: FastMap::default(),
            floor_price,
            tick_spacing,
            next_active: None,
        };
        book.push(floor_price, None);
        book
    }

    #[inline]
    pub fn floor_price(&self) -> U256 {
        self.floor_price
    }

    #[inline]
    pub fn tick_spacing(&self) -> U256 {
        self.tick_spacing
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn is_initialized(&self, price: U256) -> bool {
        self.index.contains_key(&price)
    }

    pub fn get(&self, price: U256) -> Option<&Tick> {
        self.index.get(&price).map(|id| &self.ticks[id.0])
    }

    /// Price of the tick following `tick`, if any.
    pub fn next_price(&self, tick: &Tick) -> Option<U256> {
        tick.next.map(|id| self.ticks[id.0].price)
    }

    /// Lowest tick above the clearing price.
    pub fn next_active(&self) -> Option<&Tick> {
        self.next_active.map(|id| &self.ticks[id.0])
    }

    /// Price of [`Self::next_active`], or [`MAX_TICK_PTR`] when no tick is
    /// above the clearing price.
    pub fn next_active_price(&self) -> U256 {
        self.next_active().map_or(MAX_TICK_PTR, |tick| tick.price)
    }

    /// Moves `next_active` one tick up the chain.
    pub(crate) fn advance_next_active(&mut self) {
        self.next_active = self.next_active.and_then(|id| self.ticks[id.0].next);
    }

    /// Checks that `price` is a usable tick price: not the sentinel, and an
    /// exact number of tick spacings above the floor.
    pub fn validate_price(&self, price: U256) -> Result<(), TickError> {
        if price == MAX_TICK_PTR {
            return Err(TickError::PriceIsSentinel);
        }
        if price < self.floor_price || !((price - self.floor_price) % self.tick_spacing).is_zero() {
            return Err(TickError::TickPriceNotAtBoundary(price));
        }
        Ok(())
    }

    /// Returns the tick at `price`, initializing it after the walk from
    /// `prev_price` when absent.
    ///
    /// `prev_price` must be an initialized tick strictly below `price`;
    /// passing the immediately preceding tick keeps the walk to one step.
    pub fn get_or_init_tick(&mut self, prev_price: U256, price: U256) -> Result<&Tick, TickError> {
        let id = match self.index.get(&price).copied() {
            Some(id) => id,
            None => self.init_tick(prev_price, price)?,
        };
        Ok(&self.ticks[id.0])
    }

    fn init_tick(&mut self, prev_price: U256, price: U256) -> Result<TickId, TickError> {
        self.validate_price(price)?;

        if prev_price >= price {
            return Err(TickError::TickPreviousPriceInvalid);
        }
        let mut prev = self
            .index
            .get(&prev_price)
            .copied()
            .ok_or(TickError::TickPreviousPriceInvalid)?;

        while let Some(next) = self.ticks[prev.0].next {
            if self.ticks[next.0].price >= price {
                break;
            }
            prev = next;
        }

        let next = self.ticks[prev.0].next;
        let id = self.push(price, next);
        self.ticks[prev.0].next = Some(id);

        if self
            .next_active()
            .is_none_or(|active| price < active.price)
        {
            self.next_active = Some(id);
        }

        debug!(price = %price, prev_price = %self.ticks[prev.0].price, "Tick initialized");
        Ok(id)
    }

    /// Adds demand to an initialized tick.
    pub fn add_demand(&mut self, price: U256, demand: Demand) -> Result<(), Error> {
        let id = self
            .index
            .get(&price)
            .copied()
            .ok_or(TickError::TickNotInitialized(price))?;
        let tick = &mut self.ticks[id.0];
        tick.demand = tick.demand.checked_add(demand)?;
        Ok(())
    }

    /// Iterates initialized ticks in ascending price order from the floor.
    pub fn iter(&self) -> TickIter<'_> {
        TickIter {
            book: self,
            next: Some(TickId(0)),
        }
    }

    /// Iterates ticks above the clearing price, starting at
    /// [`Self::next_active`].
    pub fn iter_active(&self) -> TickIter<'_> {
        TickIter {
            book: self,
            next: self.next_active,
        }
    }

    fn push(&mut self, price: U256, next: Option<TickId>) -> TickId {
        let id = TickId(self.ticks.len());
        self.ticks.push(Tick {
            price,
            demand: Demand::ZERO,
            next,
        });
        self.index.insert(price, id);
        id
    }
}

pub struct TickIter<'a> {
    book: &'a TickBook,
    next: Option<TickId>,
}

impl<'a> Iterator for TickIter<'a> {
    type Item = &'a Tick;

    fn next(&mut self) -> Option<Self::Item> {
        let tick = &self.book.ticks[self.next?.0];
        self.next = tick.next;
        Some(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MPS, Q96};

    fn price(units: u64) -> U256 {
        U256::from(units) * Q96
    }

    fn book() -> TickBook {
        TickBook::new(price(100), price(10))
    }

    fn prices(book: &TickBook) -> Vec<U256> {
        book.iter().map(|tick| tick.price).collect()
    }

    #[test]
    fn starts_with_floor_tick_only() {
        let book = book();
        assert_eq!(prices(&book), vec![price(100)]);
        assert!(book.next_active().is_none());
        assert_eq!(book.next_active_price(), MAX_TICK_PTR);
    }

    #[test]
    fn chain_stays_sorted_with_valid_hints() {
        let mut book = book();
        book.get_or_init_tick(price(100), price(150)).unwrap();
        book.get_or_init_tick(price(100), price(120)).unwrap();
        book.get_or_init_tick(price(150), price(200)).unwrap();
        // stale but valid hint: walks past 120 and 150
        book.get_or_init_tick(price(100), price(170)).unwrap();
        book.get_or_init_tick(price(120), price(130)).unwrap();

        let chain = prices(&book);
        assert_eq!(
            chain,
            vec![
                price(100),
                price(120),
                price(130),
                price(150),
                price(170),
                price(200)
            ]
        );
        assert!(chain.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(book.len(), 6);
    }

    #[test]
    fn next_active_tracks_lowest_new_tick() {
        let mut book = book();
        book.get_or_init_tick(price(100), price(150)).unwrap();
        assert_eq!(book.next_active_price(), price(150));
        book.get_or_init_tick(price(100), price(120)).unwrap();
        assert_eq!(book.next_active_price(), price(120));
        book.get_or_init_tick(price(150), price(160)).unwrap();
        assert_eq!(book.next_active_price(), price(120));

        book.advance_next_active();
        assert_eq!(book.next_active_price(), price(150));
        book.advance_next_active();
        book.advance_next_active();
        assert_eq!(book.next_active_price(), MAX_TICK_PTR);
    }

    #[test]
    fn iter_active_starts_at_next_active() {
        let mut book = book();
        assert_eq!(book.iter_active().count(), 0);
        book.get_or_init_tick(price(100), price(120)).unwrap();
        book.get_or_init_tick(price(120), price(150)).unwrap();

        book.advance_next_active();
        let active: Vec<U256> = book.iter_active().map(|tick| tick.price).collect();
        assert_eq!(active, vec![price(150)]);
    }

    #[test]
    fn existing_tick_ignores_hint() {
        let mut book = book();
        book.get_or_init_tick(price(100), price(150)).unwrap();
        // hint above the price is fine once the tick exists
        let tick = book.get_or_init_tick(price(200), price(150)).unwrap();
        assert_eq!(tick.price, price(150));
    }

    #[test]
    fn rejects_hint_not_below_price() {
        let mut book = book();
        book.get_or_init_tick(price(100), price(150)).unwrap();
        assert_eq!(
            book.get_or_init_tick(price(150), price(130)).unwrap_err(),
            TickError::TickPreviousPriceInvalid
        );
    }

    #[test]
    fn rejects_uninitialized_hint() {
        let mut book = book();
        assert_eq!(
            book.get_or_init_tick(price(110), price(130)).unwrap_err(),
            TickError::TickPreviousPriceInvalid
        );
    }

    #[test]
    fn rejects_unaligned_and_sentinel_prices() {
        let mut book = book();
        assert_eq!(
            book.get_or_init_tick(price(100), price(125)).unwrap_err(),
            TickError::TickPriceNotAtBoundary(price(125))
        );
        assert_eq!(
            book.get_or_init_tick(price(100), price(90)).unwrap_err(),
            TickError::TickPriceNotAtBoundary(price(90))
        );
        assert_eq!(
            book.get_or_init_tick(price(100), MAX_TICK_PTR).unwrap_err(),
            TickError::PriceIsSentinel
        );
    }

    #[test]
    fn add_demand_requires_initialized_tick() {
        let mut book = book();
        let demand = Demand::from_bid(1_000, price(150), MPS).unwrap();

        assert!(matches!(
            book.add_demand(price(150), demand),
            Err(Error::TickError(TickError::TickNotInitialized(_)))
        ));

        book.get_or_init_tick(price(100), price(150)).unwrap();
        book.add_demand(price(150), demand).unwrap();
        book.add_demand(price(150), demand).unwrap();
        assert_eq!(
            book.get(price(150)).unwrap().demand,
            demand.checked_add(demand).unwrap()
        );
    }
}
