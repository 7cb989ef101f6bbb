//! Continuous uniform-clearing-price auction engine in pure Rust.
//!
//! A token supply is issued block by block according to a packed schedule
//! and sold at a single clearing price: the lowest price at which demand
//! above it absorbs the supply. Bids are filled lazily, from differences of
//! running sums stored in checkpoints, so exits never iterate blocks.
//!
//! This crate exposes:
//! - Fixed-point primitives (`math::*`): 512-bit mul-div with explicit
//!   rounding and the MPS-scaled value types.
//! - The auction building blocks (`auction::*`): issuance schedule, tick
//!   book, checkpoint ledger and bid ledger.
//! - The [`Auction`] state machine tying them together.
//!
//! # Examples
//!
//! ```no_run
//! use clearing_auction::{
//!     Address, Auction, AuctionParameters, Bytes, CallContext, Q96, U256,
//!     auction::schedule::encode_steps,
//! };
//!
//! let params = AuctionParameters {
//!     floor_price: U256::from(100u8) * Q96,
//!     tick_spacing: U256::from(10u8) * Q96,
//!     // 10% of the supply per block for 10 blocks
//!     auction_steps_data: encode_steps(&[(1_000_000, 10)]),
//!     start_block: 100,
//!     end_block: 110,
//!     claim_block: 110,
//!     total_supply: 1_000,
//!     required_currency_raised: 0,
//!     tokens_recipient: Address::ZERO,
//!     funds_recipient: Address::ZERO,
//! };
//! let mut auction = Auction::with_parameters(params).unwrap();
//! auction.on_tokens_received(1_000).unwrap();
//!
//! let bidder = Address::repeat_byte(1);
//! let id = auction
//!     .submit_bid(
//!         &CallContext::new(bidder, 100),
//!         U256::from(150u8) * Q96,
//!         200_000,
//!         bidder,
//!         U256::from(100u8) * Q96,
//!         Bytes::new(),
//!     )
//!     .unwrap();
//!
//! let end = CallContext::new(bidder, 110);
//! let checkpoint = auction.checkpoint(&end).unwrap();
//! println!("clearing price: {}", checkpoint.clearing_price);
//!
//! let exit = auction
//!     .exit_partially_filled_bid(&end, id, 100, None)
//!     .unwrap();
//! println!("tokens: {}, refund: {}", exit.tokens_filled, exit.currency_refunded);
//! ```

pub use alloy_primitives::{Address, Bytes, U256};

pub mod auction;
pub mod error;
mod hash;
pub mod math;

pub use auction::{Auction, AuctionParameters, BidExit, BidId, CallContext};
pub use hash::FastMap;

/// Full issuance, in milli-basis-points: 1e7 is 100% of the supply.
pub const MPS: u32 = 10_000_000;

pub(crate) const U256_MPS: U256 = U256::from_limbs([10_000_000, 0, 0, 0]);
pub(crate) const U256_MPS_SQUARED: U256 = U256::from_limbs([100_000_000_000_000, 0, 0, 0]);

pub const RESOLUTION: u8 = 96;
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);
pub const Q192: U256 = U256::from_limbs([0, 0, 0, 1]);

/// Largest total supply an auction accepts, 2^100.
pub const MAX_TOTAL_SUPPLY: u128 = 1 << 100;

/// "No tick above" sentinel. Never a valid bid price.
pub const MAX_TICK_PTR: U256 = U256::MAX;

/// Absolute ceiling on bid prices, 2^224.
pub const MAX_BID_PRICE_CAP: U256 = U256::from_limbs([0, 0, 0, 1 << 32]);
