pub mod bid;
pub mod checkpoint;
mod clearing;
pub mod hooks;
pub mod params;
pub mod schedule;
mod settle;
mod state;
mod submit;
pub mod tick_book;

pub use bid::{Bid, BidId};
pub use checkpoint::{Checkpoint, Fill};
pub use hooks::{AcceptAllBids, BidRequest, InMemorySettlement, Settlement, ValidationHook};
pub use params::AuctionParameters;
pub use settle::BidExit;
pub use state::{Auction, CallContext};
