use alloy_primitives::U256;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("Math error - overflow")]
    Overflow,
    #[error("Math error - underflow")]
    Underflow,
    #[error("Math error - division by zero")]
    DivisionByZero,
}

/// Construction-time parameter errors. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Config error - floor price is 0")]
    FloorPriceIsZero,
    #[error("Config error - tick spacing is 0")]
    TickSpacingIsZero,
    #[error("Config error - total supply is 0")]
    TotalSupplyIsZero,
    #[error("Config error - total supply {0} exceeds the maximum")]
    TotalSupplyTooLarge(u128),
    #[error("Config error - end block {end_block} must be after start block {start_block}")]
    EndBlockNotAfterStart { start_block: u64, end_block: u64 },
    #[error("Config error - claim block {claim_block} is before end block {end_block}")]
    ClaimBlockBeforeEnd { end_block: u64, claim_block: u64 },
    #[error("Config error - floor price leaves no valid bid price below {max_bid_price}")]
    FloorPriceTooHigh { max_bid_price: U256 },
    #[error("Config error - malformed parameters: {0}")]
    Malformed(String),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Schedule error - no steps")]
    Empty,
    #[error("Schedule error - packed data length {0} is not a multiple of 8")]
    InvalidDataLength(usize),
    #[error("Schedule error - step {0} spans zero blocks")]
    ZeroLengthStep(usize),
    #[error("Schedule error - steps issue {got} mps, expected exactly {expected}")]
    InvalidMpsSum { got: u128, expected: u32 },
    #[error("Schedule error - steps end at block {got}, expected {expected}")]
    EndBlockMismatch { got: u64, expected: u64 },
    #[error("Schedule error - block {requested} is before cursor block {cursor}")]
    CursorMovedBackward { requested: u64, cursor: u64 },
    #[error("Schedule error - auction is over")]
    AuctionIsOver,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickError {
    #[error("Tick error - price is the max tick sentinel")]
    PriceIsSentinel,
    #[error("Tick error - price {0} is not on a tick boundary")]
    TickPriceNotAtBoundary(U256),
    #[error("Tick error - previous price hint is not initialized or not below the price")]
    TickPreviousPriceInvalid,
    #[error("Tick error - tick at {0} is not initialized")]
    TickNotInitialized(U256),
}

/// State precondition violations and accounting guards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("Auction error - auction has not started")]
    AuctionNotStarted,
    #[error("Auction error - tokens have not been received")]
    TokensNotReceived,
    #[error("Auction error - tokens already received")]
    TokensAlreadyReceived,
    #[error("Auction error - received {got} tokens, need {required}")]
    InvalidTokenAmountReceived { required: u128, got: u128 },
    #[error("Auction error - auction is over")]
    AuctionIsOver,
    #[error("Auction error - auction is not over")]
    AuctionIsNotOver,
    #[error("Auction error - claim block not reached")]
    NotClaimable,
    #[error("Auction error - bid amount is 0")]
    BidAmountTooSmall,
    #[error("Auction error - bid price must be above clearing price {clearing_price}")]
    BidMustBeAboveClearingPrice { clearing_price: U256 },
    #[error("Auction error - bid price above maximum {max_bid_price}")]
    InvalidBidPriceTooHigh { max_bid_price: U256 },
    #[error("Auction error - bid demand could not be cleared below the maximum bid price")]
    InvalidBidUnableToClear,
    #[error("Auction error - bid {0} not found")]
    BidNotFound(u64),
    #[error("Auction error - bid {0} already exited")]
    BidAlreadyExited(u64),
    #[error("Auction error - bid {0} has not exited")]
    BidNotExited(u64),
    #[error("Auction error - bid {0} already claimed")]
    BidAlreadyClaimed(u64),
    #[error("Auction error - bid {0} cannot use the fully filled exit")]
    CannotExitBid(u64),
    #[error("Auction error - batch claim bids must share one owner")]
    BatchClaimDifferentOwner,
    #[error("Auction error - checkpoint at block {0} not found")]
    CheckpointNotFound(u64),
    #[error("Auction error - invalid last fully filled checkpoint hint")]
    InvalidLastFullyFilledCheckpointHint,
    #[error("Auction error - invalid outbid block checkpoint hint")]
    InvalidOutbidBlockCheckpointHint,
    #[error("Auction error - zero issuance remaining")]
    ZeroMpsRemaining,
    #[error("Auction error - iteration target {0} is not above the clearing price")]
    ForceIterateTargetTooLow(U256),
    #[error("Auction error - auction did not graduate")]
    NotGraduated,
    #[error("Auction error - currency already swept")]
    CurrencyAlreadySwept,
    #[error("Auction error - unsold tokens already swept")]
    TokensAlreadySwept,
}

/// Rejection raised by a validation hook. The reason is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Hook rejected bid: {reason}")]
pub struct HookError {
    pub reason: String,
}

impl HookError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("Settlement error - insufficient {asset} balance: need {required}, have {available}")]
    InsufficientBalance {
        asset: &'static str,
        required: u128,
        available: u128,
    },
    #[error("Settlement error - transfer failed: {0}")]
    TransferFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    MathError(#[from] MathError),

    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    #[error(transparent)]
    ScheduleError(#[from] ScheduleError),

    #[error(transparent)]
    TickError(#[from] TickError),

    #[error(transparent)]
    AuctionError(#[from] AuctionError),

    #[error(transparent)]
    HookError(#[from] HookError),

    #[error(transparent)]
    SettlementError(#[from] SettlementError),
}
