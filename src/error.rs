use thiserror::Error;

use crate::models::Direction;

/// Invariant breaches raised by the position book. These come from
/// out-of-order fills; the reconciler quarantines the fill instead of
/// crashing the lane.
#[derive(Debug, Error, PartialEq)]
pub enum BookError {
    #[error("direction conflict: book holds {book}, fill is {incoming}")]
    DirectionConflict { book: Direction, incoming: Direction },

    #[error("max lots exceeded (cap {0})")]
    MaxLotsExceeded(usize),
}

/// Malformed or out-of-order market data. Dropped with a counter increment,
/// never fatal.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("stale tick for {symbol}: ts {ts} <= last seen {last}")]
    StaleTick {
        symbol: String,
        ts: i64,
        last: i64,
    },
}

/// Invalid configuration at startup. The only error that terminates the
/// process.
#[derive(Debug, Error)]
#[error("fatal config: {0}")]
pub struct ConfigError(pub String);
