//! Error taxonomy
//!
//! Store and chain failures are fatal to the operation that hit them and are
//! surfaced untranslated; validation and cancel failures are rejected back to
//! the client as `ERROR` events on the originating channel.

use std::fmt;
use thiserror::Error;

/// Failure of the persistent book store.
///
/// "Not found" is never an error: lookups return `Ok(None)` or an empty list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("duplicate order hash {0}")]
    DuplicateHash(String),

    #[error("store backend: {0}")]
    Backend(String),
}

/// Failure of the external chain adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("chain rpc: {0}")]
    Rpc(String),

    #[error("chain event stream closed")]
    StreamClosed,
}

/// An open order locking part of a user's balance, as reported in
/// insufficient-available diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct LockingOrder {
    pub hash: String,
    pub remaining_sell_amount: i64,
    pub price: f64,
}

impl fmt::Display for LockingOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {} at {}", self.hash, self.remaining_sell_amount, self.price)
    }
}

/// Rejections and failures on the order paths.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("insufficient {symbol} balance: have {have}, need {need} for order {hash} at {price}")]
    InsufficientBalance {
        symbol: String,
        have: i64,
        need: i64,
        hash: String,
        price: f64,
    },

    #[error(
        "insufficient {} available: have {}, need {} for order {} at {}, total balance: {}, open orders:\n{}",
        .symbol, .available, .need, .hash, .price, .total,
        .locking.iter().map(|o| o.to_string()).collect::<Vec<_>>().join("\n")
    )]
    InsufficientAvailable {
        symbol: String,
        available: i64,
        need: i64,
        hash: String,
        price: f64,
        total: i64,
        locking: Vec<LockingOrder>,
    },

    #[error("no order with corresponding hash: {0}")]
    UnknownOrder(String),

    #[error("cannot cancel order {hash}: status is {status}")]
    NotCancellable { hash: String, status: String },

    #[error("account {0} is blocked")]
    Blocked(String),

    #[error("not your order")]
    NotAuthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("internal: {0}")]
    Internal(String),
}

/// Failures inside the matching engine proper.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("malformed order: {0}")]
    InvalidOrder(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("engine response channel closed")]
    ResponseChannelClosed,
}
