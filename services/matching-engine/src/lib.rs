//! Matching engine
//!
//! Price-time priority matching with per-pair serialization. One `OrderBook`
//! per pair crosses incoming orders against the persisted book; the
//! `Engine` routes bus messages to the pair workers.

pub mod engine;
pub mod executor;
pub mod orderbook;

pub use engine::Engine;
pub use orderbook::{NoopArbiter, OrderBook, StatusArbiter};
