//! Store contracts for orders and trades
//!
//! The production backend is a document store driven elsewhere; the engine
//! and lifecycle services only see these traits. Lookups distinguish
//! "not found" (`Ok(None)` / empty vec) from a backend failure
//! (`Err(StoreError)`), which is fatal to the caller and surfaced
//! untranslated.
//!
//! Mutations are single-document upserts. Status monotonicity (no edits to a
//! terminal order) is enforced by the callers, as is the one sanctioned
//! reversal: `update_filled_amounts` un-fills a taker whose batch was
//! invalidated after settlement failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use types::errors::StoreError;
use types::order::{Order, OrderStatus, Side};
use types::trade::{Trade, TradeStatus};

/// One aggregated price level of the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookLevel {
    pub price: f64,
    /// Sum of remaining base amounts of all live orders at this price.
    pub amount: i64,
    pub matcher_address: String,
    pub matcher_fee_rate: f64,
}

/// The two sides of the aggregated book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookLevels {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// Persistent order state.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order; fails with `StoreError::DuplicateHash` if the
    /// hash already exists.
    async fn insert(&self, o: &Order) -> Result<(), StoreError>;

    /// Upsert by hash and return the stored document. `created_at` is set
    /// only on insert.
    async fn find_and_modify(&self, hash: &str, o: &Order) -> Result<Order, StoreError>;

    /// Single-field status update. Terminal statuses release the remaining
    /// sell amount.
    async fn update_status(&self, hash: &str, status: OrderStatus) -> Result<(), StoreError>;

    /// Bulk status update, returning the updated orders.
    async fn update_statuses_by_hashes(
        &self,
        status: OrderStatus,
        hashes: &[String],
    ) -> Result<Vec<Order>, StoreError>;

    /// Subtract `amounts[i]` from the fill of `hashes[i]` and re-derive the
    /// status. This is the invalidation path: it may take a FILLED order
    /// back to OPEN or PARTIAL_FILLED.
    async fn update_filled_amounts(
        &self,
        hashes: &[String],
        amounts: &[i64],
    ) -> Result<Vec<Order>, StoreError>;

    async fn by_hash(&self, hash: &str) -> Result<Option<Order>, StoreError>;

    async fn by_hashes(&self, hashes: &[String]) -> Result<Vec<Order>, StoreError>;

    /// Live (OPEN or PARTIAL_FILLED) orders of a user.
    async fn current_by_user(&self, address: &str) -> Result<Vec<Order>, StoreError>;

    /// Live orders of a user signed by a particular signer address.
    async fn current_by_user_and_signer(
        &self,
        address: &str,
        signer: &str,
    ) -> Result<Vec<Order>, StoreError>;

    /// Settled history: every non-live order of a user.
    async fn history_by_user(&self, address: &str) -> Result<Vec<Order>, StoreError>;

    /// Live orders whose signed expiry is at or before `now_ts`.
    async fn expired(&self, now_ts: i64) -> Result<Vec<Order>, StoreError>;

    /// Live opposite-side orders of the taker's pair and matcher whose price
    /// crosses the taker's limit, in strict price-time priority (best price
    /// first, `created_at` ascending as tie-break). Orders expiring within
    /// 60 seconds of `now_ts` are excluded.
    async fn matching_candidates(&self, taker: &Order, now_ts: i64)
        -> Result<Vec<Order>, StoreError>;

    /// Sum of `remaining_sell_amount` over the user's live orders selling
    /// `asset`, together with those orders.
    async fn user_locked_balance(
        &self,
        address: &str,
        asset: &str,
    ) -> Result<(i64, Vec<Order>), StoreError>;

    /// Aggregated book for a pair, bids best-first and asks best-first.
    async fn book_levels(&self, base_asset: &str, quote_asset: &str)
        -> Result<BookLevels, StoreError>;

    /// The level at one price point of one side; zero amount when the level
    /// has emptied.
    async fn book_level(
        &self,
        base_asset: &str,
        quote_asset: &str,
        price: f64,
        side: Side,
    ) -> Result<BookLevel, StoreError>;

    /// All live orders of a pair sorted by price ascending, for the raw
    /// book snapshot.
    async fn raw_book(&self, base_asset: &str, quote_asset: &str)
        -> Result<Vec<Order>, StoreError>;
}

/// Persistent trade state.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn create(&self, trades: &[Trade]) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        hash: &str,
        status: TradeStatus,
    ) -> Result<Option<Trade>, StoreError>;

    async fn update_statuses(
        &self,
        status: TradeStatus,
        hashes: &[String],
    ) -> Result<Vec<Trade>, StoreError>;

    async fn update_statuses_by_maker_order_hashes(
        &self,
        status: TradeStatus,
        maker_order_hashes: &[String],
    ) -> Result<Vec<Trade>, StoreError>;

    /// Record a submitted trade: set its trigger unit and move it to SUCCESS.
    async fn set_submitted(&self, hash: &str, tx_hash: &str) -> Result<Option<Trade>, StoreError>;

    async fn by_hash(&self, hash: &str) -> Result<Option<Trade>, StoreError>;

    async fn by_hashes(&self, hashes: &[String]) -> Result<Vec<Trade>, StoreError>;

    /// Trades submitted under one trigger unit.
    async fn by_trigger_unit(&self, tx_hash: &str) -> Result<Vec<Trade>, StoreError>;

    /// Trades of a user submitted but not yet chain-committed (SUCCESS).
    async fn uncommitted_by_user(&self, address: &str) -> Result<Vec<Trade>, StoreError>;

    /// Latest trades of a pair, newest first.
    async fn by_pair(
        &self,
        base_asset: &str,
        quote_asset: &str,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError>;
}
