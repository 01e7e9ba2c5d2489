//! In-memory book backends
//!
//! Single-process implementations of the store contracts, used by tests and
//! local runs. Every mutation is a single-document read-modify-write under
//! one lock, which is the same atomicity the document store gives us.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use types::errors::StoreError;
use types::numeric;
use types::order::{Order, OrderStatus, Side};
use types::trade::{Trade, TradeStatus};

use crate::store::{BookLevel, BookLevels, OrderStore, TradeStore};

/// Seconds before expiry during which an order no longer matches.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn poisoned(_: impl std::fmt::Debug) -> StoreError {
    StoreError::Backend("store lock poisoned".into())
}

/// In-memory order store.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

/// In-memory trade store.
#[derive(Default)]
pub struct MemoryTradeStore {
    trades: RwLock<HashMap<String, Trade>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_pair_orders(
        &self,
        base_asset: &str,
        quote_asset: &str,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders
            .values()
            .filter(|o| o.is_live() && o.base_asset == base_asset && o.quote_asset == quote_asset)
            .cloned()
            .collect())
    }
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Apply a status to an order in place. Terminal statuses release the
/// remaining sell amount.
fn apply_status(o: &mut Order, status: OrderStatus) {
    o.status = status;
    if status.is_terminal() {
        o.remaining_sell_amount = 0;
    }
    o.updated_at = Utc::now();
}

/// Remaining sell amount of an order whose fill was rolled back to `filled`.
fn restored_remaining(o: &Order, filled: i64) -> i64 {
    match o.side {
        Side::SELL => o.amount - filled,
        Side::BUY => {
            let total = o
                .sell_amount()
                .unwrap_or_else(|_| numeric::quote_amount(o.amount, o.price));
            let spent = numeric::quote_amount(filled, o.original_price().unwrap_or(o.price));
            (total - spent).max(0)
        }
    }
}

fn crosses(taker: &Order, maker: &Order) -> bool {
    match taker.side {
        Side::BUY => maker.price <= taker.price,
        Side::SELL => maker.price >= taker.price,
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, o: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if orders.contains_key(&o.hash) {
            return Err(StoreError::DuplicateHash(o.hash.clone()));
        }
        orders.insert(o.hash.clone(), o.clone());
        Ok(())
    }

    async fn find_and_modify(&self, hash: &str, o: &Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let mut doc = o.clone();
        doc.hash = hash.to_string();
        doc.updated_at = Utc::now();
        if doc.status.is_terminal() {
            doc.remaining_sell_amount = 0;
        }
        if let Some(existing) = orders.get(hash) {
            doc.created_at = existing.created_at;
        }
        orders.insert(hash.to_string(), doc.clone());
        Ok(doc)
    }

    async fn update_status(&self, hash: &str, status: OrderStatus) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if let Some(o) = orders.get_mut(hash) {
            apply_status(o, status);
        }
        Ok(())
    }

    async fn update_statuses_by_hashes(
        &self,
        status: OrderStatus,
        hashes: &[String],
    ) -> Result<Vec<Order>, StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let mut updated = Vec::new();
        for hash in hashes {
            if let Some(o) = orders.get_mut(hash) {
                apply_status(o, status);
                updated.push(o.clone());
            }
        }
        Ok(updated)
    }

    async fn update_filled_amounts(
        &self,
        hashes: &[String],
        amounts: &[i64],
    ) -> Result<Vec<Order>, StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let mut updated = Vec::new();
        for (hash, amount) in hashes.iter().zip(amounts) {
            let Some(o) = orders.get_mut(hash) else { continue };

            let mut filled = o.filled_amount - amount;
            let status = if filled <= 0 {
                filled = 0;
                OrderStatus::Open
            } else if filled >= o.amount {
                filled = o.amount;
                OrderStatus::Filled
            } else {
                OrderStatus::PartialFilled
            };

            o.filled_amount = filled;
            o.status = status;
            o.remaining_sell_amount =
                if status == OrderStatus::Filled { 0 } else { restored_remaining(o, filled) };
            o.updated_at = Utc::now();
            updated.push(o.clone());
        }
        Ok(updated)
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(hash).cloned())
    }

    async fn by_hashes(&self, hashes: &[String]) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(hashes.iter().filter_map(|h| orders.get(h).cloned()).collect())
    }

    async fn current_by_user(&self, address: &str) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders
            .values()
            .filter(|o| o.user_address == address && o.is_live())
            .cloned()
            .collect())
    }

    async fn current_by_user_and_signer(
        &self,
        address: &str,
        signer: &str,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders
            .values()
            .filter(|o| {
                o.user_address == address
                    && o.is_live()
                    && o.signer_address().as_deref() == Ok(signer)
            })
            .cloned()
            .collect())
    }

    async fn history_by_user(&self, address: &str) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders
            .values()
            .filter(|o| o.user_address == address && !o.is_live())
            .cloned()
            .collect())
    }

    async fn expired(&self, now_ts: i64) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders
            .values()
            .filter(|o| o.is_live() && o.expiry_ts().is_some_and(|ts| ts <= now_ts))
            .cloned()
            .collect())
    }

    async fn matching_candidates(
        &self,
        taker: &Order,
        now_ts: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        let mut candidates: Vec<Order> = orders
            .values()
            .filter(|o| {
                o.is_live()
                    && o.base_asset == taker.base_asset
                    && o.quote_asset == taker.quote_asset
                    && o.matcher_address == taker.matcher_address
                    && o.side == taker.side.opposite()
                    && crosses(taker, o)
                    && o.expiry_ts().is_none_or(|ts| ts >= now_ts + EXPIRY_MARGIN_SECS)
            })
            .cloned()
            .collect();

        // best price first, then time priority
        candidates.sort_by(|a, b| {
            let by_price = match taker.side {
                Side::BUY => a.price.total_cmp(&b.price),
                Side::SELL => b.price.total_cmp(&a.price),
            };
            by_price.then_with(|| a.created_at.cmp(&b.created_at))
        });

        Ok(candidates)
    }

    async fn user_locked_balance(
        &self,
        address: &str,
        asset: &str,
    ) -> Result<(i64, Vec<Order>), StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        let locking: Vec<Order> = orders
            .values()
            .filter(|o| o.user_address == address && o.is_live() && o.sell_asset() == asset)
            .cloned()
            .collect();
        let total = locking.iter().map(|o| o.remaining_sell_amount).sum();
        Ok((total, locking))
    }

    async fn book_levels(
        &self,
        base_asset: &str,
        quote_asset: &str,
    ) -> Result<BookLevels, StoreError> {
        let live = self.live_pair_orders(base_asset, quote_asset)?;

        let mut levels: HashMap<(Side, u64), BookLevel> = HashMap::new();
        for o in &live {
            let entry = levels.entry((o.side, o.price.to_bits())).or_insert_with(|| BookLevel {
                price: o.price,
                amount: 0,
                matcher_address: o.matcher_address.clone(),
                matcher_fee_rate: o.matcher_fee_rate().unwrap_or(0.0),
            });
            entry.amount += o.remaining_amount();
        }

        let mut book = BookLevels::default();
        for ((side, _), level) in levels {
            match side {
                Side::BUY => book.bids.push(level),
                Side::SELL => book.asks.push(level),
            }
        }
        book.bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        book.asks.sort_by(|a, b| a.price.total_cmp(&b.price));
        Ok(book)
    }

    async fn book_level(
        &self,
        base_asset: &str,
        quote_asset: &str,
        price: f64,
        side: Side,
    ) -> Result<BookLevel, StoreError> {
        let live = self.live_pair_orders(base_asset, quote_asset)?;
        let mut level = BookLevel {
            price,
            amount: 0,
            matcher_address: String::new(),
            matcher_fee_rate: 0.0,
        };
        for o in live.iter().filter(|o| o.side == side && o.price.to_bits() == price.to_bits()) {
            if level.matcher_address.is_empty() {
                level.matcher_address = o.matcher_address.clone();
                level.matcher_fee_rate = o.matcher_fee_rate().unwrap_or(0.0);
            }
            level.amount += o.remaining_amount();
        }
        Ok(level)
    }

    async fn raw_book(
        &self,
        base_asset: &str,
        quote_asset: &str,
    ) -> Result<Vec<Order>, StoreError> {
        let mut live = self.live_pair_orders(base_asset, quote_asset)?;
        live.sort_by(|a, b| a.price.total_cmp(&b.price));
        Ok(live)
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn create(&self, new_trades: &[Trade]) -> Result<(), StoreError> {
        let mut trades = self.trades.write().map_err(poisoned)?;
        for t in new_trades {
            trades.insert(t.hash.clone(), t.clone());
        }
        Ok(())
    }

    async fn update_status(
        &self,
        hash: &str,
        status: TradeStatus,
    ) -> Result<Option<Trade>, StoreError> {
        let mut trades = self.trades.write().map_err(poisoned)?;
        Ok(trades.get_mut(hash).map(|t| {
            t.status = status;
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn update_statuses(
        &self,
        status: TradeStatus,
        hashes: &[String],
    ) -> Result<Vec<Trade>, StoreError> {
        let mut trades = self.trades.write().map_err(poisoned)?;
        let mut updated = Vec::new();
        for hash in hashes {
            if let Some(t) = trades.get_mut(hash) {
                t.status = status;
                t.updated_at = Utc::now();
                updated.push(t.clone());
            }
        }
        Ok(updated)
    }

    async fn update_statuses_by_maker_order_hashes(
        &self,
        status: TradeStatus,
        maker_order_hashes: &[String],
    ) -> Result<Vec<Trade>, StoreError> {
        let mut trades = self.trades.write().map_err(poisoned)?;
        let mut updated = Vec::new();
        for t in trades.values_mut() {
            if maker_order_hashes.contains(&t.maker_order_hash) {
                t.status = status;
                t.updated_at = Utc::now();
                updated.push(t.clone());
            }
        }
        Ok(updated)
    }

    async fn set_submitted(&self, hash: &str, tx_hash: &str) -> Result<Option<Trade>, StoreError> {
        let mut trades = self.trades.write().map_err(poisoned)?;
        Ok(trades.get_mut(hash).map(|t| {
            t.tx_hash = tx_hash.to_string();
            t.status = TradeStatus::Success;
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Trade>, StoreError> {
        let trades = self.trades.read().map_err(poisoned)?;
        Ok(trades.get(hash).cloned())
    }

    async fn by_hashes(&self, hashes: &[String]) -> Result<Vec<Trade>, StoreError> {
        let trades = self.trades.read().map_err(poisoned)?;
        Ok(hashes.iter().filter_map(|h| trades.get(h).cloned()).collect())
    }

    async fn by_trigger_unit(&self, tx_hash: &str) -> Result<Vec<Trade>, StoreError> {
        let trades = self.trades.read().map_err(poisoned)?;
        Ok(trades.values().filter(|t| t.tx_hash == tx_hash).cloned().collect())
    }

    async fn uncommitted_by_user(&self, address: &str) -> Result<Vec<Trade>, StoreError> {
        let trades = self.trades.read().map_err(poisoned)?;
        Ok(trades
            .values()
            .filter(|t| {
                t.status == TradeStatus::Success && (t.maker == address || t.taker == address)
            })
            .cloned()
            .collect())
    }

    async fn by_pair(
        &self,
        base_asset: &str,
        quote_asset: &str,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError> {
        let trades = self.trades.read().map_err(poisoned)?;
        let mut found: Vec<Trade> = trades
            .values()
            .filter(|t| t.base_asset == base_asset && t.quote_asset == quote_asset)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use types::signed::SignedOrder;

    fn addr(c: char) -> String {
        c.to_string().repeat(32)
    }

    fn quote() -> String {
        "Q".repeat(44)
    }

    fn signed(sell_amount: i64, price: f64, expiry_ts: Option<i64>) -> SignedOrder {
        SignedOrder(json!({
            "signed_message": {
                "sell_amount": sell_amount,
                "price": price,
                "matcher_fee": 100i64,
                "matcher_fee_asset": "base",
                "sell_asset": "base",
                "buy_asset": quote(),
                "expiry_ts": expiry_ts,
            },
            "authors": [{"address": addr('S')}],
        }))
    }

    fn order(hash: &str, user: char, side: Side, price: f64, amount: i64) -> Order {
        let remaining = match side {
            Side::SELL => amount,
            Side::BUY => numeric::quote_amount(amount, price),
        };
        Order {
            hash: hash.into(),
            user_address: addr(user),
            matcher_address: addr('M'),
            affiliate_address: String::new(),
            base_asset: "base".into(),
            quote_asset: quote(),
            side,
            status: OrderStatus::Open,
            price,
            amount,
            filled_amount: 0,
            remaining_sell_amount: remaining,
            pair_name: "GBYTE/USDC".into(),
            original_order: signed(remaining, price, None),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_hash() {
        let store = MemoryOrderStore::new();
        let o = order("h1", 'U', Side::SELL, 1000.0, 100);
        store.insert(&o).await.unwrap();
        assert_eq!(
            store.insert(&o).await,
            Err(StoreError::DuplicateHash("h1".into()))
        );
    }

    #[tokio::test]
    async fn find_and_modify_preserves_created_at() {
        let store = MemoryOrderStore::new();
        let o = order("h1", 'U', Side::SELL, 1000.0, 100);
        store.insert(&o).await.unwrap();

        let mut changed = o.clone();
        changed.status = OrderStatus::PartialFilled;
        changed.filled_amount = 10;
        changed.created_at = Utc::now();
        let stored = store.find_and_modify("h1", &changed).await.unwrap();

        assert_eq!(stored.created_at, o.created_at);
        assert_eq!(stored.status, OrderStatus::PartialFilled);
    }

    #[tokio::test]
    async fn terminal_status_releases_remaining_sell_amount() {
        let store = MemoryOrderStore::new();
        let o = order("h1", 'U', Side::SELL, 1000.0, 100);
        store.insert(&o).await.unwrap();

        store.update_status("h1", OrderStatus::Cancelled).await.unwrap();
        let stored = store.by_hash("h1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stored.remaining_sell_amount, 0);
        assert!(stored.check_invariants());
    }

    #[tokio::test]
    async fn matching_candidates_price_time_priority() {
        let store = MemoryOrderStore::new();
        let mut early = order("s1", 'A', Side::SELL, 1002.0, 100);
        early.created_at = Utc::now() - chrono::Duration::seconds(10);
        store.insert(&early).await.unwrap();
        store.insert(&order("s2", 'B', Side::SELL, 1001.0, 100)).await.unwrap();
        store.insert(&order("s3", 'C', Side::SELL, 1002.0, 100)).await.unwrap();
        // does not cross
        store.insert(&order("s4", 'D', Side::SELL, 1010.0, 100)).await.unwrap();
        // wrong matcher
        let mut foreign = order("s5", 'E', Side::SELL, 1000.0, 100);
        foreign.matcher_address = addr('X');
        store.insert(&foreign).await.unwrap();

        let taker = order("b1", 'T', Side::BUY, 1005.0, 300);
        let candidates = store.matching_candidates(&taker, 0).await.unwrap();
        let hashes: Vec<&str> = candidates.iter().map(|o| o.hash.as_str()).collect();
        assert_eq!(hashes, vec!["s2", "s1", "s3"]);
    }

    #[tokio::test]
    async fn matching_candidates_for_sell_taker_best_bid_first() {
        let store = MemoryOrderStore::new();
        store.insert(&order("b1", 'A', Side::BUY, 1001.0, 100)).await.unwrap();
        store.insert(&order("b2", 'B', Side::BUY, 1003.0, 100)).await.unwrap();
        store.insert(&order("b3", 'C', Side::BUY, 999.0, 100)).await.unwrap();

        let taker = order("s1", 'T', Side::SELL, 1000.0, 300);
        let candidates = store.matching_candidates(&taker, 0).await.unwrap();
        let hashes: Vec<&str> = candidates.iter().map(|o| o.hash.as_str()).collect();
        assert_eq!(hashes, vec!["b2", "b1"]);
    }

    #[tokio::test]
    async fn matching_candidates_skip_orders_about_to_expire() {
        let store = MemoryOrderStore::new();
        let now = 1_700_000_000;
        let mut expiring = order("s1", 'A', Side::SELL, 1000.0, 100);
        expiring.original_order = signed(100, 1000.0, Some(now + 30));
        store.insert(&expiring).await.unwrap();
        let mut living = order("s2", 'B', Side::SELL, 1000.0, 100);
        living.original_order = signed(100, 1000.0, Some(now + 3600));
        store.insert(&living).await.unwrap();

        let taker = order("b1", 'T', Side::BUY, 1000.0, 100);
        let candidates = store.matching_candidates(&taker, now).await.unwrap();
        let hashes: Vec<&str> = candidates.iter().map(|o| o.hash.as_str()).collect();
        assert_eq!(hashes, vec!["s2"]);
    }

    #[tokio::test]
    async fn locked_balance_sums_live_sell_side_orders() {
        let store = MemoryOrderStore::new();
        store.insert(&order("s1", 'U', Side::SELL, 1000.0, 100)).await.unwrap();
        store.insert(&order("s2", 'U', Side::SELL, 1000.0, 250)).await.unwrap();
        // BUY locks the quote asset, not base
        store.insert(&order("b1", 'U', Side::BUY, 1000.0, 100)).await.unwrap();
        // cancelled orders lock nothing
        store.insert(&order("s3", 'U', Side::SELL, 1000.0, 500)).await.unwrap();
        store.update_status("s3", OrderStatus::Cancelled).await.unwrap();

        let (locked, orders) = store.user_locked_balance(&addr('U'), "base").await.unwrap();
        assert_eq!(locked, 350);
        assert_eq!(orders.len(), 2);

        let (locked_quote, _) = store.user_locked_balance(&addr('U'), &quote()).await.unwrap();
        assert_eq!(locked_quote, numeric::quote_amount(100, 1000.0));
    }

    #[tokio::test]
    async fn expired_orders_query() {
        let store = MemoryOrderStore::new();
        let now = 1_700_000_000;
        let mut past = order("s1", 'A', Side::SELL, 1000.0, 100);
        past.original_order = signed(100, 1000.0, Some(now - 10));
        store.insert(&past).await.unwrap();
        let mut future = order("s2", 'B', Side::SELL, 1000.0, 100);
        future.original_order = signed(100, 1000.0, Some(now + 10));
        store.insert(&future).await.unwrap();
        store.insert(&order("s3", 'C', Side::SELL, 1000.0, 100)).await.unwrap();

        let expired = store.expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].hash, "s1");
    }

    #[tokio::test]
    async fn unfill_restores_open_state() {
        let store = MemoryOrderStore::new();
        let mut o = order("s1", 'U', Side::SELL, 1000.0, 100);
        o.filled_amount = 40;
        o.remaining_sell_amount = 60;
        o.status = OrderStatus::PartialFilled;
        store.insert(&o).await.unwrap();

        let updated = store.update_filled_amounts(&["s1".into()], &[40]).await.unwrap();
        assert_eq!(updated[0].status, OrderStatus::Open);
        assert_eq!(updated[0].filled_amount, 0);
        assert_eq!(updated[0].remaining_sell_amount, 100);
        assert!(updated[0].check_invariants());
    }

    #[tokio::test]
    async fn unfill_to_partial_recomputes_remaining() {
        let store = MemoryOrderStore::new();
        let mut o = order("s1", 'U', Side::SELL, 1000.0, 100);
        o.filled_amount = 70;
        o.remaining_sell_amount = 30;
        o.status = OrderStatus::PartialFilled;
        store.insert(&o).await.unwrap();

        let updated = store.update_filled_amounts(&["s1".into()], &[30]).await.unwrap();
        assert_eq!(updated[0].status, OrderStatus::PartialFilled);
        assert_eq!(updated[0].filled_amount, 40);
        assert_eq!(updated[0].remaining_sell_amount, 60);
    }

    #[tokio::test]
    async fn book_levels_aggregate_remaining_base() {
        let store = MemoryOrderStore::new();
        store.insert(&order("s1", 'A', Side::SELL, 1001.0, 100)).await.unwrap();
        let mut partial = order("s2", 'B', Side::SELL, 1001.0, 100);
        partial.filled_amount = 25;
        partial.remaining_sell_amount = 75;
        partial.status = OrderStatus::PartialFilled;
        store.insert(&partial).await.unwrap();
        store.insert(&order("s3", 'C', Side::SELL, 1002.0, 50)).await.unwrap();
        store.insert(&order("b1", 'D', Side::BUY, 999.0, 40)).await.unwrap();

        let book = store.book_levels("base", &quote()).await.unwrap();
        assert_eq!(book.asks.len(), 2);
        assert_eq!(book.asks[0].price, 1001.0);
        assert_eq!(book.asks[0].amount, 175);
        assert_eq!(book.asks[1].amount, 50);
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.bids[0].amount, 40);

        let level = store.book_level("base", &quote(), 1001.0, Side::SELL).await.unwrap();
        assert_eq!(level.amount, 175);
        assert_eq!(level.matcher_address, addr('M'));
    }

    #[tokio::test]
    async fn submitted_trades_are_found_by_trigger_unit() {
        let trades = MemoryTradeStore::new();
        let maker = order("m1", 'A', Side::SELL, 1000.0, 100);
        let taker = order("t1", 'B', Side::BUY, 1000.0, 100);
        let t = Trade::new(&maker, &taker, 100, 100_000);
        trades.create(&[t.clone()]).await.unwrap();

        let updated = trades.set_submitted(&t.hash, "unit-1").await.unwrap().unwrap();
        assert_eq!(updated.status, TradeStatus::Success);
        assert_eq!(updated.tx_hash, "unit-1");

        let found = trades.by_trigger_unit("unit-1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hash, t.hash);

        // SUCCESS trades count as uncommitted for both parties
        assert_eq!(trades.uncommitted_by_user(&addr('A')).await.unwrap().len(), 1);
        assert_eq!(trades.uncommitted_by_user(&addr('B')).await.unwrap().len(), 1);

        trades.update_status(&t.hash, TradeStatus::Committed).await.unwrap();
        assert!(trades.uncommitted_by_user(&addr('A')).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trades_by_pair_newest_first() {
        let trades = MemoryTradeStore::new();
        let maker = order("m1", 'A', Side::SELL, 1000.0, 100);
        let taker = order("t1", 'B', Side::BUY, 1000.0, 100);
        let mut t1 = Trade::new(&maker, &taker, 100, 100_000);
        t1.hash = "trade1".into();
        t1.created_at = Utc::now() - chrono::Duration::seconds(5);
        let mut t2 = t1.clone();
        t2.hash = "trade2".into();
        t2.created_at = Utc::now();
        trades.create(&[t1, t2]).await.unwrap();

        let found = trades.by_pair("base", &quote(), 10).await.unwrap();
        assert_eq!(found[0].hash, "trade2");
        assert_eq!(found[1].hash, "trade1");
    }
}
