//! In-pipeline index
//!
//! Orders accepted from clients whose engine response has not yet been
//! processed. The index is the single source of truth for the
//! cancel-during-match race: a cancel pre-marks the entry CANCELLED, and
//! the engine reads that mark immediately before persisting its end state.
//!
//! Critical sections are map reads and writes only; the lock ranks above
//! the per-pair engine mutex and is never held across I/O.

use std::collections::HashMap;
use std::sync::Mutex;

use matching_engine::StatusArbiter;
use tracing::info;
use types::order::{Order, OrderStatus};

/// The lifecycle service's in-pipeline order index.
#[derive(Default)]
pub struct PipelineIndex {
    inner: Mutex<HashMap<String, Order>>,
}

impl PipelineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the hash. Returns `false` when an entry already exists, in
    /// which case the submission is a duplicate.
    pub fn insert_if_absent(&self, o: &Order) -> bool {
        let mut inner = self.inner.lock().expect("pipeline lock poisoned");
        if inner.contains_key(&o.hash) {
            return false;
        }
        inner.insert(o.hash.clone(), o.clone());
        true
    }

    /// Refresh the stored entry with derived fields filled in. A CANCELLED
    /// mark that landed in the meantime survives the refresh.
    pub fn update(&self, o: &Order) {
        let mut inner = self.inner.lock().expect("pipeline lock poisoned");
        if let Some(entry) = inner.get_mut(&o.hash) {
            let was_cancelled = entry.status == OrderStatus::Cancelled;
            *entry = o.clone();
            if was_cancelled {
                entry.status = OrderStatus::Cancelled;
            }
        }
    }

    pub fn remove(&self, hash: &str) -> Option<Order> {
        self.inner.lock().expect("pipeline lock poisoned").remove(hash)
    }

    pub fn get(&self, hash: &str) -> Option<Order> {
        self.inner.lock().expect("pipeline lock poisoned").get(hash).cloned()
    }

    /// Record the cancel intent on an in-flight order. Returns the entry
    /// after marking, or `None` when the order is not in the pipeline.
    pub fn mark_cancelled(&self, hash: &str) -> Option<Order> {
        let mut inner = self.inner.lock().expect("pipeline lock poisoned");
        inner.get_mut(hash).map(|entry| {
            entry.status = OrderStatus::Cancelled;
            info!(order = %hash, "in-pipeline order marked CANCELLED");
            entry.clone()
        })
    }

    /// Whether the entry carries a cancel mark.
    pub fn is_cancelled(&self, hash: &str) -> bool {
        self.inner
            .lock()
            .expect("pipeline lock poisoned")
            .get(hash)
            .map(|o| o.status == OrderStatus::Cancelled)
            .unwrap_or(false)
    }

    /// Sum of `remaining_sell_amount` over OPEN in-flight orders of `user`
    /// selling `asset`, excluding the order being validated.
    pub fn in_flight_lock(&self, user: &str, sell_asset: &str, exclude_hash: &str) -> i64 {
        let inner = self.inner.lock().expect("pipeline lock poisoned");
        inner
            .values()
            .filter(|o| {
                o.user_address == user
                    && o.hash != exclude_hash
                    && o.sell_asset() == sell_asset
                    && o.status == OrderStatus::Open
            })
            .map(|o| o.remaining_sell_amount)
            .sum()
    }
}

impl StatusArbiter for PipelineIndex {
    /// Apply a cancel that arrived while the engine was processing `o`.
    fn fix_order_status(&self, o: &mut Order) {
        if self.is_cancelled(&o.hash) {
            o.status = OrderStatus::Cancelled;
            info!(order = %o.hash, "order status fixed to CANCELLED");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use types::order::Side;
    use types::signed::SignedOrder;

    fn order(hash: &str, user: char, side: Side, remaining: i64) -> Order {
        Order {
            hash: hash.into(),
            user_address: user.to_string().repeat(32),
            matcher_address: "M".repeat(32),
            affiliate_address: String::new(),
            base_asset: "base".into(),
            quote_asset: "Q".repeat(44),
            side,
            status: OrderStatus::Open,
            price: 1000.0,
            amount: remaining.max(1),
            filled_amount: 0,
            remaining_sell_amount: remaining,
            pair_name: "GBYTE/USDC".into(),
            original_order: SignedOrder::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn insert_is_idempotent_on_hash() {
        let index = PipelineIndex::new();
        assert!(index.insert_if_absent(&order("h1", 'U', Side::SELL, 10)));
        assert!(!index.insert_if_absent(&order("h1", 'U', Side::SELL, 10)));
    }

    #[test]
    fn cancel_mark_survives_update() {
        let index = PipelineIndex::new();
        let mut o = order("h1", 'U', Side::SELL, 0);
        index.insert_if_absent(&o);
        index.mark_cancelled("h1");

        o.remaining_sell_amount = 100;
        index.update(&o);
        assert!(index.is_cancelled("h1"));
        assert_eq!(index.get("h1").unwrap().remaining_sell_amount, 100);
    }

    #[test]
    fn fix_order_status_applies_cancel_mark() {
        let index = PipelineIndex::new();
        let mut o = order("h1", 'U', Side::SELL, 10);
        index.insert_if_absent(&o);
        index.mark_cancelled("h1");

        o.status = OrderStatus::PartialFilled;
        index.fix_order_status(&mut o);
        assert_eq!(o.status, OrderStatus::Cancelled);

        // untouched orders keep their status
        let mut other = order("h2", 'U', Side::SELL, 10);
        index.fix_order_status(&mut other);
        assert_eq!(other.status, OrderStatus::Open);
    }

    #[test]
    fn in_flight_lock_scopes_by_user_asset_and_status() {
        let index = PipelineIndex::new();
        index.insert_if_absent(&order("h1", 'U', Side::SELL, 100));
        index.insert_if_absent(&order("h2", 'U', Side::SELL, 250));
        // different sell asset
        index.insert_if_absent(&order("h3", 'U', Side::BUY, 999));
        // different user
        index.insert_if_absent(&order("h4", 'V', Side::SELL, 999));
        // cancelled entries do not lock
        index.insert_if_absent(&order("h5", 'U', Side::SELL, 999));
        index.mark_cancelled("h5");

        assert_eq!(index.in_flight_lock(&"U".repeat(32), "base", "hx"), 350);
        // the order being validated is excluded
        assert_eq!(index.in_flight_lock(&"U".repeat(32), "base", "h2"), 100);
    }
}
