//! Match batches
//!
//! A `Matches` groups everything one taker order produced in a single pass
//! over the book: the maker orders it crossed and the trade per maker. The
//! batch is the unit submitted to the settlement queue.

use serde::{Deserialize, Serialize};

use crate::errors::OrderError;
use crate::order::Order;
use crate::trade::Trade;

/// One taker order with the maker orders and trades it produced.
///
/// `maker_orders` and `trades` are parallel: `trades[i]` fills
/// `maker_orders[i]`. Maker orders are pairwise distinct by hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matches {
    pub taker_order: Order,
    #[serde(default)]
    pub maker_orders: Vec<Order>,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

impl Matches {
    pub fn new(taker_order: Order) -> Self {
        Matches { taker_order, maker_orders: Vec::new(), trades: Vec::new() }
    }

    pub fn append_match(&mut self, maker_order: Order, trade: Trade) {
        self.maker_orders.push(maker_order);
        self.trades.push(trade);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// The i-th (maker, trade) pair as a single-entry batch, used for
    /// per-maker notifications.
    pub fn nth_match(&self, i: usize) -> Matches {
        Matches {
            taker_order: self.taker_order.clone(),
            maker_orders: vec![self.maker_orders[i].clone()],
            trades: vec![self.trades[i].clone()],
        }
    }

    /// The submitted prefix of this batch: the first `count` makers and
    /// trades. Used when the chain accepted only part of a batch.
    pub fn prefix(&self, count: usize) -> Matches {
        Matches {
            taker_order: self.taker_order.clone(),
            maker_orders: self.maker_orders[..count.min(self.maker_orders.len())].to_vec(),
            trades: self.trades[..count.min(self.trades.len())].to_vec(),
        }
    }

    pub fn trade_amounts(&self) -> Vec<i64> {
        self.trades.iter().map(|t| t.amount).collect()
    }

    pub fn pair_code(&self) -> Result<String, OrderError> {
        self.taker_order.pair_code()
    }

    /// Structural checks: parallel arrays, distinct makers, every trade
    /// referencing the taker.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.maker_orders.len() != self.trades.len() {
            return Err(OrderError::Validation("matches maker/trade arity mismatch".into()));
        }
        for (i, mo) in self.maker_orders.iter().enumerate() {
            if self.trades[i].maker_order_hash != mo.hash {
                return Err(OrderError::Validation("matches trade does not reference its maker".into()));
            }
            if self.trades[i].taker_order_hash != self.taker_order.hash {
                return Err(OrderError::Validation("matches trade does not reference the taker".into()));
            }
            if self.maker_orders[..i].iter().any(|prev| prev.hash == mo.hash) {
                return Err(OrderError::Validation("matches contain a duplicate maker order".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderStatus, Side};
    use crate::signed::SignedOrder;
    use chrono::Utc;

    fn order(hash: &str, side: Side) -> Order {
        Order {
            hash: hash.into(),
            user_address: "U".repeat(32),
            matcher_address: "M".repeat(32),
            affiliate_address: String::new(),
            base_asset: "base".into(),
            quote_asset: "Q".repeat(44),
            side,
            status: OrderStatus::Open,
            price: 1000.0,
            amount: 100,
            filled_amount: 0,
            remaining_sell_amount: 100,
            pair_name: "GBYTE/USDC".into(),
            original_order: SignedOrder::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn matches_with(n: usize) -> Matches {
        let taker = order("taker", Side::BUY);
        let mut m = Matches::new(taker.clone());
        for i in 0..n {
            let maker = order(&format!("maker{}", i), Side::SELL);
            let trade = Trade::new(&maker, &taker, 10, 10_000);
            m.append_match(maker, trade);
        }
        m
    }

    #[test]
    fn append_keeps_arrays_parallel() {
        let m = matches_with(3);
        assert_eq!(m.len(), 3);
        assert_eq!(m.trade_amounts(), vec![10, 10, 10]);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn nth_match_extracts_one_pair() {
        let m = matches_with(3);
        let second = m.nth_match(1);
        assert_eq!(second.len(), 1);
        assert_eq!(second.maker_orders[0].hash, "maker1");
        assert_eq!(second.taker_order.hash, "taker");
    }

    #[test]
    fn prefix_truncates() {
        let m = matches_with(3);
        let p = m.prefix(2);
        assert_eq!(p.len(), 2);
        assert_eq!(p.maker_orders[1].hash, "maker1");

        // prefix longer than the batch is the whole batch
        assert_eq!(m.prefix(10).len(), 3);
    }

    #[test]
    fn validate_rejects_duplicate_makers() {
        let taker = order("taker", Side::BUY);
        let maker = order("maker0", Side::SELL);
        let trade = Trade::new(&maker, &taker, 10, 10_000);
        let mut m = Matches::new(taker);
        m.append_match(maker.clone(), trade.clone());
        m.append_match(maker, trade);
        assert!(m.validate().is_err());
    }
}
