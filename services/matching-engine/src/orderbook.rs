//! Per-pair order book
//!
//! One `OrderBook` exists per pair code. Its mutex is held for the entire
//! duration of every operation, including the store writes for the order
//! being processed: operations on the same pair serialize, different pairs
//! run in parallel.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info};

use book::{OrderStore, TradeStore};
use bus::Bus;
use types::errors::EngineError;
use types::matches::Matches;
use types::order::{Order, OrderStatus};
use types::response::EngineResponse;
use types::trade::{Trade, TradeStatus};

use crate::executor;

/// Last-moment status arbitration before the engine persists an order.
///
/// Implemented by the lifecycle service's in-pipeline index: a cancel that
/// arrived while the engine was mid-match is applied here, which is what
/// makes the cancel race lossless.
pub trait StatusArbiter: Send + Sync {
    fn fix_order_status(&self, o: &mut Order);
}

/// Arbiter for contexts without a lifecycle pipeline (tests, tooling).
pub struct NoopArbiter;

impl StatusArbiter for NoopArbiter {
    fn fix_order_status(&self, _o: &mut Order) {}
}

/// The matcher state for a single pair.
pub struct OrderBook {
    pair_code: String,
    orders: Arc<dyn OrderStore>,
    trades: Arc<dyn TradeStore>,
    operator_address: String,
    arbiter: Arc<dyn StatusArbiter>,
    bus: Bus,
    mutex: Mutex<()>,
}

impl OrderBook {
    pub fn new(
        pair_code: impl Into<String>,
        orders: Arc<dyn OrderStore>,
        trades: Arc<dyn TradeStore>,
        operator_address: impl Into<String>,
        arbiter: Arc<dyn StatusArbiter>,
        bus: Bus,
    ) -> Self {
        OrderBook {
            pair_code: pair_code.into(),
            orders,
            trades,
            operator_address: operator_address.into(),
            arbiter,
            bus,
            mutex: Mutex::new(()),
        }
    }

    pub fn pair_code(&self) -> &str {
        &self.pair_code
    }

    /// Run a new order through matching and publish the engine response.
    pub async fn new_order(&self, o: Order) -> Result<(), EngineError> {
        let _guard = self.mutex.lock().await;
        let res = self.cross(o).await?;
        self.bus
            .publish_engine_response(res)
            .await
            .map_err(|_| EngineError::ResponseChannelClosed)
    }

    /// Persist an order without matching (recovery / re-admission).
    pub async fn add_order(&self, o: Order) -> Result<(), EngineError> {
        let _guard = self.mutex.lock().await;
        self.add(o).await?;
        Ok(())
    }

    /// Cancel an order and publish the engine response.
    ///
    /// A FILLED or AUTO_CANCELLED status on the incoming order is preserved;
    /// anything else becomes CANCELLED.
    pub async fn cancel_order(&self, mut o: Order) -> Result<(), EngineError> {
        let _guard = self.mutex.lock().await;

        if o.status != OrderStatus::AutoCancelled && o.status != OrderStatus::Filled {
            o.status = OrderStatus::Cancelled;
        }
        if matches!(o.status, OrderStatus::AutoCancelled | OrderStatus::Cancelled) {
            self.orders.update_status(&o.hash, o.status).await?;
            o.remaining_sell_amount = 0;
        }

        self.bus
            .publish_engine_response(EngineResponse::order_cancelled(o))
            .await
            .map_err(|_| EngineError::ResponseChannelClosed)
    }

    /// Roll back a batch whose settlement failed: un-fill the taker, mark
    /// the makers INVALIDATED and their trades CANCELLED, then re-admit the
    /// taker into matching.
    pub async fn invalidate_maker_orders(&self, matches: Matches) -> Result<(), EngineError> {
        let _guard = self.mutex.lock().await;

        let maker_hashes: Vec<String> =
            matches.trades.iter().map(|t| t.maker_order_hash.clone()).collect();
        let unfilled: i64 = matches.trades.iter().map(|t| t.amount).sum();

        let takers = self
            .orders
            .update_filled_amounts(&[matches.taker_order.hash.clone()], &[unfilled])
            .await?;

        let invalidated = self
            .orders
            .update_statuses_by_hashes(OrderStatus::Invalidated, &maker_hashes)
            .await?;

        let cancelled = self
            .trades
            .update_statuses_by_maker_order_hashes(TradeStatus::Cancelled, &maker_hashes)
            .await?;

        self.bus
            .publish_engine_response(EngineResponse::trades_cancelled(invalidated, cancelled))
            .await
            .map_err(|_| EngineError::ResponseChannelClosed)?;

        for taker in takers {
            if let Err(e) = self.bus.publish_new_order(taker).await {
                error!(pair = %self.pair_code, error = %e, "failed to re-admit taker order");
            }
        }

        Ok(())
    }

    async fn cross(&self, mut o: Order) -> Result<EngineResponse, EngineError> {
        let candidates = self.orders.matching_candidates(&o, Utc::now().timestamp()).await?;

        // orders addressed to another operator are only recorded here
        if candidates.is_empty() || o.matcher_address != self.operator_address {
            let stored = self.add(o).await?;
            return Ok(EngineResponse::order_added(stored));
        }

        let mut matches = Matches::new(o.clone());
        for mut maker in candidates {
            let trade = self.execute(&mut o, &mut maker).await?;
            matches.append_match(maker, trade);

            if o.status == OrderStatus::Filled {
                self.orders.find_and_modify(&o.hash, &o).await?;
                matches.taker_order = o.clone();
                return Ok(EngineResponse::order_filled(o, matches));
            }
        }

        // the order can be partially filled and then immediately cancelled
        self.arbiter.fix_order_status(&mut o);
        self.orders.find_and_modify(&o.hash, &o).await?;
        matches.taker_order = o.clone();
        Ok(EngineResponse::order_partially_filled(o, matches))
    }

    /// Execute one fill, persist the maker, and build the PENDING trade.
    async fn execute(&self, taker: &mut Order, maker: &mut Order) -> Result<Trade, EngineError> {
        let fill = executor::fill(taker, maker)?;
        self.orders.find_and_modify(&maker.hash, maker).await?;

        let trade = Trade::new(maker, taker, fill.amount, fill.quote_amount);
        info!(
            pair = %self.pair_code,
            maker = %maker.hash,
            taker = %taker.hash,
            amount = fill.amount,
            quote_amount = fill.quote_amount,
            "executed fill"
        );
        Ok(trade)
    }

    async fn add(&self, mut o: Order) -> Result<Order, EngineError> {
        if o.filled_amount == 0 {
            o.status = OrderStatus::Open;
        }
        self.arbiter.fix_order_status(&mut o);
        let stored = self.orders.find_and_modify(&o.hash, &o).await?;
        Ok(stored)
    }
}
