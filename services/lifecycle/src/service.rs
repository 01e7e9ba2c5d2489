//! Order lifecycle service
//!
//! Mediates between external events (new order, cancel, revoke, expiry,
//! balance updates) and the engine: deduplicates submissions, validates
//! funding, arbitrates cancel races through the in-pipeline index, reacts to
//! engine and settlement responses, and pushes client notifications.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use book::{OrderStore, TradeStore};
use bus::Bus;
use chain_adapter::ChainProvider;
use types::account::Balances;
use types::asset::{BASE_ASSET, SETTLEMENT_FEE};
use types::errors::OrderError;
use types::matches::Matches;
use types::order::{Order, OrderCancel, OrderStatus};
use types::response::{EngineResponse, EngineStatus, OperatorMessage, OperatorMessageKind};
use types::trade::{Trade, TradeStatus};
use ws::{pair_topic, SocketRegistry};

use crate::pipeline::PipelineIndex;
use crate::validator::Validator;

const EXPIRY_SWEEP_SECS: u64 = 60;

/// The order lifecycle service.
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    trades: Arc<dyn TradeStore>,
    validator: Validator,
    bus: Bus,
    pipeline: Arc<PipelineIndex>,
    sockets: Arc<SocketRegistry>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        trades: Arc<dyn TradeStore>,
        provider: Arc<dyn ChainProvider>,
        bus: Bus,
        sockets: Arc<SocketRegistry>,
    ) -> Arc<Self> {
        let validator = Validator::new(provider, orders.clone());
        Arc::new(OrderService {
            orders,
            trades,
            validator,
            bus,
            pipeline: Arc::new(PipelineIndex::new()),
            sockets,
        })
    }

    /// The in-pipeline index, handed to the engine as its status arbiter.
    pub fn pipeline(&self) -> Arc<PipelineIndex> {
        self.pipeline.clone()
    }

    // ---- client-facing read API ----

    pub async fn by_hash(&self, hash: &str) -> Result<Option<Order>, OrderError> {
        Ok(self.orders.by_hash(hash).await?)
    }

    pub async fn current_by_user(&self, address: &str) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.current_by_user(address).await?)
    }

    pub async fn history_by_user(&self, address: &str) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.history_by_user(address).await?)
    }

    // ---- order admission ----

    /// Validate and admit a new order, then hand it to the engine.
    ///
    /// Duplicate submissions (in the pipeline or already persisted) return
    /// silently. On any failure the pipeline claim is rolled back.
    pub async fn new_order(&self, mut o: Order) -> Result<(), OrderError> {
        if !self.pipeline.insert_if_absent(&o) {
            info!(order = %o.hash, "duplicate order found in pipeline");
            return Ok(());
        }

        match self.admit(&mut o).await {
            Ok(admitted) => {
                if !admitted {
                    self.pipeline.remove(&o.hash);
                }
                Ok(())
            }
            Err(e) => {
                self.pipeline.remove(&o.hash);
                Err(e)
            }
        }
    }

    /// Returns `Ok(false)` for the silent duplicate-in-store case.
    async fn admit(&self, o: &mut Order) -> Result<bool, OrderError> {
        if self.orders.by_hash(&o.hash).await?.is_some() {
            info!(order = %o.hash, "duplicate order found in store");
            return Ok(false);
        }

        o.validate()?;
        o.pair_code()?;
        o.process()?;

        // the refreshed entry carries the derived sell amount, which is what
        // the in-flight lock of later orders must count
        self.pipeline.update(o);

        let in_flight =
            self.pipeline.in_flight_lock(&o.user_address, o.sell_asset(), &o.hash);
        let deltas = self
            .adjust_balances_for_uncommitted_trades(&o.user_address, Balances::new())
            .await?;
        self.validator.validate_available_balance(o, &deltas, in_flight).await?;

        self.bus
            .publish_new_order(o.clone())
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))?;
        Ok(true)
    }

    // ---- cancellation ----

    /// Cancel an order. Live orders are pre-emptively marked CANCELLED in
    /// the store so concurrent validators see the freed balance before the
    /// engine has processed the cancel.
    pub async fn cancel_order(&self, oc: &OrderCancel) -> Result<(), OrderError> {
        let memory_order = self.pipeline.mark_cancelled(&oc.order_hash);

        let stored = self.orders.by_hash(&oc.order_hash).await?;
        let found_in_store = stored.is_some();
        let o = match stored {
            Some(o) => o,
            None => match memory_order {
                Some(o) => {
                    info!(order = %oc.order_hash, "to-be-cancelled order found in pipeline only");
                    o
                }
                None => return Err(OrderError::UnknownOrder(oc.order_hash.clone())),
            },
        };

        if o.status == OrderStatus::Filled
            || o.status == OrderStatus::Error
            || (found_in_store && o.status == OrderStatus::Cancelled)
        {
            return Err(OrderError::NotCancellable {
                hash: o.hash.clone(),
                status: o.status.as_str().to_string(),
            });
        }

        if found_in_store
            && !matches!(
                o.status,
                OrderStatus::Cancelled | OrderStatus::AutoCancelled | OrderStatus::Filled
            )
        {
            self.orders.update_status(&o.hash, OrderStatus::Cancelled).await?;
        }

        self.bus
            .publish_cancel_order(o)
            .await
            .map_err(|e| OrderError::Internal(e.to_string()))
    }

    /// Owner and signer of the order a cancel refers to, for the
    /// coordinator's authorization check.
    pub async fn sender_addresses(&self, oc: &OrderCancel) -> Result<(String, String), OrderError> {
        let o = match self.pipeline.get(&oc.order_hash) {
            Some(o) => o,
            None => self
                .orders
                .by_hash(&oc.order_hash)
                .await?
                .ok_or_else(|| OrderError::UnknownOrder(oc.order_hash.clone()))?,
        };
        let signer = o.signer_address()?;
        Ok((o.user_address, signer))
    }

    // ---- auto-cancellation triggers ----

    /// Cancel open orders until the locked amount fits within the reported
    /// balance of each asset. When the base balance cannot even cover the
    /// per-trade settlement fees, every open order goes.
    pub async fn check_balances_and_cancel(
        &self,
        address: &str,
        balances_by_asset: &Balances,
    ) -> Result<(), OrderError> {
        for (asset, balance) in balances_by_asset {
            self.check_balance_and_cancel(address, asset, *balance).await?;
        }
        Ok(())
    }

    async fn check_balance_and_cancel(
        &self,
        address: &str,
        asset: &str,
        balance: i64,
    ) -> Result<(), OrderError> {
        let (mut locked, _) = self.orders.user_locked_balance(address, asset).await?;
        if locked <= balance {
            return Ok(());
        }

        let orders = self.orders.current_by_user(address).await?;
        let cancel_all =
            asset == BASE_ASSET && balance < orders.len() as i64 * SETTLEMENT_FEE;
        if cancel_all {
            warn!(address, balance, "base balance below fee floor, cancelling all open orders");
        }

        for mut order in orders {
            if !cancel_all && order.sell_asset() != asset {
                continue;
            }

            order.status = OrderStatus::AutoCancelled;
            let remaining = order.remaining_sell_amount;
            self.bus
                .publish_cancel_order(order)
                .await
                .map_err(|e| OrderError::Internal(e.to_string()))?;

            if !cancel_all {
                locked -= remaining;
                if locked <= balance {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Cancel every open order of `address` signed by a signer whose
    /// authorization was revoked.
    pub async fn cancel_orders_by_revoked_signer(
        &self,
        address: &str,
        signer: &str,
    ) -> Result<(), OrderError> {
        let orders = self.orders.current_by_user_and_signer(address, signer).await?;
        info!(
            count = orders.len(),
            address, signer, "cancelling orders after signer revocation"
        );
        for mut order in orders {
            order.status = OrderStatus::AutoCancelled;
            self.bus
                .publish_cancel_order(order)
                .await
                .map_err(|e| OrderError::Internal(e.to_string()))?;
        }
        Ok(())
    }

    /// Cancel every live order whose signed expiry has passed.
    pub async fn cancel_expired_orders(&self) -> Result<(), OrderError> {
        let orders = self.orders.expired(Utc::now().timestamp()).await?;
        if !orders.is_empty() {
            info!(count = orders.len(), "cancelling expired orders");
        }
        for mut order in orders {
            order.status = OrderStatus::AutoCancelled;
            self.bus
                .publish_cancel_order(order)
                .await
                .map_err(|e| OrderError::Internal(e.to_string()))?;
        }
        Ok(())
    }

    /// Periodic expiry sweep.
    pub fn spawn_expiry_sweep(self: &Arc<Self>) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut tick =
                tokio::time::interval(std::time::Duration::from_secs(EXPIRY_SWEEP_SECS));
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Err(e) = service.cancel_expired_orders().await {
                    error!(error = %e, "expiry sweep failed");
                }
            }
        })
    }

    // ---- engine responses ----

    /// Consume engine responses until the bus closes.
    pub async fn run_engine_responses(
        self: Arc<Self>,
        mut rx: tokio::sync::mpsc::Receiver<EngineResponse>,
    ) {
        while let Some(res) = rx.recv().await {
            self.handle_engine_response(res).await;
        }
    }

    pub async fn handle_engine_response(&self, mut res: EngineResponse) {
        if let Some(order) = res.order.as_mut() {
            // a cancel that raced the engine wins the notification too
            if self.pipeline.is_cancelled(&order.hash)
                && order.status != OrderStatus::Cancelled
            {
                order.status = OrderStatus::Cancelled;
                info!(order = %order.hash, "engine response status fixed to CANCELLED");
            }
            self.pipeline.remove(&order.hash);
        }

        match res.status {
            EngineStatus::Error => self.handle_engine_error(&res),
            EngineStatus::OrderAdded => self.handle_order_added(&res).await,
            EngineStatus::OrderFilled | EngineStatus::OrderPartiallyFilled => {
                self.handle_order_matched(&res).await
            }
            EngineStatus::OrderCancelled => self.handle_order_cancelled(&res).await,
            EngineStatus::TradesCancelled => self.handle_orders_invalidated(&res).await,
        }
    }

    fn handle_engine_error(&self, res: &EngineResponse) {
        if let Some(o) = &res.order {
            self.sockets.orders.send_order_message("ERROR", &o.user_address, ());
        }
    }

    async fn handle_order_added(&self, res: &EngineResponse) {
        let Some(o) = &res.order else { return };
        self.sockets.orders.send_order_message("ORDER_ADDED", &o.user_address, o);
        self.broadcast_order_book_update(std::slice::from_ref(o)).await;
        self.broadcast_raw_order_book_update(std::slice::from_ref(o)).await;
    }

    async fn handle_order_cancelled(&self, res: &EngineResponse) {
        let Some(o) = &res.order else { return };
        self.sockets.orders.send_order_message("ORDER_CANCELLED", &o.user_address, o);
        self.broadcast_order_book_update(std::slice::from_ref(o)).await;
        self.broadcast_raw_order_book_update(std::slice::from_ref(o)).await;
    }

    /// Persist the batch's trades, queue it for settlement, and notify every
    /// participant.
    async fn handle_order_matched(&self, res: &EngineResponse) {
        let Some(taker) = &res.order else { return };
        let Some(matches) = &res.matches else { return };

        let mut orders: Vec<Order> = vec![taker.clone()];
        orders.extend(matches.maker_orders.iter().cloned());

        if !matches.is_empty() {
            if let Err(e) = self.trades.create(&matches.trades).await {
                error!(error = %e, "failed to persist trades");
                self.sockets
                    .orders
                    .send_order_message("ERROR", &taker.user_address, e.to_string());
                return;
            }

            if let Err(e) = self.bus.publish_trades(matches.clone()).await {
                error!(error = %e, "failed to queue trades for settlement");
                self.sockets
                    .orders
                    .send_order_message("ERROR", &taker.user_address, e.to_string());
                return;
            }

            for o in &orders {
                self.sockets.orders.send_order_message(
                    "ORDER_MATCHED",
                    &o.user_address,
                    json!({ "matches": matches }),
                );
            }
        }

        self.broadcast_order_book_update(&orders).await;
        self.broadcast_raw_order_book_update(&orders).await;
    }

    async fn handle_orders_invalidated(&self, res: &EngineResponse) {
        let orders = res.invalidated_orders.as_deref().unwrap_or_default();
        let trades = res.cancelled_trades.as_deref().unwrap_or_default();

        for o in orders {
            self.sockets.orders.send_order_message("ORDER_INVALIDATED", &o.user_address, o);
        }
        if !orders.is_empty() {
            self.broadcast_order_book_update(orders).await;
            self.broadcast_raw_order_book_update(orders).await;
        }
        if !trades.is_empty() {
            self.broadcast_trade_update(trades);
        }
    }

    // ---- settlement messages ----

    /// Consume operator messages until the bus closes.
    pub async fn run_operator_messages(
        self: Arc<Self>,
        mut rx: tokio::sync::mpsc::Receiver<OperatorMessage>,
    ) {
        while let Some(msg) = rx.recv().await {
            self.handle_operator_message(msg).await;
        }
    }

    pub async fn handle_operator_message(&self, msg: OperatorMessage) {
        match msg.kind {
            OperatorMessageKind::TradeTxPending => self.handle_trade_tx_pending(&msg.matches),
            OperatorMessageKind::TradeTxSuccess => {
                self.handle_trade_tx_success(&msg.matches).await
            }
            OperatorMessageKind::TradeTxError => self.handle_trade_tx_error(&msg.matches).await,
            OperatorMessageKind::TradeError => self.handle_trade_error(&msg.matches).await,
        }
    }

    /// The batch reached the chain's transaction pool.
    fn handle_trade_tx_pending(&self, matches: &Matches) {
        let payload = json!({ "matches": matches });
        self.sockets.orders.send_order_message(
            "ORDER_PENDING",
            &matches.taker_order.user_address,
            &payload,
        );
        for o in &matches.maker_orders {
            self.sockets.orders.send_order_message("ORDER_PENDING", &o.user_address, &payload);
        }
        self.broadcast_trade_update(&matches.trades);
    }

    /// The chain acknowledged the submitted batch.
    async fn handle_trade_tx_success(&self, matches: &Matches) {
        let hashes: Vec<String> = matches.trades.iter().map(|t| t.hash.clone()).collect();
        if hashes.is_empty() {
            return;
        }

        let trades = match self.trades.update_statuses(TradeStatus::Success, &hashes).await {
            Ok(trades) => trades,
            Err(e) => {
                error!(error = %e, "failed to mark trades SUCCESS");
                return;
            }
        };

        self.sockets.orders.send_order_message(
            "ORDER_SUCCESS",
            &matches.taker_order.user_address,
            json!({ "matches": matches }),
        );
        for i in 0..matches.len() {
            let m = matches.nth_match(i);
            self.sockets.orders.send_order_message(
                "ORDER_SUCCESS",
                &m.maker_orders[0].user_address,
                json!({ "matches": m }),
            );
        }

        self.broadcast_trade_update(&trades);
    }

    /// The chain bounced the batch: trades are rejected and any partially
    /// filled order of either side is auto-cancelled.
    async fn handle_trade_tx_error(&self, matches: &Matches) {
        for t in &matches.trades {
            if let Err(e) = self.trades.update_status(&t.hash, TradeStatus::Rejected).await {
                error!(trade = %t.hash, error = %e, "failed to mark trade REJECTED");
            }
        }

        let taker = &matches.taker_order;
        self.sockets.orders.send_order_message("ORDER_ERROR", &taker.user_address, taker);
        if taker.status == OrderStatus::PartialFilled {
            if let Err(e) =
                self.orders.update_status(&taker.hash, OrderStatus::AutoCancelled).await
            {
                error!(order = %taker.hash, error = %e, "failed to auto-cancel taker");
            }
        }

        for o in &matches.maker_orders {
            self.sockets.orders.send_order_message("ORDER_ERROR", &o.user_address, o);
            if o.status == OrderStatus::PartialFilled {
                if let Err(e) =
                    self.orders.update_status(&o.hash, OrderStatus::AutoCancelled).await
                {
                    error!(order = %o.hash, error = %e, "failed to auto-cancel maker");
                }
            }
        }

        self.broadcast_trade_update(&matches.trades);
    }

    /// The operator hit a server-side failure before submission.
    async fn handle_trade_error(&self, matches: &Matches) {
        for t in &matches.trades {
            if let Err(e) = self.trades.update_status(&t.hash, TradeStatus::Error).await {
                error!(trade = %t.hash, error = %e, "failed to mark trade ERROR");
            }
        }

        self.sockets.orders.send_order_message(
            "ORDER_ERROR",
            &matches.taker_order.user_address,
            &matches.taker_order,
        );
        for o in &matches.maker_orders {
            self.sockets.orders.send_order_message("ORDER_ERROR", &o.user_address, o);
        }

        self.broadcast_trade_update(&matches.trades);
    }

    // ---- balances ----

    /// Apply the user's uncommitted trades to a balance map: the sold side
    /// is subtracted and the bought side added, so funds look locked as soon
    /// as a match is submitted rather than when the chain commits.
    pub async fn adjust_balances_for_uncommitted_trades(
        &self,
        address: &str,
        mut balances: Balances,
    ) -> Result<Balances, OrderError> {
        let trades = self.trades.uncommitted_by_user(address).await?;

        for t in trades {
            let Some(my_hash) = t.order_hash_of(address) else { continue };
            let Some(order) = self.orders.by_hash(my_hash).await? else {
                error!(trade = %t.hash, address, "order not found for uncommitted trade");
                continue;
            };

            let base_amount = t.amount;
            let quote_amount = (t.amount as f64 * t.price).round() as i64;
            let (sell_amount, buy_amount, sell_symbol, buy_symbol) = match order.side {
                types::order::Side::SELL => {
                    (base_amount, quote_amount, t.base_symbol(), t.quote_symbol())
                }
                types::order::Side::BUY => {
                    (quote_amount, base_amount, t.quote_symbol(), t.base_symbol())
                }
            };

            *balances.entry(sell_symbol.to_string()).or_insert(0) -= sell_amount;
            *balances.entry(buy_symbol.to_string()).or_insert(0) += buy_amount;
        }

        Ok(balances)
    }

    // ---- broadcasts ----

    async fn broadcast_order_book_update(&self, orders: &[Order]) {
        let Some(first) = orders.first() else { return };

        let mut bids = Vec::new();
        let mut asks = Vec::new();
        for o in orders {
            let level = match self
                .orders
                .book_level(&o.base_asset, &o.quote_asset, o.price, o.side)
                .await
            {
                Ok(level) => level,
                Err(e) => {
                    error!(error = %e, "failed to read book level");
                    continue;
                }
            };
            match o.side {
                types::order::Side::BUY => bids.push(level),
                types::order::Side::SELL => asks.push(level),
            }
        }

        let topic = pair_topic(&first.base_asset, &first.quote_asset);
        self.sockets.orderbook.broadcast_message(
            &topic,
            json!({
                "pairName": first.pair_name,
                "bids": bids,
                "asks": asks,
            }),
        );
    }

    async fn broadcast_raw_order_book_update(&self, orders: &[Order]) {
        let Some(first) = orders.first() else { return };
        let topic = pair_topic(&first.base_asset, &first.quote_asset);
        self.sockets.raw_orderbook.broadcast_message(&topic, orders);
    }

    fn broadcast_trade_update(&self, trades: &[Trade]) {
        let Some(first) = trades.first() else { return };
        let topic = pair_topic(&first.base_asset, &first.quote_asset);
        self.sockets.trades.broadcast_message(&topic, trades);
    }
}
