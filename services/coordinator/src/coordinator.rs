//! Chain event coordinator
//!
//! Consumes the wallet node's event stream and dispatches each event to the
//! lifecycle service, the settlement operator, or the websocket registries.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use book::{OrderStore, TradeStore};
use bus::Bus;
use chain_adapter::{ChainEvent, ChainProvider};
use lifecycle::OrderService;
use settlement::Operator;
use types::account::Balances;
use types::errors::ChainError;
use types::matches::Matches;
use types::order::{Order, OrderCancel};
use types::trade::{Trade, TradeStatus};
use ws::SocketRegistry;

use crate::accounts::AccountRegistry;

/// The event coordinator.
pub struct EventCoordinator {
    provider: Arc<dyn ChainProvider>,
    service: Arc<OrderService>,
    operator: Arc<Operator>,
    orders: Arc<dyn OrderStore>,
    trades: Arc<dyn TradeStore>,
    sockets: Arc<SocketRegistry>,
    accounts: AccountRegistry,
    bus: Bus,
}

impl EventCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        service: Arc<OrderService>,
        operator: Arc<Operator>,
        orders: Arc<dyn OrderStore>,
        trades: Arc<dyn TradeStore>,
        sockets: Arc<SocketRegistry>,
        bus: Bus,
    ) -> Self {
        EventCoordinator {
            provider,
            service,
            operator,
            orders,
            trades,
            sockets,
            accounts: AccountRegistry::new(),
            bus,
        }
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    /// Subscribe to the chain stream and dispatch events until it closes.
    pub async fn run(self: Arc<Self>) -> Result<(), ChainError> {
        let mut rx = self.provider.listen().await?;
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
        Err(ChainError::StreamClosed)
    }

    pub async fn handle_event(&self, event: ChainEvent) {
        match event {
            ChainEvent::Loggedin { session_id, address } => {
                info!(session = %session_id, address = %address, "wallet session logged in");
                self.sockets.login.send_message_by_session(&session_id, &address);
                self.sockets.login.link_address(&session_id, &address, &self.sockets.orders);
            }

            ChainEvent::NewOrder(order) => self.handle_new_order(order).await,

            ChainEvent::CancelOrder(cancel) => self.handle_cancel_order(cancel).await,

            ChainEvent::Revoke { user_address, signer_address } => {
                info!(owner = %user_address, signer = %signer_address, "signer authorization revoked");
                if let Err(e) = self
                    .service
                    .cancel_orders_by_revoked_signer(&user_address, &signer_address)
                    .await
                {
                    error!(error = %e, "revocation sweep failed");
                }
            }

            ChainEvent::BalancesUpdate {
                address,
                balances_by_asset,
                balances_by_symbol,
                event,
            } => {
                self.handle_balances_update(&address, balances_by_asset, balances_by_symbol, &event)
                    .await
            }

            ChainEvent::ExchangeResponse { trigger_unit, bounced, response } => {
                self.handle_exchange_response(&trigger_unit, bounced, &response).await
            }

            ChainEvent::SubmittedTrades { trade_hashes } => {
                self.handle_submitted_trades(&trade_hashes).await
            }
        }
    }

    async fn handle_new_order(&self, order: Order) {
        let account = self.accounts.find_or_create(&order.user_address);
        if account.is_blocked {
            self.sockets
                .orders
                .send_order_message("ERROR", &order.user_address, "Account is blocked");
            return;
        }

        let user = order.user_address.clone();
        if let Err(e) = self.service.new_order(order).await {
            error!(error = %e, "order admission failed");
            self.sockets.orders.send_order_message("ERROR", &user, e.to_string());
        }
    }

    /// A cancel must come from the order's owner, its signer, or a delegate
    /// the owner authorized on-chain.
    async fn handle_cancel_order(&self, cancel: OrderCancel) {
        let (owner, signer) = match self.service.sender_addresses(&cancel).await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "cancel sender resolution failed");
                self.sockets
                    .orders
                    .send_order_message("ERROR", &cancel.user_address, e.to_string());
                return;
            }
        };

        if owner != cancel.user_address && signer != cancel.user_address {
            let authorized = match self.provider.authorized_addresses(&owner).await {
                Ok(list) => list,
                Err(e) => {
                    error!(error = %e, "authorized address lookup failed");
                    self.sockets
                        .orders
                        .send_order_message("ERROR", &cancel.user_address, e.to_string());
                    return;
                }
            };
            if !authorized.contains(&cancel.user_address) {
                warn!(order = %cancel.order_hash, sender = %cancel.user_address, "cancel from unauthorized sender");
                self.sockets
                    .orders
                    .send_order_message("ERROR", &cancel.user_address, "Not your order");
                return;
            }
        }

        if let Err(e) = self.service.cancel_order(&cancel).await {
            error!(error = %e, "cancel failed");
            self.sockets.orders.send_order_message("ERROR", &owner, e.to_string());
        }
    }

    /// Fresh chain balances: auto-cancel what the raw asset balances can no
    /// longer cover, and push symbol balances adjusted for uncommitted
    /// trades to the client.
    async fn handle_balances_update(
        &self,
        address: &str,
        balances_by_asset: Balances,
        balances_by_symbol: Balances,
        event: &str,
    ) {
        let adjusted = match self
            .service
            .adjust_balances_for_uncommitted_trades(address, balances_by_symbol)
            .await
        {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "balance adjustment failed");
                return;
            }
        };

        if let Err(e) = self.service.check_balances_and_cancel(address, &balances_by_asset).await
        {
            error!(error = %e, "balance sufficiency check failed");
        }

        self.sockets.orders.send_balances_message("UPDATE", address, &adjusted, event);
    }

    /// The exchange contract's verdict on one submitted trigger unit.
    ///
    /// Only trades still awaiting a verdict transition; redelivery of the
    /// same response is a no-op.
    async fn handle_exchange_response(&self, trigger_unit: &str, bounced: bool, response: &Value) {
        let located = match self.trades.by_trigger_unit(trigger_unit).await {
            Ok(trades) => trades,
            Err(e) => {
                error!(error = %e, "trade lookup by trigger unit failed");
                return;
            }
        };

        if located.is_empty() {
            // could be a trade by another matcher or a bounced withdrawal
            warn!(trigger_unit, "no trade found for trigger unit");
            return;
        }

        let actionable: Vec<Trade> = located
            .into_iter()
            .filter(|t| matches!(t.status, TradeStatus::Success | TradeStatus::Pending))
            .collect();
        if actionable.is_empty() {
            info!(trigger_unit, "trigger unit already settled, ignoring redelivery");
            return;
        }

        if bounced {
            let reason = response
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("bounced")
                .to_string();
            self.handle_bounce(&actionable, reason).await;
        } else {
            for t in &actionable {
                if let Err(e) = self.trades.update_status(&t.hash, TradeStatus::Committed).await
                {
                    error!(trade = %t.hash, error = %e, "failed to commit trade");
                }
            }
        }
    }

    async fn handle_bounce(&self, trades: &[Trade], reason: String) {
        let trade = &trades[0];
        let taker_order = match self.orders.by_hash(&trade.taker_order_hash).await {
            Ok(Some(o)) => o,
            Ok(None) => {
                error!(order = %trade.taker_order_hash, "taker order missing for bounced trade");
                return;
            }
            Err(e) => {
                error!(error = %e, "taker order lookup failed");
                return;
            }
        };
        let maker_order = match self.orders.by_hash(&trade.maker_order_hash).await {
            Ok(Some(o)) => o,
            Ok(None) => {
                error!(order = %trade.maker_order_hash, "maker order missing for bounced trade");
                return;
            }
            Err(e) => {
                error!(error = %e, "maker order lookup failed");
                return;
            }
        };

        let maker_address = maker_order.user_address.clone();
        let taker_address = taker_order.user_address.clone();
        let matches = Matches {
            taker_order,
            maker_orders: vec![maker_order],
            trades: trades.to_vec(),
        };

        // the lifecycle rejects the trades and notifies both parties
        if let Err(e) = self.bus.publish_tx_error(matches, reason).await {
            error!(error = %e, "failed to publish bounce");
            return;
        }

        // the wallet only sends balance updates after successful trades
        self.send_balances_update_after_trade(&maker_address).await;
        self.send_balances_update_after_trade(&taker_address).await;
    }

    async fn send_balances_update_after_trade(&self, address: &str) {
        let balances = match self.provider.balances_of(address).await {
            Ok(b) => b,
            Err(e) => {
                error!(address, error = %e, "balance refresh failed");
                return;
            }
        };
        match self
            .service
            .adjust_balances_for_uncommitted_trades(address, balances.balances_by_symbol)
            .await
        {
            Ok(adjusted) => {
                self.sockets.orders.send_balances_message("UPDATE", address, &adjusted, "trade")
            }
            Err(e) => error!(address, error = %e, "balance adjustment failed"),
        }
    }

    /// Trades surfaced in the chain's transaction pool: aggregate them into
    /// a batch and relay the acknowledgement through the operator.
    async fn handle_submitted_trades(&self, trade_hashes: &[String]) {
        let trades = match self.trades.by_hashes(trade_hashes).await {
            Ok(trades) => trades,
            Err(e) => {
                error!(error = %e, "trade lookup by hashes failed");
                return;
            }
        };
        if trades.is_empty() {
            warn!("no trades found for submitted trade hashes");
            return;
        }

        let taker_hash = &trades[0].taker_order_hash;
        if trades.iter().any(|t| &t.taker_order_hash != taker_hash) {
            error!("submitted trades reference different takers");
            return;
        }

        let taker_order = match self.orders.by_hash(taker_hash).await {
            Ok(Some(o)) => o,
            Ok(None) => {
                error!(order = %taker_hash, "taker order missing for submitted trades");
                return;
            }
            Err(e) => {
                error!(error = %e, "taker order lookup failed");
                return;
            }
        };

        let mut matches = Matches::new(taker_order);
        for t in &trades {
            match self.orders.by_hash(&t.maker_order_hash).await {
                Ok(Some(maker)) => matches.maker_orders.push(maker),
                Ok(None) => {
                    error!(order = %t.maker_order_hash, "maker order missing for submitted trade");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "maker order lookup failed");
                    return;
                }
            }
        }
        matches.trades = trades;

        self.operator.handle_tx_success(matches).await;
    }
}
