//! In-process message bus
//!
//! The broker the production deployment runs on is an external collaborator;
//! inside the process its topics are bounded `tokio::sync::mpsc` channels.
//! Four topics exist: order messages into the engine, engine responses back
//! to the lifecycle, matched batches into the settlement operator, and
//! operator messages back to the lifecycle.
//!
//! Each topic is single-consumer, which is what gives a pair's order
//! messages their FIFO guarantee.

use thiserror::Error;
use tokio::sync::mpsc;

use types::matches::Matches;
use types::order::Order;
use types::response::{EngineResponse, OperatorMessage, OperatorMessageKind};

/// An order-path message consumed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderMessage {
    /// Run the order through matching.
    NewOrder(Order),
    /// Persist the order without matching (recovery/re-admission path).
    AddOrder(Order),
    /// Cancel the order.
    CancelOrder(Order),
}

impl OrderMessage {
    pub fn order(&self) -> &Order {
        match self {
            OrderMessage::NewOrder(o) | OrderMessage::AddOrder(o) | OrderMessage::CancelOrder(o) => o,
        }
    }
}

/// Publishing failed because the consuming half is gone.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("bus topic '{0}' closed")]
pub struct BusClosed(pub &'static str);

/// Publisher half of the bus. Cheap to clone; one lives in every service.
#[derive(Clone)]
pub struct Bus {
    orders: mpsc::Sender<OrderMessage>,
    responses: mpsc::Sender<EngineResponse>,
    queued_trades: mpsc::Sender<Matches>,
    operator: mpsc::Sender<OperatorMessage>,
}

/// Consumer half of the bus, handed to the service that owns each topic.
pub struct BusReceivers {
    pub orders: mpsc::Receiver<OrderMessage>,
    pub responses: mpsc::Receiver<EngineResponse>,
    pub queued_trades: mpsc::Receiver<Matches>,
    pub operator: mpsc::Receiver<OperatorMessage>,
}

/// Create the bus with `capacity` slots per topic.
pub fn channel(capacity: usize) -> (Bus, BusReceivers) {
    let (orders_tx, orders_rx) = mpsc::channel(capacity);
    let (responses_tx, responses_rx) = mpsc::channel(capacity);
    let (trades_tx, trades_rx) = mpsc::channel(capacity);
    let (operator_tx, operator_rx) = mpsc::channel(capacity);
    (
        Bus {
            orders: orders_tx,
            responses: responses_tx,
            queued_trades: trades_tx,
            operator: operator_tx,
        },
        BusReceivers {
            orders: orders_rx,
            responses: responses_rx,
            queued_trades: trades_rx,
            operator: operator_rx,
        },
    )
}

impl Bus {
    pub async fn publish_new_order(&self, order: Order) -> Result<(), BusClosed> {
        self.orders
            .send(OrderMessage::NewOrder(order))
            .await
            .map_err(|_| BusClosed("orders"))
    }

    pub async fn publish_add_order(&self, order: Order) -> Result<(), BusClosed> {
        self.orders
            .send(OrderMessage::AddOrder(order))
            .await
            .map_err(|_| BusClosed("orders"))
    }

    pub async fn publish_cancel_order(&self, order: Order) -> Result<(), BusClosed> {
        self.orders
            .send(OrderMessage::CancelOrder(order))
            .await
            .map_err(|_| BusClosed("orders"))
    }

    pub async fn publish_engine_response(&self, res: EngineResponse) -> Result<(), BusClosed> {
        self.responses.send(res).await.map_err(|_| BusClosed("responses"))
    }

    /// Hand a matched batch to the settlement operator.
    pub async fn publish_trades(&self, matches: Matches) -> Result<(), BusClosed> {
        self.queued_trades.send(matches).await.map_err(|_| BusClosed("queued_trades"))
    }

    pub async fn publish_trade_sent(&self, matches: Matches) -> Result<(), BusClosed> {
        self.publish_operator(OperatorMessageKind::TradeTxPending, matches, None).await
    }

    pub async fn publish_trade_success(&self, matches: Matches) -> Result<(), BusClosed> {
        self.publish_operator(OperatorMessageKind::TradeTxSuccess, matches, None).await
    }

    pub async fn publish_tx_error(
        &self,
        matches: Matches,
        error_type: impl Into<String>,
    ) -> Result<(), BusClosed> {
        self.publish_operator(OperatorMessageKind::TradeTxError, matches, Some(error_type.into()))
            .await
    }

    pub async fn publish_trade_error(
        &self,
        matches: Matches,
        error_type: impl Into<String>,
    ) -> Result<(), BusClosed> {
        self.publish_operator(OperatorMessageKind::TradeError, matches, Some(error_type.into()))
            .await
    }

    async fn publish_operator(
        &self,
        kind: OperatorMessageKind,
        matches: Matches,
        error_type: Option<String>,
    ) -> Result<(), BusClosed> {
        self.operator
            .send(OperatorMessage { kind, matches, error_type })
            .await
            .map_err(|_| BusClosed("operator"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::order::Side;

    fn order(hash: &str) -> Order {
        serde_json::from_value(serde_json::json!({
            "hash": hash,
            "userAddress": "U".repeat(32),
            "baseAsset": "base",
            "quoteAsset": "Q".repeat(44),
            "side": Side::BUY,
            "price": 1000.0,
            "amount": 100i64,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn order_messages_arrive_in_order() {
        let (bus, mut rx) = channel(8);
        bus.publish_new_order(order("h1")).await.unwrap();
        bus.publish_cancel_order(order("h1")).await.unwrap();

        assert!(matches!(rx.orders.recv().await.unwrap(), OrderMessage::NewOrder(o) if o.hash == "h1"));
        assert!(matches!(rx.orders.recv().await.unwrap(), OrderMessage::CancelOrder(o) if o.hash == "h1"));
    }

    #[tokio::test]
    async fn operator_messages_carry_kind_and_error() {
        let (bus, mut rx) = channel(8);
        let m = Matches::new(order("taker"));
        bus.publish_tx_error(m.clone(), "bounced").await.unwrap();

        let msg = rx.operator.recv().await.unwrap();
        assert_eq!(msg.kind, OperatorMessageKind::TradeTxError);
        assert_eq!(msg.error_type.as_deref(), Some("bounced"));
    }

    #[tokio::test]
    async fn publish_to_dropped_consumer_reports_closed() {
        let (bus, rx) = channel(1);
        drop(rx);
        assert_eq!(
            bus.publish_new_order(order("h1")).await,
            Err(BusClosed("orders"))
        );
    }
}
