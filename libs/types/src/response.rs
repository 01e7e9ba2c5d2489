//! Engine and operator response payloads

use serde::{Deserialize, Serialize};

use crate::matches::Matches;
use crate::order::Order;
use crate::trade::Trade;

/// Outcome of one engine operation, published back to the lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    #[serde(rename = "ORDER_ADDED")]
    OrderAdded,
    #[serde(rename = "ORDER_FILLED")]
    OrderFilled,
    #[serde(rename = "ORDER_PARTIALLY_FILLED")]
    OrderPartiallyFilled,
    #[serde(rename = "ORDER_CANCELLED")]
    OrderCancelled,
    #[serde(rename = "TRADES_CANCELLED")]
    TradesCancelled,
    #[serde(rename = "ERROR")]
    Error,
}

/// The engine's response to a single order message.
///
/// `order` is the taker (or cancelled) order; `matches` is present on fills.
/// `TRADES_CANCELLED` carries the invalidated makers and cancelled trades
/// instead of a single order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
    pub status: EngineStatus,
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub matches: Option<Matches>,
    #[serde(default)]
    pub invalidated_orders: Option<Vec<Order>>,
    #[serde(default)]
    pub cancelled_trades: Option<Vec<Trade>>,
}

impl EngineResponse {
    pub fn order_added(order: Order) -> Self {
        EngineResponse {
            status: EngineStatus::OrderAdded,
            order: Some(order),
            matches: None,
            invalidated_orders: None,
            cancelled_trades: None,
        }
    }

    pub fn order_filled(order: Order, matches: Matches) -> Self {
        EngineResponse {
            status: EngineStatus::OrderFilled,
            order: Some(order),
            matches: Some(matches),
            invalidated_orders: None,
            cancelled_trades: None,
        }
    }

    pub fn order_partially_filled(order: Order, matches: Matches) -> Self {
        EngineResponse {
            status: EngineStatus::OrderPartiallyFilled,
            order: Some(order),
            matches: Some(matches),
            invalidated_orders: None,
            cancelled_trades: None,
        }
    }

    pub fn order_cancelled(order: Order) -> Self {
        EngineResponse {
            status: EngineStatus::OrderCancelled,
            order: Some(order),
            matches: None,
            invalidated_orders: None,
            cancelled_trades: None,
        }
    }

    pub fn trades_cancelled(invalidated: Vec<Order>, cancelled: Vec<Trade>) -> Self {
        EngineResponse {
            status: EngineStatus::TradesCancelled,
            order: None,
            matches: None,
            invalidated_orders: Some(invalidated),
            cancelled_trades: Some(cancelled),
        }
    }

    pub fn error(order: Option<Order>) -> Self {
        EngineResponse {
            status: EngineStatus::Error,
            order,
            matches: None,
            invalidated_orders: None,
            cancelled_trades: None,
        }
    }
}

/// Settlement-side message kinds delivered to the lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorMessageKind {
    /// Server-side failure before or during submission.
    #[serde(rename = "TRADE_ERROR")]
    TradeError,
    /// Batch accepted into the chain's transaction pool.
    #[serde(rename = "TRADE_TX_PENDING")]
    TradeTxPending,
    /// Chain acknowledged the submitted batch.
    #[serde(rename = "TRADE_TX_SUCCESS")]
    TradeTxSuccess,
    /// Chain bounced the batch.
    #[serde(rename = "TRADE_TX_ERROR")]
    TradeTxError,
}

/// A settlement-pipeline notification about a batch of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorMessage {
    pub kind: OperatorMessageKind,
    pub matches: Matches,
    #[serde(default)]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_status_names() {
        assert_eq!(
            serde_json::to_string(&EngineStatus::OrderPartiallyFilled).unwrap(),
            "\"ORDER_PARTIALLY_FILLED\""
        );
        assert_eq!(
            serde_json::to_string(&OperatorMessageKind::TradeTxPending).unwrap(),
            "\"TRADE_TX_PENDING\""
        );
    }
}
