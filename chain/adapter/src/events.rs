//! Chain event stream types
//!
//! The wallet node pushes one stream of events at the matcher. Everything
//! the coordinator reacts to arrives here: client logins relayed through the
//! chain, signed orders and cancels, authorization revocations, balance
//! snapshots, and the asynchronous acknowledgements for submitted batches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use types::account::Balances;
use types::order::{Order, OrderCancel};

/// One event from the chain adapter's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChainEvent {
    /// A wallet session authenticated; bind the session to its address.
    Loggedin {
        #[serde(rename = "sessionId")]
        session_id: String,
        address: String,
    },

    /// A signed order addressed to this matcher.
    NewOrder(Order),

    /// A signed cancellation request.
    CancelOrder(OrderCancel),

    /// A signer's authorization on an owner address was revoked.
    Revoke {
        #[serde(rename = "userAddress")]
        user_address: String,
        #[serde(rename = "signerAddress")]
        signer_address: String,
    },

    /// Fresh chain balances for one address.
    BalancesUpdate {
        address: String,
        balances_by_asset: Balances,
        balances_by_symbol: Balances,
        event: String,
    },

    /// The exchange contract responded to a submitted trigger unit.
    ExchangeResponse {
        trigger_unit: String,
        bounced: bool,
        #[serde(default)]
        response: Value,
    },

    /// Trades became visible in the chain's transaction pool.
    SubmittedTrades { trade_hashes: Vec<String> },
}
