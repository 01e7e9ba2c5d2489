//! Trade execution and settlement types

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::OrderError;
use crate::order::{Order, Side};

/// Trade status, wire-stable.
///
/// `Success` means the batch was accepted by the chain's transaction pool;
/// `Committed` is the chain's final acknowledgement. A trade stays
/// "uncommitted" (balance-locking) while in `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "COMMITTED")]
    Committed,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "ERROR")]
    Error,
}

impl Default for TradeStatus {
    fn default() -> Self {
        TradeStatus::Pending
    }
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "PENDING",
            TradeStatus::Success => "SUCCESS",
            TradeStatus::Committed => "COMMITTED",
            TradeStatus::Rejected => "REJECTED",
            TradeStatus::Cancelled => "CANCELLED",
            TradeStatus::Error => "ERROR",
        }
    }
}

/// A fill between one maker order and one taker order.
///
/// `amount` is in base atoms, `quote_amount` in quote atoms, `price` is the
/// maker's price. The residual sell amounts of both sides are captured at
/// the moment of the fill for reconciliation after settlement failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub tx_hash: String,
    pub maker: String,
    pub taker: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub maker_order_hash: String,
    pub taker_order_hash: String,
    #[serde(default)]
    pub pair_name: String,
    pub price: f64,
    #[serde(default)]
    pub status: TradeStatus,
    pub amount: i64,
    pub quote_amount: i64,
    #[serde(default)]
    pub remaining_taker_sell_amount: i64,
    #[serde(default)]
    pub remaining_maker_sell_amount: i64,
    pub maker_side: Side,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Trade {
    /// Build the PENDING trade for a fill the engine just executed.
    pub fn new(maker: &Order, taker: &Order, amount: i64, quote_amount: i64) -> Self {
        let mut t = Trade {
            hash: String::new(),
            tx_hash: String::new(),
            maker: maker.user_address.clone(),
            taker: taker.user_address.clone(),
            base_asset: taker.base_asset.clone(),
            quote_asset: taker.quote_asset.clone(),
            maker_order_hash: maker.hash.clone(),
            taker_order_hash: taker.hash.clone(),
            pair_name: taker.pair_name.clone(),
            price: maker.price,
            status: TradeStatus::Pending,
            amount,
            quote_amount,
            remaining_taker_sell_amount: taker.remaining_sell_amount,
            remaining_maker_sell_amount: maker.remaining_sell_amount,
            maker_side: maker.side,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        t.hash = t.compute_hash();
        t
    }

    /// Trade identity: `base64(SHA-256(makerOrderHash ‖ takerOrderHash))`.
    pub fn compute_hash(&self) -> String {
        let mut sha = Sha256::new();
        sha.update(self.maker_order_hash.as_bytes());
        sha.update(self.taker_order_hash.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(sha.finalize())
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.taker.is_empty() {
            return Err(OrderError::Validation("trade 'taker' parameter is required".into()));
        }
        if self.maker.is_empty() {
            return Err(OrderError::Validation("trade 'maker' parameter is required".into()));
        }
        if self.maker_order_hash.is_empty() || self.taker_order_hash.is_empty() {
            return Err(OrderError::Validation("trade order hash parameters are required".into()));
        }
        if self.amount <= 0 {
            return Err(OrderError::Validation("trade 'amount' parameter should be positive".into()));
        }
        if self.quote_amount <= 0 {
            return Err(OrderError::Validation(
                "trade 'quoteAmount' parameter should be positive".into(),
            ));
        }
        if self.price <= 0.0 {
            return Err(OrderError::Validation("trade 'price' parameter should be positive".into()));
        }
        Ok(())
    }

    /// Asset-only pair key, the trade channel topic.
    pub fn asset_code(&self) -> String {
        format!("{}::{}", self.base_asset, self.quote_asset)
    }

    pub fn base_symbol(&self) -> &str {
        self.pair_name.split('/').next().unwrap_or("")
    }

    pub fn quote_symbol(&self) -> &str {
        match self.pair_name.split_once('/') {
            Some((_, quote)) => quote,
            None => "",
        }
    }

    /// The order hash belonging to `address` in this trade, if any.
    pub fn order_hash_of(&self, address: &str) -> Option<&str> {
        if self.taker == address {
            Some(&self.taker_order_hash)
        } else if self.maker == address {
            Some(&self.maker_order_hash)
        } else {
            None
        }
    }

    /// Side of `address` in this trade, from the participant's perspective.
    pub fn side_of(&self, address: &str) -> Option<Side> {
        if self.maker == address {
            Some(self.maker_side)
        } else if self.taker == address {
            Some(self.maker_side.opposite())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;
    use crate::signed::SignedOrder;

    fn order(user: &str, hash: &str, side: Side) -> Order {
        Order {
            hash: hash.into(),
            user_address: user.repeat(32),
            matcher_address: "M".repeat(32),
            affiliate_address: String::new(),
            base_asset: "base".into(),
            quote_asset: "Q".repeat(44),
            side,
            status: OrderStatus::Open,
            price: 1000.0,
            amount: 100_000_000,
            filled_amount: 0,
            remaining_sell_amount: 100_000_000,
            pair_name: "GBYTE/USDC".into(),
            original_order: SignedOrder::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn trade_hash_is_stable_base64_sha256() {
        let maker = order("A", "makerhash", Side::SELL);
        let taker = order("B", "takerhash", Side::BUY);
        let t = Trade::new(&maker, &taker, 100_000_000, 100_000_000_000);

        // sha256("makerhash" ++ "takerhash"), base64 standard alphabet
        assert_eq!(t.hash, t.compute_hash());
        assert_eq!(t.hash.len(), 44);
        assert_eq!(t.hash, "y3sTN7LLaM1DUT4NnIm5WEjRmxlyA6zXl7288WEWnOo=");
    }

    #[test]
    fn trade_captures_fill_context() {
        let mut maker = order("A", "mh", Side::SELL);
        maker.remaining_sell_amount = 0;
        let mut taker = order("B", "th", Side::BUY);
        taker.remaining_sell_amount = 42;

        let t = Trade::new(&maker, &taker, 100_000_000, 100_000_000_000);
        assert_eq!(t.status, TradeStatus::Pending);
        assert_eq!(t.price, maker.price);
        assert_eq!(t.maker_side, Side::SELL);
        assert_eq!(t.remaining_maker_sell_amount, 0);
        assert_eq!(t.remaining_taker_sell_amount, 42);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn validate_rejects_nonpositive_amounts() {
        let maker = order("A", "mh", Side::SELL);
        let taker = order("B", "th", Side::BUY);
        let mut t = Trade::new(&maker, &taker, 0, 1);
        assert!(t.validate().is_err());
        t.amount = 1;
        t.quote_amount = 0;
        assert!(t.validate().is_err());
    }

    #[test]
    fn participant_lookups() {
        let maker = order("A", "mh", Side::SELL);
        let taker = order("B", "th", Side::BUY);
        let t = Trade::new(&maker, &taker, 1, 1);

        assert_eq!(t.order_hash_of(&maker.user_address), Some("mh"));
        assert_eq!(t.order_hash_of(&taker.user_address), Some("th"));
        assert_eq!(t.order_hash_of("nobody"), None);
        assert_eq!(t.side_of(&maker.user_address), Some(Side::SELL));
        assert_eq!(t.side_of(&taker.user_address), Some(Side::BUY));
    }

    #[test]
    fn wire_status_names() {
        assert_eq!(serde_json::to_string(&TradeStatus::Pending).unwrap(), "\"PENDING\"");
        assert_eq!(serde_json::to_string(&TradeStatus::Committed).unwrap(), "\"COMMITTED\"");
    }
}
