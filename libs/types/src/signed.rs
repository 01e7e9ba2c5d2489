//! Signed order payloads
//!
//! The payload a user signed is retained verbatim: the settlement contract
//! re-validates the signature, so the matcher must submit exactly the bytes
//! it received. The matcher's own arithmetic reads a strongly-typed view of
//! the `signed_message` object instead of poking at the raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::OrderError;

/// The opaque signed payload, kept verbatim for settlement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedOrder(pub Value);

/// Typed view of the `signed_message` object inside a signed order.
///
/// `sell_amount` is in the sell asset's atoms; `price` is quote-per-base as
/// the maker expressed it. This price, not the possibly rounded `Order.price`
/// field, is what the fill arithmetic must use.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SignedMessage {
    pub sell_amount: i64,
    pub price: f64,
    pub matcher_fee: i64,
    pub matcher_fee_asset: String,
    pub sell_asset: String,
    pub buy_asset: String,
    #[serde(default)]
    pub expiry_ts: Option<i64>,
}

impl SignedOrder {
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    /// Parse the typed view of the signed message.
    pub fn signed_message(&self) -> Result<SignedMessage, OrderError> {
        let msg = self
            .0
            .get("signed_message")
            .ok_or_else(|| OrderError::Validation("signed order has no signed_message".into()))?;

        serde_json::from_value(msg.clone())
            .map_err(|e| OrderError::Validation(format!("malformed signed_message: {}", e)))
    }

    /// Expiry timestamp (unix seconds), if the signed message carries one.
    ///
    /// Tolerates payloads without a parseable signed message; candidacy
    /// filters treat those as non-expiring.
    pub fn expiry_ts(&self) -> Option<i64> {
        self.0.get("signed_message")?.get("expiry_ts")?.as_i64()
    }

    /// Address of the unit's first author: the signer of the order.
    pub fn signer_address(&self) -> Result<String, OrderError> {
        self.0
            .get("authors")
            .and_then(|a| a.get(0))
            .and_then(|a| a.get("address"))
            .and_then(|a| a.as_str())
            .map(str::to_owned)
            .ok_or_else(|| OrderError::Validation("signed order has no author".into()))
    }
}

impl SignedMessage {
    /// Matcher fee as a fraction of the traded notional.
    ///
    /// The fee asset must be one of the pair's two assets; anything else is a
    /// payload the contract would never have accepted.
    pub fn matcher_fee_rate(&self) -> Result<f64, OrderError> {
        if self.matcher_fee_asset == self.sell_asset {
            Ok(self.matcher_fee as f64 / self.sell_amount as f64)
        } else if self.matcher_fee_asset == self.buy_asset {
            Ok(self.matcher_fee as f64 / (self.sell_amount as f64 * self.price))
        } else {
            Err(OrderError::Validation("matcher fee asset not a pair asset".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signed(v: Value) -> SignedOrder {
        SignedOrder(v)
    }

    #[test]
    fn parses_signed_message() {
        let so = signed(json!({
            "signed_message": {
                "sell_amount": 100_000_000i64,
                "price": 1000.0,
                "matcher_fee": 250_000i64,
                "matcher_fee_asset": "base",
                "sell_asset": "base",
                "buy_asset": "q".repeat(44),
                "expiry_ts": 1_700_000_000i64,
            },
            "authors": [{"address": "A".repeat(32)}],
        }));

        let msg = so.signed_message().unwrap();
        assert_eq!(msg.sell_amount, 100_000_000);
        assert_eq!(msg.price, 1000.0);
        assert_eq!(msg.expiry_ts, Some(1_700_000_000));
        assert_eq!(so.expiry_ts(), Some(1_700_000_000));
        assert_eq!(so.signer_address().unwrap(), "A".repeat(32));
    }

    #[test]
    fn missing_signed_message_is_validation_error() {
        let so = signed(json!({"authors": []}));
        assert!(matches!(so.signed_message(), Err(OrderError::Validation(_))));
        assert_eq!(so.expiry_ts(), None);
    }

    #[test]
    fn fee_rate_in_sell_asset() {
        let msg = SignedMessage {
            sell_amount: 1_000_000,
            price: 2.0,
            matcher_fee: 2_500,
            matcher_fee_asset: "base".into(),
            sell_asset: "base".into(),
            buy_asset: "q".repeat(44),
            expiry_ts: None,
        };
        assert_eq!(msg.matcher_fee_rate().unwrap(), 0.0025);
    }

    #[test]
    fn fee_rate_in_buy_asset() {
        let msg = SignedMessage {
            sell_amount: 1_000_000,
            price: 2.0,
            matcher_fee: 5_000,
            matcher_fee_asset: "q".repeat(44),
            sell_asset: "base".into(),
            buy_asset: "q".repeat(44),
            expiry_ts: None,
        };
        assert_eq!(msg.matcher_fee_rate().unwrap(), 0.0025);
    }

    #[test]
    fn fee_rate_rejects_foreign_asset() {
        let msg = SignedMessage {
            sell_amount: 1_000_000,
            price: 2.0,
            matcher_fee: 5_000,
            matcher_fee_asset: "z".repeat(44),
            sell_asset: "base".into(),
            buy_asset: "q".repeat(44),
            expiry_ts: None,
        };
        assert!(msg.matcher_fee_rate().is_err());
    }
}
