//! Order lifecycle types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{self, SETTLEMENT_FEE, SETTLEMENT_FEE_RESERVE_COUNT};
use crate::errors::OrderError;
use crate::signed::SignedOrder;

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    BUY,
    /// Sell order (ask)
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

/// Order status, wire-stable.
///
/// `AutoCancelled` is a system-initiated cancel (balance shortfall, signer
/// revocation, expiry); `Invalidated` marks a maker order removed after its
/// submitted batch could not settle on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "PARTIAL_FILLED")]
    PartialFilled,
    #[serde(rename = "FILLED")]
    Filled,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "AUTO_CANCELLED")]
    AutoCancelled,
    #[serde(rename = "INVALIDATED")]
    Invalidated,
    #[serde(rename = "ERROR")]
    Error,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Open
    }
}

impl OrderStatus {
    /// Once terminal, no further mutation is allowed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Open | OrderStatus::PartialFilled)
    }

    /// Wire string, as used in status filters and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::PartialFilled => "PARTIAL_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::AutoCancelled => "AUTO_CANCELLED",
            OrderStatus::Invalidated => "INVALIDATED",
            OrderStatus::Error => "ERROR",
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// An order as accepted from a user and mutated by the matcher.
///
/// `hash` is the client-supplied identity derived from the signed payload.
/// `amount` and `filled_amount` are base-asset atoms; `remaining_sell_amount`
/// is in the sell asset's atoms (quote for BUY, base for SELL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub hash: String,
    pub user_address: String,
    #[serde(default)]
    pub matcher_address: String,
    #[serde(default)]
    pub affiliate_address: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub side: Side,
    #[serde(default)]
    pub status: OrderStatus,
    pub price: f64,
    pub amount: i64,
    #[serde(default)]
    pub filled_amount: i64,
    #[serde(default)]
    pub remaining_sell_amount: i64,
    #[serde(default)]
    pub pair_name: String,
    #[serde(default)]
    pub original_order: SignedOrder,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Field-level validation of an incoming order. Never persisted on failure.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.user_address.is_empty() {
            return Err(OrderError::Validation("order 'userAddress' parameter is required".into()));
        }
        if !asset::is_valid_address(&self.user_address) {
            return Err(OrderError::Validation("order 'userAddress' parameter is malformed".into()));
        }
        if self.base_asset.is_empty() {
            return Err(OrderError::Validation("order 'baseAsset' parameter is required".into()));
        }
        if self.quote_asset.is_empty() {
            return Err(OrderError::Validation("order 'quoteAsset' parameter is required".into()));
        }
        if !asset::is_valid_asset(&self.base_asset) || !asset::is_valid_asset(&self.quote_asset) {
            return Err(OrderError::Validation("order asset parameter is malformed".into()));
        }
        if self.hash.is_empty() {
            return Err(OrderError::Validation("order 'hash' parameter is required".into()));
        }
        if self.amount <= 0 {
            return Err(OrderError::Validation(
                "order 'amount' parameter should be strictly positive".into(),
            ));
        }
        if self.price <= 0.0 || !self.price.is_finite() {
            return Err(OrderError::Validation(
                "order 'price' parameter should be strictly positive".into(),
            ));
        }
        Ok(())
    }

    /// Fill in derived state on acceptance: the initial remaining sell amount
    /// comes from the signed message, and the timestamps are stamped here.
    pub fn process(&mut self) -> Result<(), OrderError> {
        if self.remaining_sell_amount == 0 {
            self.remaining_sell_amount = self.sell_amount()?;
        }
        self.created_at = Utc::now();
        self.updated_at = self.created_at;
        Ok(())
    }

    pub fn remaining_amount(&self) -> i64 {
        self.amount - self.filled_amount
    }

    /// Asset this order pays with.
    pub fn sell_asset(&self) -> &str {
        match self.side {
            Side::BUY => &self.quote_asset,
            Side::SELL => &self.base_asset,
        }
    }

    /// Asset this order receives.
    pub fn buy_asset(&self) -> &str {
        match self.side {
            Side::BUY => &self.base_asset,
            Side::SELL => &self.quote_asset,
        }
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

    pub fn sell_symbol(&self) -> &str {
        match self.side {
            Side::BUY => self.quote_symbol(),
            Side::SELL => self.base_symbol(),
        }
    }

    pub fn buy_symbol(&self) -> &str {
        match self.side {
            Side::BUY => self.base_symbol(),
            Side::SELL => self.quote_symbol(),
        }
    }

    /// Key of the per-pair matcher this order routes to.
    pub fn pair_code(&self) -> Result<String, OrderError> {
        if self.pair_name.is_empty() {
            return Err(OrderError::Validation("order 'pairName' parameter is required".into()));
        }
        Ok(format!("{}::{}::{}", self.pair_name, self.base_asset, self.quote_asset))
    }

    /// Asset-only pair key, the orderbook/trade channel topic.
    pub fn asset_code(&self) -> String {
        format!("{}::{}", self.base_asset, self.quote_asset)
    }

    /// Price exactly as expressed in the signed message.
    ///
    /// The fill arithmetic uses this, never the `price` field, so the
    /// matcher's rounding agrees with the settlement contract's.
    pub fn original_price(&self) -> Result<f64, OrderError> {
        Ok(self.original_order.signed_message()?.price)
    }

    /// The signed sell amount. For a SELL this must equal `amount`.
    pub fn sell_amount(&self) -> Result<i64, OrderError> {
        let sell_amount = self.original_order.signed_message()?.sell_amount;
        if self.side == Side::SELL && sell_amount != self.amount {
            return Err(OrderError::Validation("sell amount and amount mismatch".into()));
        }
        Ok(sell_amount)
    }

    /// Sell-asset amount the user must be able to fund for this order,
    /// including the matcher fee (paid in the sell asset on a BUY) and the
    /// base-asset reserve covering settlement fees.
    pub fn required_sell_amount(&self) -> Result<i64, OrderError> {
        let mut required = match self.side {
            Side::BUY => {
                let msg = self.original_order.signed_message()?;
                msg.sell_amount + msg.matcher_fee
            }
            Side::SELL => self.amount,
        };

        if asset::is_base(self.sell_asset()) {
            required += SETTLEMENT_FEE_RESERVE_COUNT * SETTLEMENT_FEE;
        }

        Ok(required)
    }

    pub fn matcher_fee_rate(&self) -> Result<f64, OrderError> {
        self.original_order.signed_message()?.matcher_fee_rate()
    }

    pub fn expiry_ts(&self) -> Option<i64> {
        self.original_order.expiry_ts()
    }

    pub fn signer_address(&self) -> Result<String, OrderError> {
        self.original_order.signer_address()
    }

    /// Whether this order still participates in matching scans.
    pub fn is_live(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::PartialFilled)
    }

    /// Whether this order pays with the chain's native unit.
    pub fn sells_base(&self) -> bool {
        asset::is_base(self.sell_asset())
    }

    /// The persisted-state invariants. Checked in tests after every mutation.
    ///
    /// A live order always has funds left to sell; an exhausted or terminal
    /// order never does. `filled_amount` is bounded by `amount` on the sell
    /// side only: a buyer matched below its limit price receives more base
    /// per quote atom than it budgeted for, so its fill can exceed `amount`.
    pub fn check_invariants(&self) -> bool {
        let amounts_nonnegative = self.filled_amount >= 0 && self.remaining_sell_amount >= 0;
        let sell_fill_bounded = self.side == Side::BUY || self.filled_amount <= self.amount;
        let exhausted_iff_terminal =
            (self.remaining_sell_amount == 0) == self.status.is_terminal();
        let open_unfilled = self.status != OrderStatus::Open || self.filled_amount == 0;
        let partial_strict = self.status != OrderStatus::PartialFilled
            || (self.filled_amount > 0 && self.remaining_sell_amount > 0);

        amounts_nonnegative
            && sell_fill_bounded
            && exhausted_iff_terminal
            && open_unfilled
            && partial_strict
    }
}

/// Cancellation request for a previously submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancel {
    pub order_hash: String,
    pub user_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::BASE_ASSET;
    use crate::numeric;
    use serde_json::json;

    fn addr(c: char) -> String {
        c.to_string().repeat(32)
    }

    fn quote_asset() -> String {
        "Q".repeat(44)
    }

    fn signed_order(sell_amount: i64, price: f64, side: Side) -> SignedOrder {
        let (sell, buy) = match side {
            Side::BUY => (quote_asset(), BASE_ASSET.to_string()),
            Side::SELL => (BASE_ASSET.to_string(), quote_asset()),
        };
        SignedOrder(json!({
            "signed_message": {
                "sell_amount": sell_amount,
                "price": price,
                "matcher_fee": 1000i64,
                "matcher_fee_asset": sell,
                "sell_asset": sell,
                "buy_asset": buy,
            },
            "authors": [{"address": addr('S')}],
        }))
    }

    fn order(side: Side, price: f64, amount: i64) -> Order {
        let sell_amount = match side {
            Side::BUY => numeric::quote_amount(amount, price),
            Side::SELL => amount,
        };
        Order {
            hash: "orderhash".into(),
            user_address: addr('U'),
            matcher_address: addr('M'),
            affiliate_address: String::new(),
            base_asset: BASE_ASSET.into(),
            quote_asset: quote_asset(),
            side,
            status: OrderStatus::Open,
            price,
            amount,
            filled_amount: 0,
            remaining_sell_amount: 0,
            pair_name: "GBYTE/USDC".into(),
            original_order: signed_order(sell_amount, price, side),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::BUY.opposite(), Side::SELL);
        assert_eq!(Side::SELL.opposite(), Side::BUY);
    }

    #[test]
    fn validate_accepts_well_formed_order() {
        assert!(order(Side::SELL, 1000.0, 100_000_000).validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut o = order(Side::BUY, 1000.0, 100_000_000);
        o.amount = 0;
        assert!(matches!(o.validate(), Err(OrderError::Validation(_))));

        let mut o = order(Side::BUY, 1000.0, 100_000_000);
        o.price = -1.0;
        assert!(o.validate().is_err());

        let mut o = order(Side::BUY, 1000.0, 100_000_000);
        o.user_address = "short".into();
        assert!(o.validate().is_err());
    }

    #[test]
    fn process_derives_remaining_sell_amount() {
        let mut o = order(Side::SELL, 1000.0, 100_000_000);
        o.process().unwrap();
        assert_eq!(o.remaining_sell_amount, 100_000_000);

        let mut o = order(Side::BUY, 1000.0, 100_000_000);
        o.process().unwrap();
        assert_eq!(o.remaining_sell_amount, 100_000_000_000);
    }

    #[test]
    fn sell_amount_mismatch_is_rejected() {
        let mut o = order(Side::SELL, 1000.0, 100_000_000);
        o.original_order = signed_order(99, 1000.0, Side::SELL);
        assert!(o.sell_amount().is_err());
    }

    #[test]
    fn sell_and_buy_sides() {
        let o = order(Side::BUY, 1000.0, 1);
        assert_eq!(o.sell_asset(), o.quote_asset);
        assert_eq!(o.buy_asset(), BASE_ASSET);
        assert_eq!(o.sell_symbol(), "USDC");
        assert_eq!(o.buy_symbol(), "GBYTE");

        let o = order(Side::SELL, 1000.0, 1);
        assert_eq!(o.sell_asset(), BASE_ASSET);
        assert_eq!(o.buy_asset(), o.quote_asset);
    }

    #[test]
    fn pair_code_requires_pair_name() {
        let mut o = order(Side::BUY, 1000.0, 1);
        assert_eq!(
            o.pair_code().unwrap(),
            format!("GBYTE/USDC::base::{}", "Q".repeat(44))
        );
        o.pair_name.clear();
        assert!(o.pair_code().is_err());
    }

    #[test]
    fn required_sell_amount_includes_fee_reserve() {
        // SELL of base: amount plus the reserve for 10 settlement fees
        let o = order(Side::SELL, 1000.0, 100_000_000);
        assert_eq!(o.required_sell_amount().unwrap(), 100_000_000 + 10_000);

        // BUY paying quote: signed sell amount plus matcher fee, no reserve
        let o = order(Side::BUY, 1000.0, 100_000_000);
        assert_eq!(o.required_sell_amount().unwrap(), 100_000_000_000 + 1000);
    }

    #[test]
    fn status_terminality() {
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::PartialFilled.is_terminal());
        for s in [
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::AutoCancelled,
            OrderStatus::Invalidated,
            OrderStatus::Error,
        ] {
            assert!(s.is_terminal(), "{:?} should be terminal", s);
        }
    }

    #[test]
    fn invariants_hold_through_fill_progression() {
        let mut o = order(Side::SELL, 1000.0, 100_000_000);
        o.process().unwrap();
        assert!(o.check_invariants());

        o.filled_amount = 40_000_000;
        o.remaining_sell_amount = 60_000_000;
        o.status = OrderStatus::PartialFilled;
        assert!(o.check_invariants());

        o.filled_amount = o.amount;
        o.remaining_sell_amount = 0;
        o.status = OrderStatus::Filled;
        assert!(o.check_invariants());
    }

    #[test]
    fn invariants_catch_bad_states() {
        let mut o = order(Side::SELL, 1000.0, 100_000_000);
        o.process().unwrap();

        // OPEN with fills
        o.filled_amount = 1;
        assert!(!o.check_invariants());

        // PARTIAL_FILLED with nothing left to sell
        o.filled_amount = 1;
        o.remaining_sell_amount = 0;
        o.status = OrderStatus::PartialFilled;
        assert!(!o.check_invariants());

        // sell-side overfill
        o.status = OrderStatus::Filled;
        o.filled_amount = o.amount + 1;
        assert!(!o.check_invariants());
    }

    #[test]
    fn wire_status_names() {
        let s = serde_json::to_string(&OrderStatus::PartialFilled).unwrap();
        assert_eq!(s, "\"PARTIAL_FILLED\"");
        let s = serde_json::to_string(&OrderStatus::AutoCancelled).unwrap();
        assert_eq!(s, "\"AUTO_CANCELLED\"");
    }

    #[test]
    fn order_round_trips_through_json() {
        let mut o = order(Side::BUY, 1000.0, 100_000_000);
        o.process().unwrap();
        let json = serde_json::to_string(&o).unwrap();
        assert!(json.contains("\"userAddress\""));
        assert!(json.contains("\"remainingSellAmount\""));
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(o, back);
    }
}
