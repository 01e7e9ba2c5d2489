//! Trading pair identification
//!
//! A pair is the (base, quote) asset combination together with the token
//! symbols and decimals used for display. `code()` is the injective key
//! under which a per-pair matcher is registered.

use serde::{Deserialize, Serialize};

/// A trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub base_symbol: String,
    pub base_asset: String,
    pub base_decimals: u8,
    pub quote_symbol: String,
    pub quote_asset: String,
    pub quote_decimals: u8,
}

impl Pair {
    /// Display name, `baseSymbol/quoteSymbol`.
    pub fn name(&self) -> String {
        format!("{}/{}", self.base_symbol, self.quote_symbol)
    }

    /// Injective matcher key: `baseSymbol/quoteSymbol::baseAsset::quoteAsset`.
    pub fn code(&self) -> String {
        format!("{}::{}::{}", self.name(), self.base_asset, self.quote_asset)
    }

    /// Asset-only key used as the orderbook/trade channel topic.
    pub fn asset_code(&self) -> String {
        format!("{}::{}", self.base_asset, self.quote_asset)
    }

    /// Multiplier converting base display units to atoms.
    pub fn base_multiplier(&self) -> i64 {
        10i64.pow(self.base_decimals as u32)
    }

    /// Multiplier converting quote display units to atoms.
    pub fn quote_multiplier(&self) -> i64 {
        10i64.pow(self.quote_decimals as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Pair {
        Pair {
            base_symbol: "GBYTE".into(),
            base_asset: "base".into(),
            base_decimals: 9,
            quote_symbol: "USDC".into(),
            quote_asset: "x".repeat(44),
            quote_decimals: 4,
        }
    }

    #[test]
    fn name_and_code() {
        let p = pair();
        assert_eq!(p.name(), "GBYTE/USDC");
        assert_eq!(p.code(), format!("GBYTE/USDC::base::{}", "x".repeat(44)));
        assert_eq!(p.asset_code(), format!("base::{}", "x".repeat(44)));
    }

    #[test]
    fn multipliers() {
        let p = pair();
        assert_eq!(p.base_multiplier(), 1_000_000_000);
        assert_eq!(p.quote_multiplier(), 10_000);
    }
}
