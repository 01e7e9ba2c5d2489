//! Account types
//!
//! Accounts are created implicitly the first time an address submits an
//! order. Custody stays on the external chain; the only state kept here is
//! the moderation flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user account, keyed by chain address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Account { address: address.into(), is_blocked: false, created_at: Utc::now() }
    }
}

/// Balances keyed by asset id or token symbol, in atoms.
pub type Balances = HashMap<String, i64>;

/// Both keyings of a user's chain balances, as the chain reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    #[serde(default)]
    pub balances_by_asset: Balances,
    #[serde(default)]
    pub balances_by_symbol: Balances,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_unblocked() {
        let acc = Account::new("A".repeat(32));
        assert!(!acc.is_blocked);
    }
}
