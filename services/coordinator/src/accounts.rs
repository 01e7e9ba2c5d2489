//! Account registry
//!
//! Accounts exist implicitly for every address that submits an order; the
//! only state the matcher keeps about them is the moderation flag.

use dashmap::DashMap;

use types::account::Account;

/// In-process account registry keyed by chain address.
#[derive(Default)]
pub struct AccountRegistry {
    accounts: DashMap<String, Account>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The account for `address`, created on first contact.
    pub fn find_or_create(&self, address: &str) -> Account {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address))
            .clone()
    }

    /// Moderation hook: refuse further orders from `address`.
    pub fn block(&self, address: &str) {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address))
            .is_blocked = true;
    }

    pub fn is_blocked(&self, address: &str) -> bool {
        self.accounts.get(address).map(|a| a.is_blocked).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accounts_are_created_on_first_contact() {
        let registry = AccountRegistry::new();
        let account = registry.find_or_create("ADDR");
        assert!(!account.is_blocked);

        registry.block("ADDR");
        assert!(registry.is_blocked("ADDR"));
        assert!(registry.find_or_create("ADDR").is_blocked);
    }

    #[test]
    fn unknown_addresses_are_not_blocked() {
        let registry = AccountRegistry::new();
        assert!(!registry.is_blocked("ADDR"));
    }
}
