//! Balance-availability validation
//!
//! Proves a new order's required sell amount can be funded given the chain
//! balance, amounts locked by open orders, uncommitted-trade deltas, and
//! in-flight orders still in the pipeline.

use std::sync::Arc;

use book::OrderStore;
use chain_adapter::{retry, ChainProvider};
use types::account::Balances;
use types::errors::{LockingOrder, OrderError};
use types::order::Order;

const BALANCE_LOOKUP_RETRIES: usize = 3;

/// Order admission validator.
pub struct Validator {
    provider: Arc<dyn ChainProvider>,
    orders: Arc<dyn OrderStore>,
}

impl Validator {
    pub fn new(provider: Arc<dyn ChainProvider>, orders: Arc<dyn OrderStore>) -> Self {
        Validator { provider, orders }
    }

    /// Accept the order iff the user's total balance covers the requirement
    /// AND the balance left after all existing locks covers it too.
    ///
    /// `uncommitted_deltas` are symbol-keyed adjustments from trades already
    /// matched but not yet chain-committed; `in_flight_lock` is the sell
    /// amount locked by the user's orders still in the pipeline.
    pub async fn validate_available_balance(
        &self,
        o: &Order,
        uncommitted_deltas: &Balances,
        in_flight_lock: i64,
    ) -> Result<(), OrderError> {
        let required = o.required_sell_amount()?;

        let mut balance = retry(BALANCE_LOOKUP_RETRIES, || {
            self.provider.balance_of(&o.user_address, o.sell_asset())
        })
        .await?;

        balance += uncommitted_deltas.get(o.sell_symbol()).copied().unwrap_or(0);

        if balance < required {
            return Err(OrderError::InsufficientBalance {
                symbol: o.sell_symbol().to_string(),
                have: balance,
                need: required,
                hash: o.hash.clone(),
                price: o.price,
            });
        }

        let (locked, locking) =
            self.orders.user_locked_balance(&o.user_address, o.sell_asset()).await?;

        let available = balance - locked - in_flight_lock;
        if available < required {
            return Err(OrderError::InsufficientAvailable {
                symbol: o.sell_symbol().to_string(),
                available,
                need: required,
                hash: o.hash.clone(),
                price: o.price,
                total: balance,
                locking: locking
                    .iter()
                    .map(|l| LockingOrder {
                        hash: l.hash.clone(),
                        remaining_sell_amount: l.remaining_sell_amount,
                        price: l.price,
                    })
                    .collect(),
            });
        }

        Ok(())
    }
}
