//! Chain adapter
//!
//! The matcher talks to its wallet node through `ChainProvider`: balance and
//! catalog lookups, order admission, batch submission, and the event stream.
//! The JSON-RPC driver lives outside this workspace; `sim::SimProvider` is
//! the in-process implementation backing tests and local runs.

pub mod events;
pub mod sim;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::OnceCell;

use types::account::AccountBalances;
use types::errors::ChainError;
use types::matches::Matches;
use types::signed::SignedOrder;

pub use events::ChainEvent;

/// Remote surface of the chain wallet.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Balance of `owner` in `asset` atoms.
    async fn balance_of(&self, owner: &str, asset: &str) -> Result<i64, ChainError>;

    /// All balances of `owner`, keyed both by asset and by symbol.
    async fn balances_of(&self, owner: &str) -> Result<AccountBalances, ChainError>;

    /// This operator's matcher address. Resolved at startup and cached.
    fn operator_address(&self) -> String;

    /// `(matcher_fee_rate, affiliate_fee_rate)` as configured on-chain.
    async fn fees(&self) -> Result<(f64, f64), ChainError>;

    async fn symbol(&self, asset: &str) -> Result<String, ChainError>;

    async fn asset(&self, symbol: &str) -> Result<String, ChainError>;

    async fn decimals(&self, asset: &str) -> Result<u8, ChainError>;

    /// Post a signed order to the chain; returns its unit hash.
    async fn add_order(&self, signed_order: &SignedOrder) -> Result<String, ChainError>;

    /// Post a signed cancellation to the chain.
    async fn cancel_order(&self, signed_cancel: &Value) -> Result<String, ChainError>;

    /// Addresses authorized to sign for `address`.
    async fn authorized_addresses(&self, address: &str) -> Result<Vec<String>, ChainError>;

    /// Submit a matched batch to the exchange contract. Returns the trigger
    /// unit per submitted trade; a short result means only that prefix of
    /// the batch was submitted.
    async fn execute_trade(&self, matches: &Matches) -> Result<Vec<String>, ChainError>;

    /// Subscribe to the chain event stream.
    async fn listen(&self) -> Result<mpsc::Receiver<ChainEvent>, ChainError>;
}

/// Retry an operation up to `retries` times with 1-second spacing.
///
/// The wallet connection occasionally falls asleep; a second attempt a
/// moment later usually lands.
pub async fn retry<T, E, F, Fut>(retries: usize, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut remaining = retries;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    return Err(e);
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// One-shot cache for the on-chain fee configuration.
///
/// Fees change only with a chain-level reconfiguration, so the first
/// successful lookup is kept for the life of the process.
#[derive(Default)]
pub struct FeeCache {
    cell: OnceCell<(f64, f64)>,
}

impl FeeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, provider: &dyn ChainProvider) -> Result<(f64, f64), ChainError> {
        self.cell
            .get_or_try_init(|| async { retry(3, || provider.fees()).await })
            .await
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_after_transient_failures() {
        let attempts = AtomicUsize::new(0);
        let result: Result<u32, &str> = retry(3, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("asleep")
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_budget() {
        let attempts = AtomicUsize::new(0);
        let result: Result<u32, &str> = retry(3, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("down") }
        })
        .await;
        assert_eq!(result, Err("down"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fee_cache_queries_once() {
        let provider = sim::SimProvider::new("M".repeat(32));
        let cache = FeeCache::new();
        let first = cache.get(&provider).await.unwrap();
        let second = cache.get(&provider).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.fee_queries(), 1);
    }
}
