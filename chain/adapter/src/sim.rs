//! In-process chain simulator
//!
//! Backs tests and local runs: balances, the token catalog, and signer
//! authorizations are plain maps, `execute_trade` mints trigger units (or
//! replays scripted outcomes), and `emit` feeds the event stream by hand.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use types::account::AccountBalances;
use types::errors::ChainError;
use types::matches::Matches;
use types::pair::Pair;
use types::signed::SignedOrder;

use crate::{ChainEvent, ChainProvider};

const EVENT_BUFFER: usize = 256;

/// Scripted outcome for one `execute_trade` call.
type TradeOutcome = Result<Vec<String>, ChainError>;

/// Simulated chain wallet.
pub struct SimProvider {
    operator_address: String,
    fees: (f64, f64),
    balances: RwLock<HashMap<(String, String), i64>>,
    symbols: RwLock<HashMap<String, (String, u8)>>,
    authorized: RwLock<HashMap<String, Vec<String>>>,
    trade_outcomes: Mutex<VecDeque<TradeOutcome>>,
    events: Mutex<Option<mpsc::Sender<ChainEvent>>>,
    unit_counter: AtomicU64,
    fee_queries: AtomicUsize,
}

impl SimProvider {
    pub fn new(operator_address: impl Into<String>) -> Self {
        SimProvider {
            operator_address: operator_address.into(),
            fees: (0.0025, 0.0),
            balances: RwLock::new(HashMap::new()),
            symbols: RwLock::new(HashMap::new()),
            authorized: RwLock::new(HashMap::new()),
            trade_outcomes: Mutex::new(VecDeque::new()),
            events: Mutex::new(None),
            unit_counter: AtomicU64::new(0),
            fee_queries: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, owner: &str, asset: &str, amount: i64) {
        self.balances
            .write()
            .unwrap()
            .insert((owner.to_string(), asset.to_string()), amount);
    }

    pub fn register_token(&self, asset: &str, symbol: &str, decimals: u8) {
        self.symbols
            .write()
            .unwrap()
            .insert(asset.to_string(), (symbol.to_string(), decimals));
    }

    /// Register both legs of a trading pair in the token catalog.
    pub fn register_pair(&self, pair: &Pair) {
        self.register_token(&pair.base_asset, &pair.base_symbol, pair.base_decimals);
        self.register_token(&pair.quote_asset, &pair.quote_symbol, pair.quote_decimals);
    }

    pub fn authorize(&self, owner: &str, signer: &str) {
        self.authorized
            .write()
            .unwrap()
            .entry(owner.to_string())
            .or_default()
            .push(signer.to_string());
    }

    /// Queue the outcome of the next `execute_trade` call. Without a script
    /// the simulator submits the whole batch and mints unit hashes.
    pub fn script_trade_outcome(&self, outcome: TradeOutcome) {
        self.trade_outcomes.lock().unwrap().push_back(outcome);
    }

    /// Push an event at the coordinator, as the wallet would.
    pub async fn emit(&self, event: ChainEvent) {
        let sender = self.events.lock().unwrap().clone();
        if let Some(tx) = sender {
            let _ = tx.send(event).await;
        }
    }

    /// Number of `fees()` round-trips served (observability for tests).
    pub fn fee_queries(&self) -> usize {
        self.fee_queries.load(Ordering::SeqCst)
    }

    fn next_unit(&self) -> String {
        format!("unit-{}", self.unit_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl ChainProvider for SimProvider {
    async fn balance_of(&self, owner: &str, asset: &str) -> Result<i64, ChainError> {
        let balances = self.balances.read().unwrap();
        Ok(*balances.get(&(owner.to_string(), asset.to_string())).unwrap_or(&0))
    }

    async fn balances_of(&self, owner: &str) -> Result<AccountBalances, ChainError> {
        let balances = self.balances.read().unwrap();
        let symbols = self.symbols.read().unwrap();
        let mut out = AccountBalances::default();
        for ((o, asset), amount) in balances.iter() {
            if o == owner {
                out.balances_by_asset.insert(asset.clone(), *amount);
                let symbol = symbols
                    .get(asset)
                    .map(|(s, _)| s.clone())
                    .unwrap_or_else(|| asset.clone());
                out.balances_by_symbol.insert(symbol, *amount);
            }
        }
        Ok(out)
    }

    fn operator_address(&self) -> String {
        self.operator_address.clone()
    }

    async fn fees(&self) -> Result<(f64, f64), ChainError> {
        self.fee_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.fees)
    }

    async fn symbol(&self, asset: &str) -> Result<String, ChainError> {
        let symbols = self.symbols.read().unwrap();
        symbols
            .get(asset)
            .map(|(s, _)| s.clone())
            .ok_or_else(|| ChainError::Rpc(format!("unknown asset {}", asset)))
    }

    async fn asset(&self, symbol: &str) -> Result<String, ChainError> {
        let symbols = self.symbols.read().unwrap();
        symbols
            .iter()
            .find(|(_, (s, _))| s == symbol)
            .map(|(asset, _)| asset.clone())
            .ok_or_else(|| ChainError::Rpc(format!("unknown symbol {}", symbol)))
    }

    async fn decimals(&self, asset: &str) -> Result<u8, ChainError> {
        let symbols = self.symbols.read().unwrap();
        symbols
            .get(asset)
            .map(|(_, d)| *d)
            .ok_or_else(|| ChainError::Rpc(format!("unknown asset {}", asset)))
    }

    async fn add_order(&self, _signed_order: &SignedOrder) -> Result<String, ChainError> {
        Ok(self.next_unit())
    }

    async fn cancel_order(&self, _signed_cancel: &Value) -> Result<String, ChainError> {
        Ok(self.next_unit())
    }

    async fn authorized_addresses(&self, address: &str) -> Result<Vec<String>, ChainError> {
        let authorized = self.authorized.read().unwrap();
        Ok(authorized.get(address).cloned().unwrap_or_default())
    }

    async fn execute_trade(&self, matches: &Matches) -> Result<Vec<String>, ChainError> {
        if let Some(outcome) = self.trade_outcomes.lock().unwrap().pop_front() {
            return outcome;
        }
        Ok(matches.trades.iter().map(|_| self.next_unit()).collect())
    }

    async fn listen(&self) -> Result<mpsc::Receiver<ChainEvent>, ChainError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        *self.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn balances_and_catalog() {
        let sim = SimProvider::new("M".repeat(32));
        sim.set_balance("alice", "base", 1_000_000);
        sim.register_pair(&Pair {
            base_symbol: "GBYTE".into(),
            base_asset: "base".into(),
            base_decimals: 9,
            quote_symbol: "USDC".into(),
            quote_asset: "Q".repeat(44),
            quote_decimals: 4,
        });

        assert_eq!(sim.balance_of("alice", "base").await.unwrap(), 1_000_000);
        assert_eq!(sim.balance_of("alice", "other").await.unwrap(), 0);
        assert_eq!(sim.symbol("base").await.unwrap(), "GBYTE");
        assert_eq!(sim.asset("USDC").await.unwrap(), "Q".repeat(44));
        assert_eq!(sim.decimals("base").await.unwrap(), 9);

        let all = sim.balances_of("alice").await.unwrap();
        assert_eq!(all.balances_by_asset["base"], 1_000_000);
        assert_eq!(all.balances_by_symbol["GBYTE"], 1_000_000);
    }

    #[tokio::test]
    async fn order_submission_mints_unit_hashes() {
        let sim = SimProvider::new("M".repeat(32));
        let unit = sim.add_order(&SignedOrder::default()).await.unwrap();
        assert_eq!(unit, "unit-1");
        let unit = sim.cancel_order(&serde_json::json!({})).await.unwrap();
        assert_eq!(unit, "unit-2");
    }

    #[tokio::test]
    async fn events_flow_through_listen() {
        let sim = SimProvider::new("M".repeat(32));
        let mut rx = sim.listen().await.unwrap();
        sim.emit(ChainEvent::SubmittedTrades { trade_hashes: vec!["t1".into()] }).await;
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev, ChainEvent::SubmittedTrades { trade_hashes: vec!["t1".into()] });
    }

    #[tokio::test]
    async fn scripted_trade_outcomes_take_precedence() {
        let sim = SimProvider::new("M".repeat(32));
        sim.script_trade_outcome(Err(ChainError::Rpc("wallet down".into())));

        let m = Matches {
            taker_order: serde_json::from_value(serde_json::json!({
                "hash": "t", "userAddress": "U".repeat(32),
                "baseAsset": "base", "quoteAsset": "Q".repeat(44),
                "side": "BUY", "price": 1.0, "amount": 1i64,
            }))
            .unwrap(),
            maker_orders: vec![],
            trades: vec![],
        };
        assert!(sim.execute_trade(&m).await.is_err());
        assert!(sim.execute_trade(&m).await.unwrap().is_empty());
    }
}
