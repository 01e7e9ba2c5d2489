//! Engine dispatcher
//!
//! Routes order messages from the bus to per-pair books. Each pair gets its
//! own worker task with a FIFO queue, so messages for one pair are processed
//! in arrival order while different pairs run in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{error, warn};

use book::{OrderStore, TradeStore};
use bus::{Bus, OrderMessage};
use types::errors::EngineError;
use types::matches::Matches;
use types::response::EngineResponse;

use crate::orderbook::{OrderBook, StatusArbiter};

const PAIR_QUEUE_DEPTH: usize = 64;

struct PairWorker {
    book: Arc<OrderBook>,
    queue: mpsc::Sender<OrderMessage>,
}

/// The matching engine: a registry of per-pair books plus the bus consumer.
pub struct Engine {
    workers: Mutex<HashMap<String, PairWorker>>,
    orders: Arc<dyn OrderStore>,
    trades: Arc<dyn TradeStore>,
    operator_address: String,
    arbiter: Arc<dyn StatusArbiter>,
    bus: Bus,
}

impl Engine {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        trades: Arc<dyn TradeStore>,
        operator_address: impl Into<String>,
        arbiter: Arc<dyn StatusArbiter>,
        bus: Bus,
    ) -> Self {
        Engine {
            workers: Mutex::new(HashMap::new()),
            orders,
            trades,
            operator_address: operator_address.into(),
            arbiter,
            bus,
        }
    }

    /// Consume order messages until the bus closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<OrderMessage>) {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = self.handle_message(msg).await {
                error!(error = %e, "engine failed to route order message");
            }
        }
    }

    /// Route one message to its pair's worker, creating the worker on first
    /// contact with the pair.
    pub async fn handle_message(&self, msg: OrderMessage) -> Result<(), EngineError> {
        let code = msg
            .order()
            .pair_code()
            .map_err(|e| EngineError::InvalidOrder(e.to_string()))?;
        let queue = self.pair_queue(&code);
        queue
            .send(msg)
            .await
            .map_err(|_| EngineError::InvalidOrder(format!("pair worker {} is gone", code)))
    }

    /// Roll back a settled-but-failed batch on its pair's book.
    pub async fn invalidate_maker_orders(&self, matches: Matches) -> Result<(), EngineError> {
        let code = matches
            .pair_code()
            .map_err(|e| EngineError::InvalidOrder(e.to_string()))?;
        let book = self.book(&code);
        book.invalidate_maker_orders(matches).await
    }

    /// The book for a pair code, created on demand.
    pub fn book(&self, pair_code: &str) -> Arc<OrderBook> {
        let mut workers = self.workers.lock().expect("engine worker registry poisoned");
        if let Some(w) = workers.get(pair_code) {
            return w.book.clone();
        }
        let (book, _) = self.spawn_worker(&mut workers, pair_code);
        book
    }

    fn pair_queue(&self, pair_code: &str) -> mpsc::Sender<OrderMessage> {
        let mut workers = self.workers.lock().expect("engine worker registry poisoned");
        if let Some(w) = workers.get(pair_code) {
            return w.queue.clone();
        }
        let (_, queue) = self.spawn_worker(&mut workers, pair_code);
        queue
    }

    fn spawn_worker(
        &self,
        workers: &mut HashMap<String, PairWorker>,
        pair_code: &str,
    ) -> (Arc<OrderBook>, mpsc::Sender<OrderMessage>) {
        let book = Arc::new(OrderBook::new(
            pair_code,
            self.orders.clone(),
            self.trades.clone(),
            self.operator_address.clone(),
            self.arbiter.clone(),
            self.bus.clone(),
        ));
        let (tx, rx) = mpsc::channel(PAIR_QUEUE_DEPTH);
        tokio::spawn(run_pair(book.clone(), rx, self.bus.clone()));
        workers.insert(
            pair_code.to_string(),
            PairWorker { book: book.clone(), queue: tx.clone() },
        );
        (book, tx)
    }
}

/// Sequential message loop of one pair.
///
/// A failed operation is answered with an ERROR engine response carrying the
/// order, so the lifecycle releases its in-pipeline slot and the client
/// learns about the failure.
async fn run_pair(book: Arc<OrderBook>, mut rx: mpsc::Receiver<OrderMessage>, bus: Bus) {
    while let Some(msg) = rx.recv().await {
        let order = msg.order().clone();
        let result = match msg {
            OrderMessage::NewOrder(o) => book.new_order(o).await,
            OrderMessage::AddOrder(o) => book.add_order(o).await,
            OrderMessage::CancelOrder(o) => book.cancel_order(o).await,
        };

        if let Err(e) = result {
            error!(pair = %book.pair_code(), order = %order.hash, error = %e, "engine operation failed");
            if bus
                .publish_engine_response(EngineResponse::error(Some(order)))
                .await
                .is_err()
            {
                warn!(pair = %book.pair_code(), "response channel closed, stopping pair worker");
                return;
            }
        }
    }
}
