//! Settlement transaction queue
//!
//! FIFO queue feeding matched batches to the chain adapter. Each queue has a
//! single consumer task processing head-of-line: submit, persist the trigger
//! units, announce the submission. The chain's final verdict for each unit
//! arrives later through the event coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use book::TradeStore;
use bus::Bus;
use chain_adapter::ChainProvider;
use types::matches::Matches;
use types::trade::TradeStatus;

/// Producer-side handle to a running queue.
#[derive(Clone)]
pub struct TxQueueHandle {
    name: String,
    sender: mpsc::Sender<Matches>,
    depth: Arc<AtomicUsize>,
}

impl TxQueueHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of batches waiting in the queue.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a batch. Fails when the consumer task is gone.
    pub async fn enqueue(&self, matches: Matches) -> Result<(), Matches> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.sender.send(matches).await.map_err(|e| {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            e.0
        })
    }
}

/// One settlement queue's consumer.
pub struct TxQueue {
    name: String,
    provider: Arc<dyn ChainProvider>,
    trades: Arc<dyn TradeStore>,
    bus: Bus,
}

impl TxQueue {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn ChainProvider>,
        trades: Arc<dyn TradeStore>,
        bus: Bus,
    ) -> Self {
        TxQueue { name: name.into(), provider, trades, bus }
    }

    /// Spawn the consumer task and return the producer handle.
    pub fn start(self, capacity: usize) -> TxQueueHandle {
        let (tx, rx) = mpsc::channel(capacity);
        let depth = Arc::new(AtomicUsize::new(0));
        let handle = TxQueueHandle { name: self.name.clone(), sender: tx, depth: depth.clone() };
        tokio::spawn(self.consume(rx, depth));
        handle
    }

    async fn consume(self, mut rx: mpsc::Receiver<Matches>, depth: Arc<AtomicUsize>) {
        while let Some(matches) = rx.recv().await {
            depth.fetch_sub(1, Ordering::SeqCst);
            self.execute_trade(matches).await;
        }
    }

    /// Submit one batch to the exchange contract and apply the outcome.
    ///
    /// A short trigger-unit list means only that prefix of the batch was
    /// submitted; the suffix stays PENDING and is not retried here.
    ///
    /// # Panics
    /// Panics when the adapter reports success with an empty unit list,
    /// which the adapter contract rules out.
    pub async fn execute_trade(&self, mut matches: Matches) {
        info!(queue = %self.name, trades = matches.len(), "executing trades");

        let units = match self.provider.execute_trade(&matches).await {
            Ok(units) => units,
            Err(e) => {
                error!(queue = %self.name, error = %e, "trade submission failed");
                if let Err(e) = self.bus.publish_tx_error(matches, e.to_string()).await {
                    error!(queue = %self.name, error = %e, "failed to publish tx error");
                }
                return;
            }
        };

        if units.is_empty() {
            panic!("no error but units array is empty");
        }

        let submitted = units.len().min(matches.trades.len());
        for (trade, unit) in matches.trades.iter_mut().zip(&units) {
            trade.tx_hash = unit.clone();
            trade.status = TradeStatus::Success;
            if let Err(e) = self.trades.set_submitted(&trade.hash, unit).await {
                error!(trade = %trade.hash, error = %e, "failed to record submitted trade");
            }
        }

        if submitted < matches.trades.len() {
            warn!(
                queue = %self.name,
                submitted,
                total = matches.trades.len(),
                "chain accepted only a prefix of the batch, suffix stays PENDING"
            );
        }

        let successful = matches.prefix(submitted);
        if let Err(e) = self.bus.publish_trade_sent(successful).await {
            error!(queue = %self.name, error = %e, "failed to publish trade-sent message");
        }
    }
}
