//! Settlement operator
//!
//! Owns the transaction queues and routes matched batches to the least
//! loaded one. The operator wallet must be the matcher address of every
//! order it submits; one operator usually runs a single queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use book::TradeStore;
use bus::Bus;
use chain_adapter::ChainProvider;
use types::matches::Matches;

use crate::txqueue::{TxQueue, TxQueueHandle};

/// Queue depth above which a warning is logged.
const OVERLOAD_DEPTH: usize = 10;

/// The settlement operator.
pub struct Operator {
    queues: Vec<TxQueueHandle>,
    bus: Bus,
}

impl Operator {
    /// Start `queue_count` transaction queues and return the operator.
    pub fn start(
        provider: Arc<dyn ChainProvider>,
        trades: Arc<dyn TradeStore>,
        bus: Bus,
        queue_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let queues = (0..queue_count.max(1))
            .map(|i| {
                TxQueue::new(format!("oper-{}", i + 1), provider.clone(), trades.clone(), bus.clone())
                    .start(queue_capacity)
            })
            .collect();
        Operator { queues, bus }
    }

    /// Consume matched batches from the bus until it closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Matches>) {
        while let Some(matches) = rx.recv().await {
            self.queue_trade(matches).await;
        }
    }

    /// Enqueue a batch on the shortest queue. A failure to enqueue is a
    /// server error reported back to the lifecycle.
    pub async fn queue_trade(&self, matches: Matches) {
        let queue = self.shortest_queue();
        let depth = queue.len();
        if depth > OVERLOAD_DEPTH {
            warn!(queue = queue.name(), depth, "transaction queue is overloaded");
        }

        info!(queue = queue.name(), depth, "queuing trade batch");
        if let Err(matches) = queue.enqueue(matches).await {
            error!(queue = queue.name(), "settlement queue is gone");
            if let Err(e) = self.bus.publish_trade_error(matches, "Server error").await {
                error!(error = %e, "failed to publish trade error");
            }
        }
    }

    /// Relay the chain's pool acknowledgement for an already submitted batch.
    pub async fn handle_tx_success(&self, matches: Matches) {
        if let Err(e) = self.bus.publish_trade_success(matches).await {
            error!(error = %e, "failed to publish trade success");
        }
    }

    fn shortest_queue(&self) -> &TxQueueHandle {
        self.queues
            .iter()
            .min_by_key(|q| q.len())
            .expect("operator owns at least one queue")
    }
}
