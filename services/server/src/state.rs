//! Service wiring
//!
//! Everything the process needs is built once at startup into an immutable
//! `Services` value and passed down; no globals. Local runs wire the chain
//! simulator; a production deployment substitutes the wallet's JSON-RPC
//! driver behind the same `ChainProvider` trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use book::{MemoryOrderStore, MemoryTradeStore, OrderStore, TradeStore};
use chain_adapter::sim::SimProvider;
use chain_adapter::{ChainProvider, FeeCache};
use coordinator::EventCoordinator;
use lifecycle::OrderService;
use matching_engine::Engine;
use settlement::Operator;
use ws::{ClientId, SocketRegistry};

use crate::config::Config;

const TX_QUEUE_CAPACITY: usize = 64;

/// The process's service graph.
pub struct Services {
    pub config: Config,
    pub orders: Arc<dyn OrderStore>,
    pub trades: Arc<dyn TradeStore>,
    pub provider: Arc<dyn ChainProvider>,
    pub service: Arc<OrderService>,
    pub engine: Arc<Engine>,
    pub operator: Arc<Operator>,
    pub coordinator: Arc<EventCoordinator>,
    pub sockets: Arc<SocketRegistry>,
    next_client_id: AtomicU64,
}

impl Services {
    /// Build the service graph and spawn the long-running tasks: the engine,
    /// the lifecycle consumers, the settlement operator, the coordinator,
    /// and the expiry sweep.
    pub async fn build(config: Config) -> Arc<Self> {
        let orders: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
        let trades: Arc<dyn TradeStore> = Arc::new(MemoryTradeStore::new());
        let provider: Arc<dyn ChainProvider> =
            Arc::new(SimProvider::new(config.matcher_address.clone()));
        info!(operator = %config.matcher_address, "running against the built-in chain simulator");

        let (bus, receivers) = bus::channel(config.bus_capacity);
        let sockets = Arc::new(SocketRegistry::new());

        let service = OrderService::new(
            orders.clone(),
            trades.clone(),
            provider.clone(),
            bus.clone(),
            sockets.clone(),
        );

        let engine = Arc::new(Engine::new(
            orders.clone(),
            trades.clone(),
            config.matcher_address.clone(),
            service.pipeline(),
            bus.clone(),
        ));
        tokio::spawn(engine.clone().run(receivers.orders));
        tokio::spawn(service.clone().run_engine_responses(receivers.responses));
        tokio::spawn(service.clone().run_operator_messages(receivers.operator));
        service.spawn_expiry_sweep();

        let operator = Arc::new(Operator::start(
            provider.clone(),
            trades.clone(),
            bus.clone(),
            config.tx_queue_count,
            TX_QUEUE_CAPACITY,
        ));
        tokio::spawn(operator.clone().run(receivers.queued_trades));

        let coordinator = Arc::new(EventCoordinator::new(
            provider.clone(),
            service.clone(),
            operator.clone(),
            orders.clone(),
            trades.clone(),
            sockets.clone(),
            bus.clone(),
        ));
        tokio::spawn({
            let coordinator = coordinator.clone();
            async move {
                if let Err(e) = coordinator.run().await {
                    error!(error = %e, "chain event stream ended");
                }
            }
        });

        let fees = FeeCache::new();
        match fees.get(provider.as_ref()).await {
            Ok((matcher_fee, affiliate_fee)) => {
                info!(matcher_fee, affiliate_fee, "fee configuration resolved")
            }
            Err(e) => error!(error = %e, "failed to resolve fee configuration"),
        }

        Arc::new(Services {
            config,
            orders,
            trades,
            provider,
            service,
            engine,
            operator,
            coordinator,
            sockets,
            next_client_id: AtomicU64::new(1),
        })
    }

    /// Allocate a connection id.
    pub fn next_client_id(&self) -> ClientId {
        self.next_client_id.fetch_add(1, Ordering::SeqCst)
    }
}
