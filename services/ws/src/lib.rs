//! WebSocket registries
//!
//! Connection registries and notification fan-out for the client-facing
//! channels. Transport framing lives in the server crate; everything here
//! operates on `Client` handles whose outbound queues the transport drains.

pub mod channels;
pub mod client;
pub mod login;
pub mod orders;

pub use channels::{pair_topic, TopicSocket, ORDERBOOK_CHANNEL, RAW_ORDERBOOK_CHANNEL, TRADES_CHANNEL};
pub use client::{Client, ClientId, WsEvent, WsMessage};
pub use login::{LoginSocket, LOGIN_CHANNEL};
pub use orders::{OrderSocket, BALANCES_CHANNEL, ORDERS_CHANNEL};

/// All channel registries, built once at startup.
pub struct SocketRegistry {
    pub orders: OrderSocket,
    pub orderbook: TopicSocket,
    pub raw_orderbook: TopicSocket,
    pub trades: TopicSocket,
    pub login: LoginSocket,
}

impl SocketRegistry {
    pub fn new() -> Self {
        SocketRegistry {
            orders: OrderSocket::new(),
            orderbook: TopicSocket::new(ORDERBOOK_CHANNEL),
            raw_orderbook: TopicSocket::new(RAW_ORDERBOOK_CHANNEL),
            trades: TopicSocket::new(TRADES_CHANNEL),
            login: LoginSocket::new(),
        }
    }

    /// Drop a closed connection from every registry.
    pub fn disconnect(&self, client_id: ClientId) {
        self.orders.disconnect(client_id);
        self.orderbook.disconnect(client_id);
        self.raw_orderbook.disconnect(client_id);
        self.trades.disconnect(client_id);
        self.login.disconnect(client_id);
    }
}

impl Default for SocketRegistry {
    fn default() -> Self {
        Self::new()
    }
}
