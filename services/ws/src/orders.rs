//! Per-address order notifications
//!
//! Clients subscribe to an owner address on the `orders` channel; order
//! lifecycle notifications and balance pushes for that address fan out to
//! every connection registered under it.

use dashmap::DashMap;
use serde::Serialize;

use types::account::Balances;

use crate::client::{Client, ClientId};

pub const ORDERS_CHANNEL: &str = "orders";
pub const BALANCES_CHANNEL: &str = "balances";

/// Registry of order-channel connections keyed by owner address.
#[derive(Default)]
pub struct OrderSocket {
    connections: DashMap<String, Vec<Client>>,
}

impl OrderSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for an address. Re-registering the same
    /// connection is a no-op.
    pub fn register(&self, address: &str, client: Client) {
        let mut entry = self.connections.entry(address.to_string()).or_default();
        if !entry.iter().any(|c| c.id() == client.id()) {
            entry.push(client);
        }
    }

    pub fn unregister(&self, address: &str, client_id: ClientId) {
        if let Some(mut entry) = self.connections.get_mut(address) {
            entry.retain(|c| c.id() != client_id);
        }
        self.connections.retain(|_, clients| !clients.is_empty());
    }

    /// Drop a connection from every address it is registered under.
    pub fn disconnect(&self, client_id: ClientId) {
        for mut entry in self.connections.iter_mut() {
            entry.value_mut().retain(|c| c.id() != client_id);
        }
        self.connections.retain(|_, clients| !clients.is_empty());
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.connections.get(address).map(|c| !c.is_empty()).unwrap_or(false)
    }

    /// Send an order-channel event to every connection of `address`.
    pub fn send_order_message(&self, event_type: &str, address: &str, payload: impl Serialize) {
        let payload = serde_json::to_value(payload).unwrap_or_default();
        if let Some(clients) = self.connections.get(address) {
            for client in clients.iter() {
                client.send_message(ORDERS_CHANNEL, event_type, &payload);
            }
        }
    }

    /// Push a balance snapshot to every connection of `address`.
    pub fn send_balances_message(
        &self,
        event_type: &str,
        address: &str,
        balances: &Balances,
        event: &str,
    ) {
        let payload = serde_json::json!({
            "balances": balances,
            "event": event,
        });
        if let Some(clients) = self.connections.get(address) {
            for client in clients.iter() {
                client.send_message(BALANCES_CHANNEL, event_type, &payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn notifications_reach_all_connections_of_address() {
        let socket = OrderSocket::new();
        let (c1, mut rx1) = Client::with_queue(1);
        let (c2, mut rx2) = Client::with_queue(2);
        socket.register("ADDR", c1);
        socket.register("ADDR", c2);

        socket.send_order_message("ORDER_ADDED", "ADDR", json!({"hash": "h"}));

        assert_eq!(rx1.recv().await.unwrap().event.event_type, "ORDER_ADDED");
        assert_eq!(rx2.recv().await.unwrap().event.event_type, "ORDER_ADDED");
    }

    #[tokio::test]
    async fn balances_go_over_the_balances_channel() {
        let socket = OrderSocket::new();
        let (c1, mut rx1) = Client::with_queue(1);
        socket.register("ADDR", c1);

        let balances = Balances::from([("GBYTE".to_string(), 42i64)]);
        socket.send_balances_message("UPDATE", "ADDR", &balances, "deposit");

        let msg = rx1.recv().await.unwrap();
        assert_eq!(msg.channel, BALANCES_CHANNEL);
        assert_eq!(msg.event.payload["balances"]["GBYTE"], 42);
        assert_eq!(msg.event.payload["event"], "deposit");
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let socket = OrderSocket::new();
        let (c1, _rx) = Client::with_queue(1);
        socket.register("ADDR", c1.clone());
        socket.register("ADDR", c1);
        assert_eq!(socket.connections.get("ADDR").unwrap().len(), 1);
    }

    #[test]
    fn disconnect_removes_from_every_address() {
        let socket = OrderSocket::new();
        let (c1, _rx) = Client::with_queue(1);
        socket.register("A1", c1.clone());
        socket.register("A2", c1);
        socket.disconnect(1);
        assert!(!socket.is_connected("A1"));
        assert!(!socket.is_connected("A2"));
    }
}
