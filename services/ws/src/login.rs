//! Login sessions
//!
//! A client subscribes to the `login` channel with the wallet session id it
//! was given. When the chain relays the wallet's `loggedin` event, the
//! session resolves to an address and the session's connections are linked
//! into the order registry so notifications reach them.

use dashmap::DashMap;

use crate::client::{Client, ClientId};
use crate::orders::OrderSocket;

pub const LOGIN_CHANNEL: &str = "login";

/// Registry of login-channel connections keyed by wallet session id.
#[derive(Default)]
pub struct LoginSocket {
    sessions: DashMap<String, Vec<Client>>,
}

impl LoginSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, session_id: &str, client: Client) {
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        if !entry.iter().any(|c| c.id() == client.id()) {
            entry.push(client);
        }
    }

    pub fn unsubscribe(&self, session_id: &str, client_id: ClientId) {
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            entry.retain(|c| c.id() != client_id);
        }
        self.sessions.retain(|_, clients| !clients.is_empty());
    }

    pub fn disconnect(&self, client_id: ClientId) {
        for mut entry in self.sessions.iter_mut() {
            entry.value_mut().retain(|c| c.id() != client_id);
        }
        self.sessions.retain(|_, clients| !clients.is_empty());
    }

    /// Tell the session's connections which address they logged in as.
    pub fn send_message_by_session(&self, session_id: &str, address: &str) {
        if let Some(clients) = self.sessions.get(session_id) {
            for client in clients.iter() {
                client.send_message(LOGIN_CHANNEL, "UPDATE", address);
            }
        }
    }

    /// Register every connection of the session under `address` in the
    /// order registry.
    pub fn link_address(&self, session_id: &str, address: &str, orders: &OrderSocket) {
        if let Some(clients) = self.sessions.get(session_id) {
            for client in clients.iter() {
                orders.register(address, client.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn login_links_session_connections_to_address() {
        let login = LoginSocket::new();
        let orders = OrderSocket::new();
        let (client, mut rx) = Client::with_queue(1);

        login.subscribe("sess-1", client);
        login.send_message_by_session("sess-1", "ADDR");
        login.link_address("sess-1", "ADDR", &orders);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.channel, LOGIN_CHANNEL);
        assert_eq!(msg.event.payload, json!("ADDR"));

        assert!(orders.is_connected("ADDR"));
        orders.send_order_message("ORDER_ADDED", "ADDR", json!({}));
        assert_eq!(rx.recv().await.unwrap().event.event_type, "ORDER_ADDED");
    }

    #[test]
    fn unsubscribe_clears_session() {
        let login = LoginSocket::new();
        let (client, _rx) = Client::with_queue(1);
        login.subscribe("sess-1", client);
        login.unsubscribe("sess-1", 1);
        assert!(login.sessions.get("sess-1").is_none());
    }
}
