//! Topic subscription sockets
//!
//! The `orderbook`, `raw_orderbook` and `trades` channels share one shape:
//! clients subscribe to a pair topic (`baseAsset::quoteAsset`), receive an
//! INIT snapshot, then UPDATEs as the book or tape moves.

use dashmap::DashMap;
use serde::Serialize;

use crate::client::{Client, ClientId};

pub const ORDERBOOK_CHANNEL: &str = "orderbook";
pub const RAW_ORDERBOOK_CHANNEL: &str = "raw_orderbook";
pub const TRADES_CHANNEL: &str = "trades";

/// Topic id for a pair's book and trade channels.
pub fn pair_topic(base_asset: &str, quote_asset: &str) -> String {
    format!("{}::{}", base_asset, quote_asset)
}

/// Subscription registry for one broadcast channel.
pub struct TopicSocket {
    channel: &'static str,
    subscriptions: DashMap<String, Vec<Client>>,
}

impl TopicSocket {
    pub fn new(channel: &'static str) -> Self {
        TopicSocket { channel, subscriptions: DashMap::new() }
    }

    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Subscribe a connection to a topic and deliver the INIT snapshot.
    pub fn subscribe(&self, topic: &str, client: Client, snapshot: impl Serialize) {
        client.send_message(self.channel, "INIT", snapshot);
        let mut entry = self.subscriptions.entry(topic.to_string()).or_default();
        if !entry.iter().any(|c| c.id() == client.id()) {
            entry.push(client);
        }
    }

    pub fn unsubscribe(&self, topic: &str, client_id: ClientId) {
        if let Some(mut entry) = self.subscriptions.get_mut(topic) {
            entry.retain(|c| c.id() != client_id);
        }
        self.subscriptions.retain(|_, clients| !clients.is_empty());
    }

    pub fn disconnect(&self, client_id: ClientId) {
        for mut entry in self.subscriptions.iter_mut() {
            entry.value_mut().retain(|c| c.id() != client_id);
        }
        self.subscriptions.retain(|_, clients| !clients.is_empty());
    }

    /// Broadcast an UPDATE to every subscriber of a topic.
    pub fn broadcast_message(&self, topic: &str, payload: impl Serialize) {
        let payload = serde_json::to_value(payload).unwrap_or_default();
        if let Some(clients) = self.subscriptions.get(topic) {
            for client in clients.iter() {
                client.send_message(self.channel, "UPDATE", &payload);
            }
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions.get(topic).map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribe_sends_init_then_updates() {
        let socket = TopicSocket::new(ORDERBOOK_CHANNEL);
        let (client, mut rx) = Client::with_queue(1);
        let topic = pair_topic("base", "QQ");

        socket.subscribe(&topic, client, json!({"bids": [], "asks": []}));
        socket.broadcast_message(&topic, json!({"bids": [{"price": 1000.0}]}));

        let init = rx.recv().await.unwrap();
        assert_eq!(init.event.event_type, "INIT");
        let update = rx.recv().await.unwrap();
        assert_eq!(update.event.event_type, "UPDATE");
        assert_eq!(update.channel, ORDERBOOK_CHANNEL);
    }

    #[tokio::test]
    async fn unsubscribed_client_stops_receiving() {
        let socket = TopicSocket::new(TRADES_CHANNEL);
        let (client, mut rx) = Client::with_queue(1);
        let topic = pair_topic("base", "QQ");

        socket.subscribe(&topic, client, json!([]));
        rx.recv().await.unwrap();

        socket.unsubscribe(&topic, 1);
        socket.broadcast_message(&topic, json!([]));
        assert!(rx.try_recv().is_err());
        assert_eq!(socket.subscriber_count(&topic), 0);
    }

    #[tokio::test]
    async fn broadcasts_are_scoped_to_topic() {
        let socket = TopicSocket::new(TRADES_CHANNEL);
        let (client, mut rx) = Client::with_queue(1);
        socket.subscribe(&pair_topic("base", "A"), client, json!([]));
        rx.recv().await.unwrap();

        socket.broadcast_message(&pair_topic("base", "B"), json!([1]));
        assert!(rx.try_recv().is_err());
    }
}
