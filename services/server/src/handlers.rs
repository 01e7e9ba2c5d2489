//! WebSocket endpoint
//!
//! Accepts client connections, drains each connection's outbound queue with
//! a single writer task, and maps the channel envelope onto the registries
//! and lifecycle calls.

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use types::order::{Order, OrderCancel};
use ws::{pair_topic, Client, WsMessage};

use crate::state::Services;

const TRADES_INIT_LIMIT: usize = 100;

pub fn create_router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/socket", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

async fn ws_handler(ws: WebSocketUpgrade, State(services): State<Arc<Services>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, services))
}

async fn handle_socket(socket: WebSocket, services: Arc<Services>) {
    let client_id = services.next_client_id();
    let (client, mut outbound) = Client::with_queue(client_id);
    let (mut sink, mut stream) = socket.split();

    // the socket's write side is single-consumer: one task drains the queue
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let Ok(text) = serde_json::to_string(&msg) else { continue };
            if sink.send(Message::Text(Utf8Bytes::from(text))).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                handle_client_message(&services, &client, text.as_str()).await
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    services.sockets.disconnect(client_id);
    writer.abort();
    debug!(client = client_id, "websocket connection closed");
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairSubscription {
    base_token: String,
    quote_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginSubscription {
    session_id: String,
}

async fn handle_client_message(services: &Arc<Services>, client: &Client, text: &str) {
    let msg: WsMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            client.send_message("orders", "ERROR", format!("malformed message: {}", e));
            return;
        }
    };

    match (msg.channel.as_str(), msg.event.event_type.as_str()) {
        ("orders", "NEW_ORDER") => {
            let order: Order = match serde_json::from_value(msg.event.payload) {
                Ok(o) => o,
                Err(e) => {
                    client.send_message("orders", "ERROR", format!("malformed order: {}", e));
                    return;
                }
            };
            let user = order.user_address.clone();
            services.sockets.orders.register(&user, client.clone());
            if let Err(e) = services.service.new_order(order).await {
                client.send_message("orders", "ERROR", e.to_string());
            }
        }

        ("orders", "CANCEL_ORDER") => {
            let cancel: OrderCancel = match serde_json::from_value(msg.event.payload) {
                Ok(c) => c,
                Err(e) => {
                    client.send_message("orders", "ERROR", format!("malformed cancel: {}", e));
                    return;
                }
            };
            if let Err(e) = services.service.cancel_order(&cancel).await {
                client.send_message("orders", "ERROR", e.to_string());
            }
        }

        ("orders", "ADDRESS") => {
            let Some(address) = msg.event.payload.as_str() else {
                client.send_message("orders", "ERROR", "malformed address subscription");
                return;
            };
            services.sockets.orders.register(address, client.clone());
        }

        ("orderbook", "SUBSCRIBE") => {
            let Some(sub) = parse_pair_subscription(client, msg.event.payload) else { return };
            let snapshot = match services
                .orders
                .book_levels(&sub.base_token, &sub.quote_token)
                .await
            {
                Ok(book) => json!({ "bids": book.bids, "asks": book.asks }),
                Err(e) => {
                    client.send_message("orderbook", "ERROR", e.to_string());
                    return;
                }
            };
            let topic = pair_topic(&sub.base_token, &sub.quote_token);
            services.sockets.orderbook.subscribe(&topic, client.clone(), snapshot);
        }

        ("orderbook", "UNSUBSCRIBE") => {
            let Some(sub) = parse_pair_subscription(client, msg.event.payload) else { return };
            let topic = pair_topic(&sub.base_token, &sub.quote_token);
            services.sockets.orderbook.unsubscribe(&topic, client.id());
        }

        ("raw_orderbook", "SUBSCRIBE") => {
            let Some(sub) = parse_pair_subscription(client, msg.event.payload) else { return };
            let snapshot =
                match services.orders.raw_book(&sub.base_token, &sub.quote_token).await {
                    Ok(orders) => json!(orders),
                    Err(e) => {
                        client.send_message("raw_orderbook", "ERROR", e.to_string());
                        return;
                    }
                };
            let topic = pair_topic(&sub.base_token, &sub.quote_token);
            services.sockets.raw_orderbook.subscribe(&topic, client.clone(), snapshot);
        }

        ("raw_orderbook", "UNSUBSCRIBE") => {
            let Some(sub) = parse_pair_subscription(client, msg.event.payload) else { return };
            let topic = pair_topic(&sub.base_token, &sub.quote_token);
            services.sockets.raw_orderbook.unsubscribe(&topic, client.id());
        }

        ("trades", "SUBSCRIBE") => {
            let Some(sub) = parse_pair_subscription(client, msg.event.payload) else { return };
            let snapshot = match services
                .trades
                .by_pair(&sub.base_token, &sub.quote_token, TRADES_INIT_LIMIT)
                .await
            {
                Ok(trades) => json!(trades),
                Err(e) => {
                    client.send_message("trades", "ERROR", e.to_string());
                    return;
                }
            };
            let topic = pair_topic(&sub.base_token, &sub.quote_token);
            services.sockets.trades.subscribe(&topic, client.clone(), snapshot);
        }

        ("trades", "UNSUBSCRIBE") => {
            let Some(sub) = parse_pair_subscription(client, msg.event.payload) else { return };
            let topic = pair_topic(&sub.base_token, &sub.quote_token);
            services.sockets.trades.unsubscribe(&topic, client.id());
        }

        ("login", "SUBSCRIBE") => {
            let sub: LoginSubscription = match serde_json::from_value(msg.event.payload) {
                Ok(s) => s,
                Err(e) => {
                    client.send_message("login", "ERROR", format!("malformed subscription: {}", e));
                    return;
                }
            };
            services.sockets.login.subscribe(&sub.session_id, client.clone());
        }

        (channel, event_type) => {
            warn!(channel, event_type, "unknown websocket message");
            client.send_message(channel, "ERROR", "unknown message type");
        }
    }
}

fn parse_pair_subscription(client: &Client, payload: serde_json::Value) -> Option<PairSubscription> {
    match serde_json::from_value(payload) {
        Ok(sub) => Some(sub),
        Err(e) => {
            client.send_message("orders", "ERROR", format!("malformed subscription: {}", e));
            None
        }
    }
}
