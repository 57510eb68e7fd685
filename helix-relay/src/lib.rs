//! Shared types and HTTP API for the Helix sync relay.
//!
//! The relay is a topic-based WebSocket fan-out that devices can use as a
//! realtime transport. It keeps no data: frames are forwarded to the
//! subscribers connected at the time and then forgotten.

mod hub;

pub use hub::{Hub, Session};

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Frames a client sends over `/ws`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe {
        topic: String,
    },
    Unsubscribe {
        topic: String,
    },
    Publish {
        topic: String,
        payload: serde_json::Value,
    },
}

/// Frames the relay delivers to subscribers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ServerFrame {
    pub topic: String,
    pub payload: serde_json::Value,
    pub sender: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusResponse {
    pub version: String,
    pub connected_clients: usize,
    pub topics: Vec<String>,
}

async fn status_handler(State(hub): State<Arc<Hub>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        connected_clients: hub.connected_clients(),
        topics: hub.active_topics(),
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerFrame>(64);
    let mut session = hub.connect(outbound_tx);
    let client_id = session.client_id().to_string();
    info!("Client connected: {}", client_id);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to encode frame for {}: {}", frame.topic, e);
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(frame) => session.handle(frame),
                Err(e) => debug!("Ignoring malformed frame from {}: {}", client_id, e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    session.close().await;
    writer.abort();
    hub.prune();
    info!("Client disconnected: {}", client_id);
}

/// Build the HTTP API router around a shared hub.
pub fn build_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/v1/status", get(status_handler))
        .with_state(hub)
}
