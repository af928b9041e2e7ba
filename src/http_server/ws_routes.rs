//! # WebSocket Route
//!
//! The realtime push channel. The server accepts, registers the connection
//! with the subscriber registry, and then only pushes: inbound client text
//! is read and discarded as keepalive. The connection is deregistered on
//! close or on the first failed send.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};

use super::server::AppState;

/// Create the WebSocket route
pub fn ws_routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // Registration happens only after the upgrade handshake completed.
    let (id, mut feed) = state.registry.connect().await;
    tracing::info!(connection = %id, "websocket subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                match inbound {
                    // Keepalive only; the server does not act on client text
                    Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_))) => {}
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }

            outbound = feed.recv() => {
                match outbound {
                    Some(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    // Registry dropped our queue (pruned as dead)
                    None => break,
                }
            }
        }
    }

    state.registry.disconnect(id).await;
    tracing::info!(connection = %id, "websocket subscriber disconnected");
}
