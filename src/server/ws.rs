//! WebSocket status stream.
//!
//! Clients connect to `/ws` and receive JSON status events (article
//! ingested, refresh finished, cover job terminal states). The stream is
//! notify-only; client messages other than close are ignored.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;

use super::AppState;

pub async fn ws_handler(
    State(state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.notifier.subscribe();
    upgrade.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(
    mut socket: WebSocket,
    mut rx: tokio::sync::broadcast::Receiver<crate::services::StatusEvent>,
) {
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(p) => p,
                            Err(e) => {
                                tracing::error!("failed to serialize status event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    // Slow consumer; skip ahead rather than disconnect.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("ws client lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ignore pings and client chatter
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
