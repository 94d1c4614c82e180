//! WebSocket subscriptions — one-way relay of broadcast events.
//!
//! DESIGN
//! ======
//! `/ws/metrics` carries new samples to dashboard clients and `/ws/manager`
//! carries control updates to worker managers. Each connection subscribes to
//! its channel before the upgrade completes, then enters a `select!` loop:
//! - Broadcast events → serialize envelope → forward to client
//! - Incoming client messages → ignored, except close
//!
//! An optional `?prefix=` narrows the relay to events whose name starts with
//! it (e.g. `metric-greenhouse-` or `control-update-greenhouse`).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::broadcast::{Channel, Event};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    prefix: Option<String>,
}

/// `GET /ws/metrics`
pub async fn metrics_socket(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let rx = state.broadcasts.subscribe(Channel::Metrics);
    ws.on_upgrade(move |socket| run_ws(socket, rx, Channel::Metrics, query.prefix))
}

/// `GET /ws/manager`
pub async fn manager_socket(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let rx = state.broadcasts.subscribe(Channel::Manager);
    ws.on_upgrade(move |socket| run_ws(socket, rx, Channel::Manager, query.prefix))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, mut rx: broadcast::Receiver<Event>, channel: Channel, prefix: Option<String>) {
    let client_id = Uuid::new_v4();
    info!(%client_id, ?channel, prefix = ?prefix, "ws: subscriber connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    None | Some(Err(_) | Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if !matches_prefix(&event, prefix.as_deref()) {
                            continue;
                        }
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%client_id, ?channel, skipped, "ws: subscriber lagged; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!(%client_id, ?channel, "ws: subscriber disconnected");
}

pub(crate) fn matches_prefix(event: &Event, prefix: Option<&str>) -> bool {
    prefix.is_none_or(|p| event.event.starts_with(p))
}

async fn send_event(socket: &mut WebSocket, event: &Event) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, event = %event.event, "ws: event not serializable; skipped");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
