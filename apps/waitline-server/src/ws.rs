//! # Event Push
//!
//! `GET /companies/{company}/events` upgrades to a WebSocket that streams the
//! company's `QueueEvent`s as JSON text frames.
//!
//! ```text
//! EventBus topic ──▶ broadcast_rx ──▶ forward task ──▶ socket sender
//!                                                        ▲
//!                       receive loop (ping/close) ───────┘
//! ```
//! Delivery is best-effort: a lagging client skips missed events and is
//! expected to re-read `/entries/{id}/status` or the queue snapshot.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::routes::AppState;

/// Upgrades the request and streams events for `company`.
pub async fn events_handler(
    ws: WebSocketUpgrade,
    State(service): State<AppState>,
    Path(company): Path<String>,
) -> impl IntoResponse {
    // Subscribe before the upgrade so nothing published in between is lost.
    let events = service.subscribe(&company);
    ws.on_upgrade(move |socket| handle_socket(socket, company, events))
}

async fn handle_socket(
    socket: WebSocket,
    company: String,
    mut events: broadcast::Receiver<waitline_core::QueueEvent>,
) {
    info!(company_id = %company, "Event subscriber connected");
    let (mut sender, mut receiver) = socket.split();

    let forward_company = company.clone();
    let mut forward = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(?e, "Failed to serialize queue event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(company_id = %forward_company, skipped, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    loop {
        tokio::select! {
            message = receiver.next() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(company_id = %company, ?e, "WebSocket error");
                    break;
                }
            },
            _ = &mut forward => break,
        }
    }

    forward.abort();
    info!(company_id = %company, "Event subscriber disconnected");
}
