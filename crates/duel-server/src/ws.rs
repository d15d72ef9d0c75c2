//! `WebSocket` handler for live audit reports.
//!
//! Clients connect to `GET /ws/diagnostics` and receive every report the
//! monitor compiles as a JSON text frame, whether it came from the
//! monitoring loop or an on-demand pass. A client that falls behind skips
//! to the newest report.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use duel_audit::AuditReport;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::diagnostics::monitor;
use crate::error::ApiError;
use crate::state::AppState;

/// Upgrade to a `WebSocket` and stream audit reports.
///
/// # Route
///
/// `GET /ws/diagnostics`
pub async fn ws_diagnostics(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rx = monitor(&state)?.subscribe();
    Ok(ws.on_upgrade(|socket| stream_reports(socket, rx)))
}

async fn stream_reports(mut socket: WebSocket, mut rx: broadcast::Receiver<AuditReport>) {
    debug!("Diagnostics client connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(report) => {
                        let json = match serde_json::to_string(&report) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize audit report: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("Diagnostics client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Diagnostics client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Report channel closed, closing diagnostics socket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Diagnostics client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("Diagnostics socket error: {e}");
                        return;
                    }
                    // Client text and binary frames carry no meaning here.
                    _ => {}
                }
            }
        }
    }
}
