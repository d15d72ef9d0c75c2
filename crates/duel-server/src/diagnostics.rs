//! Diagnostics endpoints backed by the [`DiagnosticMonitor`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/diagnostics` | Latest audit report |
//! | `POST` | `/api/diagnostics/audit` | Run one audit pass now |
//!
//! Both answer 503 when the client runs without a monitor.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use duel_audit::DiagnosticMonitor;

use crate::error::ApiError;
use crate::state::AppState;

/// The attached monitor, or a 503.
pub(crate) fn monitor(state: &AppState) -> Result<&Arc<DiagnosticMonitor>, ApiError> {
    state
        .monitor
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("diagnostic monitor is not running".to_owned()))
}

/// Return the most recent report. 404 until the first pass has run.
pub async fn latest_report(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = monitor(&state)?
        .latest()
        .await
        .ok_or_else(|| ApiError::NotFound("no audit report yet".to_owned()))?;
    Ok(Json(report))
}

/// Run an on-demand audit pass and return its report.
pub async fn run_audit(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let report = monitor(&state)?.run_once().await;
    Ok(Json(report))
}
