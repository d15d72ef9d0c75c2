//! Axum router construction for the card service.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::diagnostics;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /api/health`
/// - `GET|POST /api/cards`
/// - `GET|PUT|DELETE /api/cards/{id}`
/// - `GET /api/diagnostics`
/// - `POST /api/diagnostics/audit`
/// - `GET /ws/diagnostics`
///
/// CORS allows any origin so the browser-hosted renderer can call it.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/cards",
            get(handlers::list_cards).post(handlers::create_card),
        )
        .route(
            "/api/cards/{id}",
            get(handlers::get_card)
                .put(handlers::put_card)
                .delete(handlers::delete_card),
        )
        .route("/api/diagnostics", get(diagnostics::latest_report))
        .route("/api/diagnostics/audit", post(diagnostics::run_audit))
        .route("/ws/diagnostics", get(ws::ws_diagnostics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
