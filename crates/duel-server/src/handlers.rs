//! REST handlers for card definitions and service health.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/health` | Liveness and card count |
//! | `GET` | `/api/cards` | List all cards |
//! | `GET` | `/api/cards/{id}` | Single card |
//! | `POST` | `/api/cards` | Create a card (409 if the id exists) |
//! | `PUT` | `/api/cards/{id}` | Replace or create a card |
//! | `DELETE` | `/api/cards/{id}` | Delete a card |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use duel_types::CardDefinition;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::PutOutcome;

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Report that the service is up.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cards = state.cards.read().await.len();
    let uptime_secs = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();

    Json(serde_json::json!({
        "status": "ok",
        "cards": cards,
        "uptime_secs": uptime_secs,
        "monitoring": state.monitor.as_ref().is_some_and(|m| m.is_running()),
    }))
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// List all cards in id order.
pub async fn list_cards(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.cards.read().await.list())
}

/// Fetch one card.
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cards = state.cards.read().await;
    let card = cards
        .get(&id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("card `{id}`")))?;
    Ok(Json(card))
}

/// Create a card.
pub async fn create_card(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CardDefinition>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(card) = body?;
    state.cards.write().await.create(card.clone()).await?;
    info!(id = %card.id, "Card created");
    Ok((StatusCode::CREATED, Json(card)))
}

/// Replace the card at `id`, creating it if absent.
pub async fn put_card(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<CardDefinition>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(card) = body?;
    let outcome = state.cards.write().await.put(&id, card.clone()).await?;
    let status = match outcome {
        PutOutcome::Created => StatusCode::CREATED,
        PutOutcome::Replaced => StatusCode::OK,
    };
    info!(id = %id, ?outcome, "Card stored");
    Ok((status, Json(card)))
}

/// Delete a card and return it.
pub async fn delete_card(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.cards.write().await.delete(&id).await?;
    info!(id = %id, "Card deleted");
    Ok(Json(removed))
}
