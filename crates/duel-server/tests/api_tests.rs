//! Integration tests for the card service endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Each test gets its own card file under a unique
//! temporary directory.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use duel_audit::{
    CollaboratorError, ConsistencyAuditor, DiagnosticMonitor, LogicalModel, RenderProjection,
};
use duel_server::router::build_router;
use duel_server::state::AppState;
use duel_server::store::CardStore;
use duel_types::{EntityId, EntityRecord, Owner, PhaseName, RenderNode, SlotRef, Zone};
use serde_json::{Value, json};
use tower::ServiceExt;

fn temp_cards_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("duel-server-test-{}", uuid::Uuid::new_v4()))
        .join("cards.json")
}

async fn make_state() -> Arc<AppState> {
    let store = CardStore::open(temp_cards_path()).await.unwrap();
    Arc::new(AppState::new(store))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn pikachu() -> Value {
    json!({
        "id": "pikachu-58",
        "name": "Pikachu",
        "kind": "creature",
        "hp": 60,
        "types": ["lightning"],
        "attacks": [{"name": "Gnaw", "cost": ["colorless"], "damage": 10}]
    })
}

/// Model with one entity the projection never draws.
struct HalfDrawn {
    id: EntityId,
}

impl LogicalModel for HalfDrawn {
    fn phase(&self) -> Result<PhaseName, CollaboratorError> {
        Ok(PhaseName::from("player-main"))
    }

    fn entities(&self) -> Result<Vec<EntityRecord>, CollaboratorError> {
        Ok(vec![EntityRecord {
            id: self.id,
            card_id: "pikachu-58".to_owned(),
            slot: SlotRef {
                owner: Owner::Player,
                zone: Zone::Active,
                index: 0,
            },
            attributes: Default::default(),
        }])
    }
}

impl RenderProjection for HalfDrawn {
    fn nodes(&self) -> Result<Vec<RenderNode>, CollaboratorError> {
        Ok(Vec::new())
    }
}

async fn make_state_with_monitor() -> Arc<AppState> {
    let store = CardStore::open(temp_cards_path()).await.unwrap();
    let board = Arc::new(HalfDrawn { id: EntityId::new() });
    let monitor = DiagnosticMonitor::new(ConsistencyAuditor::default(), board.clone(), board);
    Arc::new(AppState::with_monitor(store, Arc::new(monitor)))
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_health() {
    let app = build_router(make_state().await);
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["cards"], 0);
    assert_eq!(json["monitoring"], false);
}

#[tokio::test]
async fn test_card_crud_cycle() {
    let state = make_state().await;

    let response = build_router(state.clone())
        .oneshot(json_request("POST", "/api/cards", &pikachu()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = build_router(state.clone())
        .oneshot(get("/api/cards/pikachu-58"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["name"], "Pikachu");
    assert_eq!(json["attacks"][0]["damage"], 10);

    let mut renamed = pikachu();
    renamed["name"] = json!("Surfing Pikachu");
    let response = build_router(state.clone())
        .oneshot(json_request("PUT", "/api/cards/pikachu-58", &renamed))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state.clone())
        .oneshot(get("/api/cards"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["name"], "Surfing Pikachu");

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/cards/pikachu-58")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(get("/api/cards/pikachu-58"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_duplicate_conflicts() {
    let state = make_state().await;
    let first = build_router(state.clone())
        .oneshot(json_request("POST", "/api/cards", &pikachu()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = build_router(state)
        .oneshot(json_request("POST", "/api/cards", &pikachu()))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let json = body_to_json(second.into_body()).await;
    assert_eq!(json["status"], 409);
}

#[tokio::test]
async fn test_put_creates_missing_card() {
    let response = build_router(make_state().await)
        .oneshot(json_request("PUT", "/api/cards/pikachu-58", &pikachu()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_put_id_mismatch_is_bad_request() {
    let response = build_router(make_state().await)
        .oneshot(json_request("PUT", "/api/cards/raichu-14", &pikachu()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_card_is_rejected() {
    let mut zero_hp = pikachu();
    zero_hp["hp"] = json!(0);
    let response = build_router(make_state().await)
        .oneshot(json_request("POST", "/api/cards", &zero_hp))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_json_error() {
    let response = build_router(make_state().await)
        .oneshot(json_request("POST", "/api/cards", &json!({"id": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_delete_missing_is_not_found() {
    let response = build_router(make_state().await)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/cards/ghost")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_diagnostics_without_monitor_is_unavailable() {
    let response = build_router(make_state().await)
        .oneshot(get("/api/diagnostics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_diagnostics_report_lifecycle() {
    let state = make_state_with_monitor().await;

    let before = build_router(state.clone())
        .oneshot(get("/api/diagnostics"))
        .await
        .unwrap();
    assert_eq!(before.status(), StatusCode::NOT_FOUND);

    let audit = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/diagnostics/audit")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(audit.status(), StatusCode::OK);
    let json = body_to_json(audit.into_body()).await;
    assert_eq!(json["total_count"], 1);
    assert_eq!(json["counts_by_category"]["missing-in-render"], 1);

    let after = build_router(state)
        .oneshot(get("/api/diagnostics"))
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::OK);
    let json = body_to_json(after.into_body()).await;
    assert_eq!(json["divergences"][0]["subtype"], "active");
}
