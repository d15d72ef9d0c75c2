//! Shared application state for the card service.
//!
//! [`AppState`] holds the card store behind an async lock and, when the
//! client runs one, a handle to the diagnostic monitor whose reports the
//! diagnostics endpoints serve.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use duel_audit::DiagnosticMonitor;
use tokio::sync::RwLock;

use crate::store::CardStore;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState {
    /// The card definition store. Writers hold the lock across the file
    /// write so mutations are serialized.
    pub cards: RwLock<CardStore>,
    /// Diagnostic monitor, present when the client wires one in.
    pub monitor: Option<Arc<DiagnosticMonitor>>,
    /// When the state was created.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state without diagnostics.
    pub fn new(cards: CardStore) -> Self {
        Self {
            cards: RwLock::new(cards),
            monitor: None,
            started_at: Utc::now(),
        }
    }

    /// Create state with a diagnostic monitor attached.
    pub fn with_monitor(cards: CardStore, monitor: Arc<DiagnosticMonitor>) -> Self {
        Self {
            monitor: Some(monitor),
            ..Self::new(cards)
        }
    }
}
