//! Card definition service and diagnostics API for the duel client.
//!
//! An Axum HTTP server exposing:
//!
//! - **Card CRUD** (`/api/cards`) over a JSON-file-backed [`CardStore`]
//! - **Diagnostics** (`/api/diagnostics`) serving the latest audit report
//!   and on-demand audit passes
//! - **`WebSocket`** (`/ws/diagnostics`) streaming every compiled report
//! - **Health** (`/api/health`)
//!
//! [`CardStore`]: store::CardStore

pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod store;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, spawn_server, start_server};
pub use state::AppState;
pub use store::{CardStore, PutOutcome, StoreError};
