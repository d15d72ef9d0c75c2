//! Card service lifecycle.
//!
//! [`start_server`] binds and serves in the current task; [`spawn_server`]
//! binds eagerly and serves on a background task so the client can keep
//! running its console loop.

use std::net::SocketAddr;
use std::sync::Arc;

use duel_core::config::ServiceConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

async fn bind(config: &ServiceConfig) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Bind and serve until the process ends.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or taken, or
/// [`ServerError::Serve`] on a fatal I/O error.
pub async fn start_server(config: &ServiceConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Card service listening");
    }
    serve(listener, state).await
}

/// Bind now and serve on a background task.
///
/// Returns the task handle and the bound address (useful with port 0).
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the listener cannot be bound. Errors
/// after that are logged by the background task.
pub async fn spawn_server(
    config: &ServiceConfig,
    state: Arc<AppState>,
) -> Result<(JoinHandle<()>, SocketAddr), ServerError> {
    let listener = bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            error!(error = %e, "Card service exited with error");
        }
    });

    info!(%addr, "Card service spawned on background task");
    Ok((handle, addr))
}
