//! Error types for the duel client binary.
//!
//! [`ClientError`] wraps every subsystem failure so `main` can propagate
//! it with `?`.

/// Top-level error for the client binary.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: duel_core::ConfigError,
    },

    /// The card store could not be opened.
    #[error("card store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: duel_server::StoreError,
    },

    /// The card service failed to start.
    #[error("card service error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: duel_server::ServerError,
    },

    /// The diagnostic monitor refused to start.
    #[error("monitor error: {source}")]
    Monitor {
        /// The underlying monitor error.
        #[from]
        source: duel_audit::MonitorError,
    },

    /// Reading console input failed.
    #[error("console input error: {source}")]
    Input {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A console line could not be understood.
    #[error("{message}")]
    Console {
        /// What was wrong with the line.
        message: String,
    },
}
