//! Error types for bui-core

use thiserror::Error;

/// Failure raised by a backend client.
///
/// The display string is relayed verbatim to API callers, so variants carry
/// human-readable messages.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{0}")]
    Server(String),

    #[error("Unknown server: {0}")]
    UnknownServer(String),

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type BackendResult<T> = Result<T, BackendError>;
