//! API error and reply types shared by the handlers

use bui_core::BackendError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error message
    pub message: String,
    /// HTTP status code
    #[serde(skip)]
    pub status: u16,
}

impl ApiError {
    pub fn new(status: u16, message: &str) -> Self {
        Self {
            message: message.to_string(),
            status,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(400, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(403, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(404, message)
    }

    pub fn method_not_allowed(message: &str) -> Self {
        Self::new(405, message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(409, message)
    }

    pub fn internal(message: &str) -> Self {
        Self::new(500, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Backend failures surface as internal errors with the backend message
impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        Self::internal(&err.to_string())
    }
}

/// Successful handler output
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    /// Serialize any value into a 200 reply
    pub fn json<T: Serialize>(data: &T) -> Result<Self, ApiError> {
        serde_json::to_value(data)
            .map(Self::ok)
            .map_err(|e| ApiError::internal(&e.to_string()))
    }
}

/// Handler result
pub type ApiResult = Result<Reply, ApiError>;
