// Gateway error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

use crate::database::StorageError;
use crate::filter::FilterError;

/// Errors surfaced by request composition.
///
/// Unknown or unauthorized attributes and relations are not errors; they are
/// dropped from the output.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A parent/single lookup did not yield exactly one record, or a traversal
    /// named a relation that is not whitelisted
    #[error("Not found: {0}")]
    NotFound(String),

    /// The declarative request could not be normalized
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Passed through from the `Queryable` unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl GatewayError {
    pub fn not_found(message: impl Into<String>) -> Self {
        GatewayError::NotFound(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        GatewayError::MalformedRequest(message.into())
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::MalformedRequest(_) => "MALFORMED_REQUEST",
            GatewayError::Storage(_) => "STORAGE_FAILURE",
        }
    }

    /// Convert to JSON response body; storage details stay server-side
    pub fn to_json(&self) -> Value {
        let message = match self {
            GatewayError::NotFound(msg) | GatewayError::MalformedRequest(msg) => msg.clone(),
            GatewayError::Storage(_) => "An error occurred while processing your request".to_string(),
        };
        json!({
            "error": true,
            "message": message,
            "code": self.error_code()
        })
    }
}

impl From<FilterError> for GatewayError {
    fn from(err: FilterError) -> Self {
        GatewayError::MalformedRequest(err.to_string())
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        if let GatewayError::Storage(err) = &self {
            tracing::error!("Storage error: {}", err);
        }
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
