//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for the layout service and every
//! endpoint. It implements `axum::response::IntoResponse` to produce
//! structured JSON error responses with appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use portlayout_core::CoreError;
use portlayout_storage::StorageError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "PERMISSION_DENIED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown node, user, subscription, layout or content (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or structurally illegal request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A capability flag check failed (403).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No acting user, or the guest user (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The layout changed since the client read it, or a duplicate record
    /// (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store could not persist the edit (500). The edit was discarded.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::PersistenceFailure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILURE")
            }
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::PermissionDenied(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Conflict(msg)
            | ApiError::PersistenceFailure(msg)
            | ApiError::InternalError(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let detail = ApiErrorDetail {
            code: code.to_string(),
            message: self.message().to_string(),
            details: None,
        };

        let body = serde_json::json!({
            "success": false,
            "error": detail,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::NodeNotFound { .. } => ApiError::NotFound(err.to_string()),
            CoreError::PermissionDenied { .. } => ApiError::PermissionDenied(err.to_string()),
            CoreError::InvalidRequest { .. } | CoreError::InvalidId { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            CoreError::TreeInconsistency { .. } => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        if err.is_not_found() {
            return ApiError::NotFound(err.to_string());
        }
        match &err {
            StorageError::IntegrityError { .. } => ApiError::Conflict(err.to_string()),
            _ => ApiError::PersistenceFailure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portlayout_core::{Capability, NodeId, UserId};

    #[test]
    fn core_errors_map_to_request_kinds() {
        let denied: ApiError = CoreError::PermissionDenied {
            id: NodeId::root(),
            capability: Capability::Delete,
        }
        .into();
        assert!(matches!(denied, ApiError::PermissionDenied(_)));

        let missing: ApiError = CoreError::NodeNotFound { id: NodeId::folder(9) }.into();
        assert!(matches!(missing, ApiError::NotFound(_)));

        let bad: ApiError = CoreError::InvalidRequest {
            reason: "cycle".to_string(),
        }
        .into();
        assert!(matches!(bad, ApiError::BadRequest(_)));
    }

    #[test]
    fn storage_errors_map_by_kind() {
        let missing: ApiError = StorageError::UserIdNotFound(UserId(4)).into();
        assert!(matches!(missing, ApiError::NotFound(_)));

        let dup: ApiError = StorageError::IntegrityError {
            reason: "taken".to_string(),
        }
        .into();
        assert!(matches!(dup, ApiError::Conflict(_)));

        let rejected: ApiError = StorageError::WriteRejected {
            reason: "disk full".to_string(),
        }
        .into();
        assert!(matches!(rejected, ApiError::PersistenceFailure(_)));
    }

    #[test]
    fn status_codes() {
        let cases = [
            (ApiError::NotFound(String::new()), StatusCode::NOT_FOUND),
            (ApiError::BadRequest(String::new()), StatusCode::BAD_REQUEST),
            (ApiError::PermissionDenied(String::new()), StatusCode::FORBIDDEN),
            (ApiError::Unauthorized(String::new()), StatusCode::UNAUTHORIZED),
            (ApiError::Conflict(String::new()), StatusCode::CONFLICT),
            (
                ApiError::PersistenceFailure(String::new()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
