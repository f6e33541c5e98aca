//! Error Types for the Vellum API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use vellum_core::{CoordinationError, KeyParseError, VellumError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Artifact failed structural validation
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Path or field format is incorrect
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No schema is stored for the requested core or collection
    SchemaNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Compare-and-set publish lost to another writer
    VersionConflict,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Coordination store could not be reached
    ServiceUnavailable,

    /// Coordination store did not answer in time
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidInput | ErrorCode::InvalidFormat => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::SchemaNotFound => StatusCode::NOT_FOUND,

            ErrorCode::VersionConflict => StatusCode::CONFLICT,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn schema_not_found(key: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SchemaNotFound,
            format!("No schema stored for {}", key),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling in Axum.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

fn coordination_code(err: &CoordinationError) -> ErrorCode {
    match err {
        CoordinationError::Unavailable { .. } => ErrorCode::ServiceUnavailable,
        CoordinationError::Timeout { .. } => ErrorCode::Timeout,
        CoordinationError::NotFound { .. } => ErrorCode::SchemaNotFound,
        CoordinationError::VersionConflict { .. } => ErrorCode::VersionConflict,
    }
}

impl From<CoordinationError> for ApiError {
    fn from(err: CoordinationError) -> Self {
        match &err {
            CoordinationError::NotFound { key } => ApiError::schema_not_found(key),
            CoordinationError::VersionConflict {
                expected, actual, ..
            } => ApiError::new(ErrorCode::VersionConflict, err.to_string()).with_details(json!({
                "expectedVersion": expected,
                "actualVersion": actual,
            })),
            _ => {
                tracing::warn!(error = %err, "Coordination store failure");
                ApiError::new(coordination_code(&err), err.to_string())
            }
        }
    }
}

impl From<VellumError> for ApiError {
    fn from(err: VellumError) -> Self {
        match err {
            VellumError::Coordination(e) => e.into(),
            VellumError::RefreshUnavailable {
                key,
                requested,
                last_known_version,
                source,
            } => ApiError::new(
                coordination_code(&source),
                format!("Could not refresh {} to version {}: {}", key, requested, source),
            )
            .with_details(json!({
                "requestedVersion": requested,
                "lastKnownVersion": last_known_version,
            })),
            VellumError::Validation(e) => ApiError::validation_failed(e.to_string()),
            VellumError::Config(e) => {
                tracing::error!(error = %e, "Configuration error surfaced to a request");
                ApiError::internal_error("Server misconfigured")
            }
        }
    }
}

impl From<KeyParseError> for ApiError {
    fn from(err: KeyParseError) -> Self {
        ApiError::new(ErrorCode::InvalidFormat, err.to_string())
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::ValidationError;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::SchemaNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::VersionConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_refresh_unavailable_carries_last_known_version() {
        let err: ApiError = VellumError::RefreshUnavailable {
            key: "collections/books".to_string(),
            requested: 9,
            last_known_version: 5,
            source: CoordinationError::Unavailable {
                reason: "connection refused".to_string(),
            },
        }
        .into();

        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let details = err.details.expect("details present");
        assert_eq!(details["lastKnownVersion"], 5);
        assert_eq!(details["requestedVersion"], 9);
    }

    #[test]
    fn test_refresh_timeout_maps_to_gateway_timeout() {
        let err: ApiError = VellumError::RefreshUnavailable {
            key: "collections/books".to_string(),
            requested: 2,
            last_known_version: 1,
            source: CoordinationError::Timeout {
                key: "collections/books".to_string(),
                after: std::time::Duration::from_millis(100),
            },
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_first_load_failures() {
        let err: ApiError = VellumError::Coordination(CoordinationError::NotFound {
            key: "cores/c1".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message.contains("cores/c1"));

        let err: ApiError = VellumError::Coordination(CoordinationError::Unavailable {
            reason: "down".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.details.is_none());
    }

    #[test]
    fn test_conflict_and_validation() {
        let err: ApiError = CoordinationError::VersionConflict {
            key: "collections/books".to_string(),
            expected: 3,
            actual: Some(4),
        }
        .into();
        assert_eq!(err.code, ErrorCode::VersionConflict);
        assert_eq!(err.details.as_ref().map(|d| d["actualVersion"].clone()), Some(json!(4)));

        let err: ApiError = VellumError::from(ValidationError::DuplicateField {
            name: "id".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::schema_not_found("collections/books");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("SCHEMA_NOT_FOUND"));
        assert!(json.contains("collections/books"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::timeout("fetch");
        let display = format!("{}", err);
        assert!(display.contains("Timeout"));
        assert!(display.contains("fetch"));
    }
}
