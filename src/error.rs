//! Tracker error types with HTTP status code mapping.
//!
//! [`TrackerError`] is the central error type for rule loading, record
//! evaluation, persistence and the operator API. Each variant maps to a
//! specific HTTP status code and structured JSON error response.
//!
//! Delivery failures are not represented here: they are classified by
//! [`crate::delivery::DeliveryError`] and never leave the delivery worker.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid killmail record: victim is missing",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error enum shared by the rule engine, rule store, persistence and API.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request / 422        |
/// | 2000–2999 | Not Found       | 404 Not Found                |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Killmail record is malformed (missing victim, no attackers).
    #[error("invalid killmail record: {0}")]
    InvalidRecord(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Rule or destination configuration is inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Rule with the given ID was not found.
    #[error("rule not found: {0}")]
    RuleNotFound(uuid::Uuid),

    /// Destination with the given ID was not found.
    #[error("destination not found: {0}")]
    DestinationNotFound(uuid::Uuid),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl TrackerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRecord(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::Configuration(_) => 1003,
            Self::RuleNotFound(_) => 2001,
            Self::DestinationNotFound(_) => 2002,
            Self::Persistence(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRecord(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RuleNotFound(_) | Self::DestinationNotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_record_is_bad_request() {
        let err = TrackerError::InvalidRecord("victim is missing".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), 1001);
        assert!(err.to_string().contains("victim is missing"));
    }

    #[test]
    fn not_found_variants_map_to_404() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            TrackerError::RuleNotFound(id).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TrackerError::DestinationNotFound(id).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn into_response_carries_status() {
        let response = TrackerError::Configuration("bad rule".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
