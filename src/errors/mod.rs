//! Error handling module for the folklore archive backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Field path (e.g. `title.ja`, `motifs[1]`) to human-readable message.
pub type FieldErrors = BTreeMap<String, String>;

/// Message returned in place of internal details outside development.
const GENERIC_INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Client exceeded its request quota
    RateLimited { retry_after_secs: u64 },
    /// Missing, invalid or unconfigured credential
    Unauthorized(String),
    /// One or more payload fields failed validation
    Validation(FieldErrors),
    /// Stored item counter is not a non-negative integer
    CounterCorrupt(String),
    /// Item counter has reached its digit capacity
    CounterOverflow,
    /// Document store failure
    Store(String),
    /// Resource not found
    NotFound(String),
    /// Bad request
    BadRequest(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::CounterCorrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::CounterOverflow => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::RateLimited { .. } => codes::RATE_LIMIT_EXCEEDED,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::CounterCorrupt(_)
            | AppError::CounterOverflow
            | AppError::Store(_)
            | AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::RateLimited { retry_after_secs } => {
                format!("Rate limit exceeded, retry after {} seconds", retry_after_secs)
            }
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Validation(fields) => {
                format!("Validation failed for {} field(s)", fields.len())
            }
            AppError::CounterCorrupt(msg) => format!("Item counter is corrupt: {}", msg),
            AppError::CounterOverflow => "Item counter exhausted its id space".to_string(),
            AppError::Store(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }

    /// Whether this error is a server-side fault rather than a caller mistake.
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Store(format!("Database error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    /// Build the envelope, hiding internal details unless `expose_internal` is set.
    pub fn new(error: &AppError, expose_internal: bool) -> Self {
        let details = match error {
            AppError::Validation(fields) => serde_json::to_value(fields).ok(),
            AppError::RateLimited { retry_after_secs } => {
                Some(serde_json::json!({ "retryAfter": retry_after_secs }))
            }
            _ => None,
        };

        let message = if error.is_internal() && !expose_internal {
            GENERIC_INTERNAL_MESSAGE.to_string()
        } else {
            error.message()
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message,
                details,
            },
        }
    }
}

/// An error on its way out, with the exposure policy of the running environment.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub expose_internal: bool,
}

impl ApiError {
    pub fn new(error: AppError, expose_internal: bool) -> Self {
        Self {
            error,
            expose_internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorResponse::new(&self.error, self.expose_internal);
        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after_secs } = self.error {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_envelope_carries_field_map() {
        let mut fields = FieldErrors::new();
        fields.insert("title".to_string(), "Required".to_string());
        let body = ErrorResponse::new(&AppError::Validation(fields), false);

        assert!(!body.success);
        assert_eq!(body.error.code, codes::VALIDATION_ERROR);
        assert_eq!(body.error.details.unwrap()["title"], "Required");
    }

    #[test]
    fn test_internal_details_hidden_in_production() {
        let err = AppError::Store("disk I/O error at page 7".to_string());

        let production = ErrorResponse::new(&err, false);
        assert_eq!(production.error.code, codes::INTERNAL_ERROR);
        assert_eq!(production.error.message, GENERIC_INTERNAL_MESSAGE);

        let development = ErrorResponse::new(&err, true);
        assert!(development.error.message.contains("page 7"));
    }

    #[test]
    fn test_counter_errors_surface_as_internal() {
        assert_eq!(AppError::CounterOverflow.error_code(), codes::INTERNAL_ERROR);
        assert_eq!(
            AppError::CounterCorrupt("abc".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after_header() {
        let response = ApiError::new(AppError::RateLimited { retry_after_secs: 42 }, false)
            .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
