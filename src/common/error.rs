// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

/// API error types
///
/// Every failure leaving the service goes through one of these variants, so
/// callers only ever see a stable message and code.
#[derive(Debug)]
pub enum ApiError {
    ValidationError(String),
    Malformed(String),
    InvalidCredentials,
    Unauthenticated(String),
    AuthenticationFailed(String),
    Conflict(String),
    NotFound(String),
    Timeout(String),
    BadGateway(String),
    ServiceUnavailable(String),
    InternalServer(String),
    DatabaseError(sqlx::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::Malformed(msg) => write!(f, "Malformed: {}", msg),
            ApiError::InvalidCredentials => write!(f, "Invalid credentials"),
            ApiError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            ApiError::AuthenticationFailed(msg) => write!(f, "Authentication Failed: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad Gateway: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message, code) = match self {
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR"),
            ApiError::Malformed(msg) => (StatusCode::BAD_REQUEST, msg, "MALFORMED"),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid credentials".to_string(),
                "INVALID_CREDENTIALS",
            ),
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHENTICATED"),
            ApiError::AuthenticationFailed(msg) => {
                (StatusCode::UNAUTHORIZED, msg, "AUTHENTICATION_FAILED")
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT"),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg, "TIMEOUT"),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg, "BAD_GATEWAY"),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg, "SERVICE_UNAVAILABLE")
            }
            ApiError::InternalServer(msg) => {
                error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                )
            }
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    "DATABASE_ERROR",
                )
            }
        };

        let error_response = ErrorResponse {
            success: false,
            message,
            code: code.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}
