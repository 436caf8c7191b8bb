//! Authentication error taxonomy
//!
//! Store, token and provider failures are folded into [`AuthError`] at the
//! service boundary; [`ApiError`] is what finally reaches the caller.

use thiserror::Error;
use tracing::warn;

use super::providers::ProviderError;
use super::store::{StoreError, UniqueField};
use super::tokens::TokenError;
use crate::common::{ApiError, ValidationResult};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("identity provider error: {0}")]
    Upstream(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("malformed: {0}")]
    Malformed(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("provider {0} is not configured")]
    ProviderNotConfigured(String),

    #[error("store error: {0}")]
    Store(#[source] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(UniqueField::Email) => {
                AuthError::Conflict("Email already exists".to_string())
            }
            StoreError::Conflict(field) => AuthError::Conflict(format!("{} already exists", field)),
            StoreError::Timeout(op) => AuthError::Timeout(format!("credential store: {}", op)),
            StoreError::Database(e) => AuthError::Store(e),
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout => AuthError::Timeout("identity provider".to_string()),
            other => {
                warn!(error = %other, "Provider handshake failed");
                AuthError::AuthenticationFailed("Authentication failed".to_string())
            }
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AuthError::Internal(format!("token signing: {}", msg)),
            other => AuthError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<ValidationResult> for AuthError {
    fn from(result: ValidationResult) -> Self {
        AuthError::Validation(result.message())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::Conflict(msg) => ApiError::Conflict(msg),
            AuthError::AuthenticationFailed(_) => {
                ApiError::AuthenticationFailed("Authentication failed".to_string())
            }
            // Token failure kinds are not distinguished to the caller
            AuthError::Unauthenticated(_) => ApiError::Unauthenticated("Unauthorized".to_string()),
            AuthError::Timeout(_) => ApiError::Timeout("Upstream operation timed out".to_string()),
            AuthError::Upstream(_) => {
                ApiError::BadGateway("Identity provider unavailable".to_string())
            }
            AuthError::Unavailable(_) => {
                ApiError::ServiceUnavailable("Too many pending sign-ins".to_string())
            }
            AuthError::Malformed(msg) => ApiError::Malformed(msg),
            AuthError::Validation(msg) => ApiError::ValidationError(msg),
            AuthError::ProviderNotConfigured(_) => {
                ApiError::NotFound("Provider not configured".to_string())
            }
            AuthError::Store(e) => ApiError::DatabaseError(e),
            AuthError::Internal(msg) => ApiError::InternalServer(msg),
        }
    }
}
