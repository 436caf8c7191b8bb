//! Route guard for Axum
//!
//! Protected handlers take an [`AuthedUser`] argument; the request never
//! reaches them unless a valid bearer token was presented.

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};
use cookie::Cookie;
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::Identity;
use super::tokens::TokenService;
use crate::common::{ApiError, AppState};

pub const TOKEN_COOKIE: &str = "token";

/// Identity of the caller, decoded from a verified token
#[derive(Debug, Clone)]
pub struct AuthedUser(pub Identity);

/// Bearer header first, then the `token` cookie set at login
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == TOKEN_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

/// Every failure is the same 401; the token error kind only reaches the logs
pub fn authorize(headers: &HeaderMap, tokens: &TokenService) -> Result<Identity, ApiError> {
    let token = match extract_token(headers) {
        Some(t) => t,
        None => {
            warn!("Authentication failed: missing bearer token");
            return Err(ApiError::Unauthenticated("Unauthorized".to_string()));
        }
    };

    match tokens.verify(&token) {
        Ok(claims) => {
            debug!(user_id = %claims.user_id, "Bearer token accepted");
            Ok(Identity::from(claims))
        }
        Err(e) => {
            warn!(error = %e, "Authentication failed: token rejected");
            Err(ApiError::Unauthenticated("Unauthorized".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        authorize(&parts.headers, app_state.auth.tokens()).map(AuthedUser)
    }
}
