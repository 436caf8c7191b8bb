//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Query},
    http::{
        header::{LOCATION, SET_COOKIE},
        StatusCode,
    },
    response::IntoResponse,
};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use std::sync::Arc;
use tracing::{info, warn};

use super::extractors::{AuthedUser, TOKEN_COOKIE};
use super::models::{
    CallbackParams, CredentialsRequest, MessageResponse, Provider, RegisterResponse,
    TokenResponse, UserView,
};
use super::tokens::TOKEN_TTL_HOURS;
use crate::common::{ApiError, AppState};

fn credentials_body(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<CredentialsRequest, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected malformed request body");
        ApiError::Malformed("Malformed request body".to_string())
    })
}

fn token_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token.to_string()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::hours(TOKEN_TTL_HOURS))
        .build()
}

fn cleared_token_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, ""))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .build()
}

/// POST /auth/register
///
/// # Request Body
/// ```json
/// { "email": "a@x.com", "password": "p1" }
/// ```
///
/// # Response (201)
/// ```json
/// { "success": true, "message": "User registered successfully", "user": { ... } }
/// ```
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let request = credentials_body(payload)?;
    let user = state.auth.register(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User registered successfully".to_string(),
            user: UserView::from(&user),
        }),
    ))
}

/// POST /auth/login
///
/// Returns the token in the body and also sets it as an HttpOnly cookie.
///
/// # Response
/// ```json
/// { "success": true, "message": "Login successful", "token": "<jwt>", "user": { ... } }
/// ```
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = credentials_body(payload)?;
    let session = state.auth.login(&request).await?;

    Ok((
        [(SET_COOKIE, token_cookie(&session.token).to_string())],
        Json(TokenResponse {
            success: true,
            message: "Login successful".to_string(),
            token: session.token,
            user: session.user,
        }),
    ))
}

/// POST /auth/logout
pub async fn logout(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    state.auth.logout();
    (
        [(SET_COOKIE, cleared_token_cookie().to_string())],
        Json(MessageResponse {
            success: true,
            message: "Logout successful".to_string(),
        }),
    )
}

/// GET /auth/CheckUser
/// Returns the caller's user view
pub async fn check_user(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
) -> Result<Json<UserView>, ApiError> {
    let view = state.auth.check_user(&identity).await?;
    Ok(Json(view))
}

/// GET /auth/{provider} - 302 to the provider's consent page
pub async fn provider_redirect(
    provider: Provider,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let url = state.auth.begin_provider_login(provider).await?;
    info!(provider = %provider, "Redirecting to {} OAuth", provider.display_name());
    Ok((StatusCode::FOUND, [(LOCATION, url)]))
}

/// GET /auth/{provider}/callback
///
/// # Response
/// ```json
/// { "success": true, "message": "Google Sign-In successful", "token": "<jwt>", "user": { ... } }
/// ```
pub async fn provider_callback(
    provider: Provider,
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<TokenResponse>, ApiError> {
    let session = state.auth.handle_provider_callback(provider, &params).await?;

    Ok(Json(TokenResponse {
        success: true,
        message: format!("{} Sign-In successful", provider.display_name()),
        token: session.token,
        user: session.user,
    }))
}
