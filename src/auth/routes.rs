//! Authentication routes

use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::models::{CallbackParams, Provider};
use crate::common::AppState;

/// Creates and returns the authentication router, mounted under `/auth`
///
/// # Routes
/// - `POST /auth/register` - Create a password account
/// - `POST /auth/login` - Exchange credentials for a token
/// - `POST /auth/logout` - Clear the token cookie
/// - `GET /auth/CheckUser` - Current user (bearer token required)
/// - `GET /auth/{google,facebook,twitter}` - Start a provider sign-in
/// - `GET /auth/{google,facebook,twitter}/callback` - Finish a provider sign-in
pub fn auth_routes() -> Router {
    let mut router = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/CheckUser", get(handlers::check_user));

    for provider in Provider::ALL {
        router = router
            .route(
                &format!("/{}", provider),
                get(move |state: Extension<Arc<AppState>>| {
                    handlers::provider_redirect(provider, state)
                }),
            )
            .route(
                &format!("/{}/callback", provider),
                get(
                    move |state: Extension<Arc<AppState>>, query: Query<CallbackParams>| {
                        handlers::provider_callback(provider, state, query)
                    },
                ),
            );
    }

    Router::new().nest("/auth", router)
}
