//! End-to-end tests for the auth routes
//!
//! These drive the full router (guard, handlers, error mapping) with
//! in-memory storage and a network-free provider adapter.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

use super::handshake::HandshakeStore;
use super::models::{NormalizedProfile, Provider};
use super::providers::google::GoogleEndpoints;
use super::providers::twitter::TwitterEndpoints;
use super::providers::{
    test_http_client, GoogleAdapter, ProviderRegistry, StaticProfileAdapter, TwitterAdapter,
};
use super::service::{test_service, test_service_with, AuthService};
use crate::common::config::OAuthClientConfig;
use crate::common::{AppConfig, AppState};

fn app_from(service: AuthService) -> Router {
    let vars: HashMap<&str, &str> = [("JWT_SECRET", "test_secret_key")].into_iter().collect();
    let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    let state = Arc::new(AppState::new(config, service));
    crate::build_app(state)
}

async fn app_with(registry: ProviderRegistry) -> Router {
    app_from(test_service(registry).await)
}

async fn app() -> Router {
    app_with(ProviderRegistry::new()).await
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value, Response<()>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (parts.status, value, Response::from_parts(parts, ()))
}

fn credentials() -> Value {
    json!({ "email": "a@x.com", "password": "p1" })
}

#[tokio::test]
async fn test_register_login_check_user() {
    let app = app().await;

    let (status, body, _) =
        send(&app, json_request(Method::POST, "/auth/register", credentials())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "a@x.com");
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let (status, body, response) =
        send(&app, json_request(Method::POST, "/auth/login", credentials())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    let token = body["token"].as_str().unwrap().to_string();
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with(&format!("token={};", token)));
    assert!(cookie.contains("HttpOnly"));

    let (status, body, _) = send(&app, get("/auth/CheckUser", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id.as_str());
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["role"], "user");
    assert!(!body.to_string().contains("password"));
}

#[tokio::test]
async fn test_check_user_requires_token() {
    let app = app().await;

    let (status, body, _) = send(&app, get("/auth/CheckUser", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Unauthorized");

    let (status, _, _) = send(&app, get("/auth/CheckUser", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_check_user_accepts_cookie() {
    let app = app().await;
    send(&app, json_request(Method::POST, "/auth/register", credentials())).await;
    let (_, body, _) = send(&app, json_request(Method::POST, "/auth/login", credentials())).await;
    let token = body["token"].as_str().unwrap();

    let request = Request::builder()
        .uri("/auth/CheckUser")
        .header(header::COOKIE, format!("token={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@x.com");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = app().await;
    send(&app, json_request(Method::POST, "/auth/register", credentials())).await;

    let (status, body, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            json!({ "email": "a@x.com", "password": "other" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already exists");
}

#[tokio::test]
async fn test_login_failures_look_identical() {
    let app = app().await;
    send(&app, json_request(Method::POST, "/auth/register", credentials())).await;

    let (wrong_status, wrong_body, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            json!({ "email": "a@x.com", "password": "nope" }),
        ),
    )
    .await;
    let (unknown_status, unknown_body, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            json!({ "email": "nobody@x.com", "password": "p1" }),
        ),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_invalid_and_malformed_bodies() {
    let app = app().await;

    let (status, body, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            json!({ "email": "nope", "password": "p1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MALFORMED");
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/logout")
        .body(Body::empty())
        .unwrap();

    let (status, body, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logout successful");
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = app().await;
    let (status, body, _) = send(&app, get("/auth/myspace", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");
}

#[tokio::test]
async fn test_unconfigured_provider_is_404() {
    let app = app().await;
    let (status, body, _) = send(&app, get("/auth/twitter", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Provider not configured");
}

#[tokio::test]
async fn test_provider_redirect_and_callback() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(StaticProfileAdapter {
        provider: Provider::Facebook,
        profile: Some(NormalizedProfile {
            provider: Provider::Facebook,
            provider_id: "fb-1".to_string(),
            email: None,
            display_name: Some("Eff Bee".to_string()),
        }),
    }));
    let app = app_with(registry).await;

    let (status, _, response) = send(&app, get("/auth/facebook", None)).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let state = location.split("state=").nth(1).unwrap();

    let (status, body, _) = send(
        &app,
        get(&format!("/auth/facebook/callback?code=abc&state={}", state), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Facebook Sign-In successful");
    assert_eq!(body["user"]["name"], "Eff Bee");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body, _) = send(&app, get("/auth/CheckUser", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");

    // Replaying the callback finds no handshake
    let (status, body, _) = send(
        &app,
        get(&format!("/auth/facebook/callback?code=abc&state={}", state), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({
        "success": false,
        "message": "Authentication failed",
        "code": "AUTHENTICATION_FAILED"
    }));
}

#[tokio::test]
async fn test_denied_callback_is_unauthorized() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(StaticProfileAdapter {
        provider: Provider::Google,
        profile: None,
    }));
    let app = app_with(registry).await;

    let (status, body, _) = send(
        &app,
        get("/auth/google/callback?error=access_denied&state=H_X", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body.get("token").is_none());
}

fn facebook_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(StaticProfileAdapter {
        provider: Provider::Facebook,
        profile: None,
    }));
    registry
}

#[tokio::test]
async fn test_redirects_refused_when_handshakes_full() {
    let service = test_service_with(
        facebook_registry(),
        HandshakeStore::new(Duration::from_secs(60), 1),
    )
    .await;
    let app = app_from(service);

    let (status, _, _) = send(&app, get("/auth/facebook", None)).await;
    assert_eq!(status, StatusCode::FOUND);

    let (status, body, _) = send(&app, get("/auth/facebook", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

async fn slow_token_endpoint() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "access_token": "late" }))
}

/// Google adapter whose token endpoint answers after the client gives up
async fn stalled_google() -> GoogleAdapter {
    let mock = Router::new().route("/token", post(slow_token_endpoint));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, mock).await.unwrap();
    });

    let credentials = OAuthClientConfig {
        client_id: "gid".to_string(),
        client_secret: "gsecret".to_string(),
    };
    GoogleAdapter::new(
        &credentials,
        "http://localhost:5000/auth/google/callback".to_string(),
        test_http_client(Duration::from_millis(200)),
    )
    .with_endpoints(GoogleEndpoints {
        authorize_url: format!("{}/authorize", base),
        token_url: format!("{}/token", base),
        userinfo_url: format!("{}/userinfo", base),
    })
}

#[tokio::test]
async fn test_provider_timeout_is_gateway_timeout() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(stalled_google().await));
    let app = app_with(registry).await;

    let (status, _, response) = send(&app, get("/auth/google", None)).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let state = location
        .split("state=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap();

    let (status, body, _) = send(
        &app,
        get(&format!("/auth/google/callback?code=abc&state={}", state), None),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "TIMEOUT");
    assert!(body.get("token").is_none());
}

async fn reject_request_token() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

#[tokio::test]
async fn test_rejected_request_token_is_bad_gateway() {
    let mock = Router::new().route("/oauth/request_token", post(reject_request_token));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, mock).await.unwrap();
    });

    let credentials = OAuthClientConfig {
        client_id: "consumer-key".to_string(),
        client_secret: "consumer-secret".to_string(),
    };
    let twitter = TwitterAdapter::new(
        &credentials,
        "http://localhost:5000/auth/twitter/callback".to_string(),
        test_http_client(Duration::from_secs(5)),
    )
    .with_endpoints(TwitterEndpoints {
        request_token_url: format!("{}/oauth/request_token", base),
        authenticate_url: format!("{}/oauth/authenticate", base),
        access_token_url: format!("{}/oauth/access_token", base),
        verify_credentials_url: format!("{}/1.1/account/verify_credentials.json", base),
    });
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(twitter));
    let app = app_with(registry).await;

    let (status, body, response) = send(&app, get("/auth/twitter", None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "BAD_GATEWAY");
    assert!(response.headers().get(header::LOCATION).is_none());
}
