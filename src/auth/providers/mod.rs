//! # Provider adapters
//!
//! Each adapter runs one provider's two-phase handshake and hands back a
//! [`NormalizedProfile`]:
//!
//! 1. **Redirect**: [`ProviderAdapter::authorization_redirect`] builds the
//!    provider URL plus the correlation key (OAuth2 `state` nonce, or the
//!    OAuth1 request token) that the auth service parks in the
//!    [`HandshakeStore`](super::handshake::HandshakeStore).
//! 2. **Callback**: [`ProviderAdapter::correlation_key`] pulls that key back
//!    out of the callback query (or reports a denial), and
//!    [`ProviderAdapter::fetch_profile`] exchanges the grant for a profile.
//!
//! Adapters hold no per-request state. They are built once from
//! [`AppConfig`] and shared through [`ProviderRegistry`].

pub mod facebook;
pub mod google;
pub mod oauth1;
pub mod twitter;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::handshake::PendingHandshake;
use super::models::{CallbackParams, NormalizedProfile, Provider};
use crate::common::config::AppConfig;

pub use facebook::FacebookAdapter;
pub use google::GoogleAdapter;
pub use twitter::TwitterAdapter;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider denied authorization: {0}")]
    Denied(String),

    #[error("callback is missing {0}")]
    MissingParameter(&'static str),

    #[error("unknown or expired handshake")]
    UnknownHandshake,

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("provider returned no usable profile")]
    NoProfile,

    #[error("provider request timed out")]
    Timeout,

    #[error("provider request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Request(err.to_string())
        }
    }
}

/// Where to send the caller, and how to recognise the callback
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    pub url: String,
    pub correlation: String,
    pub secret: Option<String>,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn authorization_redirect(&self) -> Result<AuthorizationRedirect, ProviderError>;

    fn correlation_key(&self, params: &CallbackParams) -> Result<String, ProviderError>;

    async fn fetch_profile(
        &self,
        params: &CallbackParams,
        handshake: &PendingHandshake,
    ) -> Result<NormalizedProfile, ProviderError>;
}

/// Access token half of an OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
struct OAuth2TokenResponse {
    access_token: String,
}

/// Shared callback parsing for the OAuth2 providers
fn oauth2_correlation_key(params: &CallbackParams) -> Result<String, ProviderError> {
    if let Some(error) = &params.error {
        return Err(ProviderError::Denied(error.clone()));
    }
    non_empty(params.state.as_deref()).ok_or(ProviderError::MissingParameter("state"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads an error response body for logging
async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    format!("HTTP {}: {}", status, text)
}

/// HTTP client shared by all adapters; every call is bounded by `timeout`
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Client for the local mock providers in tests; bypasses any proxy
#[cfg(test)]
pub(crate) fn test_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .unwrap()
}

/// The configured adapters, keyed by provider
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every provider that has credentials configured
    pub fn from_config(config: &AppConfig, http: Client) -> Self {
        let mut registry = Self::new();

        if let Some(credentials) = &config.google {
            registry.register(Arc::new(GoogleAdapter::new(
                credentials,
                config.callback_url(Provider::Google),
                http.clone(),
            )));
        }
        if let Some(credentials) = &config.facebook {
            registry.register(Arc::new(FacebookAdapter::new(
                credentials,
                config.callback_url(Provider::Facebook),
                http.clone(),
            )));
        }
        if let Some(credentials) = &config.twitter {
            registry.register(Arc::new(TwitterAdapter::new(
                credentials,
                config.callback_url(Provider::Twitter),
                http,
            )));
        }

        for provider in Provider::ALL {
            if registry.get(provider).is_some() {
                info!(provider = %provider, "OAuth provider enabled");
            } else {
                info!(provider = %provider, "OAuth provider not configured, routes disabled");
            }
        }

        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }
}

/// Adapter that skips the network and hands back a fixed profile
#[cfg(test)]
pub(crate) struct StaticProfileAdapter {
    pub provider: Provider,
    pub profile: Option<NormalizedProfile>,
}

#[cfg(test)]
#[async_trait]
impl ProviderAdapter for StaticProfileAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn authorization_redirect(&self) -> Result<AuthorizationRedirect, ProviderError> {
        let state = crate::common::generate_handshake_nonce();
        Ok(AuthorizationRedirect {
            url: format!("https://provider.test/authorize?state={}", state),
            correlation: state,
            secret: None,
        })
    }

    fn correlation_key(&self, params: &CallbackParams) -> Result<String, ProviderError> {
        oauth2_correlation_key(params)
    }

    async fn fetch_profile(
        &self,
        _params: &CallbackParams,
        _handshake: &PendingHandshake,
    ) -> Result<NormalizedProfile, ProviderError> {
        self.profile.clone().ok_or(ProviderError::NoProfile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    #[test]
    fn test_oauth2_correlation_key() {
        let params = CallbackParams {
            code: Some("c".into()),
            state: Some("H_STATE".into()),
            ..Default::default()
        };
        assert_eq!(oauth2_correlation_key(&params).unwrap(), "H_STATE");

        let denied = CallbackParams {
            error: Some("access_denied".into()),
            state: Some("H_STATE".into()),
            ..Default::default()
        };
        assert!(matches!(
            oauth2_correlation_key(&denied),
            Err(ProviderError::Denied(_))
        ));

        assert!(matches!(
            oauth2_correlation_key(&CallbackParams::default()),
            Err(ProviderError::MissingParameter("state"))
        ));
    }

    #[test]
    fn test_registry_only_holds_configured_providers() {
        let vars: Map<&str, &str> = [
            ("JWT_SECRET", "s"),
            ("GOOGLE_CLIENT_ID", "gid"),
            ("GOOGLE_CLIENT_SECRET", "gsecret"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        let http = http_client(Duration::from_secs(1)).unwrap();
        let registry = ProviderRegistry::from_config(&config, http);
        assert!(registry.get(Provider::Google).is_some());
        assert!(registry.get(Provider::Facebook).is_none());
        assert!(registry.get(Provider::Twitter).is_none());
    }
}
