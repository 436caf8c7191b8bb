// src/auth/providers/google.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::{
    error_body, non_empty, oauth2_correlation_key, AuthorizationRedirect, OAuth2TokenResponse,
    ProviderAdapter, ProviderError,
};
use crate::auth::handshake::PendingHandshake;
use crate::auth::models::{CallbackParams, NormalizedProfile, Provider};
use crate::common::config::OAuthClientConfig;
use crate::common::generate_handshake_nonce;

const SCOPES: &str = "profile email";

#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
        }
    }
}

/// OpenID Connect userinfo response
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleAdapter {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    endpoints: GoogleEndpoints,
    http: Client,
}

impl GoogleAdapter {
    pub fn new(credentials: &OAuthClientConfig, redirect_uri: String, http: Client) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri,
            endpoints: GoogleEndpoints::default(),
            http,
        }
    }

    #[cfg(test)]
    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging Google authorization code for tokens");

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_body(response).await;
            error!(error = %detail, "Google token exchange failed");
            return Err(ProviderError::Exchange(detail));
        }

        let token = response
            .json::<OAuth2TokenResponse>()
            .await
            .map_err(|e| ProviderError::Exchange(e.to_string()))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn authorization_redirect(&self) -> Result<AuthorizationRedirect, ProviderError> {
        let state = generate_handshake_nonce();
        let url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.endpoints.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(&state)
        );

        debug!("Generated Google OAuth authorization URL with scopes: {}", SCOPES);
        Ok(AuthorizationRedirect {
            url,
            correlation: state,
            secret: None,
        })
    }

    fn correlation_key(&self, params: &CallbackParams) -> Result<String, ProviderError> {
        oauth2_correlation_key(params)
    }

    async fn fetch_profile(
        &self,
        params: &CallbackParams,
        _handshake: &PendingHandshake,
    ) -> Result<NormalizedProfile, ProviderError> {
        let code =
            non_empty(params.code.as_deref()).ok_or(ProviderError::MissingParameter("code"))?;
        let access_token = self.exchange_code(&code).await?;

        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(&access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_body(response).await;
            warn!(error = %detail, "Google userinfo request failed");
            return Err(ProviderError::NoProfile);
        }

        let info = response
            .json::<GoogleUserInfo>()
            .await
            .map_err(|_| ProviderError::NoProfile)?;

        let provider_id = non_empty(info.sub.as_deref()).ok_or(ProviderError::NoProfile)?;

        let email = match info.email_verified {
            Some(false) => {
                warn!(
                    provider_id = %provider_id,
                    "Google account email is unverified, ignoring it"
                );
                None
            }
            _ => non_empty(info.email.as_deref()),
        };

        Ok(NormalizedProfile {
            provider: Provider::Google,
            provider_id,
            email,
            display_name: non_empty(info.name.as_deref()),
        })
    }
}
