// src/auth/providers/facebook.rs
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

const SCOPES: &str = "email";
const PROFILE_FIELDS: &str = "id,name,email";

#[derive(Debug, Clone)]
pub struct FacebookEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
}

impl Default for FacebookEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: "https://www.facebook.com/v18.0/dialog/oauth".to_string(),
            token_url: "https://graph.facebook.com/v18.0/oauth/access_token".to_string(),
            profile_url: "https://graph.facebook.com/me".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FacebookAdapter {
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    endpoints: FacebookEndpoints,
    http: Client,
}

impl FacebookAdapter {
    pub fn new(credentials: &OAuthClientConfig, redirect_uri: String, http: Client) -> Self {
        Self {
            app_id: credentials.client_id.clone(),
            app_secret: credentials.client_secret.clone(),
            redirect_uri,
            endpoints: FacebookEndpoints::default(),
            http,
        }
    }

    #[cfg(test)]
    pub fn with_endpoints(mut self, endpoints: FacebookEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        debug!("Exchanging Facebook authorization code for an access token");

        // Graph API takes the exchange as a GET with query parameters
        let response = self
            .http
            .get(&self.endpoints.token_url)
            .query(&[
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_body(response).await;
            error!(error = %detail, "Facebook token exchange failed");
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
impl ProviderAdapter for FacebookAdapter {
    fn provider(&self) -> Provider {
        Provider::Facebook
    }

    async fn authorization_redirect(&self) -> Result<AuthorizationRedirect, ProviderError> {
        let state = generate_handshake_nonce();
        let url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.endpoints.authorize_url,
            urlencoding::encode(&self.app_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(&state)
        );

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
            .get(&self.endpoints.profile_url)
            .query(&[("fields", PROFILE_FIELDS), ("access_token", access_token.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_body(response).await;
            warn!(error = %detail, "Facebook profile request failed");
            return Err(ProviderError::NoProfile);
        }

        let profile = response
            .json::<FacebookProfile>()
            .await
            .map_err(|_| ProviderError::NoProfile)?;

        // Accounts registered by phone number come back without an email
        Ok(NormalizedProfile {
            provider: Provider::Facebook,
            provider_id: non_empty(profile.id.as_deref()).ok_or(ProviderError::NoProfile)?,
            email: non_empty(profile.email.as_deref()),
            display_name: non_empty(profile.name.as_deref()),
        })
    }
}
