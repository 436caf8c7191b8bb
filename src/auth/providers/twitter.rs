// src/auth/providers/twitter.rs
//! Twitter sign-in over OAuth 1.0a
//!
//! The redirect phase has to call Twitter first to obtain a request token;
//! that token is the correlation key and its secret rides along in the
//! pending handshake until the callback signs the access-token exchange.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::oauth1::{parse_form, OAuth1Signer};
use super::{error_body, non_empty, AuthorizationRedirect, ProviderAdapter, ProviderError};
use crate::auth::handshake::PendingHandshake;
use crate::auth::models::{CallbackParams, NormalizedProfile, Provider};
use crate::common::config::OAuthClientConfig;

#[derive(Debug, Clone)]
pub struct TwitterEndpoints {
    pub request_token_url: String,
    pub authenticate_url: String,
    pub access_token_url: String,
    pub verify_credentials_url: String,
}

impl Default for TwitterEndpoints {
    fn default() -> Self {
        Self {
            request_token_url: "https://api.twitter.com/oauth/request_token".to_string(),
            authenticate_url: "https://api.twitter.com/oauth/authenticate".to_string(),
            access_token_url: "https://api.twitter.com/oauth/access_token".to_string(),
            verify_credentials_url: "https://api.twitter.com/1.1/account/verify_credentials.json"
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TwitterAccount {
    id_str: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwitterAdapter {
    consumer_key: String,
    consumer_secret: String,
    callback_url: String,
    endpoints: TwitterEndpoints,
    http: Client,
}

impl TwitterAdapter {
    pub fn new(credentials: &OAuthClientConfig, callback_url: String, http: Client) -> Self {
        Self {
            consumer_key: credentials.client_id.clone(),
            consumer_secret: credentials.client_secret.clone(),
            callback_url,
            endpoints: TwitterEndpoints::default(),
            http,
        }
    }

    #[cfg(test)]
    pub fn with_endpoints(mut self, endpoints: TwitterEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn signer<'a>(&'a self, token: Option<&'a str>, token_secret: &'a str) -> OAuth1Signer<'a> {
        OAuth1Signer {
            consumer_key: &self.consumer_key,
            consumer_secret: &self.consumer_secret,
            token,
            token_secret,
        }
    }

    /// Signed POST whose response is a form-encoded body
    async fn signed_form_post(
        &self,
        url: &str,
        signer: OAuth1Signer<'_>,
        extra_oauth: &[(&str, &str)],
    ) -> Result<std::collections::HashMap<String, String>, ProviderError> {
        let header = signer.authorization_header("POST", url, &[], extra_oauth);
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_body(response).await;
            error!(error = %detail, url = %url, "Twitter OAuth request failed");
            return Err(ProviderError::Exchange(detail));
        }

        Ok(parse_form(&response.text().await?))
    }
}

#[async_trait]
impl ProviderAdapter for TwitterAdapter {
    fn provider(&self) -> Provider {
        Provider::Twitter
    }

    async fn authorization_redirect(&self) -> Result<AuthorizationRedirect, ProviderError> {
        let body = self
            .signed_form_post(
                &self.endpoints.request_token_url,
                self.signer(None, ""),
                &[("oauth_callback", self.callback_url.as_str())],
            )
            .await?;

        if body.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
            return Err(ProviderError::Exchange(
                "request token callback not confirmed".to_string(),
            ));
        }
        let (token, secret) = match (body.get("oauth_token"), body.get("oauth_token_secret")) {
            (Some(token), Some(secret)) => (token.clone(), secret.clone()),
            _ => {
                return Err(ProviderError::Exchange(
                    "request token response incomplete".to_string(),
                ))
            }
        };

        debug!("Obtained Twitter request token");
        Ok(AuthorizationRedirect {
            url: format!(
                "{}?oauth_token={}",
                self.endpoints.authenticate_url,
                urlencoding::encode(&token)
            ),
            correlation: token,
            secret: Some(secret),
        })
    }

    fn correlation_key(&self, params: &CallbackParams) -> Result<String, ProviderError> {
        if let Some(denied) = &params.denied {
            return Err(ProviderError::Denied(format!("request token {} denied", denied)));
        }
        non_empty(params.oauth_token.as_deref())
            .ok_or(ProviderError::MissingParameter("oauth_token"))
    }

    async fn fetch_profile(
        &self,
        params: &CallbackParams,
        handshake: &PendingHandshake,
    ) -> Result<NormalizedProfile, ProviderError> {
        let request_token = self.correlation_key(params)?;
        let verifier = non_empty(params.oauth_verifier.as_deref())
            .ok_or(ProviderError::MissingParameter("oauth_verifier"))?;
        let request_secret = handshake
            .secret
            .as_deref()
            .ok_or(ProviderError::UnknownHandshake)?;

        let access = self
            .signed_form_post(
                &self.endpoints.access_token_url,
                self.signer(Some(&request_token), request_secret),
                &[("oauth_verifier", verifier.as_str())],
            )
            .await?;
        let (access_token, access_secret) =
            match (access.get("oauth_token"), access.get("oauth_token_secret")) {
                (Some(token), Some(secret)) => (token.as_str(), secret.as_str()),
                _ => {
                    return Err(ProviderError::Exchange(
                        "access token response incomplete".to_string(),
                    ))
                }
            };

        let query = [("include_email", "true"), ("skip_status", "true")];
        let header = self.signer(Some(access_token), access_secret).authorization_header(
            "GET",
            &self.endpoints.verify_credentials_url,
            &query,
            &[],
        );
        let response = self
            .http
            .get(&self.endpoints.verify_credentials_url)
            .query(&query)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_body(response).await;
            warn!(error = %detail, "Twitter verify_credentials failed");
            return Err(ProviderError::NoProfile);
        }

        let account = response
            .json::<TwitterAccount>()
            .await
            .map_err(|_| ProviderError::NoProfile)?;

        // The access-token response already names the user; fall back to it
        let provider_id = non_empty(account.id_str.as_deref())
            .or_else(|| non_empty(access.get("user_id").map(String::as_str)))
            .ok_or(ProviderError::NoProfile)?;

        Ok(NormalizedProfile {
            provider: Provider::Twitter,
            provider_id,
            email: non_empty(account.email.as_deref()),
            display_name: non_empty(account.name.as_deref())
                .or_else(|| non_empty(access.get("screen_name").map(String::as_str))),
        })
    }
}
