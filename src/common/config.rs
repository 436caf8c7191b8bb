// src/common/config.rs
//! Process-wide configuration
//!
//! Loaded and validated once at startup. Everything in here is read-only
//! afterwards; a missing signing secret aborts startup instead of falling back
//! to a default key.

use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::auth::models::Provider;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DATABASE_URL: &str = "sqlite://auth_api.db";
const DEFAULT_CALLBACK_BASE_URL: &str = "http://localhost:5000/auth";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HANDSHAKE_TTL_SECS: u64 = 600;
const DEFAULT_HANDSHAKE_MAX_PENDING: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("JWT_SECRET is not set; refusing to sign tokens with a default key")]
    MissingSigningSecret,

    #[error("{provider} OAuth is half configured: {missing} is not set")]
    IncompleteProvider {
        provider: &'static str,
        missing: &'static str,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Client credentials for one OAuth provider
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub callback_base_url: String,
    pub google: Option<OAuthClientConfig>,
    pub facebook: Option<OAuthClientConfig>,
    pub twitter: Option<OAuthClientConfig>,
    pub store_timeout: Duration,
    pub provider_timeout: Duration,
    pub handshake_ttl: Duration,
    pub handshake_max_pending: usize,
    pub cors_origins: Vec<String>,
    pub reset_db: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("callback_base_url", &self.callback_base_url)
            .field("google", &self.google)
            .field("facebook", &self.facebook)
            .field("twitter", &self.twitter)
            .field("store_timeout", &self.store_timeout)
            .field("provider_timeout", &self.provider_timeout)
            .field("handshake_ttl", &self.handshake_ttl)
            .field("handshake_max_pending", &self.handshake_max_pending)
            .field("cors_origins", &self.cors_origins)
            .field("reset_db", &self.reset_db)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::MissingSigningSecret)?;

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;

        let bcrypt_cost = parse_or("BCRYPT_COST", get("BCRYPT_COST"), bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let callback_base_url = get("CALLBACK_BASE_URL")
            .unwrap_or_else(|| DEFAULT_CALLBACK_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let google = provider_credentials(
            "google",
            ("GOOGLE_CLIENT_ID", get("GOOGLE_CLIENT_ID")),
            ("GOOGLE_CLIENT_SECRET", get("GOOGLE_CLIENT_SECRET")),
        )?;
        let facebook = provider_credentials(
            "facebook",
            ("FACEBOOK_APP_ID", get("FACEBOOK_APP_ID")),
            ("FACEBOOK_APP_SECRET", get("FACEBOOK_APP_SECRET")),
        )?;
        let twitter = provider_credentials(
            "twitter",
            ("TWITTER_CONSUMER_KEY", get("TWITTER_CONSUMER_KEY")),
            ("TWITTER_CONSUMER_SECRET", get("TWITTER_CONSUMER_SECRET")),
        )?;

        let store_timeout = Duration::from_secs(parse_or(
            "STORE_TIMEOUT_SECS",
            get("STORE_TIMEOUT_SECS"),
            DEFAULT_STORE_TIMEOUT_SECS,
        )?);
        let provider_timeout = Duration::from_secs(parse_or(
            "PROVIDER_TIMEOUT_SECS",
            get("PROVIDER_TIMEOUT_SECS"),
            DEFAULT_PROVIDER_TIMEOUT_SECS,
        )?);
        let handshake_ttl = Duration::from_secs(parse_or(
            "HANDSHAKE_TTL_SECS",
            get("HANDSHAKE_TTL_SECS"),
            DEFAULT_HANDSHAKE_TTL_SECS,
        )?);

        let handshake_max_pending = parse_or(
            "HANDSHAKE_MAX_PENDING",
            get("HANDSHAKE_MAX_PENDING"),
            DEFAULT_HANDSHAKE_MAX_PENDING,
        )?;
        if handshake_max_pending == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HANDSHAKE_MAX_PENDING",
                value: "0".to_string(),
            });
        }

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let reset_db = get("RESET_DB")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            port,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            bcrypt_cost,
            callback_base_url,
            google,
            facebook,
            twitter,
            store_timeout,
            provider_timeout,
            handshake_ttl,
            handshake_max_pending,
            cors_origins,
            reset_db,
        })
    }

    /// Absolute callback URL registered with a provider
    pub fn callback_url(&self, provider: Provider) -> String {
        format!("{}/{}/callback", self.callback_base_url, provider.as_str())
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

fn provider_credentials(
    provider: &'static str,
    id: (&'static str, Option<String>),
    secret: (&'static str, Option<String>),
) -> Result<Option<OAuthClientConfig>, ConfigError> {
    match (id, secret) {
        ((_, Some(client_id)), (_, Some(client_secret))) => Ok(Some(OAuthClientConfig {
            client_id,
            client_secret,
        })),
        ((_, None), (_, None)) => Ok(None),
        ((missing, None), _) | (_, (missing, None)) => {
            Err(ConfigError::IncompleteProvider { provider, missing })
        }
    }
}
