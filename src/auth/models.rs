//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// JWT claims structure
///
/// Serialized as `{"userId": ..., "role": ..., "exp": ...}`. Every issuance
/// path carries the role, OAuth ones included.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub role: String,
    pub exp: i64,
}

/// Roles carried into issued tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Third-party identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Facebook,
    Twitter,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Facebook, Provider::Twitter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
            Provider::Twitter => "twitter",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Google => "Google",
            Provider::Facebook => "Facebook",
            Provider::Twitter => "Twitter",
        }
    }

    /// Column holding this provider's user id in the users table
    pub fn id_column(&self) -> &'static str {
        match self {
            Provider::Google => "google_id",
            Provider::Facebook => "facebook_id",
            Provider::Twitter => "twitter_id",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User database model
///
/// Deliberately not `Serialize`: anything leaving the service goes through
/// [`UserView`], which has no password hash field.
#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub twitter_id: Option<String>,
    pub role: String,
    pub created_at: String,
}

/// Fields needed to insert a user; id and created_at are assigned by the store
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub provider: Option<(Provider, String)>,
    pub role: Role,
}

/// Safe projection of a user returned to callers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

/// Provider profile reduced to the fields the resolver needs
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProfile {
    pub provider: Provider,
    pub provider_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Identity attached to a request by the route guard
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub role: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
        }
    }
}

/// Body of POST /auth/register and POST /auth/login
#[derive(Deserialize, Debug)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Query string of a provider callback
///
/// OAuth2 providers send `code`/`state` (or `error`); Twitter's OAuth1 flow
/// sends `oauth_token`/`oauth_verifier` (or `denied`).
#[derive(Deserialize, Debug, Default, Clone)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    pub denied: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: UserView,
}

#[derive(Serialize, Debug)]
pub struct TokenResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: UserView,
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
