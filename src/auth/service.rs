//! # Auth Service
//!
//! Orchestrates the password flows (register, login, logout), the "who am I"
//! lookup, and both phases of a provider sign-in. Handlers stay thin and only
//! translate HTTP in and out of these calls.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::AuthError;
use super::handshake::{HandshakeStore, PendingHandshake};
use super::models::{
    CallbackParams, CredentialsRequest, Identity, NewUser, Provider, Role, User, UserView,
};
use super::password::PasswordHasher;
use super::providers::{ProviderAdapter, ProviderError, ProviderRegistry};
use super::resolver::IdentityResolver;
use super::store::CredentialStore;
use super::tokens::TokenService;
use super::validators::{normalize_email, LoginValidator, RegisterValidator};
use crate::common::helpers::{safe_email_log, safe_token_log};
use crate::common::Validator;

/// A freshly issued token and the user it was issued for
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: UserView,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
    resolver: IdentityResolver,
    providers: ProviderRegistry,
    handshakes: HandshakeStore,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
        providers: ProviderRegistry,
        handshakes: HandshakeStore,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(store.clone()),
            store,
            hasher,
            tokens,
            providers,
            handshakes,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create a password account; the caller logs in separately
    pub async fn register(&self, request: &CredentialsRequest) -> Result<User, AuthError> {
        RegisterValidator.validate(request).into_result()?;
        let email = normalize_email(&request.email);

        if self.store.find_by_email(&email).await?.is_some() {
            info!(email = %safe_email_log(&email), "Registration rejected: email already exists");
            return Err(AuthError::Conflict("Email already exists".to_string()));
        }

        let password_hash = self.hash_password(request.password.clone()).await?;

        // A concurrent registration can still win the insert; the store's
        // unique email column reports that as the same Conflict
        let user = self
            .store
            .create(NewUser {
                email: Some(email),
                password_hash: Some(password_hash),
                name: None,
                provider: None,
                role: Role::default(),
            })
            .await?;

        info!(
            user_id = %user.id,
            email = %safe_email_log(user.email.as_deref().unwrap_or_default()),
            "✅ User registered"
        );
        Ok(user)
    }

    /// Unknown email and wrong password fail identically
    pub async fn login(&self, request: &CredentialsRequest) -> Result<AuthSession, AuthError> {
        LoginValidator.validate(request).into_result()?;
        let email = normalize_email(&request.email);

        let user = self.store.find_by_email(&email).await?;
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.clone());

        let verified = self
            .verify_password(request.password.clone(), stored_hash)
            .await?;

        let user = match (user, verified) {
            (Some(user), true) => user,
            _ => {
                warn!(email = %safe_email_log(&email), "Login failed: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let session = self.issue_session(&user)?;
        info!(user_id = %user.id, "🔐 User logged in");
        Ok(session)
    }

    /// Tokens cannot be revoked server-side; logout is advisory only
    pub fn logout(&self) {
        debug!("Logout acknowledged; client discards its token");
    }

    pub async fn check_user(&self, identity: &Identity) -> Result<UserView, AuthError> {
        match self.store.find_by_id(&identity.user_id).await? {
            Some(user) => Ok(UserView::from(&user)),
            None => {
                warn!(user_id = %identity.user_id, "Token refers to a user that no longer exists");
                Err(AuthError::Unauthenticated("user not found".to_string()))
            }
        }
    }

    /// Redirect phase: park a handshake record and return the provider URL
    pub async fn begin_provider_login(&self, provider: Provider) -> Result<String, AuthError> {
        let adapter = self.adapter(provider)?;
        let redirect = adapter
            .authorization_redirect()
            .await
            .map_err(|err| match err {
                ProviderError::Timeout => AuthError::Timeout("identity provider".to_string()),
                other => {
                    warn!(provider = %provider, error = %other, "Could not start OAuth flow");
                    AuthError::Upstream(other.to_string())
                }
            })?;

        self.handshakes
            .insert(
                redirect.correlation,
                PendingHandshake::new(provider, redirect.secret),
            )
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        info!(provider = %provider, "Starting OAuth flow");
        Ok(redirect.url)
    }

    /// Callback phase: consume the handshake, resolve the profile, issue a token
    pub async fn handle_provider_callback(
        &self,
        provider: Provider,
        params: &CallbackParams,
    ) -> Result<AuthSession, AuthError> {
        let adapter = self.adapter(provider)?;
        let resolved = self.resolve_callback(adapter.as_ref(), params).await;
        self.complete_provider_callback(provider, resolved)
    }

    /// Issue a token for a resolved user, or report the sign-in as failed
    ///
    /// Every provider gets the same claims, role included. Timeouts and
    /// storage faults keep their own kind; anything else is
    /// `AuthenticationFailed`.
    pub fn complete_provider_callback(
        &self,
        provider: Provider,
        resolved: Result<User, AuthError>,
    ) -> Result<AuthSession, AuthError> {
        match resolved {
            Ok(user) => {
                let session = self.issue_session(&user)?;
                info!(
                    user_id = %user.id,
                    provider = %provider,
                    "{} Sign-In successful",
                    provider.display_name()
                );
                Ok(session)
            }
            Err(err @ (AuthError::Timeout(_) | AuthError::Store(_) | AuthError::Internal(_))) => {
                Err(err)
            }
            Err(err) => {
                warn!(provider = %provider, error = %err, "Provider sign-in failed");
                Err(AuthError::AuthenticationFailed(
                    "Authentication failed".to_string(),
                ))
            }
        }
    }

    async fn resolve_callback(
        &self,
        adapter: &dyn ProviderAdapter,
        params: &CallbackParams,
    ) -> Result<User, AuthError> {
        let provider = adapter.provider();
        let key = adapter.correlation_key(params)?;
        let handshake = self
            .handshakes
            .take(&key, provider)
            .ok_or(ProviderError::UnknownHandshake)?;

        let profile = adapter.fetch_profile(params, &handshake).await?;
        self.resolver.resolve_or_create(&profile).await
    }

    fn adapter(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>, AuthError> {
        self.providers
            .get(provider)
            .ok_or_else(|| AuthError::ProviderNotConfigured(provider.to_string()))
    }

    fn issue_session(&self, user: &User) -> Result<AuthSession, AuthError> {
        let token = self.tokens.issue(&user.id, &user.role)?;
        debug!(user_id = %user.id, token = %safe_token_log(&token), "Issued bearer token");
        Ok(AuthSession {
            token,
            user: UserView::from(user),
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {}", e)))?
    }

    /// bcrypt runs even without a stored hash so both failure paths cost the same
    async fn verify_password(
        &self,
        password: String,
        stored_hash: Option<String>,
    ) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => {
                hasher.verify_dummy(&password);
                false
            }
        })
        .await
        .map_err(|e| AuthError::Internal(format!("password verification task failed: {}", e)))
    }
}

#[cfg(test)]
pub(crate) async fn test_service(registry: ProviderRegistry) -> AuthService {
    use std::time::Duration;

    test_service_with(registry, HandshakeStore::new(Duration::from_secs(60), 100)).await
}

#[cfg(test)]
pub(crate) async fn test_service_with(
    registry: ProviderRegistry,
    handshakes: HandshakeStore,
) -> AuthService {
    let store: Arc<dyn CredentialStore> = Arc::new(super::store::memory_store().await);
    AuthService::new(
        store,
        PasswordHasher::new(4).unwrap(),
        TokenService::new("test_secret_key").unwrap(),
        registry,
        handshakes,
    )
}
