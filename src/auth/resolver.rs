//! Identity resolution for provider sign-ins
//!
//! Maps a [`NormalizedProfile`] to exactly one internal user. Duplicate
//! concurrent callbacks are settled by the store's uniqueness constraint on
//! the provider id column, not by locking here.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::AuthError;
use super::models::{NewUser, NormalizedProfile, Role, User};
use super::store::{CredentialStore, StoreError, UniqueField};
use crate::common::helpers::safe_optional_email_log;

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn CredentialStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Find the user bound to `(provider, provider_id)`, creating one on first sight
    pub async fn resolve_or_create(&self, profile: &NormalizedProfile) -> Result<User, AuthError> {
        if let Some(user) = self
            .store
            .find_by_provider_id(profile.provider, &profile.provider_id)
            .await?
        {
            debug!(
                user_id = %user.id,
                provider = %profile.provider,
                "Resolved existing provider identity"
            );
            return Ok(user);
        }

        let email = profile.email.as_ref().map(|e| e.trim().to_lowercase());
        let new_user = NewUser {
            email,
            password_hash: None,
            name: profile.display_name.clone(),
            provider: Some((profile.provider, profile.provider_id.clone())),
            role: Role::default(),
        };

        match self.store.create(new_user.clone()).await {
            Ok(user) => {
                info!(
                    user_id = %user.id,
                    provider = %profile.provider,
                    email = %safe_optional_email_log(user.email.as_deref()),
                    "Created user from provider profile"
                );
                Ok(user)
            }
            // Lost a race with a concurrent callback for the same identity
            Err(StoreError::Conflict(UniqueField::ProviderIdentity)) => {
                debug!(
                    provider = %profile.provider,
                    "Provider identity created concurrently, re-reading"
                );
                self.lookup_after_conflict(profile).await
            }
            // Accounts are not merged by email; keep the identity without it
            Err(StoreError::Conflict(UniqueField::Email)) => {
                warn!(
                    provider = %profile.provider,
                    email = %safe_optional_email_log(new_user.email.as_deref()),
                    "Provider email belongs to another account, creating identity without email"
                );
                let without_email = NewUser {
                    email: None,
                    ..new_user
                };
                match self.store.create(without_email).await {
                    Ok(user) => Ok(user),
                    Err(StoreError::Conflict(UniqueField::ProviderIdentity)) => {
                        self.lookup_after_conflict(profile).await
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup_after_conflict(&self, profile: &NormalizedProfile) -> Result<User, AuthError> {
        self.store
            .find_by_provider_id(profile.provider, &profile.provider_id)
            .await?
            .ok_or_else(|| {
                AuthError::Internal(format!(
                    "{} identity conflicted but could not be read back",
                    profile.provider
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Provider;
    use crate::auth::store::memory_store;

    fn profile(provider: Provider, id: &str, email: Option<&str>) -> NormalizedProfile {
        NormalizedProfile {
            provider,
            provider_id: id.to_string(),
            email: email.map(str::to_string),
            display_name: Some("Pat Example".to_string()),
        }
    }

    async fn resolver() -> (IdentityResolver, Arc<dyn CredentialStore>) {
        let store: Arc<dyn CredentialStore> = Arc::new(memory_store().await);
        (IdentityResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_first_sight_creates_user() {
        let (resolver, _) = resolver().await;
        let user = resolver
            .resolve_or_create(&profile(Provider::Google, "g-1", Some("Pat@X.com")))
            .await
            .unwrap();

        assert_eq!(user.google_id.as_deref(), Some("g-1"));
        assert_eq!(user.email.as_deref(), Some("pat@x.com"));
        assert_eq!(user.name.as_deref(), Some("Pat Example"));
        assert_eq!(user.role, "user");
        assert!(user.password_hash.is_none());
    }

    #[tokio::test]
    async fn test_known_identity_returned_unchanged() {
        let (resolver, _) = resolver().await;
        let first = resolver
            .resolve_or_create(&profile(Provider::Facebook, "fb-1", None))
            .await
            .unwrap();

        let mut renamed = profile(Provider::Facebook, "fb-1", Some("new@x.com"));
        renamed.display_name = Some("Someone Else".to_string());
        let second = resolver.resolve_or_create(&renamed).await.unwrap();

        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_concurrent_callbacks_create_one_user() {
        let (resolver, store) = resolver().await;
        let p = profile(Provider::Twitter, "t-42", Some("t@x.com"));

        let (a, b) = tokio::join!(resolver.resolve_or_create(&p), resolver.resolve_or_create(&p));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.id, b.id);
        let stored = store
            .find_by_provider_id(Provider::Twitter, "t-42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, a.id);
    }

    #[tokio::test]
    async fn test_email_taken_by_other_account_is_not_merged() {
        let (resolver, store) = resolver().await;
        let existing = store
            .create(NewUser {
                email: Some("shared@x.com".to_string()),
                password_hash: Some("$2b$04$hash".to_string()),
                ..NewUser::default()
            })
            .await
            .unwrap();

        let user = resolver
            .resolve_or_create(&profile(Provider::Google, "g-9", Some("shared@x.com")))
            .await
            .unwrap();

        assert_ne!(user.id, existing.id);
        assert!(user.email.is_none());
        assert_eq!(user.google_id.as_deref(), Some("g-9"));
    }
}
