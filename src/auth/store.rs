//! Credential store
//!
//! The rest of the auth module talks to [`CredentialStore`]; the SQLite
//! implementation enforces email and per-provider id uniqueness in the schema
//! and bounds every call with a timeout.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::models::{NewUser, Provider, User};
use crate::common::generate_user_id;

const ID_COLLISION_RETRIES: usize = 3;

/// Which uniqueness rule a write ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    ProviderIdentity,
    Id,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Email => f.write_str("Email"),
            UniqueField::ProviderIdentity => f.write_str("Provider identity"),
            UniqueField::Id => f.write_str("User id"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(UniqueField),

    #[error("store operation timed out: {0}")]
    Timeout(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Insert a user; fails with `Conflict` on a duplicate email or provider id
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Attach a provider id to an existing record
    async fn attach_provider(
        &self,
        user_id: &str,
        provider: Provider,
        provider_id: &str,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(classify),
            Err(_) => {
                warn!(
                    operation = op,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Credential store call timed out"
                );
                Err(StoreError::Timeout(op))
            }
        }
    }

    async fn insert_once(&self, id: &str, new_user: &NewUser) -> Result<(), StoreError> {
        let provider_id = |p: Provider| {
            new_user
                .provider
                .as_ref()
                .filter(|(provider, _)| *provider == p)
                .map(|(_, id)| id.as_str())
        };

        self.bounded(
            "create",
            sqlx::query(
                "INSERT INTO users \
                 (id, email, password_hash, name, google_id, facebook_id, twitter_id, role) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(new_user.email.as_deref())
            .bind(new_user.password_hash.as_deref())
            .bind(new_user.name.as_deref())
            .bind(provider_id(Provider::Google))
            .bind(provider_id(Provider::Facebook))
            .bind(provider_id(Provider::Twitter))
            .bind(new_user.role.as_str())
            .execute(&self.pool),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.bounded(
            "find_by_id",
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.bounded(
            "find_by_email",
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError> {
        // id_column() is a fixed identifier, never user input
        let sql = format!("SELECT * FROM users WHERE {} = ?", provider.id_column());
        self.bounded(
            "find_by_provider_id",
            sqlx::query_as::<_, User>(&sql)
                .bind(provider_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut attempt = 0;
        let id = loop {
            let id = generate_user_id();
            match self.insert_once(&id, &new_user).await {
                Ok(()) => break id,
                Err(StoreError::Conflict(UniqueField::Id))
                    if attempt + 1 < ID_COLLISION_RETRIES =>
                {
                    attempt += 1;
                    debug!(user_id = %id, attempt, "User id collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        };

        // fetch back
        self.find_by_id(&id).await?.ok_or_else(|| {
            error!(user_id = %id, "Inserted user could not be read back");
            StoreError::Database(sqlx::Error::RowNotFound)
        })
    }

    async fn attach_provider(
        &self,
        user_id: &str,
        provider: Provider,
        provider_id: &str,
    ) -> Result<(), StoreError> {
        let sql = format!("UPDATE users SET {} = ? WHERE id = ?", provider.id_column());
        let result = self
            .bounded(
                "attach_provider",
                sqlx::query(&sql)
                    .bind(provider_id)
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(unique_field(db_err.message()));
        }
    }
    StoreError::Database(err)
}

/// SQLite reports "UNIQUE constraint failed: users.<column>"
fn unique_field(message: &str) -> UniqueField {
    if message.contains("users.email") {
        UniqueField::Email
    } else if Provider::ALL
        .iter()
        .any(|p| message.contains(&format!("users.{}", p.id_column())))
    {
        UniqueField::ProviderIdentity
    } else {
        UniqueField::Id
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> SqliteCredentialStore {
    use sqlx::sqlite::SqlitePoolOptions;

    // One connection: every connection to sqlite::memory: is its own database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::common::migrations::run_migrations(&pool, false)
        .await
        .unwrap();
    SqliteCredentialStore::new(pool, Duration::from_secs(5))
}
