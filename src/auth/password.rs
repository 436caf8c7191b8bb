//! Password hashing (bcrypt)

use tracing::{error, warn};

use super::errors::AuthError;

/// bcrypt reads at most this many bytes of a password
pub const MAX_PASSWORD_BYTES: usize = 72;

/// One-way salted password hashing with a configurable bcrypt cost
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash compared against when no account matches, so a lookup miss costs
    /// the same as a wrong password
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, AuthError> {
        let dummy_hash = bcrypt::hash("not-a-real-password", cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt setup failed: {}", e)))?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.is_empty() {
            return Err(AuthError::Validation("password: Password is required".to_string()));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::Validation(
                "password: Password must be at most 72 bytes".to_string(),
            ));
        }
        bcrypt::hash(password, self.cost).map_err(|e| {
            error!(error = %e, "Password hashing failed");
            AuthError::Internal(format!("password hashing failed: {}", e))
        })
    }

    /// Never succeeds for an empty password, a missing/corrupt hash, or a
    /// password longer than bcrypt reads
    pub fn verify(&self, password: &str, hashed: &str) -> bool {
        if password.is_empty() || hashed.is_empty() {
            return false;
        }
        let matches = match bcrypt::verify(password, hashed) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
        };
        // Checked after the bcrypt run so an over-long attempt costs the same
        matches && password.len() <= MAX_PASSWORD_BYTES
    }

    /// Burn one verification against the dummy hash
    pub fn verify_dummy(&self, password: &str) {
        let _ = bcrypt::verify(password, &self.dummy_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hashed = hasher.hash("p1").unwrap();

        assert_ne!(hashed, "p1");
        assert!(hasher.verify("p1", &hashed));
        assert!(!hasher.verify("p2", &hashed));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = hasher();
        let a = hasher.hash("same-password").unwrap();
        let b = hasher.hash("same-password").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("same-password", &a));
        assert!(hasher.verify("same-password", &b));
    }

    #[test]
    fn test_empty_password_never_verifies() {
        let hasher = hasher();
        let hashed = hasher.hash("p1").unwrap();

        assert!(!hasher.verify("", &hashed));
        assert!(hasher.hash("").is_err());
    }

    #[test]
    fn test_bytes_past_limit_do_not_verify() {
        let hasher = hasher();
        let password = "p".repeat(MAX_PASSWORD_BYTES);
        let hashed = hasher.hash(&password).unwrap();

        assert!(hasher.verify(&password, &hashed));
        assert!(!hasher.verify(&format!("{}DIFFERENT", password), &hashed));
        assert!(!hasher.verify(&format!("{}p", password), &hashed));
        assert!(hasher.hash(&format!("{}p", password)).is_err());
    }

    #[test]
    fn test_corrupt_hash_does_not_verify() {
        let hasher = hasher();
        assert!(!hasher.verify("p1", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("p1", ""));
    }
}
