//! Bearer token issuance and verification (HS256 JWT)

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::debug;

use super::models::Claims;

/// Fixed token lifetime; tokens are not renewable
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token could not be parsed")]
    Malformed,

    #[error("token signing failed: {0}")]
    Signing(String),
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    /// Refuses an empty secret rather than signing with a default key
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.trim().is_empty() {
            return Err(TokenError::Signing("signing secret is empty".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock in `verify_at`
        validation.validate_exp = false;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::hours(TOKEN_TTL_HOURS),
        })
    }

    pub fn issue(&self, user_id: &str, role: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, role, Utc::now().timestamp())
    }

    /// Issue a token as if the current unix time were `now`
    pub fn issue_at(&self, user_id: &str, role: &str, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            user_id: user_id.to_string(),
            role: role.to_string(),
            exp: now + self.ttl.num_seconds(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as if the current unix time were `now`
    ///
    /// Valid up to and including the `exp` second.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                debug!(error = %e, "JWT token validation failed");
                match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            },
        )?;

        if now > decoded.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn service() -> TokenService {
        TokenService::new("test_secret_key").unwrap()
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(TokenService::new("").is_err());
        assert!(TokenService::new("   ").is_err());
    }

    #[test]
    fn test_issue_then_verify_round_trip() {
        let tokens = service();
        let token = tokens.issue("U_ABC123", "user").unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.user_id, "U_ABC123");
        assert_eq!(claims.role, "user");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_expiry_is_one_day() {
        let tokens = service();
        let token = tokens.issue_at("U_1", "admin", NOW).unwrap();
        let claims = tokens.verify_at(&token, NOW).unwrap();

        assert_eq!(
            claims,
            Claims {
                user_id: "U_1".to_string(),
                role: "admin".to_string(),
                exp: NOW + 24 * 60 * 60,
            }
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let tokens = service();
        let token = tokens.issue_at("U_1", "user", NOW).unwrap();
        let exp = NOW + 24 * 60 * 60;

        assert!(tokens.verify_at(&token, exp - 1).is_ok());
        assert!(tokens.verify_at(&token, exp).is_ok());
        assert_eq!(tokens.verify_at(&token, exp + 1), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = TokenService::new("other_secret").unwrap().issue("U_1", "user").unwrap();
        assert_eq!(service().verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = service();
        assert_eq!(tokens.verify("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(tokens.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_claims_wire_shape() {
        let claims = Claims {
            user_id: "U_1".to_string(),
            role: "user".to_string(),
            exp: 42,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json, serde_json::json!({"userId": "U_1", "role": "user", "exp": 42}));
    }
}
