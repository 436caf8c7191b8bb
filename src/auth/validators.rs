// src/auth/validators.rs

use regex::Regex;
use std::sync::OnceLock;

use super::models::CredentialsRequest;
use super::password::MAX_PASSWORD_BYTES;
use crate::common::{ValidationResult, Validator};

const MAX_EMAIL_LEN: usize = 254;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|e| panic!("email regex: {}", e))
    })
}

/// Trim and lowercase an email before it is stored or looked up
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct RegisterValidator;

impl Validator<CredentialsRequest> for RegisterValidator {
    fn validate(&self, data: &CredentialsRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        let email = data.email.trim();
        if email.is_empty() {
            result.add_error("email", "Email is required");
        } else if email.len() > MAX_EMAIL_LEN {
            result.add_error("email", "Email must be at most 254 characters");
        } else if !email_pattern().is_match(email) {
            result.add_error("email", "Email must be valid");
        }

        if data.password.is_empty() {
            result.add_error("password", "Password is required");
        } else if data.password.len() > MAX_PASSWORD_BYTES {
            result.add_error("password", "Password must be at most 72 bytes");
        }

        result
    }
}

/// Login only checks presence; anything else is reported as bad credentials
pub struct LoginValidator;

impl Validator<CredentialsRequest> for LoginValidator {
    fn validate(&self, data: &CredentialsRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        if data.email.trim().is_empty() {
            result.add_error("email", "Email is required");
        }
        if data.password.is_empty() {
            result.add_error("password", "Password is required");
        }
        result
    }
}
