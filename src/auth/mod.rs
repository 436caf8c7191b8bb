//! # Auth Module
//!
//! Identity resolution and token lifecycle:
//! - Password registration and login (bcrypt)
//! - Google, Facebook (OAuth2) and Twitter (OAuth1.0a) sign-in
//! - JWT bearer token issuance and verification
//! - AuthedUser extractor guarding protected routes

pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod handshake;
pub mod models;
pub mod password;
pub mod providers;
pub mod resolver;
pub mod routes;
pub mod service;
pub mod store;
pub mod tokens;
pub mod validators;

#[cfg(test)]
mod tests;

pub use routes::auth_routes;
