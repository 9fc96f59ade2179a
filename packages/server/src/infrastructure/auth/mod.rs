//! Authenticator implementations.

pub mod jwt;

pub use jwt::JwtAuthenticator;
