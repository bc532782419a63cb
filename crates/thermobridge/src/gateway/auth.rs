//! HTTP Basic authentication.
//!
//! A request without a `Basic` Authorization header is unauthorized (401).
//! A well-formed header with the wrong credentials is forbidden (403). When
//! no credentials are configured every request is forbidden.

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// One configured username/password pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing or invalid Authorization header")]
    Missing,

    #[error("invalid credentials")]
    Forbidden,
}

/// Check the request's Basic credentials against `expected`.
pub fn check_basic(headers: &HeaderMap, expected: Option<&Credentials>) -> Result<(), AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Missing)?;
    let rest = value.strip_prefix("Basic ").ok_or(AuthError::Missing)?;
    // The token ends at the next space; anything after it is ignored.
    let token = rest.split(' ').next().unwrap_or_default();

    let decoded = STANDARD.decode(token).map_err(|_| AuthError::Forbidden)?;
    let decoded = String::from_utf8_lossy(&decoded).into_owned();
    // `user:pass[:ignored...]`
    let mut fields = decoded.split(':');
    let username = fields.next().unwrap_or_default();
    let password = fields.next();

    let expected = expected.ok_or(AuthError::Forbidden)?;
    // Both comparisons always run.
    let user_ok = constant_time_eq(username.as_bytes(), expected.username.as_bytes());
    let pass_ok = constant_time_eq(
        password.unwrap_or_default().as_bytes(),
        expected.password.as_bytes(),
    );
    if user_ok & pass_ok & password.is_some() {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
