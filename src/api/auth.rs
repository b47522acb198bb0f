//! Bearer token authentication
//!
//! The authenticated endpoints share one static token. When no token is
//! configured, every request is allowed.

use axum::http::{header, HeaderMap};

/// Validate an Authorization header against the configured token.
///
/// The header must be exactly `Bearer <token>`: the scheme is case-sensitive
/// and no surrounding whitespace is trimmed.
pub fn check_auth(auth_header: Option<&str>, token: Option<&str>) -> bool {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return true, // No auth configured — allow all
    };

    let header = match auth_header {
        Some(h) => h,
        None => return false, // Auth required but no header
    };

    match header.strip_prefix("Bearer ") {
        Some(presented) => constant_time_eq(presented.as_bytes(), token.as_bytes()),
        None => false,
    }
}

/// Check the `Authorization` header of a request
pub fn authorize(headers: &HeaderMap, token: Option<&str>) -> bool {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    check_auth(auth_header, token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
