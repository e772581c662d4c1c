//! # Authentication
//!
//! Optional shared-key gate for the HTTP API. When `REGISTRAR_API_KEY` is
//! set, every request except `GET /health` must carry
//! `Authorization: Bearer <key>` (a bare `<key>` is accepted too).
//! This is a convenience gate, not a user model.

use super::types::ErrorResponse;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

pub const API_KEY_ENV: &str = "REGISTRAR_API_KEY";

/// Paths reachable without a key.
const OPEN_PATHS: &[&str] = &["/health"];

/// `Some(key)` if `REGISTRAR_API_KEY` is set and non-empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// Key carried by an `Authorization` header value.
fn presented_key(header_value: &str) -> &str {
    let trimmed = header_value.trim();
    trimmed.strip_prefix("Bearer ").unwrap_or(trimmed).trim()
}

/// Compare two keys in time independent of where they differ.
///
/// Both sides are zero-padded to the same length so `ct_eq` always walks
/// the same number of bytes; the length check happens afterwards.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let width = provided.len().max(expected.len());
    let pad = |key: &[u8]| {
        let mut buf = vec![0u8; width];
        buf[..key.len()].copy_from_slice(key);
        buf
    };

    let same_bytes: bool = pad(provided).ct_eq(&pad(expected)).into();
    same_bytes && provided.len() == expected.len()
}

/// Reject requests without the configured key.
pub async fn api_key_auth_middleware(request: Request<Body>, next: Next) -> Response {
    let Some(expected) = get_api_key_from_env() else {
        return next.run(request).await;
    };

    let path = request.uri().path().to_string();
    if OPEN_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let verdict = match request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(presented_key)
    {
        Some(key) if keys_match(key.as_bytes(), expected.as_bytes()) => Ok(()),
        Some(_) => Err("invalid API key"),
        None => Err("missing Authorization header"),
    };

    let Err(reason) = verdict else {
        return next.run(request).await;
    };
    tracing::warn!(path = %path, reason, "Registrar request rejected");
    ErrorResponse::reject(StatusCode::UNAUTHORIZED, "unauthorized", reason)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_match() {
        assert!(keys_match(b"registrar-key", b"registrar-key"));
    }

    #[test]
    fn prefix_does_not_match() {
        assert!(!keys_match(b"registrar", b"registrar-key"));
        assert!(!keys_match(b"registrar-key-2", b"registrar-key"));
    }

    #[test]
    fn empty_never_matches_nonempty() {
        assert!(!keys_match(b"", b"k"));
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(presented_key("Bearer abc"), "abc");
        assert_eq!(presented_key(" abc "), "abc");
    }
}
