//! # Middleware
//!
//! Global rate limiting for the HTTP API.
//!
//! `REGISTRAR_RATE_LIMIT`: requests per second across all clients
//! (default 100, `0` disables the limiter).

use super::types::ErrorResponse;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

pub const RATE_LIMIT_ENV: &str = "REGISTRAR_RATE_LIMIT";

const DEFAULT_REQUESTS_PER_SECOND: u32 = 100;

/// One quota shared by every client.
pub type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Build a limiter allowing `requests_per_second`; zero falls back to the
/// default rate.
pub fn create_rate_limiter(requests_per_second: u32) -> SharedLimiter {
    let per_second = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(per_second)))
}

/// Value of `REGISTRAR_RATE_LIMIT`, or the default when unset or unparsable.
pub fn get_rate_limit_from_env() -> u32 {
    match std::env::var(RATE_LIMIT_ENV) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "Ignoring unparsable {}", RATE_LIMIT_ENV);
            DEFAULT_REQUESTS_PER_SECOND
        }),
        Err(_) => DEFAULT_REQUESTS_PER_SECOND,
    }
}

/// Reject with 429 once the shared quota is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<SharedLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.check().is_ok() {
        return next.run(request).await;
    }
    tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
    ErrorResponse::reject(
        StatusCode::TOO_MANY_REQUESTS,
        "rate_limited",
        "Too many requests, retry shortly",
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_first_request() {
        let limiter = create_rate_limiter(50);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn zero_falls_back_to_default() {
        let limiter = create_rate_limiter(0);
        for _ in 0..DEFAULT_REQUESTS_PER_SECOND {
            assert!(limiter.check().is_ok());
        }
    }

    #[test]
    fn quota_of_one_blocks_second_request() {
        let limiter = create_rate_limiter(1);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
