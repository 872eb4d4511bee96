//! Rate limiting middleware using a token bucket
//!
//! Disabled by default (`rate_limit.enabled = false`); when enabled it is a
//! single process-wide bucket, not per tenant.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a new rate limiter
pub fn create_rate_limiter(requests_per_minute: u32, burst: u32) -> Arc<GlobalRateLimiter> {
    let per_minute = NonZeroU32::new(requests_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst.max(1)).unwrap_or(NonZeroU32::MIN);

    let quota = Quota::per_minute(per_minute).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    request: Request,
    next: Next,
    limiter: Arc<GlobalRateLimiter>,
) -> Result<Response, StatusCode> {
    match limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!("Rate limit exceeded");
            Err(StatusCode::TOO_MANY_REQUESTS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_within_burst() {
        let limiter = create_rate_limiter(60, 120);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_rate_limiter_exhausts() {
        let limiter = create_rate_limiter(1, 1);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
