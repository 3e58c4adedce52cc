use ballast_core::ResilienceError;
use std::time::Duration;
use thiserror::Error;

/// Error returned by [`RateLimiter::check_consume`](crate::RateLimiter::check_consume).
#[derive(Debug, Clone, Error)]
pub enum RateLimiterError {
    /// Not enough tokens; denial is synchronous and nothing was queued.
    #[error("rate limiter '{name}' denied {requested} token(s)")]
    Limited {
        /// Limiter instance name.
        name: String,
        /// Tokens the caller asked for.
        requested: u32,
        /// Estimated wait until enough tokens accumulate. `None` when the
        /// request can never succeed (more tokens than capacity).
        retry_after: Option<Duration>,
    },
}

impl<E> From<RateLimiterError> for ResilienceError<E> {
    fn from(err: RateLimiterError) -> Self {
        match err {
            RateLimiterError::Limited { retry_after, .. } => {
                ResilienceError::RateLimited { retry_after }
            }
        }
    }
}
