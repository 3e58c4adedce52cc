//! Unified error type for composed resilience stacks.
//!
//! Each pattern crate defines its own error enum and provides a `From`
//! conversion into [`ResilienceError`], so a stack of several patterns can
//! use one error type without hand-written conversion boilerplate. The
//! application's own error rides along in the [`Application`] variant.
//!
//! [`Application`]: ResilienceError::Application

use std::time::Duration;
use thiserror::Error;

/// Error produced by any ballast pattern, parameterized over the
/// application error type `E`.
#[derive(Debug, Clone, Error)]
pub enum ResilienceError<E> {
    /// An operation or acquisition exceeded its deadline.
    #[error("timeout in {layer} after {elapsed:?}")]
    Timeout {
        /// Layer that timed out (e.g. `"retry"`, `"pool"`, `"resilient"`).
        layer: &'static str,
        /// How long the caller waited before giving up.
        elapsed: Duration,
    },

    /// A circuit breaker rejected the call without executing it.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen {
        /// Breaker instance name.
        name: String,
    },

    /// A pool or bulkhead is at capacity and its wait queue is full.
    #[error("{layer} exhausted: {in_use}/{capacity} in use, queue full")]
    ResourceExhausted {
        /// Layer that rejected the call (`"pool"` or `"bulkhead"`).
        layer: &'static str,
        /// Units currently in use.
        in_use: usize,
        /// Configured capacity.
        capacity: usize,
    },

    /// A rate limiter denied the call.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Estimated wait until enough tokens accumulate, when computable.
        retry_after: Option<Duration>,
    },

    /// A resource failed its health check.
    #[error("resource validation failed in pool '{pool}'")]
    ValidationFailed {
        /// Pool instance name.
        pool: String,
    },

    /// Every retry attempt failed; carries the final error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The last attempt's failure.
        last: Box<ResilienceError<E>>,
    },

    /// The wrapped operation itself failed.
    #[error("application error: {0}")]
    Application(E),
}

impl<E> ResilienceError<E> {
    /// True for [`ResilienceError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout { .. })
    }

    /// True for [`ResilienceError::CircuitOpen`].
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// True for [`ResilienceError::ResourceExhausted`].
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ResilienceError::ResourceExhausted { .. })
    }

    /// True for [`ResilienceError::RateLimited`].
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResilienceError::RateLimited { .. })
    }

    /// True for [`ResilienceError::Application`].
    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// Extracts the application error, if any, descending through
    /// [`ResilienceError::RetriesExhausted`] wrapping.
    pub fn into_application(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            ResilienceError::RetriesExhausted { last, .. } => last.into_application(),
            _ => None,
        }
    }

    /// Maps the application error type.
    pub fn map_application<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::Timeout { layer, elapsed } => {
                ResilienceError::Timeout { layer, elapsed }
            }
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::ResourceExhausted {
                layer,
                in_use,
                capacity,
            } => ResilienceError::ResourceExhausted {
                layer,
                in_use,
                capacity,
            },
            ResilienceError::RateLimited { retry_after } => {
                ResilienceError::RateLimited { retry_after }
            }
            ResilienceError::ValidationFailed { pool } => ResilienceError::ValidationFailed { pool },
            ResilienceError::RetriesExhausted { attempts, last } => {
                ResilienceError::RetriesExhausted {
                    attempts,
                    last: Box::new(last.map_application(f)),
                }
            }
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct AppError(&'static str);

    impl std::fmt::Display for AppError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for AppError {}

    // ResilienceError must be usable as a boxed error across threads.
    const _: () = {
        const fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<ResilienceError<AppError>>();
    };

    #[test]
    fn predicates_match_variants() {
        let err: ResilienceError<AppError> = ResilienceError::Timeout {
            layer: "pool",
            elapsed: Duration::from_millis(5),
        };
        assert!(err.is_timeout());
        assert!(!err.is_circuit_open());
    }

    #[test]
    fn into_application_unwraps_exhausted_chain() {
        let err: ResilienceError<AppError> = ResilienceError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ResilienceError::Application(AppError("boom"))),
        };
        assert_eq!(err.into_application(), Some(AppError("boom")));
    }

    #[test]
    fn map_application_preserves_shape() {
        let err: ResilienceError<AppError> = ResilienceError::Application(AppError("oops"));
        let mapped = err.map_application(|e| e.0.len());
        assert_eq!(mapped.into_application(), Some(4));
    }

    #[test]
    fn display_includes_context() {
        let err: ResilienceError<AppError> = ResilienceError::ResourceExhausted {
            layer: "bulkhead",
            in_use: 2,
            capacity: 2,
        };
        assert!(err.to_string().contains("bulkhead"));
        assert!(err.to_string().contains("2/2"));
    }
}
