use ballast_core::ResilienceError;
use thiserror::Error;

/// Errors returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
#[derive(Debug, Clone, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker '{name}' is open; call not permitted")]
    Open {
        /// Breaker instance name.
        name: String,
    },

    /// The operation ran and failed.
    #[error("inner operation error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// True if the error indicates the circuit rejected the call.
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }

    /// Returns the operation's error, if the operation ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::Open { .. } => None,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for ResilienceError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::Open { name } => ResilienceError::CircuitOpen { name },
            CircuitBreakerError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
