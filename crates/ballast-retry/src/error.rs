use ballast_core::ResilienceError;
use std::time::Duration;
use thiserror::Error;

/// Why a single attempt failed.
#[derive(Debug, Clone, Error)]
pub enum AttemptFailure<E> {
    /// The attempt exceeded the per-attempt timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The attached circuit breaker rejected the attempt.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen {
        /// Breaker instance name.
        name: String,
    },

    /// The operation ran and returned an error.
    #[error("{0}")]
    Inner(E),
}

impl<E> AttemptFailure<E> {
    /// Returns the operation's own error, if the attempt ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            AttemptFailure::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// True if this failure was a per-attempt timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AttemptFailure::Timeout(_))
    }
}

/// Error returned by [`RetryPolicy::execute`](crate::RetryPolicy::execute).
#[derive(Debug, Clone, Error)]
pub enum RetryError<E> {
    /// Every attempt failed (or a permanent failure stopped the loop);
    /// carries the final attempt's failure.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// The last attempt's failure.
        last: AttemptFailure<E>,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The final attempt's failure.
    pub fn last_failure(&self) -> &AttemptFailure<E> {
        match self {
            RetryError::Exhausted { last, .. } => last,
        }
    }

    /// The operation's own error from the final attempt, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => last.into_inner(),
        }
    }
}

impl<E> From<RetryError<E>> for ResilienceError<E> {
    fn from(err: RetryError<E>) -> Self {
        let RetryError::Exhausted { attempts, last } = err;
        let last = match last {
            AttemptFailure::Timeout(elapsed) => ResilienceError::Timeout {
                layer: "retry",
                elapsed,
            },
            AttemptFailure::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            AttemptFailure::Inner(e) => ResilienceError::Application(e),
        };
        ResilienceError::RetriesExhausted {
            attempts,
            last: Box::new(last),
        }
    }
}
