use ballast_core::ResilienceError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`Bulkhead::acquire`](crate::Bulkhead::acquire).
#[derive(Debug, Clone, Error)]
pub enum BulkheadError {
    /// Every slot is taken and the wait queue is at capacity.
    #[error("bulkhead '{name}' full: {in_flight}/{max_concurrent} in flight, queue at capacity")]
    Full {
        /// Bulkhead instance name.
        name: String,
        /// Calls currently holding a slot.
        in_flight: usize,
        /// Configured concurrency limit.
        max_concurrent: usize,
    },

    /// No slot freed up within `max_wait`.
    #[error("timed out after {waited:?} waiting for a bulkhead slot")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },
}

impl<E> From<BulkheadError> for ResilienceError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::Full {
                in_flight,
                max_concurrent,
                ..
            } => ResilienceError::ResourceExhausted {
                layer: "bulkhead",
                in_use: in_flight,
                capacity: max_concurrent,
            },
            BulkheadError::Timeout { waited } => ResilienceError::Timeout {
                layer: "bulkhead",
                elapsed: waited,
            },
        }
    }
}
