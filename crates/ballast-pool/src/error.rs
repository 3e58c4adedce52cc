use ballast_core::ResilienceError;
use ballast_retry::RetryError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`ResourcePool`](crate::ResourcePool) operations.
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// No resource became available within `acquire_timeout`.
    #[error("timed out after {waited:?} waiting for a pooled resource")]
    AcquireTimeout {
        /// How long the borrower waited.
        waited: Duration,
    },

    /// The pool is at capacity and its wait queue is full.
    #[error("pool '{name}' exhausted: {in_use}/{capacity} in use, wait queue full")]
    Exhausted {
        /// Pool instance name.
        name: String,
        /// Resources currently borrowed or being created.
        in_use: usize,
        /// Configured maximum size.
        capacity: usize,
    },

    /// The pool has been shut down; no further acquisitions are served.
    #[error("pool '{name}' is shut down")]
    ShutDown {
        /// Pool instance name.
        name: String,
    },

    /// Resource creation failed after exhausting its retry policy.
    #[error("resource creation failed: {0}")]
    Create(RetryError<E>),
}

impl<E> From<PoolError<E>> for ResilienceError<E> {
    fn from(err: PoolError<E>) -> Self {
        match err {
            PoolError::AcquireTimeout { waited } => ResilienceError::Timeout {
                layer: "pool",
                elapsed: waited,
            },
            PoolError::Exhausted {
                in_use, capacity, ..
            } => ResilienceError::ResourceExhausted {
                layer: "pool",
                in_use,
                capacity,
            },
            PoolError::ShutDown { .. } => ResilienceError::ResourceExhausted {
                layer: "pool",
                in_use: 0,
                capacity: 0,
            },
            PoolError::Create(retry) => retry.into(),
        }
    }
}

/// Errors returned by [`ObjectPool`](crate::ObjectPool) operations.
#[derive(Debug, Clone, Error)]
pub enum ObjectPoolError {
    /// Nothing idle and the pool is at its maximum size.
    #[error("object pool '{name}' exhausted: {in_use}/{capacity} objects in use")]
    Exhausted {
        /// Pool instance name.
        name: String,
        /// Objects currently borrowed.
        in_use: usize,
        /// Current maximum size.
        capacity: usize,
    },

    /// The pool has been drained; no further borrows are served.
    #[error("object pool '{name}' is drained")]
    Drained {
        /// Pool instance name.
        name: String,
    },
}

impl<E> From<ObjectPoolError> for ResilienceError<E> {
    fn from(err: ObjectPoolError) -> Self {
        match err {
            ObjectPoolError::Exhausted {
                in_use, capacity, ..
            } => ResilienceError::ResourceExhausted {
                layer: "object_pool",
                in_use,
                capacity,
            },
            ObjectPoolError::Drained { .. } => ResilienceError::ResourceExhausted {
                layer: "object_pool",
                in_use: 0,
                capacity: 0,
            },
        }
    }
}

/// Errors returned by [`PoolManager`](crate::PoolManager).
#[derive(Debug, Clone, Error)]
pub enum PoolManagerError {
    /// The key is registered with a pool of a different resource type.
    #[error("pool '{name}' is registered with a different resource type")]
    TypeMismatch {
        /// The conflicting key.
        name: String,
    },
}
