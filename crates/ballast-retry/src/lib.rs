//! Retry policies for async operations.
//!
//! A [`RetryPolicy`] re-runs a failing operation up to `max_attempts` times
//! with exponential backoff, optional jitter, an optional per-attempt
//! timeout, and structured retryability classification. A policy can route
//! attempts through a [`CircuitBreaker`](ballast_circuitbreaker::CircuitBreaker)
//! so a tripped breaker short-circuits the remaining attempts.
//!
//! ```
//! use ballast_retry::RetryPolicy;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy: RetryPolicy<std::io::Error> = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .initial_delay(Duration::from_millis(100))
//!     .backoff_multiplier(2.0)
//!     .name("fetch-user")
//!     .build();
//!
//! let result = policy
//!     .execute(|| async { Ok::<_, std::io::Error>("hello") })
//!     .await;
//! # let _ = result;
//! # }
//! ```
//!
//! Permanent failures — validation, not-found, auth — are never retried:
//! map your error type to a [`FailureKind`](ballast_core::FailureKind) with
//! [`classify_with`](RetryConfigBuilder::classify_with) and the policy stops
//! as soon as a failure is classified permanent.

pub mod backoff;
mod config;
mod error;
mod events;
mod policy;
mod registry;

pub use config::{RetryConfig, RetryConfigBuilder};
pub use error::{AttemptFailure, RetryError};
pub use events::RetryEvent;
pub use policy::RetryPolicy;
pub use registry::RetryRegistry;
