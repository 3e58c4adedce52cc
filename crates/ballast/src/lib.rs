//! Composable fault-tolerance primitives.
//!
//! `ballast` bundles the pattern crates and adds [`Resilient`], a
//! composition builder that protects one async operation with a fixed,
//! documented stage order:
//!
//! 1. cache lookup by key
//! 2. timer + call counter
//! 3. overall timeout racing everything below
//! 4. retry (each attempt through the circuit breaker when one is attached)
//! 5. bulkhead permit
//! 6. the operation itself
//!
//! Every stage is optional; disabled stages are skipped without reordering
//! the rest.
//!
//! ```
//! use ballast::{Resilient, ResilienceError};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), ResilienceError<std::io::Error>> {
//! let fetch = Resilient::<String, std::io::Error>::builder()
//!     .name("fetch-profile")
//!     .cache(128, Some(Duration::from_secs(30)))
//!     .timeout(Duration::from_secs(2))
//!     .retry(|r| r.max_attempts(3).initial_delay(Duration::from_millis(50)))
//!     .build();
//!
//! let profile = fetch
//!     .execute("user:42", || async { Ok("profile".to_string()) })
//!     .await?;
//! assert_eq!(profile, "profile");
//! # Ok(())
//! # }
//! ```
//!
//! The individual patterns are re-exported as modules
//! ([`circuitbreaker`], [`retry`], [`pool`], [`bulkhead`], [`ratelimiter`],
//! [`metrics`]) for direct use.

mod cache;
mod resilient;

pub use resilient::{Resilient, ResilientBuilder};

pub use ballast_core::{
    EventListener, EventListeners, FailureKind, FnListener, Registry, ResilienceError,
    ResilienceEvent,
};

/// Bulkhead pattern.
pub use ballast_bulkhead as bulkhead;
/// Circuit breaker pattern.
pub use ballast_circuitbreaker as circuitbreaker;
/// In-process metrics registry.
pub use ballast_metrics as metrics;
/// Resource and object pools.
pub use ballast_pool as pool;
/// Token-bucket rate limiting.
pub use ballast_ratelimiter as ratelimiter;
/// Retry policies.
pub use ballast_retry as retry;

pub use ballast_bulkhead::{Bulkhead, BulkheadError};
pub use ballast_circuitbreaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use ballast_metrics::{MetricsRegistry, MetricsSnapshot};
pub use ballast_pool::{ObjectPool, PoolManager, ResourceFactory, ResourcePool};
pub use ballast_ratelimiter::{RateLimiter, RateLimiterError};
pub use ballast_retry::{RetryError, RetryPolicy, RetryRegistry};
