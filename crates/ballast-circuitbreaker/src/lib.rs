//! Circuit breaker for async operations.
//!
//! A circuit breaker stops calling a failing dependency once consecutive
//! failures reach a threshold, then periodically allows trial calls to
//! detect recovery.
//!
//! ## States
//! - **Closed**: normal operation, every call runs.
//! - **Open**: calls are rejected immediately with
//!   [`CircuitBreakerError::Open`], without invoking the operation.
//! - **Half-open**: after `open_timeout`, a bounded number of trial calls
//!   decide between closing (recovered) and re-opening (still failing).
//!
//! ## Usage
//!
//! ```
//! use ballast_circuitbreaker::CircuitBreaker;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(3)
//!     .open_timeout(Duration::from_secs(1))
//!     .name("payments")
//!     .build();
//!
//! let result = breaker
//!     .execute(|| async { Ok::<_, std::io::Error>("charged") })
//!     .await;
//! # let _ = result;
//! # }
//! ```
//!
//! By default every `Err` counts as a failure. Use
//! [`CircuitBreaker::execute_with`] to classify results yourself, e.g. to
//! keep client-side errors from tripping the breaker.

mod breaker;
mod config;
mod error;
mod events;
mod registry;

pub use breaker::{CircuitBreaker, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use registry::CircuitBreakerRegistry;
