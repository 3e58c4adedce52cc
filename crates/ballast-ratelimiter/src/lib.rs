//! Token-bucket rate limiting.
//!
//! A [`RateLimiter`] accumulates tokens at `refill_rate` per second up to
//! `capacity` and answers [`try_consume`](RateLimiter::try_consume)
//! synchronously — denial never blocks or queues. Refill and consumption
//! are single compare-and-swap operations, so the limiter takes no locks.
//!
//! ```
//! use ballast_ratelimiter::RateLimiter;
//!
//! let limiter = RateLimiter::builder()
//!     .capacity(100)
//!     .refill_rate(50.0)
//!     .name("api")
//!     .build();
//!
//! if limiter.try_consume(1) {
//!     // proceed
//! } else {
//!     // shed load; check_consume() reports an estimated retry-after
//! }
//! ```

mod config;
mod error;
mod events;
mod limiter;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use limiter::RateLimiter;
