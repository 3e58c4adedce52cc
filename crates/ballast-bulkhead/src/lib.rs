//! Bulkhead pattern: isolate callers so one overloaded path cannot exhaust
//! all capacity.
//!
//! A [`Bulkhead`] admits at most `max_concurrent` calls. Excess callers
//! wait in a strict-FIFO queue bounded by `max_queue_size`; a caller
//! arriving with the queue full fails fast with [`BulkheadError::Full`].
//!
//! ```
//! use ballast_bulkhead::Bulkhead;
//!
//! # async fn example() -> Result<(), ballast_bulkhead::BulkheadError> {
//! let bulkhead = Bulkhead::builder()
//!     .max_concurrent(8)
//!     .max_queue_size(16)
//!     .name("downstream")
//!     .build();
//!
//! let permit = bulkhead.acquire().await?;
//! // ... bounded work ...
//! drop(permit);
//!
//! // Or scoped:
//! let value = bulkhead.with_permit(|| async { 2 + 2 }).await?;
//! assert_eq!(value, 4);
//! # Ok(())
//! # }
//! ```

mod bulkhead;
mod config;
mod error;
mod events;

pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::BulkheadError;
pub use events::BulkheadEvent;
