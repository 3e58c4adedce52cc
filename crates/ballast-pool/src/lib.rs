//! Resource lifecycle management.
//!
//! Two pools with the same idle/active discipline and different trade-offs:
//!
//! - [`ResourcePool`] manages expensive asynchronous resources (connections,
//!   sessions): an async [`ResourceFactory`] creates, validates, resets, and
//!   destroys them; borrowers past capacity wait in a strict-FIFO queue
//!   bounded by `acquire_timeout`; a background task evicts idle resources
//!   and keeps the pool topped up to its minimum.
//! - [`ObjectPool`] recycles cheap synchronous objects (buffers, parsers):
//!   no validation on borrow, reset on return, and optional hit-rate driven
//!   auto-sizing.
//!
//! [`PoolManager`] holds one named instance of each pool and drains them all
//! at shutdown.
//!
//! ```
//! use ballast_pool::{PoolConfig, ResourceFactory, ResourcePool};
//! use futures::future::BoxFuture;
//!
//! struct ConnFactory;
//!
//! impl ResourceFactory for ConnFactory {
//!     type Resource = Vec<u8>;
//!     type Error = std::io::Error;
//!
//!     fn create(&self) -> BoxFuture<'_, Result<Self::Resource, Self::Error>> {
//!         Box::pin(async { Ok(Vec::new()) })
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ResourcePool::new(PoolConfig::builder().max_size(8).config(), ConnFactory);
//! let handle = pool.acquire().await?;
//! pool.release(handle).await;
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod factory;
mod manager;
mod object;
mod pool;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{ObjectPoolError, PoolError, PoolManagerError};
pub use events::{DestroyReason, PoolEvent};
pub use factory::{PooledResource, ResourceFactory};
pub use manager::PoolManager;
pub use object::{ObjectPool, ObjectPoolConfig, ObjectPoolConfigBuilder, ObjectPoolStats};
pub use pool::{PoolHandle, PoolStats, ResourcePool};
