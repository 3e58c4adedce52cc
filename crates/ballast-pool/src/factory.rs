//! The factory seam between a pool and the resources it manages.

use futures::future::BoxFuture;
use std::time::Instant;

/// Creates and maintains resources on behalf of a [`ResourcePool`].
///
/// Only [`create`](ResourceFactory::create) is required. The defaults make
/// every resource permanently valid, reset to a no-op, and destruction a
/// plain drop — override the ones your resource needs.
///
/// [`ResourcePool`]: crate::ResourcePool
pub trait ResourceFactory: Send + Sync + 'static {
    /// The pooled resource type.
    type Resource: Send + 'static;
    /// Error produced by resource creation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates a fresh resource.
    fn create(&self) -> BoxFuture<'_, Result<Self::Resource, Self::Error>>;

    /// Health-checks a resource. Returning `false` destroys it instead of
    /// handing it to a borrower.
    fn validate<'a>(&'a self, resource: &'a mut Self::Resource) -> BoxFuture<'a, bool> {
        let _ = resource;
        Box::pin(std::future::ready(true))
    }

    /// Returns a resource to a clean state after use. Returning `false`
    /// destroys it instead of pooling it.
    fn reset<'a>(&'a self, resource: &'a mut Self::Resource) -> BoxFuture<'a, bool> {
        let _ = resource;
        Box::pin(std::future::ready(true))
    }

    /// Tears a resource down. Failures here are the factory's to log; the
    /// pool never surfaces them to borrowers.
    fn destroy(&self, resource: Self::Resource) -> BoxFuture<'_, ()> {
        drop(resource);
        Box::pin(std::future::ready(()))
    }
}

/// A resource plus the pool's bookkeeping for it.
///
/// Owned exclusively by the pool; while borrowed it travels inside a
/// [`PoolHandle`](crate::PoolHandle) and its id stays in the pool's active
/// set, so a resource is never in two places at once.
#[derive(Debug)]
pub struct PooledResource<T> {
    pub(crate) id: u64,
    pub(crate) inner: T,
    pub(crate) created_at: Instant,
    pub(crate) last_used_at: Instant,
    pub(crate) use_count: u64,
}

impl<T> PooledResource<T> {
    pub(crate) fn new(id: u64, inner: T) -> Self {
        let now = Instant::now();
        Self {
            id,
            inner,
            created_at: now,
            last_used_at: now,
            use_count: 0,
        }
    }

    /// Marks the start of a borrow.
    pub(crate) fn touch(&mut self) {
        self.use_count += 1;
        self.last_used_at = Instant::now();
    }

    /// The pool-assigned id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the factory created this resource.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When this resource last started or finished a borrow.
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// How many times this resource has been borrowed.
    pub fn use_count(&self) -> u64 {
        self.use_count
    }

    pub(crate) fn into_inner(self) -> T {
        self.inner
    }
}
