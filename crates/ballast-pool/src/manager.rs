//! Named-instance pool manager.

use crate::error::PoolManagerError;
use crate::factory::ResourceFactory;
use crate::pool::ResourcePool;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

type ShutdownFn = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Entry {
    /// The pool, type-erased so differently-typed pools share one manager.
    pool: Box<dyn Any + Send + Sync>,
    shutdown: ShutdownFn,
}

/// Holds one [`ResourcePool`] per logical key and drains them all at
/// process shutdown.
///
/// An explicitly constructed value, passed to whoever needs pooling — there
/// is no process-global manager. Pools of different resource types coexist
/// under one manager; asking for a key with the wrong factory type is a
/// [`PoolManagerError::TypeMismatch`].
#[derive(Default)]
pub struct PoolManager {
    entries: Mutex<HashMap<String, Entry>>,
}

impl PoolManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the pool for `key`, creating it with `init` on first use.
    pub fn get_or_create<F, I>(
        &self,
        key: &str,
        init: I,
    ) -> Result<ResourcePool<F>, PoolManagerError>
    where
        F: ResourceFactory,
        I: FnOnce() -> ResourcePool<F>,
    {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            return entry
                .pool
                .downcast_ref::<ResourcePool<F>>()
                .cloned()
                .ok_or_else(|| PoolManagerError::TypeMismatch {
                    name: key.to_owned(),
                });
        }
        let pool = init();
        let for_shutdown = pool.clone();
        entries.insert(
            key.to_owned(),
            Entry {
                pool: Box::new(pool.clone()),
                shutdown: Box::new(move || {
                    let pool = for_shutdown.clone();
                    Box::pin(async move { pool.shutdown().await })
                }),
            },
        );
        Ok(pool)
    }

    /// Returns the pool for `key`, if one of the right type exists.
    pub fn get<F: ResourceFactory>(&self, key: &str) -> Option<ResourcePool<F>> {
        self.lock()
            .get(key)
            .and_then(|entry| entry.pool.downcast_ref::<ResourcePool<F>>().cloned())
    }

    /// Removes the pool for `key` without shutting it down.
    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Registered keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no pool is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Shuts down every registered pool and forgets them.
    pub async fn shutdown_all(&self) {
        let shutdowns: Vec<BoxFuture<'static, ()>> = {
            let mut entries = self.lock();
            entries
                .drain()
                .map(|(_, entry)| (entry.shutdown)())
                .collect()
        };
        for fut in shutdowns {
            fut.await;
        }
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("pools", &self.len())
            .finish()
    }
}
