//! Asynchronous resource pool.

use crate::config::{PoolConfig, PoolConfigBuilder};
use crate::error::PoolError;
use crate::events::{DestroyReason, PoolEvent};
use crate::factory::{PooledResource, ResourceFactory};
use ballast_retry::{RetryError, RetryPolicy};
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

/// A pending borrower. Fulfillment and timeout are mutually exclusive: a
/// timed-out borrower drops its receiver, so `tx.send` fails and the
/// resource is routed to the next waiter instead.
struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<PooledResource<T>>,
    #[allow(dead_code)]
    enqueued_at: Instant,
}

struct PoolInner<T> {
    idle: Vec<PooledResource<T>>,
    /// Borrowed resource ids and when they went out.
    active: HashMap<u64, Instant>,
    waiters: VecDeque<Waiter<T>>,
    creating: usize,
    shut_down: bool,
    next_resource_id: u64,
    next_waiter_id: u64,
    created_total: u64,
    destroyed_total: u64,
    acquired_total: u64,
    timed_out_total: u64,
    validation_failures: u64,
}

impl<T> PoolInner<T> {
    fn new() -> Self {
        Self {
            idle: Vec::new(),
            active: HashMap::new(),
            waiters: VecDeque::new(),
            creating: 0,
            shut_down: false,
            next_resource_id: 1,
            next_waiter_id: 1,
            created_total: 0,
            destroyed_total: 0,
            acquired_total: 0,
            timed_out_total: 0,
            validation_failures: 0,
        }
    }

    /// Resources alive or being created. Never exceeds `max_size`.
    fn total(&self) -> usize {
        self.idle.len() + self.active.len() + self.creating
    }
}

struct PoolShared<F: ResourceFactory> {
    factory: F,
    config: PoolConfig,
    create_retry: RetryPolicy<F::Error>,
    inner: Mutex<PoolInner<F::Resource>>,
    /// Signalled when the last active resource comes home during shutdown.
    drained: Notify,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Idle resources ready to borrow.
    pub idle: usize,
    /// Resources currently borrowed.
    pub active: usize,
    /// Borrowers waiting in the queue.
    pub waiting: usize,
    /// Resources being created right now.
    pub creating: usize,
    /// Total resources created over the pool's lifetime.
    pub created_total: u64,
    /// Total resources destroyed over the pool's lifetime.
    pub destroyed_total: u64,
    /// Total successful acquisitions.
    pub acquired_total: u64,
    /// Total acquisitions that timed out in the queue.
    pub timed_out_total: u64,
    /// Total validation failures on borrow.
    pub validation_failures: u64,
}

/// What `acquire` decided to do under one lock acquisition.
enum Plan<T> {
    UseIdle(PooledResource<T>),
    Create,
    Wait(u64, oneshot::Receiver<PooledResource<T>>),
    Reject { in_use: usize },
}

impl<F: ResourceFactory> PoolShared<F> {
    fn lock(&self) -> MutexGuard<'_, PoolInner<F::Resource>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: PoolEvent) {
        self.config.event_listeners.emit(&event);
    }

    fn now_event_fields(&self) -> (String, Instant) {
        (self.config.name.clone(), Instant::now())
    }

    async fn validate(&self, resource: &mut F::Resource) -> bool {
        match self.config.validation_timeout {
            Some(limit) => tokio::time::timeout(limit, self.factory.validate(resource))
                .await
                .unwrap_or(false),
            None => self.factory.validate(resource).await,
        }
    }

    async fn create_resource(
        &self,
    ) -> Result<PooledResource<F::Resource>, RetryError<F::Error>> {
        let raw = self.create_retry.execute(|| self.factory.create()).await?;
        let id = {
            let mut inner = self.lock();
            let id = inner.next_resource_id;
            inner.next_resource_id += 1;
            inner.created_total += 1;
            id
        };
        let (pattern_name, timestamp) = self.now_event_fields();
        self.emit(PoolEvent::ResourceCreated {
            pattern_name,
            timestamp,
            resource_id: id,
        });

        #[cfg(feature = "metrics")]
        counter!("pool_resources_created_total", "pool" => self.config.name.clone()).increment(1);

        Ok(PooledResource::new(id, raw))
    }

    async fn destroy(&self, resource: PooledResource<F::Resource>, reason: DestroyReason) {
        self.lock().destroyed_total += 1;
        let (pattern_name, timestamp) = self.now_event_fields();
        self.emit(PoolEvent::ResourceDestroyed {
            pattern_name,
            timestamp,
            resource_id: resource.id,
            reason,
        });

        #[cfg(feature = "metrics")]
        counter!("pool_resources_destroyed_total", "pool" => self.config.name.clone()).increment(1);

        self.factory.destroy(resource.into_inner()).await;
    }

    /// Removes a borrowed id from the active set without returning the
    /// resource (it is about to be destroyed).
    fn forget_active(&self, id: u64) {
        let mut inner = self.lock();
        inner.active.remove(&id);
        self.notify_if_drained(&inner);
    }

    fn notify_if_drained(&self, inner: &PoolInner<F::Resource>) {
        if inner.shut_down && inner.active.is_empty() {
            self.drained.notify_one();
        }
    }

    /// Hands a healthy resource to the oldest live waiter, or parks it
    /// idle. Returns the resource back only when the pool has shut down.
    fn route_returned(
        &self,
        mut resource: PooledResource<F::Resource>,
    ) -> Option<PooledResource<F::Resource>> {
        let mut inner = self.lock();
        inner.active.remove(&resource.id);
        if inner.shut_down {
            self.notify_if_drained(&inner);
            return Some(resource);
        }
        while let Some(waiter) = inner.waiters.pop_front() {
            resource.touch();
            inner.active.insert(resource.id, Instant::now());
            match waiter.tx.send(resource) {
                Ok(()) => {
                    inner.acquired_total += 1;
                    return None;
                }
                Err(back) => {
                    // The waiter timed out and dropped its receiver.
                    resource = back;
                    inner.active.remove(&resource.id);
                    resource.use_count -= 1;
                }
            }
        }
        resource.last_used_at = Instant::now();
        inner.idle.push(resource);
        None
    }

    /// Full-hygiene release: reset, age check, then route or destroy.
    async fn release_resource(&self, mut resource: PooledResource<F::Resource>) {
        let (pattern_name, timestamp) = self.now_event_fields();
        self.emit(PoolEvent::Released {
            pattern_name,
            timestamp,
            resource_id: resource.id,
        });

        let clean = self.factory.reset(&mut resource.inner).await;
        let aged_out = self
            .config
            .max_age
            .is_some_and(|age| resource.created_at.elapsed() > age);

        if clean && !aged_out {
            if let Some(leftover) = self.route_returned(resource) {
                self.destroy(leftover, DestroyReason::Shutdown).await;
            }
        } else {
            self.forget_active(resource.id);
            let reason = if aged_out {
                DestroyReason::AgedOut
            } else {
                DestroyReason::ResetFailed
            };
            self.destroy(resource, reason).await;
            self.replace_for_waiter().await;
        }
    }

    /// After destroying a returned resource, creates a replacement for the
    /// oldest waiter when the queue is non-empty and capacity allows.
    async fn replace_for_waiter(&self) {
        let should = {
            let mut inner = self.lock();
            let ok = !inner.shut_down
                && !inner.waiters.is_empty()
                && inner.total() < self.config.max_size;
            if ok {
                inner.creating += 1;
            }
            ok
        };
        if !should {
            return;
        }
        match self.create_resource().await {
            Ok(resource) => {
                self.lock().creating -= 1;
                if let Some(leftover) = self.route_returned(resource) {
                    self.destroy(leftover, DestroyReason::Shutdown).await;
                }
            }
            Err(_err) => {
                self.lock().creating -= 1;
                #[cfg(feature = "tracing")]
                tracing::warn!(pool = %self.config.name, error = %_err, "replacement creation failed");
            }
        }
    }

    /// One maintenance pass: evict expired idle resources (never dropping
    /// the pool below `min_size`), then top back up to `min_size`.
    async fn maintain(&self) {
        let evicted = self.evict_idle(false);
        let evicted_count = evicted.len();
        for resource in evicted {
            self.destroy(resource, DestroyReason::IdleExpired).await;
        }

        let created = self.top_up().await;

        let (pattern_name, timestamp) = self.now_event_fields();
        self.emit(PoolEvent::MaintenanceCompleted {
            pattern_name,
            timestamp,
            evicted: evicted_count,
            created,
        });

        #[cfg(feature = "metrics")]
        {
            let inner = self.lock();
            gauge!("pool_idle", "pool" => self.config.name.clone()).set(inner.idle.len() as f64);
            gauge!("pool_active", "pool" => self.config.name.clone())
                .set(inner.active.len() as f64);
        }
    }

    /// Collects idle resources to destroy, oldest first. With
    /// `ignore_age`, any idle resource is a candidate (memory pressure);
    /// otherwise only those idle past `idle_timeout`. The pool never drops
    /// below `min_size` total.
    fn evict_idle(&self, ignore_age: bool) -> Vec<PooledResource<F::Resource>> {
        let mut inner = self.lock();
        if inner.shut_down {
            return Vec::new();
        }
        let drained: Vec<_> = inner.idle.drain(..).collect();
        let mut total = inner.active.len() + inner.creating + drained.len();
        let mut keep = Vec::with_capacity(drained.len());
        let mut evict = Vec::new();
        for resource in drained {
            let expired =
                ignore_age || resource.last_used_at.elapsed() > self.config.idle_timeout;
            if expired && total > self.config.min_size {
                evict.push(resource);
                total -= 1;
            } else {
                keep.push(resource);
            }
        }
        inner.idle = keep;
        evict
    }

    async fn top_up(&self) -> usize {
        let mut created = 0;
        loop {
            let should = {
                let mut inner = self.lock();
                let ok = !inner.shut_down && inner.total() < self.config.min_size;
                if ok {
                    inner.creating += 1;
                }
                ok
            };
            if !should {
                break;
            }
            match self.create_resource().await {
                Ok(resource) => {
                    self.lock().creating -= 1;
                    if let Some(leftover) = self.route_returned(resource) {
                        self.destroy(leftover, DestroyReason::Shutdown).await;
                    }
                    created += 1;
                }
                Err(_err) => {
                    self.lock().creating -= 1;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(pool = %self.config.name, error = %_err, "top-up creation failed");
                    break;
                }
            }
        }
        created
    }
}

/// An exclusively borrowed pooled resource.
///
/// Dereferences to the resource. Return it with
/// [`ResourcePool::release`] for the full reset-and-validate path; a handle
/// dropped without release goes straight back to the idle list and is
/// revalidated on its next borrow.
pub struct PoolHandle<F: ResourceFactory> {
    resource: Option<PooledResource<F::Resource>>,
    shared: Arc<PoolShared<F>>,
}

impl<F: ResourceFactory> PoolHandle<F> {
    fn new(resource: PooledResource<F::Resource>, shared: Arc<PoolShared<F>>) -> Self {
        Self {
            resource: Some(resource),
            shared,
        }
    }

    fn pooled(&self) -> &PooledResource<F::Resource> {
        self.resource
            .as_ref()
            .expect("resource present until release or drop")
    }

    /// The pool-assigned resource id.
    pub fn id(&self) -> u64 {
        self.pooled().id
    }

    /// How many times this resource has been borrowed, this borrow
    /// included.
    pub fn use_count(&self) -> u64 {
        self.pooled().use_count
    }
}

impl<F: ResourceFactory> std::fmt::Debug for PoolHandle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("id", &self.id())
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl<F: ResourceFactory> Deref for PoolHandle<F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        &self.pooled().inner
    }
}

impl<F: ResourceFactory> DerefMut for PoolHandle<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .resource
            .as_mut()
            .expect("resource present until release or drop")
            .inner
    }
}

impl<F: ResourceFactory> Drop for PoolHandle<F> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        let (pattern_name, timestamp) = self.shared.now_event_fields();
        self.shared.emit(PoolEvent::Released {
            pattern_name,
            timestamp,
            resource_id: resource.id,
        });
        if let Some(leftover) = self.shared.route_returned(resource) {
            // Pool already shut down; destroy off-thread since Drop cannot
            // await.
            if let Ok(rt) = tokio::runtime::Handle::try_current() {
                let shared = Arc::clone(&self.shared);
                rt.spawn(async move {
                    shared.destroy(leftover, DestroyReason::Shutdown).await;
                });
            }
        }
    }
}

/// A pool of asynchronously created, validated resources.
///
/// Cloning is cheap and yields another handle to the same pool. All methods
/// take `&self`; internal state lives behind one mutex whose critical
/// sections never await.
pub struct ResourcePool<F: ResourceFactory> {
    shared: Arc<PoolShared<F>>,
}

impl<F: ResourceFactory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ResourceFactory> ResourcePool<F> {
    /// Creates a pool and, when configured, spawns its maintenance task and
    /// pre-warms `min_size` resources.
    ///
    /// Must be called inside a tokio runtime for maintenance and pre-warm
    /// to take effect.
    pub fn new(config: PoolConfig, factory: F) -> Self {
        let create_retry = RetryPolicy::builder()
            .max_attempts(config.create_attempts)
            .initial_delay(config.create_retry_delay)
            .name(format!("{}-create", config.name))
            .build();
        let shared = Arc::new(PoolShared {
            factory,
            config,
            create_retry,
            inner: Mutex::new(PoolInner::new()),
            drained: Notify::new(),
            maintenance: Mutex::new(None),
        });

        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            if let Some(interval) = shared.config.maintenance_interval {
                let weak = Arc::downgrade(&shared);
                let task = rt.spawn(async move {
                    let start = tokio::time::Instant::now() + interval;
                    let mut ticker = tokio::time::interval_at(start, interval);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        let Some(shared) = weak.upgrade() else { break };
                        shared.maintain().await;
                    }
                });
                if let Ok(mut slot) = shared.maintenance.lock() {
                    *slot = Some(task);
                }
            }
            if shared.config.pre_warm {
                let warm = Arc::clone(&shared);
                rt.spawn(async move {
                    warm.top_up().await;
                });
            }
        }

        Self { shared }
    }

    /// Creates a configuration builder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// The pool's configured name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Borrows a resource.
    ///
    /// Order of preference: revalidated idle resource, then a freshly
    /// created one while under `max_size`, then a strict-FIFO queue slot
    /// bounded by `acquire_timeout`.
    pub async fn acquire(&self) -> Result<PoolHandle<F>, PoolError<F::Error>> {
        let shared = &self.shared;
        loop {
            let plan = {
                let mut inner = shared.lock();
                if inner.shut_down {
                    return Err(PoolError::ShutDown {
                        name: shared.config.name.clone(),
                    });
                }
                if let Some(resource) = inner.idle.pop() {
                    inner.active.insert(resource.id, Instant::now());
                    Plan::UseIdle(resource)
                } else if inner.total() < shared.config.max_size {
                    inner.creating += 1;
                    Plan::Create
                } else if shared
                    .config
                    .max_wait_queue
                    .is_some_and(|bound| inner.waiters.len() >= bound)
                {
                    Plan::Reject {
                        in_use: inner.active.len() + inner.creating,
                    }
                } else {
                    let id = inner.next_waiter_id;
                    inner.next_waiter_id += 1;
                    let (tx, rx) = oneshot::channel();
                    inner.waiters.push_back(Waiter {
                        id,
                        tx,
                        enqueued_at: Instant::now(),
                    });
                    Plan::Wait(id, rx)
                }
            };

            match plan {
                Plan::UseIdle(mut resource) => {
                    if shared.config.validate_on_acquire
                        && !shared.validate(&mut resource.inner).await
                    {
                        shared.forget_active(resource.id);
                        shared.lock().validation_failures += 1;
                        shared
                            .destroy(resource, DestroyReason::ValidationFailed)
                            .await;
                        continue;
                    }
                    resource.touch();
                    return Ok(self.finish_acquire(resource));
                }
                Plan::Create => match shared.create_resource().await {
                    Ok(mut resource) => {
                        {
                            let mut inner = shared.lock();
                            inner.creating -= 1;
                            inner.active.insert(resource.id, Instant::now());
                        }
                        resource.touch();
                        return Ok(self.finish_acquire(resource));
                    }
                    Err(err) => {
                        shared.lock().creating -= 1;
                        return Err(PoolError::Create(err));
                    }
                },
                Plan::Reject { in_use } => {
                    let (pattern_name, timestamp) = shared.now_event_fields();
                    shared.emit(PoolEvent::QueueRejected {
                        pattern_name,
                        timestamp,
                    });
                    return Err(PoolError::Exhausted {
                        name: shared.config.name.clone(),
                        in_use,
                        capacity: shared.config.max_size,
                    });
                }
                Plan::Wait(waiter_id, rx) => {
                    let waited = shared.config.acquire_timeout;
                    return match tokio::time::timeout(waited, rx).await {
                        Ok(Ok(resource)) => {
                            let (pattern_name, timestamp) = shared.now_event_fields();
                            shared.emit(PoolEvent::Acquired {
                                pattern_name,
                                timestamp,
                                resource_id: resource.id,
                            });
                            Ok(PoolHandle::new(resource, Arc::clone(shared)))
                        }
                        // Sender dropped: the pool shut down underneath us.
                        Ok(Err(_)) => Err(PoolError::ShutDown {
                            name: shared.config.name.clone(),
                        }),
                        Err(_) => {
                            {
                                let mut inner = shared.lock();
                                if let Some(pos) =
                                    inner.waiters.iter().position(|w| w.id == waiter_id)
                                {
                                    inner.waiters.remove(pos);
                                }
                                inner.timed_out_total += 1;
                            }
                            let (pattern_name, timestamp) = shared.now_event_fields();
                            shared.emit(PoolEvent::AcquireTimedOut {
                                pattern_name,
                                timestamp,
                                waited,
                            });

                            #[cfg(feature = "metrics")]
                            counter!("pool_acquire_timeouts_total", "pool" => shared.config.name.clone())
                                .increment(1);

                            Err(PoolError::AcquireTimeout { waited })
                        }
                    };
                }
            }
        }
    }

    fn finish_acquire(&self, resource: PooledResource<F::Resource>) -> PoolHandle<F> {
        let shared = &self.shared;
        shared.lock().acquired_total += 1;
        let (pattern_name, timestamp) = shared.now_event_fields();
        shared.emit(PoolEvent::Acquired {
            pattern_name,
            timestamp,
            resource_id: resource.id,
        });
        PoolHandle::new(resource, Arc::clone(shared))
    }

    /// Returns a borrowed resource with full hygiene: factory `reset`, age
    /// check, then FIFO handoff to a queued borrower or back to the idle
    /// list. A resource that fails reset or exceeds `max_age` is destroyed
    /// instead, and a replacement is created for the queue if capacity
    /// allows.
    pub async fn release(&self, mut handle: PoolHandle<F>) {
        if let Some(resource) = handle.resource.take() {
            self.shared.release_resource(resource).await;
        }
    }

    /// Acquires, runs `f` on the resource, releases, and returns `f`'s
    /// output. The resource is released on both success and failure.
    pub async fn execute<R, Fun>(&self, f: Fun) -> Result<R, PoolError<F::Error>>
    where
        Fun: for<'a> FnOnce(&'a mut F::Resource) -> BoxFuture<'a, R>,
    {
        let mut handle = self.acquire().await?;
        let out = f(&mut *handle).await;
        self.release(handle).await;
        Ok(out)
    }

    /// Sheds idle resources down to `min_size` immediately, regardless of
    /// idle age. Call on a memory-pressure signal.
    pub async fn handle_memory_pressure(&self) {
        let evicted = self.shared.evict_idle(true);
        for resource in evicted {
            self.shared
                .destroy(resource, DestroyReason::MemoryPressure)
                .await;
        }
    }

    /// Runs one maintenance pass inline (idle eviction + top-up). The
    /// background task does the same on its interval.
    pub async fn maintain(&self) {
        self.shared.maintain().await;
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> PoolStats {
        let inner = self.shared.lock();
        PoolStats {
            idle: inner.idle.len(),
            active: inner.active.len(),
            waiting: inner.waiters.len(),
            creating: inner.creating,
            created_total: inner.created_total,
            destroyed_total: inner.destroyed_total,
            acquired_total: inner.acquired_total,
            timed_out_total: inner.timed_out_total,
            validation_failures: inner.validation_failures,
        }
    }

    /// Shuts the pool down: stops maintenance, rejects every queued
    /// borrower, destroys idle resources, then waits up to `shutdown_grace`
    /// for borrowed resources to come back. Whatever is still out after the
    /// grace period is abandoned; a late release destroys the resource.
    pub async fn shutdown(&self) {
        let shared = &self.shared;

        // Stop the timer first so nothing fires after teardown.
        let task = shared
            .maintenance
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(task) = task {
            task.abort();
        }

        let (waiters, idle) = {
            let mut inner = shared.lock();
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            (
                std::mem::take(&mut inner.waiters),
                std::mem::take(&mut inner.idle),
            )
        };
        // Dropping the senders completes every queued acquire with ShutDown.
        drop(waiters);
        for resource in idle {
            shared.destroy(resource, DestroyReason::Shutdown).await;
        }

        let deadline = tokio::time::Instant::now() + shared.config.shutdown_grace;
        loop {
            let notified = shared.drained.notified();
            if shared.lock().active.is_empty() {
                break;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                break;
            }
        }

        let abandoned = {
            let mut inner = shared.lock();
            let n = inner.active.len();
            inner.active.clear();
            n
        };
        let (pattern_name, timestamp) = shared.now_event_fields();
        shared.emit(PoolEvent::ShutdownCompleted {
            pattern_name,
            timestamp,
            abandoned,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(pool = %shared.config.name, abandoned, "pool shut down");
    }
}

impl<F: ResourceFactory> std::fmt::Debug for ResourcePool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ResourcePool")
            .field("name", &self.shared.config.name)
            .field("idle", &stats.idle)
            .field("active", &stats.active)
            .field("waiting", &stats.waiting)
            .finish()
    }
}
