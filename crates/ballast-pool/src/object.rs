//! Generic object pool for cheap, synchronously created objects.

use crate::error::ObjectPoolError;
use crate::events::{DestroyReason, PoolEvent};
use ballast_core::events::EventListeners;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

type CreateFn<T> = Box<dyn Fn() -> T + Send + Sync>;
type ResetFn<T> = Box<dyn Fn(&mut T) -> bool + Send + Sync>;

/// Auto-sizing parameters: a rolling window of borrow outcomes drives
/// periodic growth or shrinkage of `max_size` between hard bounds.
#[derive(Clone, Copy)]
struct AutoSize {
    hard_min: usize,
    hard_max: usize,
    /// Borrow outcomes retained for the hit-rate estimate.
    window: usize,
    /// Borrows between evaluations.
    check_every: u32,
    grow_above: f64,
    shrink_below: f64,
    factor: f64,
}

/// Configuration for an [`ObjectPool`].
pub struct ObjectPoolConfig {
    pub(crate) initial_size: usize,
    pub(crate) max_size: usize,
    pub(crate) autosize: Option<(usize, usize)>,
    pub(crate) autosize_check_every: u32,
    pub(crate) event_listeners: EventListeners<PoolEvent>,
    pub(crate) name: String,
}

impl ObjectPoolConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ObjectPoolConfigBuilder {
        ObjectPoolConfigBuilder::new()
    }
}

/// Builder for [`ObjectPoolConfig`].
pub struct ObjectPoolConfigBuilder {
    initial_size: usize,
    max_size: usize,
    autosize: Option<(usize, usize)>,
    autosize_check_every: u32,
    event_listeners: EventListeners<PoolEvent>,
    name: String,
}

impl ObjectPoolConfigBuilder {
    /// Creates a builder with default values.
    ///
    /// Defaults:
    /// - initial_size: 0 (no warm-up)
    /// - max_size: 32
    /// - auto-sizing: off
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            initial_size: 0,
            max_size: 32,
            autosize: None,
            autosize_check_every: 50,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Objects eagerly created at construction.
    ///
    /// Default: 0
    pub fn initial_size(mut self, n: usize) -> Self {
        self.initial_size = n;
        self
    }

    /// Ceiling on objects alive at once (idle + borrowed). Clamped to at
    /// least 1; auto-sizing moves it between its hard bounds.
    ///
    /// Default: 32
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n.max(1);
        self
    }

    /// Enables hit-rate driven auto-sizing with hard bounds on how far
    /// `max_size` may move.
    ///
    /// Default: off
    pub fn autosize(mut self, hard_min: usize, hard_max: usize) -> Self {
        self.autosize = Some((hard_min.max(1), hard_max.max(hard_min.max(1))));
        self
    }

    /// Borrows between auto-sizing evaluations. Clamped to at least 1.
    ///
    /// Default: 50
    pub fn autosize_check_every(mut self, borrows: u32) -> Self {
        self.autosize_check_every = borrows.max(1);
        self
    }

    /// Sets the instance name (used in events and errors).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Attaches a raw event listener receiving every event.
    pub fn event_listener<L>(mut self, listener: L) -> Self
    where
        L: ballast_core::EventListener<PoolEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Finishes the configuration. `initial_size` is clamped to
    /// `max_size`.
    pub fn config(self) -> ObjectPoolConfig {
        ObjectPoolConfig {
            initial_size: self.initial_size.min(self.max_size),
            max_size: self.max_size,
            autosize: self.autosize,
            autosize_check_every: self.autosize_check_every,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

impl Default for ObjectPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time object pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectPoolStats {
    /// Idle objects ready to borrow.
    pub idle: usize,
    /// Objects currently borrowed.
    pub in_use: usize,
    /// Current maximum size (moves under auto-sizing).
    pub max_size: usize,
    /// Borrows served from the idle list.
    pub hits: u64,
    /// Borrows that created a fresh object.
    pub misses: u64,
    /// Objects destroyed (failed reset, resize, drain).
    pub destroyed: u64,
}

struct ObjectPoolInner<T> {
    idle: Vec<T>,
    in_use: usize,
    max_size: usize,
    drained: bool,
    recent: VecDeque<bool>,
    borrows_since_check: u32,
    hits: u64,
    misses: u64,
    destroyed: u64,
}

/// A pool of synchronously created objects.
///
/// Unlike [`ResourcePool`](crate::ResourcePool) there is no wait queue and
/// no validation on borrow: a borrow past capacity fails fast with
/// [`ObjectPoolError::Exhausted`], and hygiene is the reset hook's job on
/// return. With auto-sizing enabled, a sustained hit-rate above 0.9 grows
/// `max_size` by 50% and one below 0.3 shrinks it by a third, clamped to
/// the configured hard bounds.
pub struct ObjectPool<T> {
    create: CreateFn<T>,
    reset: Option<ResetFn<T>>,
    autosize: Option<AutoSize>,
    inner: Mutex<ObjectPoolInner<T>>,
    event_listeners: EventListeners<PoolEvent>,
    name: String,
}

impl<T> ObjectPool<T> {
    /// Creates a pool, eagerly creating `initial_size` objects.
    pub fn new<C>(config: ObjectPoolConfig, create: C) -> Self
    where
        C: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_reset_impl(config, Box::new(create), None)
    }

    /// Creates a pool whose objects are cleaned by `reset` on return.
    /// A reset returning `false` destroys the object instead of pooling it.
    pub fn with_reset<C, R>(config: ObjectPoolConfig, create: C, reset: R) -> Self
    where
        C: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) -> bool + Send + Sync + 'static,
    {
        Self::with_reset_impl(config, Box::new(create), Some(Box::new(reset)))
    }

    fn with_reset_impl(
        config: ObjectPoolConfig,
        create: CreateFn<T>,
        reset: Option<ResetFn<T>>,
    ) -> Self {
        let autosize = config.autosize.map(|(hard_min, hard_max)| AutoSize {
            hard_min,
            hard_max,
            window: 100,
            check_every: config.autosize_check_every,
            grow_above: 0.9,
            shrink_below: 0.3,
            factor: 1.5,
        });
        let idle: Vec<T> = (0..config.initial_size).map(|_| create()).collect();
        Self {
            create,
            reset,
            autosize,
            inner: Mutex::new(ObjectPoolInner {
                idle,
                in_use: 0,
                max_size: config.max_size,
                drained: false,
                recent: VecDeque::new(),
                borrows_since_check: 0,
                hits: 0,
                misses: 0,
                destroyed: 0,
            }),
            event_listeners: config.event_listeners,
            name: config.name,
        }
    }

    /// Creates a configuration builder.
    pub fn builder() -> ObjectPoolConfigBuilder {
        ObjectPoolConfigBuilder::new()
    }

    /// The pool's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, ObjectPoolInner<T>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Borrows an object, transferring ownership to the caller until
    /// [`put_back`](ObjectPool::put_back).
    pub fn borrow(&self) -> Result<T, ObjectPoolError> {
        let mut inner = self.lock();
        if inner.drained {
            return Err(ObjectPoolError::Drained {
                name: self.name.clone(),
            });
        }

        let (object, hit) = if let Some(object) = inner.idle.pop() {
            (Some(object), true)
        } else if inner.in_use < inner.max_size {
            (None, false)
        } else {
            return Err(ObjectPoolError::Exhausted {
                name: self.name.clone(),
                in_use: inner.in_use,
                capacity: inner.max_size,
            });
        };

        inner.in_use += 1;
        if hit {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        self.note_borrow(&mut inner, hit);
        drop(inner);

        let object = match object {
            Some(object) => object,
            None => {
                let object = (self.create)();
                self.event_listeners.emit(&PoolEvent::ResourceCreated {
                    pattern_name: self.name.clone(),
                    timestamp: Instant::now(),
                    resource_id: 0,
                });
                object
            }
        };
        Ok(object)
    }

    /// Returns a borrowed object. The reset hook runs first; an object
    /// whose reset fails, or that no longer fits under `max_size`, is
    /// destroyed instead of pooled.
    pub fn put_back(&self, mut object: T) {
        let clean = self.reset.as_ref().map_or(true, |reset| reset(&mut object));

        let mut inner = self.lock();
        inner.in_use = inner.in_use.saturating_sub(1);
        let fits = inner.idle.len() + inner.in_use < inner.max_size;
        if clean && fits && !inner.drained {
            inner.idle.push(object);
        } else {
            let drained = inner.drained;
            inner.destroyed += 1;
            drop(inner);
            drop(object);
            let reason = if !clean {
                DestroyReason::ResetFailed
            } else if drained {
                DestroyReason::Shutdown
            } else {
                DestroyReason::Surplus
            };
            self.event_listeners.emit(&PoolEvent::ResourceDestroyed {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
                resource_id: 0,
                reason,
            });
        }
    }

    /// Applies explicit size bounds: raises `max_size` to at least `min`,
    /// caps it at `max`, eagerly fills the idle list up to `min`, and trims
    /// idle objects that no longer fit.
    pub fn resize(&self, min: usize, max: usize) {
        let max = max.max(min).max(1);
        let mut trimmed = Vec::new();
        {
            let mut inner = self.lock();
            if inner.drained {
                return;
            }
            inner.max_size = max;
            while inner.idle.len() + inner.in_use > max {
                match inner.idle.pop() {
                    Some(object) => trimmed.push(object),
                    None => break,
                }
            }
            while inner.idle.len() + inner.in_use < min && inner.idle.len() + inner.in_use < max {
                let object = (self.create)();
                inner.idle.push(object);
            }
            inner.destroyed += trimmed.len() as u64;
        }
        drop(trimmed);
    }

    /// Destroys every idle object and rejects further borrows. Objects
    /// still out are dropped by their borrowers; `put_back` after a drain
    /// destroys them.
    pub fn drain(&self) {
        let idle = {
            let mut inner = self.lock();
            inner.drained = true;
            inner.destroyed += inner.idle.len() as u64;
            std::mem::take(&mut inner.idle)
        };
        let count = idle.len();
        drop(idle);
        self.event_listeners.emit(&PoolEvent::ShutdownCompleted {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            abandoned: count,
        });
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> ObjectPoolStats {
        let inner = self.lock();
        ObjectPoolStats {
            idle: inner.idle.len(),
            in_use: inner.in_use,
            max_size: inner.max_size,
            hits: inner.hits,
            misses: inner.misses,
            destroyed: inner.destroyed,
        }
    }

    /// Records a borrow outcome and periodically re-evaluates `max_size`
    /// from the recent hit-rate.
    fn note_borrow(&self, inner: &mut ObjectPoolInner<T>, hit: bool) {
        let Some(auto) = self.autosize else { return };

        if inner.recent.len() == auto.window {
            inner.recent.pop_front();
        }
        inner.recent.push_back(hit);
        inner.borrows_since_check += 1;
        if inner.borrows_since_check < auto.check_every || inner.recent.is_empty() {
            return;
        }
        inner.borrows_since_check = 0;

        let hits = inner.recent.iter().filter(|&&h| h).count();
        let rate = hits as f64 / inner.recent.len() as f64;
        let current = inner.max_size;
        let next = if rate > auto.grow_above {
            ((current as f64 * auto.factor).ceil() as usize).min(auto.hard_max)
        } else if rate < auto.shrink_below {
            ((current as f64 / auto.factor).floor() as usize).max(auto.hard_min)
        } else {
            current
        };
        if next != current {
            inner.max_size = next;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                pool = %self.name,
                hit_rate = rate,
                from = current,
                to = next,
                "object pool resized"
            );
        }
    }
}

impl<T> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ObjectPool")
            .field("name", &self.name)
            .field("idle", &stats.idle)
            .field("in_use", &stats.in_use)
            .field("max_size", &stats.max_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_pool(initial: usize, max: usize) -> ObjectPool<Vec<u8>> {
        ObjectPool::with_reset(
            ObjectPoolConfig::builder()
                .initial_size(initial)
                .max_size(max)
                .name("buffers")
                .config(),
            || Vec::with_capacity(64),
            |buf| {
                buf.clear();
                true
            },
        )
    }

    #[test]
    fn warm_up_creates_initial_objects() {
        let pool = byte_pool(3, 8);
        assert_eq!(pool.stats().idle, 3);
    }

    #[test]
    fn borrow_prefers_idle_then_creates() {
        let pool = byte_pool(1, 2);
        let a = pool.borrow().unwrap();
        assert_eq!(pool.stats().hits, 1);
        let b = pool.borrow().unwrap();
        assert_eq!(pool.stats().misses, 1);

        let err = pool.borrow().unwrap_err();
        assert!(matches!(err, ObjectPoolError::Exhausted { .. }));

        pool.put_back(a);
        pool.put_back(b);
        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn reset_runs_on_return() {
        let pool = byte_pool(1, 2);
        let mut buf = pool.borrow().unwrap();
        buf.extend_from_slice(b"dirty");
        pool.put_back(buf);

        let buf = pool.borrow().unwrap();
        assert!(buf.is_empty(), "reset cleared the buffer");
        pool.put_back(buf);
    }

    #[test]
    fn failed_reset_destroys_object() {
        let pool: ObjectPool<Vec<u8>> = ObjectPool::with_reset(
            ObjectPoolConfig::builder().max_size(2).name("strict").config(),
            Vec::new,
            |buf| buf.len() < 100,
        );
        let mut buf = pool.borrow().unwrap();
        buf.resize(200, 0);
        pool.put_back(buf);

        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.destroyed, 1);
    }

    #[test]
    fn resize_trims_and_fills() {
        let pool = byte_pool(4, 8);
        pool.resize(2, 2);
        assert_eq!(pool.stats().idle, 2);
        assert_eq!(pool.stats().max_size, 2);

        pool.resize(6, 10);
        assert_eq!(pool.stats().idle, 6);
    }

    #[test]
    fn drain_rejects_further_borrows() {
        let pool = byte_pool(2, 4);
        let out = pool.borrow().unwrap();
        pool.drain();

        assert!(matches!(
            pool.borrow(),
            Err(ObjectPoolError::Drained { .. })
        ));
        // A post-drain return is destroyed, not pooled.
        pool.put_back(out);
        assert_eq!(pool.stats().idle, 0);
    }

    #[test]
    fn high_hit_rate_grows_capacity() {
        let pool: ObjectPool<u8> = ObjectPool::new(
            ObjectPoolConfig::builder()
                .initial_size(1)
                .max_size(4)
                .autosize(2, 64)
                .name("auto")
                .config(),
            || 0,
        );
        // Borrow/return in a tight loop: every borrow after the first hits
        // the idle list.
        for _ in 0..120 {
            let obj = pool.borrow().unwrap();
            pool.put_back(obj);
        }
        assert!(pool.stats().max_size > 4, "grew under high hit-rate");
    }

    #[test]
    fn low_hit_rate_shrinks_capacity() {
        let pool: ObjectPool<u8> = ObjectPool::new(
            ObjectPoolConfig::builder()
                .max_size(16)
                .autosize(2, 64)
                .autosize_check_every(10)
                .name("auto-shrink")
                .config(),
            || 0,
        );
        // Hold every borrowed object: the idle list stays empty, so every
        // borrow is a miss. The tenth borrow triggers the evaluation.
        let mut held = Vec::new();
        for _ in 0..10 {
            held.push(pool.borrow().unwrap());
        }
        assert!(pool.stats().max_size < 16, "shrank under low hit-rate");
        for obj in held {
            pool.put_back(obj);
        }
    }
}
