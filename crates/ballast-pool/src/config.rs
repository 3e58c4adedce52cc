use crate::events::PoolEvent;
use ballast_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`ResourcePool`](crate::ResourcePool).
///
/// Immutable after construction. `min_size <= max_size` is enforced at
/// build time by raising `max_size`.
pub struct PoolConfig {
    pub(crate) min_size: usize,
    pub(crate) max_size: usize,
    pub(crate) acquire_timeout: Duration,
    pub(crate) idle_timeout: Duration,
    pub(crate) max_age: Option<Duration>,
    pub(crate) validation_timeout: Option<Duration>,
    pub(crate) validate_on_acquire: bool,
    pub(crate) maintenance_interval: Option<Duration>,
    pub(crate) pre_warm: bool,
    pub(crate) max_wait_queue: Option<usize>,
    pub(crate) shutdown_grace: Duration,
    pub(crate) create_attempts: u32,
    pub(crate) create_retry_delay: Duration,
    pub(crate) event_listeners: EventListeners<PoolEvent>,
    pub(crate) name: String,
}

impl PoolConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }
}

/// Builder for [`PoolConfig`].
pub struct PoolConfigBuilder {
    min_size: usize,
    max_size: usize,
    acquire_timeout: Duration,
    idle_timeout: Duration,
    max_age: Option<Duration>,
    validation_timeout: Option<Duration>,
    validate_on_acquire: bool,
    maintenance_interval: Option<Duration>,
    pre_warm: bool,
    max_wait_queue: Option<usize>,
    shutdown_grace: Duration,
    create_attempts: u32,
    create_retry_delay: Duration,
    event_listeners: EventListeners<PoolEvent>,
    name: String,
}

impl PoolConfigBuilder {
    /// Creates a builder with default values.
    ///
    /// Defaults:
    /// - min_size: 0, max_size: 10
    /// - acquire_timeout: 5 seconds
    /// - idle_timeout: 5 minutes, max_age: none
    /// - validate_on_acquire: true, validation_timeout: none
    /// - maintenance_interval: 30 seconds, pre_warm: off
    /// - max_wait_queue: unbounded
    /// - shutdown_grace: 10 seconds
    /// - creation retries: 3 attempts, 50ms initial delay
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            min_size: 0,
            max_size: 10,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            max_age: None,
            validation_timeout: None,
            validate_on_acquire: true,
            maintenance_interval: Some(Duration::from_secs(30)),
            pre_warm: false,
            max_wait_queue: None,
            shutdown_grace: Duration::from_secs(10),
            create_attempts: 3,
            create_retry_delay: Duration::from_millis(50),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Resources the maintenance task keeps the pool topped up to.
    ///
    /// Default: 0
    pub fn min_size(mut self, n: usize) -> Self {
        self.min_size = n;
        self
    }

    /// Hard ceiling on resources alive at once (idle + borrowed + being
    /// created). Clamped to at least 1.
    ///
    /// Default: 10
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n.max(1);
        self
    }

    /// How long a borrower waits in the queue before failing with a
    /// timeout.
    ///
    /// Default: 5 seconds
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Idle resources unused for longer than this are evicted by
    /// maintenance, down to `min_size`.
    ///
    /// Default: 5 minutes
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Resources older than this are destroyed on release rather than
    /// pooled, regardless of health.
    ///
    /// Default: none
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Deadline for each factory `validate` call; exceeding it counts as a
    /// failed validation.
    ///
    /// Default: none
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = Some(timeout);
        self
    }

    /// Whether idle resources are re-validated before being handed to a
    /// borrower.
    ///
    /// Default: true
    pub fn validate_on_acquire(mut self, enabled: bool) -> Self {
        self.validate_on_acquire = enabled;
        self
    }

    /// Interval between maintenance passes (idle eviction + top-up).
    /// `None` disables background maintenance.
    ///
    /// Default: 30 seconds
    pub fn maintenance_interval(mut self, interval: Option<Duration>) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Eagerly create `min_size` resources at construction instead of on
    /// first demand.
    ///
    /// Default: off
    pub fn pre_warm(mut self, enabled: bool) -> Self {
        self.pre_warm = enabled;
        self
    }

    /// Bound on queued borrowers; an acquisition past the bound fails fast
    /// with [`PoolError::Exhausted`](crate::PoolError::Exhausted) instead of
    /// queuing. `None` leaves the queue unbounded.
    ///
    /// Default: unbounded
    pub fn max_wait_queue(mut self, bound: usize) -> Self {
        self.max_wait_queue = Some(bound);
        self
    }

    /// How long `shutdown` waits for borrowed resources to come back before
    /// abandoning them.
    ///
    /// Default: 10 seconds
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Retry tuning for factory `create` calls: total attempts and the
    /// initial backoff delay.
    ///
    /// Default: 3 attempts, 50ms
    pub fn create_retries(mut self, attempts: u32, initial_delay: Duration) -> Self {
        self.create_attempts = attempts.max(1);
        self.create_retry_delay = initial_delay;
        self
    }

    /// Sets the instance name (used in events, errors, and metrics labels).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for resource creation.
    pub fn on_resource_created<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let PoolEvent::ResourceCreated { resource_id, .. } = event {
                f(*resource_id);
            }
        }));
        self
    }

    /// Registers a callback for resource destruction.
    pub fn on_resource_destroyed<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, crate::DestroyReason) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let PoolEvent::ResourceDestroyed {
                resource_id,
                reason,
                ..
            } = event
            {
                f(*resource_id, *reason);
            }
        }));
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

    /// Finishes the configuration. If `min_size > max_size`, `max_size` is
    /// raised to match.
    pub fn config(self) -> PoolConfig {
        let max_size = self.max_size.max(self.min_size);
        PoolConfig {
            min_size: self.min_size,
            max_size,
            acquire_timeout: self.acquire_timeout,
            idle_timeout: self.idle_timeout,
            max_age: self.max_age,
            validation_timeout: self.validation_timeout,
            validate_on_acquire: self.validate_on_acquire,
            maintenance_interval: self.maintenance_interval,
            pre_warm: self.pre_warm,
            max_wait_queue: self.max_wait_queue,
            shutdown_grace: self.shutdown_grace,
            create_attempts: self.create_attempts,
            create_retry_delay: self.create_retry_delay,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
