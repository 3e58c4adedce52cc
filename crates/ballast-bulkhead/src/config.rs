use crate::bulkhead::Bulkhead;
use crate::events::BulkheadEvent;
use ballast_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a bulkhead instance.
pub struct BulkheadConfig {
    pub(crate) max_concurrent: usize,
    pub(crate) max_queue_size: usize,
    pub(crate) max_wait: Option<Duration>,
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
    pub(crate) name: String,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }
}

/// Builder for [`BulkheadConfig`].
pub struct BulkheadConfigBuilder {
    max_concurrent: usize,
    max_queue_size: usize,
    max_wait: Option<Duration>,
    event_listeners: EventListeners<BulkheadEvent>,
    name: String,
}

impl BulkheadConfigBuilder {
    /// Creates a builder with default values.
    ///
    /// Defaults:
    /// - max_concurrent: 10
    /// - max_queue_size: 100
    /// - max_wait: unbounded
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_concurrent: 10,
            max_queue_size: 100,
            max_wait: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Concurrent calls admitted before queuing begins. Clamped to at
    /// least 1.
    ///
    /// Default: 10
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    /// Callers allowed to wait for a slot; one more fails fast with
    /// [`BulkheadError::Full`](crate::BulkheadError::Full). Zero disables
    /// queuing entirely.
    ///
    /// Default: 100
    pub fn max_queue_size(mut self, n: usize) -> Self {
        self.max_queue_size = n;
        self
    }

    /// Bound on time spent queued; exceeding it fails with
    /// [`BulkheadError::Timeout`](crate::BulkheadError::Timeout).
    ///
    /// Default: unbounded
    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = Some(wait);
        self
    }

    /// Sets the instance name (used in events, errors, and metrics labels).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for rejected calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected { .. } = event {
                f();
            }
        }));
        self
    }

    /// Attaches a raw event listener receiving every event.
    pub fn event_listener<L>(mut self, listener: L) -> Self
    where
        L: ballast_core::EventListener<BulkheadEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Finishes the configuration.
    pub fn config(self) -> BulkheadConfig {
        BulkheadConfig {
            max_concurrent: self.max_concurrent,
            max_queue_size: self.max_queue_size,
            max_wait: self.max_wait,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the bulkhead.
    pub fn build(self) -> Bulkhead {
        Bulkhead::new(self.config())
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
