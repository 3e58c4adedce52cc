use crate::events::RateLimiterEvent;
use crate::limiter::RateLimiter;
use ballast_core::events::{EventListeners, FnListener};

/// Configuration for a rate limiter instance.
pub struct RateLimiterConfig {
    pub(crate) capacity: u64,
    pub(crate) refill_rate: f64,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

impl RateLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    capacity: u64,
    refill_rate: f64,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl RateLimiterConfigBuilder {
    /// Creates a builder with default values.
    ///
    /// Defaults:
    /// - capacity: 50 tokens (bucket starts full)
    /// - refill_rate: 50 tokens/second
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            capacity: 50,
            refill_rate: 50.0,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Maximum tokens the bucket holds; also the burst size. Clamped to at
    /// least 1.
    ///
    /// Default: 50
    pub fn capacity(mut self, tokens: u64) -> Self {
        self.capacity = tokens.max(1);
        self
    }

    /// Tokens accumulated per second. Values at or below zero are raised to
    /// a minimal positive rate.
    ///
    /// Default: 50.0
    pub fn refill_rate(mut self, tokens_per_second: f64) -> Self {
        self.refill_rate = if tokens_per_second > 0.0 {
            tokens_per_second
        } else {
            f64::MIN_POSITIVE
        };
        self
    }

    /// Sets the instance name (used in events, errors, and metrics labels).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for denied calls.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::Rejected { requested, .. } = event {
                f(*requested);
            }
        }));
        self
    }

    /// Attaches a raw event listener receiving every event.
    pub fn event_listener<L>(mut self, listener: L) -> Self
    where
        L: ballast_core::EventListener<RateLimiterEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Finishes the configuration.
    pub fn config(self) -> RateLimiterConfig {
        RateLimiterConfig {
            capacity: self.capacity,
            refill_rate: self.refill_rate,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the limiter.
    pub fn build(self) -> RateLimiter {
        RateLimiter::new(self.config())
    }
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
