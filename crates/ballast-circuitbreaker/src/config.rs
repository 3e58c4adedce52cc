use crate::breaker::{CircuitBreaker, CircuitState};
use crate::events::CircuitBreakerEvent;
use ballast_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a circuit breaker instance.
///
/// Immutable after construction; build one through
/// [`CircuitBreaker::builder`].
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) success_threshold: u32,
    pub(crate) time_window: Duration,
    pub(crate) open_timeout: Duration,
    pub(crate) half_open_max_calls: u32,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: u32,
    success_threshold: u32,
    time_window: Duration,
    open_timeout: Duration,
    half_open_max_calls: u32,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a builder with default values.
    ///
    /// Defaults:
    /// - failure_threshold: 5
    /// - success_threshold: 2
    /// - time_window: 60 seconds
    /// - open_timeout: 30 seconds
    /// - half_open_max_calls: 3
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            time_window: Duration::from_secs(60),
            open_timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Consecutive failures within the time window that trip the circuit.
    ///
    /// Clamped to at least 1. Default: 5
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    /// Successful half-open trial calls required to close the circuit.
    ///
    /// Clamped to at least 1. Default: 2
    pub fn success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n.max(1);
        self
    }

    /// Window bounding a failure streak: a failure older than this no longer
    /// counts toward the threshold and the streak restarts.
    ///
    /// Default: 60 seconds
    pub fn time_window(mut self, window: Duration) -> Self {
        self.time_window = window;
        self
    }

    /// How long the circuit stays open before half-open trial calls begin.
    ///
    /// Default: 30 seconds
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Maximum trial calls admitted while half-open; a call beyond this
    /// bound re-opens the circuit without executing.
    ///
    /// Clamped to at least 1. Default: 3
    pub fn half_open_max_calls(mut self, n: u32) -> Self {
        self.half_open_max_calls = n.max(1);
        self
    }

    /// Sets the instance name (used in events, errors, and metrics labels).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for state transitions.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback for rejected calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallRejected { .. } = event {
                f();
            }
        }));
        self
    }

    /// Attaches a raw event listener receiving every event.
    pub fn event_listener<L>(mut self, listener: L) -> Self
    where
        L: ballast_core::EventListener<CircuitBreakerEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Finishes the configuration.
    pub fn config(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            time_window: self.time_window,
            open_timeout: self.open_timeout,
            half_open_max_calls: self.half_open_max_calls,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the breaker.
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(self.config())
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
