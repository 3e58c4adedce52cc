use crate::error::AttemptFailure;
use crate::events::RetryEvent;
use crate::policy::RetryPolicy;
use ballast_circuitbreaker::CircuitBreaker;
use ballast_core::events::{EventListeners, FnListener};
use ballast_core::FailureKind;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type Classifier<E> = Arc<dyn Fn(&E) -> FailureKind + Send + Sync>;
pub(crate) type RetryPredicate<E> = Arc<dyn Fn(&AttemptFailure<E>, u32) -> bool + Send + Sync>;

/// Configuration for a retry policy.
///
/// Immutable after construction; build one through
/// [`RetryPolicy::builder`].
pub struct RetryConfig<E> {
    pub(crate) max_attempts: u32,
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) backoff_multiplier: f64,
    pub(crate) jitter: bool,
    pub(crate) jitter_factor: f64,
    pub(crate) attempt_timeout: Option<Duration>,
    pub(crate) classifier: Classifier<E>,
    pub(crate) should_retry: Option<RetryPredicate<E>>,
    pub(crate) breaker: Option<Arc<CircuitBreaker>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl<E> RetryConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<E> {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
    jitter_factor: f64,
    attempt_timeout: Option<Duration>,
    classifier: Classifier<E>,
    should_retry: Option<RetryPredicate<E>>,
    breaker: Option<Arc<CircuitBreaker>>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl<E> RetryConfigBuilder<E> {
    /// Creates a builder with default values.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - initial_delay: 100ms
    /// - max_delay: 30 seconds
    /// - backoff_multiplier: 2.0
    /// - jitter: off (jitter_factor 0.25 when enabled)
    /// - attempt_timeout: none
    /// - classifier: every error is transient
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
            jitter_factor: 0.25,
            attempt_timeout: None,
            classifier: Arc::new(|_| FailureKind::Other),
            should_retry: None,
            breaker: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Total attempts including the first. Clamped to at least 1.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Delay before the first retry.
    ///
    /// Default: 100ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Ceiling on any single backoff delay.
    ///
    /// Default: 30 seconds
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Multiplier applied to the delay after each failed attempt.
    ///
    /// Values below 1.0 are treated as 1.0. Default: 2.0
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables randomized delay perturbation.
    ///
    /// Default: off
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Maximum relative perturbation when jitter is on, clamped to [0, 1].
    ///
    /// Default: 0.25
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Deadline for each individual attempt; an attempt that exceeds it
    /// fails with [`AttemptFailure::Timeout`] and is retried like any other
    /// transient failure.
    ///
    /// Default: none
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Maps the operation's error type to a [`FailureKind`].
    ///
    /// Failures whose kind is permanent (validation, not-found, auth) stop
    /// the retry loop immediately.
    pub fn classify_with<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&E) -> FailureKind + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Custom retry predicate, called with the failure and the 1-based
    /// attempt number that just failed.
    ///
    /// For operation errors this is ANDed with the classifier; for
    /// circuit-open rejections — not retried by default — the predicate
    /// alone decides, which is how a caller opts in to backing off on an
    /// open breaker.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AttemptFailure<E>, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Routes every attempt through `breaker`.
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Sets the instance name (used in events and metrics labels).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback fired before each backoff sleep, with the
    /// upcoming attempt number and the delay about to be slept.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::RetryScheduled { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback fired when the policy gives up.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Attaches a raw event listener receiving every event.
    pub fn event_listener<L>(mut self, listener: L) -> Self
    where
        L: ballast_core::EventListener<RetryEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Finishes the configuration.
    pub fn config(self) -> RetryConfig<E> {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
            jitter_factor: self.jitter_factor,
            attempt_timeout: self.attempt_timeout,
            classifier: self.classifier,
            should_retry: self.should_retry,
            breaker: self.breaker,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the policy.
    pub fn build(self) -> RetryPolicy<E> {
        RetryPolicy::new(self.config())
    }
}

impl<E> Default for RetryConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
