//! The `Resilient` composition wrapper.

use crate::cache::TtlCache;
use ballast_bulkhead::Bulkhead;
use ballast_circuitbreaker::{CircuitBreaker, CircuitBreakerError};
use ballast_core::{FailureKind, ResilienceError};
use ballast_metrics::MetricsRegistry;
use ballast_retry::{AttemptFailure, RetryConfigBuilder, RetryError, RetryPolicy};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type AppClassifier<E> = Arc<dyn Fn(&E) -> FailureKind + Send + Sync>;
type RetryTuning<E> = Box<
    dyn FnOnce(RetryConfigBuilder<ResilienceError<E>>) -> RetryConfigBuilder<ResilienceError<E>>,
>;

/// Protects one async operation with a fixed composition of resilience
/// stages: cache, metrics, timeout, retry (wrapping the circuit breaker),
/// and bulkhead — in that order, outermost first.
///
/// `T` is the operation's success type (cached by key), `E` its error type.
/// Build one per logical operation and share it; all methods take `&self`.
pub struct Resilient<T, E> {
    name: String,
    metrics: Option<Arc<MetricsRegistry>>,
    cache: Option<Mutex<TtlCache<T>>>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy<ResilienceError<E>>>,
    breaker: Option<Arc<CircuitBreaker>>,
    bulkhead: Option<Bulkhead>,
}

impl<T, E> Resilient<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    /// Creates a builder.
    pub fn builder() -> ResilientBuilder<T, E> {
        ResilientBuilder::new()
    }

    /// The wrapper's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `op` through the enabled stages.
    ///
    /// `key` addresses the result cache; unrelated calls through the same
    /// wrapper should use distinct keys. On success the value is cached and
    /// the timer records an `outcome=success` sample; on failure the error
    /// counter increments and the timer records `outcome=failure`.
    pub async fn execute<F, Fut>(&self, key: &str, op: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cache) = &self.cache {
            let hit = lock_cache(cache).get(key);
            if let Some(value) = hit {
                if let Some(metrics) = &self.metrics {
                    metrics
                        .counter(
                            "resilient_cache_hits_total",
                            &[("operation", self.name.as_str())],
                        )
                        .increment();
                }
                return Ok(value);
            }
        }

        let started = Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics
                .counter(
                    "resilient_calls_total",
                    &[("operation", self.name.as_str())],
                )
                .increment();
        }

        let protected = self.run_protected(op);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, protected).await {
                Ok(inner) => inner,
                Err(_) => Err(ResilienceError::Timeout {
                    layer: "resilient",
                    elapsed: limit,
                }),
            },
            None => protected.await,
        };

        match &result {
            Ok(value) => {
                if let Some(cache) = &self.cache {
                    lock_cache(cache).insert(key, value.clone());
                }
                if let Some(metrics) = &self.metrics {
                    metrics
                        .timer(
                            "resilient_duration_seconds",
                            &[
                                ("operation", self.name.as_str()),
                                ("outcome", "success"),
                            ],
                        )
                        .record(started.elapsed());
                }
            }
            Err(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics
                        .counter(
                            "resilient_errors_total",
                            &[("operation", self.name.as_str())],
                        )
                        .increment();
                    metrics
                        .timer(
                            "resilient_duration_seconds",
                            &[
                                ("operation", self.name.as_str()),
                                ("outcome", "failure"),
                            ],
                        )
                        .record(started.elapsed());
                }

                #[cfg(feature = "tracing")]
                tracing::debug!(operation = %self.name, "resilient call failed");
            }
        }
        result
    }

    /// Stages (d) through (f): retry around breaker around bulkhead around
    /// the operation.
    async fn run_protected<F, Fut>(&self, op: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // The operation lives in a shared slot so each retry attempt's
        // future owns everything it touches; attempts run strictly one at a
        // time, so the lock is never contended.
        let op = Arc::new(Mutex::new(op));
        let attempt = {
            let bulkhead = self.bulkhead.clone();
            let breaker = self.breaker.clone();
            move || run_attempt(Arc::clone(&op), bulkhead.clone(), breaker.clone())
        };

        match &self.retry {
            Some(retry) => flatten_retry(retry.execute(attempt).await),
            None => {
                let mut attempt = attempt;
                attempt().await
            }
        }
    }
}

fn lock_cache<V>(cache: &Mutex<TtlCache<V>>) -> std::sync::MutexGuard<'_, TtlCache<V>> {
    match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One attempt: bulkhead permit, then the operation, through the breaker
/// when one is attached. Only application errors count against the breaker;
/// a full bulkhead is back-pressure, not a downstream failure.
async fn run_attempt<T, E, F, Fut>(
    op: Arc<Mutex<F>>,
    bulkhead: Option<Bulkhead>,
    breaker: Option<Arc<CircuitBreaker>>,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let body = move || async move {
        let _permit = match bulkhead {
            Some(bulkhead) => match bulkhead.acquire().await {
                Ok(permit) => Some(permit),
                Err(err) => return Err(ResilienceError::from(err)),
            },
            None => None,
        };
        let fut = {
            let mut op = match op.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            op()
        };
        fut.await.map_err(ResilienceError::Application)
    };

    match breaker {
        Some(breaker) => {
            let outcome = breaker
                .execute_with(body, |result| {
                    matches!(result, Err(ResilienceError::Application(_)))
                })
                .await;
            match outcome {
                Ok(value) => Ok(value),
                Err(CircuitBreakerError::Open { name }) => {
                    Err(ResilienceError::CircuitOpen { name })
                }
                Err(CircuitBreakerError::Inner(err)) => Err(err),
            }
        }
        None => body().await,
    }
}

fn flatten_retry<T, E>(
    result: Result<T, RetryError<ResilienceError<E>>>,
) -> Result<T, ResilienceError<E>> {
    result.map_err(|err| {
        let RetryError::Exhausted { attempts, last } = err;
        let last = match last {
            AttemptFailure::Timeout(elapsed) => ResilienceError::Timeout {
                layer: "retry",
                elapsed,
            },
            AttemptFailure::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            AttemptFailure::Inner(inner) => inner,
        };
        // A single attempt means nothing was retried; surface the failure
        // as-is rather than wrapping it.
        if attempts <= 1 {
            last
        } else {
            ResilienceError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            }
        }
    })
}

fn classify_stage_error<E>(err: &ResilienceError<E>, app: &AppClassifier<E>) -> FailureKind {
    match err {
        ResilienceError::Timeout { .. } => FailureKind::Timeout,
        ResilienceError::CircuitOpen { .. }
        | ResilienceError::RateLimited { .. }
        | ResilienceError::RetriesExhausted { .. } => FailureKind::Rejected,
        ResilienceError::ResourceExhausted { .. } => FailureKind::Busy,
        ResilienceError::ValidationFailed { .. } => FailureKind::Validation,
        ResilienceError::Application(e) => app(e),
    }
}

/// Builder for [`Resilient`].
pub struct ResilientBuilder<T, E> {
    name: String,
    metrics: Option<Arc<MetricsRegistry>>,
    cache: Option<(usize, Option<Duration>)>,
    timeout: Option<Duration>,
    retry_tuning: Option<RetryTuning<E>>,
    app_classifier: AppClassifier<E>,
    breaker: Option<Arc<CircuitBreaker>>,
    bulkhead: Option<Bulkhead>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, E> ResilientBuilder<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    /// Creates a builder with every stage disabled.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            metrics: None,
            cache: None,
            timeout: None,
            retry_tuning: None,
            app_classifier: Arc::new(|_| FailureKind::Other),
            breaker: None,
            bulkhead: None,
            _marker: PhantomData,
        }
    }

    /// Sets the operation name (cache namespace, metric label, log field).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Publishes call counters and duration timers into `registry`.
    pub fn metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Enables the result cache: `capacity` entries, LRU-evicted, expiring
    /// after `ttl` when given.
    pub fn cache(mut self, capacity: usize, ttl: Option<Duration>) -> Self {
        self.cache = Some((capacity, ttl));
        self
    }

    /// Races the whole protected chain against a deadline.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Enables retries; `tune` adjusts attempts, backoff, and jitter.
    ///
    /// Stage errors are classified by the wrapper (timeouts and a full
    /// bulkhead retry; an open breaker does not); use
    /// [`classify_errors`](Self::classify_errors) for the operation's own
    /// error type.
    pub fn retry<Tune>(mut self, tune: Tune) -> Self
    where
        Tune: FnOnce(
                RetryConfigBuilder<ResilienceError<E>>,
            ) -> RetryConfigBuilder<ResilienceError<E>>
            + 'static,
    {
        self.retry_tuning = Some(Box::new(tune));
        self
    }

    /// Maps the operation's error type to a [`FailureKind`] so permanent
    /// failures stop the retry loop.
    pub fn classify_errors<C>(mut self, classifier: C) -> Self
    where
        C: Fn(&E) -> FailureKind + Send + Sync + 'static,
    {
        self.app_classifier = Arc::new(classifier);
        self
    }

    /// Routes every attempt through `breaker`.
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Caps concurrent executions with `bulkhead`.
    pub fn bulkhead(mut self, bulkhead: Bulkhead) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    /// Builds the wrapper.
    pub fn build(self) -> Resilient<T, E> {
        let retry = self.retry_tuning.map(|tune| {
            let app = Arc::clone(&self.app_classifier);
            tune(RetryPolicy::builder())
                .name(format!("{}-retry", self.name))
                .classify_with(move |err| classify_stage_error(err, &app))
                .build()
        });
        Resilient {
            name: self.name,
            metrics: self.metrics,
            cache: self
                .cache
                .map(|(capacity, ttl)| Mutex::new(TtlCache::new(capacity, ttl))),
            timeout: self.timeout,
            retry,
            breaker: self.breaker,
            bulkhead: self.bulkhead,
        }
    }
}

impl<T, E> Default for ResilientBuilder<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
