use crate::backoff::{apply_jitter, backoff_delay};
use crate::config::{RetryConfig, RetryConfigBuilder};
use crate::error::{AttemptFailure, RetryError};
use crate::events::RetryEvent;
use ballast_circuitbreaker::CircuitBreakerError;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::future::Future;
use std::time::Instant;

/// Re-runs a failing operation with exponential backoff.
///
/// `E` is the operation's error type. Policies are cheap to share behind an
/// `Arc` and are usually obtained from a
/// [`RetryRegistry`](crate::RetryRegistry) so every caller of the same
/// logical operation uses the same tuning.
pub struct RetryPolicy<E> {
    config: RetryConfig<E>,
}

impl<E> RetryPolicy<E> {
    /// Creates a policy from a finished configuration.
    pub fn new(config: RetryConfig<E>) -> Self {
        Self { config }
    }

    /// Creates a configuration builder.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }

    /// The policy's configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Runs `op` until it succeeds, a permanent failure occurs, or
    /// `max_attempts` is reached.
    ///
    /// When a circuit breaker is attached, each attempt goes through it, so
    /// an open circuit fails attempts without invoking `op`.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match self.run_attempt(&mut op).await {
                Ok(value) => {
                    self.config.event_listeners.emit(&RetryEvent::Succeeded {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => self.config.name.clone(), "outcome" => "success")
                        .increment(1);

                    return Ok(value);
                }
                Err(failure) => {
                    if attempt >= self.config.max_attempts || !self.is_retryable(&failure, attempt)
                    {
                        self.config.event_listeners.emit(&RetryEvent::Exhausted {
                            pattern_name: self.config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });

                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            retry = %self.config.name,
                            attempts = attempt,
                            "giving up"
                        );

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => self.config.name.clone(), "outcome" => "exhausted")
                            .increment(1);

                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: failure,
                        });
                    }

                    let mut delay = backoff_delay(
                        self.config.initial_delay,
                        self.config.max_delay,
                        self.config.backoff_multiplier,
                        attempt - 1,
                    );
                    if self.config.jitter {
                        delay = apply_jitter(delay, self.config.jitter_factor);
                    }

                    attempt += 1;
                    self.config
                        .event_listeners
                        .emit(&RetryEvent::RetryScheduled {
                            pattern_name: self.config.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                            delay,
                        });

                    #[cfg(feature = "metrics")]
                    counter!("retry_attempts_total", "retry" => self.config.name.clone())
                        .increment(1);

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn run_attempt<T, F, Fut>(&self, op: &mut F) -> Result<T, AttemptFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let fut = async {
            match &self.config.breaker {
                Some(breaker) => breaker.execute(&mut *op).await.map_err(|err| match err {
                    CircuitBreakerError::Open { name } => AttemptFailure::CircuitOpen { name },
                    CircuitBreakerError::Inner(e) => AttemptFailure::Inner(e),
                }),
                None => op().await.map_err(AttemptFailure::Inner),
            }
        };

        match self.config.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(AttemptFailure::Timeout(limit)),
            },
            None => fut.await,
        }
    }

    /// Whether `failure` on 1-based attempt `attempt` warrants another try.
    ///
    /// Operation errors: classifier AND user predicate must both allow.
    /// Circuit-open rejections: not retried unless the user predicate says
    /// so. Per-attempt timeouts: retried unless the user predicate vetoes.
    fn is_retryable(&self, failure: &AttemptFailure<E>, attempt: u32) -> bool {
        let predicate_allows = |failure: &AttemptFailure<E>| {
            self.config
                .should_retry
                .as_ref()
                .map_or(true, |p| p(failure, attempt))
        };
        match failure {
            AttemptFailure::CircuitOpen { .. } => self
                .config
                .should_retry
                .as_ref()
                .is_some_and(|p| p(failure, attempt)),
            AttemptFailure::Timeout(_) => predicate_allows(failure),
            AttemptFailure::Inner(e) => {
                (self.config.classifier)(e).is_retryable() && predicate_allows(failure)
            }
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &self.config.name)
            .field("max_attempts", &self.config.max_attempts)
            .finish()
    }
}
