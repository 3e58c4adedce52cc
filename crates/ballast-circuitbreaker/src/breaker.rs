use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::error::CircuitBreakerError;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls are allowed.
    Closed = 0,
    /// Calls are rejected without executing.
    Open = 1,
    /// A bounded number of trial calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Mutable breaker state. Exactly one of the three states holds at a time;
/// every transition happens under the owning mutex.
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    half_open_calls: u32,
    half_open_successes: u32,
    last_state_change: Instant,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            half_open_calls: 0,
            half_open_successes: 0,
            last_state_change: Instant::now(),
        }
    }
}

/// A failure-triggered state machine guarding one downstream dependency.
///
/// Create one per logical operation key (usually through a
/// [`CircuitBreakerRegistry`](crate::CircuitBreakerRegistry)) and share it;
/// the breaker is `Send + Sync` and all transitions are atomic with respect
/// to concurrent callers.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    // Mirror of `circuit.state` so `state()` never contends with `execute`.
    state_atomic: AtomicU8,
}

impl CircuitBreaker {
    /// Creates a breaker from a finished configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuit: Mutex::new(Circuit::new()),
            state_atomic: AtomicU8::new(CircuitState::Closed as u8),
        }
    }

    /// Creates a configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// The breaker's configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current state, read without locking.
    ///
    /// The open-to-half-open transition happens lazily on the next call, so
    /// an idle breaker whose `open_timeout` has elapsed still reports
    /// [`CircuitState::Open`] here.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Runs `op` through the breaker; any `Err` counts as a failure.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(op, |result| result.is_err()).await
    }

    /// Runs `op` through the breaker with a custom failure classifier.
    ///
    /// `is_failure` decides whether the outcome counts against the breaker;
    /// a result classified as non-failure is still returned unchanged to the
    /// caller (an `Err` surfaces as [`CircuitBreakerError::Inner`]).
    pub async fn execute_with<T, E, F, Fut, C>(
        &self,
        op: F,
        is_failure: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&Result<T, E>) -> bool,
    {
        if !self.try_acquire() {
            return Err(CircuitBreakerError::Open {
                name: self.config.name.clone(),
            });
        }

        let result = op().await;

        if is_failure(&result) {
            self.record_failure();
        } else {
            self.record_success();
        }

        result.map_err(CircuitBreakerError::Inner)
    }

    /// Forces the circuit open; calls are rejected until `open_timeout`
    /// elapses and trial calls succeed again.
    pub fn force_open(&self) {
        let mut circuit = self.lock();
        self.transition_to(&mut circuit, CircuitState::Open);
    }

    /// Forces the circuit closed, clearing the failure streak.
    pub fn force_closed(&self) {
        let mut circuit = self.lock();
        self.transition_to(&mut circuit, CircuitState::Closed);
    }

    /// Resets the breaker to a pristine closed state.
    pub fn reset(&self) {
        let mut circuit = self.lock();
        self.transition_to(&mut circuit, CircuitState::Closed);
        circuit.consecutive_failures = 0;
        circuit.last_failure_at = None;
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        match self.circuit.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Decides whether a call may proceed, performing the lazy
    /// open-to-half-open transition when the open timeout has elapsed.
    fn try_acquire(&self) -> bool {
        let mut circuit = self.lock();
        let permitted = match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if circuit.last_state_change.elapsed() >= self.config.open_timeout {
                    self.transition_to(&mut circuit, CircuitState::HalfOpen);
                    circuit.half_open_calls = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if circuit.half_open_calls >= self.config.half_open_max_calls {
                    // Saturated half-open: trip back without executing.
                    self.transition_to(&mut circuit, CircuitState::Open);
                    false
                } else {
                    circuit.half_open_calls += 1;
                    true
                }
            }
        };

        let state = circuit.state;
        drop(circuit);

        if permitted {
            self.config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallPermitted {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    state,
                });
        } else {
            self.config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallRejected {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_rejected_total", "circuitbreaker" => self.config.name.clone())
                .increment(1);
        }

        permitted
    }

    fn record_success(&self) {
        let mut circuit = self.lock();
        match circuit.state {
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                if circuit.half_open_successes >= self.config.success_threshold {
                    self.transition_to(&mut circuit, CircuitState::Closed);
                }
            }
            _ => {
                circuit.consecutive_failures = 0;
                circuit.last_failure_at = None;
            }
        }
        let state = circuit.state;
        drop(circuit);

        self.config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => self.config.name.clone(), "outcome" => "success")
            .increment(1);
    }

    fn record_failure(&self) {
        let now = Instant::now();
        let mut circuit = self.lock();
        match circuit.state {
            CircuitState::HalfOpen => {
                self.transition_to(&mut circuit, CircuitState::Open);
            }
            _ => {
                // A failure older than the window no longer counts toward
                // the threshold; the streak restarts at this failure.
                let streak_expired = circuit
                    .last_failure_at
                    .is_some_and(|at| now.duration_since(at) > self.config.time_window);
                if streak_expired {
                    circuit.consecutive_failures = 0;
                }
                circuit.consecutive_failures += 1;
                circuit.last_failure_at = Some(now);
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    self.transition_to(&mut circuit, CircuitState::Open);
                }
            }
        }
        let state = circuit.state;
        let consecutive_failures = circuit.consecutive_failures;
        drop(circuit);

        self.config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                state,
                consecutive_failures,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => self.config.name.clone(), "outcome" => "failure")
            .increment(1);
    }

    fn transition_to(&self, circuit: &mut Circuit, state: CircuitState) {
        if circuit.state == state {
            return;
        }
        let from_state = circuit.state;

        circuit.state = state;
        circuit.last_state_change = Instant::now();
        circuit.half_open_calls = 0;
        circuit.half_open_successes = 0;
        if state == CircuitState::Closed {
            circuit.consecutive_failures = 0;
            circuit.last_failure_at = None;
        }
        self.state_atomic.store(state as u8, Ordering::Release);

        self.config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %self.config.name,
            from = from_state.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_transitions_total",
            "circuitbreaker" => self.config.name.clone(),
            "from" => from_state.as_str(),
            "to" => state.as_str()
        )
        .increment(1);

        #[cfg(not(any(feature = "tracing", feature = "metrics")))]
        let _ = from_state;
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker(failures: u32, open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::builder()
            .failure_threshold(failures)
            .success_threshold(1)
            .open_timeout(open_timeout)
            .name("test")
            .build()
    }

    async fn fail(b: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
        b.execute(|| async { Err::<(), _>("boom") }).await.map(|_| ())
    }

    async fn succeed(b: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
        b.execute(|| async { Ok::<(), &'static str>(()) }).await
    }

    #[tokio::test]
    async fn trips_after_threshold_failures() {
        let b = breaker(3, Duration::from_secs(30));
        for _ in 0..3 {
            let _ = fail(&b).await;
        }
        assert_eq!(b.state(), CircuitState::Open);

        let err = fail(&b).await.unwrap_err();
        assert!(err.is_open());
    }

    #[tokio::test]
    async fn success_resets_failure_streak() {
        let b = breaker(3, Duration::from_secs(30));
        let _ = fail(&b).await;
        let _ = fail(&b).await;
        let _ = succeed(&b).await;
        let _ = fail(&b).await;
        let _ = fail(&b).await;
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_circuit_admits_trial_after_timeout() {
        let b = breaker(1, Duration::from_millis(50));
        let _ = fail(&b).await;
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(succeed(&b).await.is_ok());
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let b = breaker(1, Duration::from_millis(50));
        let _ = fail(&b).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = fail(&b).await;
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn classifier_can_ignore_errors() {
        let b = breaker(1, Duration::from_secs(30));
        let result = b
            .execute_with(|| async { Err::<(), _>("not-a-failure") }, |_| false)
            .await;
        assert!(result.is_err());
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn force_open_rejects_immediately() {
        let b = breaker(5, Duration::from_secs(30));
        b.force_open();
        assert!(fail(&b).await.unwrap_err().is_open());
        b.force_closed();
        assert!(succeed(&b).await.is_ok());
    }
}
