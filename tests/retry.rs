use ballast_circuitbreaker::CircuitBreaker;
use ballast_core::FailureKind;
use ballast_retry::{AttemptFailure, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 3 attempts, 100ms initial delay, multiplier 2, no jitter, over an
/// operation failing twice then succeeding: the result is the success value
/// and the backoff sleeps total at least 300ms.
#[tokio::test(start_paused = true)]
async fn fail_twice_then_succeed_scenario() {
    let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(100))
        .backoff_multiplier(2.0)
        .jitter(false)
        .name("scenario")
        .build();

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let started = tokio::time::Instant::now();
    let value = policy
        .execute(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("flaky")
                } else {
                    Ok("recovered")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(300), "100ms + 200ms backoff");
}

#[tokio::test(start_paused = true)]
async fn attempts_never_exceed_max() {
    let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
        .max_attempts(4)
        .initial_delay(Duration::from_millis(1))
        .name("capped")
        .build();

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let err = policy
        .execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("always") }
        })
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(err.into_inner(), Some("always"));
}

#[tokio::test(start_paused = true)]
async fn validation_errors_never_retry() {
    #[derive(Debug, PartialEq)]
    enum ApiError {
        BadRequest,
        ServerError,
    }

    let policy: RetryPolicy<ApiError> = RetryPolicy::builder()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(1))
        .classify_with(|e| match e {
            ApiError::BadRequest => FailureKind::Validation,
            ApiError::ServerError => FailureKind::Transport,
        })
        .name("classified")
        .build();

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let err = policy
        .execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ApiError::BadRequest) }
        })
        .await
        .unwrap_err();
    assert_eq!(err.attempts(), 1, "permanent failure stops immediately");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The transient kind is retried to exhaustion.
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let err = policy
        .execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ApiError::ServerError) }
        })
        .await
        .unwrap_err();
    assert_eq!(err.attempts(), 5);
}

#[tokio::test(start_paused = true)]
async fn user_predicate_can_veto_retries() {
    let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(1))
        .should_retry(|_, attempt| attempt < 2)
        .name("vetoed")
        .build();

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let err = policy
        .execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("nope") }
        })
        .await
        .unwrap_err();
    // Attempt 1 may retry (1 < 2); attempt 2 may not.
    assert_eq!(err.attempts(), 2);
}

/// An attached breaker that trips mid-loop short-circuits the remaining
/// attempts without invoking the operation.
#[tokio::test(start_paused = true)]
async fn tripped_breaker_short_circuits_remaining_attempts() {
    let breaker = Arc::new(
        CircuitBreaker::builder()
            .failure_threshold(2)
            .open_timeout(Duration::from_secs(3600))
            .name("dep")
            .build(),
    );
    let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(1))
        .circuit_breaker(Arc::clone(&breaker))
        .name("guarded")
        .build();

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let err = policy
        .execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down") }
        })
        .await
        .unwrap_err();

    // Two real attempts trip the breaker; the third is rejected by the
    // breaker and, being non-retryable by default, ends the loop.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(err.attempts(), 3);
    assert!(matches!(
        err.last_failure(),
        AttemptFailure::CircuitOpen { .. }
    ));
}

/// Opting in via the predicate lets a caller back off on an open breaker.
#[tokio::test]
async fn predicate_can_opt_in_to_retrying_circuit_open() {
    let breaker = Arc::new(
        CircuitBreaker::builder()
            .failure_threshold(1)
            .success_threshold(1)
            .open_timeout(Duration::from_millis(50))
            .name("dep")
            .build(),
    );
    breaker.force_open();

    let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(60))
        .circuit_breaker(Arc::clone(&breaker))
        .should_retry(|failure, _| matches!(failure, AttemptFailure::CircuitOpen { .. }))
        .name("patient")
        .build();

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let value = policy
        .execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, &'static str>("through") }
        })
        .await
        .unwrap();

    // First attempt rejected while open; the backoff outlives the open
    // timeout, so the second attempt goes through half-open and succeeds.
    assert_eq!(value, "through");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn per_attempt_timeout_bounds_slow_attempts() {
    let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(5))
        .attempt_timeout(Duration::from_millis(20))
        .name("deadline")
        .build();

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let err = policy
        .execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok::<(), _>(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3, "timeouts are retried");
    assert!(err.last_failure().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn on_retry_hook_sees_attempt_and_delay() {
    let seen: Arc<std::sync::Mutex<Vec<(u32, Duration)>>> =
        Arc::new(std::sync::Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);

    let policy: RetryPolicy<&'static str> = RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(100))
        .backoff_multiplier(2.0)
        .on_retry(move |attempt, delay| {
            s.lock().unwrap().push((attempt, delay));
        })
        .name("hooked")
        .build();

    let _ = policy
        .execute(|| async { Err::<(), _>("always") })
        .await;

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            (2, Duration::from_millis(100)),
            (3, Duration::from_millis(200)),
        ]
    );
}
