use crate::config::{RateLimiterConfig, RateLimiterConfigBuilder};
use crate::error::RateLimiterError;
use crate::events::RateLimiterEvent;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Sub-token granularity: one token is a million micro-tokens, so refill
/// math stays in integers on the fast path.
const MICRO: u64 = 1_000_000;

/// A lock-free token bucket.
///
/// Tokens accumulate lazily: each `try_consume` first credits the elapsed
/// time since the last refill (one CAS on the refill clock, one on the
/// token count), then attempts the take (one more CAS). The bucket never
/// holds more than `capacity` tokens and never goes negative. Denials are
/// synchronous — there is no wait queue.
pub struct RateLimiter {
    config: RateLimiterConfig,
    /// Current micro-tokens, `<= capacity * MICRO`.
    tokens: AtomicU64,
    /// Nanoseconds since `start` at which the bucket was last credited.
    last_refill: AtomicU64,
    start: Instant,
    capacity_micro: u64,
    /// Micro-tokens accrued per nanosecond.
    rate_micro_per_nano: f64,
}

impl RateLimiter {
    /// Creates a limiter from a finished configuration; the bucket starts
    /// full.
    pub fn new(config: RateLimiterConfig) -> Self {
        let capacity_micro = config.capacity.saturating_mul(MICRO);
        let rate_micro_per_nano = config.refill_rate * (MICRO as f64) / 1_000_000_000.0;
        Self {
            config,
            tokens: AtomicU64::new(capacity_micro),
            last_refill: AtomicU64::new(0),
            start: Instant::now(),
            capacity_micro,
            rate_micro_per_nano,
        }
    }

    /// Creates a configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// The limiter's configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Takes `n` tokens if available. Never blocks.
    pub fn try_consume(&self, n: u32) -> bool {
        self.refill();
        let need = u64::from(n).saturating_mul(MICRO);
        let taken = self
            .tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |tokens| {
                tokens.checked_sub(need)
            })
            .is_ok();

        if taken {
            self.config.event_listeners.emit(&RateLimiterEvent::Consumed {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                tokens: n,
                remaining: self.tokens.load(Ordering::Acquire) / MICRO,
            });

            #[cfg(feature = "metrics")]
            counter!("ratelimiter_tokens_consumed_total", "ratelimiter" => self.config.name.clone())
                .increment(u64::from(n));
        } else {
            self.config.event_listeners.emit(&RateLimiterEvent::Rejected {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
                requested: n,
            });

            #[cfg(feature = "tracing")]
            tracing::debug!(ratelimiter = %self.config.name, requested = n, "rate limited");

            #[cfg(feature = "metrics")]
            counter!("ratelimiter_rejections_total", "ratelimiter" => self.config.name.clone())
                .increment(1);
        }
        taken
    }

    /// Like [`try_consume`](Self::try_consume) but reports a typed error
    /// with an estimated wait on denial.
    pub fn check_consume(&self, n: u32) -> Result<(), RateLimiterError> {
        if self.try_consume(n) {
            return Ok(());
        }
        let need = u64::from(n).saturating_mul(MICRO);
        let retry_after = if need > self.capacity_micro {
            None
        } else {
            let have = self.tokens.load(Ordering::Acquire);
            let deficit = need.saturating_sub(have) as f64;
            Some(Duration::from_nanos(
                (deficit / self.rate_micro_per_nano) as u64,
            ))
        };
        Err(RateLimiterError::Limited {
            name: self.config.name.clone(),
            requested: n,
            retry_after,
        })
    }

    /// Whole tokens currently available.
    pub fn available(&self) -> u64 {
        self.refill();
        self.tokens.load(Ordering::Acquire) / MICRO
    }

    /// Credits tokens for the time elapsed since the last refill.
    ///
    /// The refill clock only advances by the nanoseconds actually converted
    /// into micro-tokens, so sub-token remainders carry over instead of
    /// being rounded away.
    fn refill(&self) {
        let now = self.start.elapsed().as_nanos() as u64;
        loop {
            let last = self.last_refill.load(Ordering::Acquire);
            if now <= last {
                return;
            }
            let accrued = ((now - last) as f64 * self.rate_micro_per_nano) as u64;
            if accrued == 0 {
                return;
            }
            let consumed_nanos = (accrued as f64 / self.rate_micro_per_nano) as u64;
            if self
                .last_refill
                .compare_exchange_weak(
                    last,
                    last + consumed_nanos,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                let capacity = self.capacity_micro;
                let _ = self
                    .tokens
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |tokens| {
                        Some(tokens.saturating_add(accrued).min(capacity))
                    });
                return;
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.config.name)
            .field("capacity", &self.config.capacity)
            .field("refill_rate", &self.config.refill_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn limiter(capacity: u64, rate: f64) -> RateLimiter {
        RateLimiter::builder()
            .capacity(capacity)
            .refill_rate(rate)
            .name("test")
            .build()
    }

    #[test]
    fn bucket_starts_full_and_drains() {
        let rl = limiter(5, 0.000001);
        for _ in 0..5 {
            assert!(rl.try_consume(1));
        }
        assert!(!rl.try_consume(1));
    }

    #[test]
    fn multi_token_take_is_all_or_nothing() {
        let rl = limiter(10, 0.000001);
        assert!(rl.try_consume(7));
        assert!(!rl.try_consume(7), "only 3 left");
        assert!(rl.try_consume(3));
    }

    #[test]
    fn refill_restores_tokens_over_time() {
        let rl = limiter(10, 1000.0);
        for _ in 0..10 {
            assert!(rl.try_consume(1));
        }
        assert!(!rl.try_consume(1));

        std::thread::sleep(Duration::from_millis(10));
        assert!(rl.try_consume(1), "~10 tokens accrued in 10ms at 1000/s");
    }

    #[test]
    fn never_exceeds_capacity() {
        let rl = limiter(3, 1_000_000.0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(rl.available(), 3, "refill capped at capacity");
    }

    #[test]
    fn check_consume_estimates_retry_after() {
        let rl = limiter(10, 10.0);
        assert!(rl.try_consume(10));
        let err = rl.check_consume(5).unwrap_err();
        let RateLimiterError::Limited { retry_after, .. } = err;
        let wait = retry_after.expect("within capacity");
        // 5 tokens at 10/s is about half a second.
        assert!(wait <= Duration::from_millis(600), "{wait:?}");
    }

    #[test]
    fn impossible_requests_have_no_retry_after() {
        let rl = limiter(4, 10.0);
        let err = rl.check_consume(5).unwrap_err();
        let RateLimiterError::Limited { retry_after, .. } = err;
        assert!(retry_after.is_none());
    }

    #[test]
    fn concurrent_consumers_never_oversubscribe() {
        // Effectively no refill during the test window.
        let rl = Arc::new(limiter(100, 0.000001));
        let granted = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let rl = Arc::clone(&rl);
            let granted = Arc::clone(&granted);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    if rl.try_consume(1) {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.join();
        }
        assert_eq!(granted.load(Ordering::SeqCst), 100);
    }
}
