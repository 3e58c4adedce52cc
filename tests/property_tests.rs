//! Property tests for the pure math: backoff growth and token-bucket
//! conservation.

use ballast_ratelimiter::RateLimiter;
use ballast_retry::backoff::{apply_jitter, backoff_delay};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    /// Backoff never exceeds the cap and never shrinks as the retry index
    /// grows.
    #[test]
    fn backoff_is_monotone_and_capped(
        initial_ms in 1u64..5_000,
        max_ms in 1u64..120_000,
        multiplier in 1.0f64..10.0,
        retry in 0u32..64,
    ) {
        let initial = Duration::from_millis(initial_ms);
        let max = Duration::from_millis(max_ms);

        let delay = backoff_delay(initial, max, multiplier, retry);
        prop_assert!(delay <= max);

        let next = backoff_delay(initial, max, multiplier, retry + 1);
        prop_assert!(next >= delay);
    }

    /// The first retry always waits the initial delay (capped).
    #[test]
    fn first_retry_uses_initial_delay(
        initial_ms in 1u64..5_000,
        multiplier in 1.0f64..10.0,
    ) {
        let initial = Duration::from_millis(initial_ms);
        let max = Duration::from_secs(600);
        prop_assert_eq!(backoff_delay(initial, max, multiplier, 0), initial);
    }

    /// Jitter stays inside the configured band and never goes negative.
    #[test]
    fn jitter_stays_in_band(
        delay_ms in 0u64..60_000,
        factor in 0.0f64..1.0,
    ) {
        let delay = Duration::from_millis(delay_ms);
        let jittered = apply_jitter(delay, factor);

        let band = delay.as_secs_f64() * factor;
        let low = (delay.as_secs_f64() - band).max(0.0);
        let high = delay.as_secs_f64() + band;
        let value = jittered.as_secs_f64();
        // Floating-point slack on the band edges.
        prop_assert!(value >= low - 1e-9 && value <= high + 1e-9);
    }

    /// A bucket with a negligible refill rate grants exactly its capacity,
    /// regardless of the consumption pattern.
    #[test]
    fn bucket_conserves_tokens(
        capacity in 1u64..200,
        takes in proptest::collection::vec(1u32..8, 1..100),
    ) {
        let limiter = RateLimiter::builder()
            .capacity(capacity)
            .refill_rate(1e-9)
            .name("prop")
            .build();

        let mut granted: u64 = 0;
        for take in takes {
            if limiter.try_consume(take) {
                granted += u64::from(take);
            }
        }
        prop_assert!(granted <= capacity);
        // Whatever was not granted is still in the bucket.
        prop_assert_eq!(limiter.available(), capacity - granted);
    }
}
