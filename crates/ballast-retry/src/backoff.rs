//! Backoff delay computation.

use rand::Rng;
use std::time::Duration;

/// Base delay before the retry following the `retry`-th failed attempt
/// (0-based): `min(max_delay, initial_delay * multiplier^retry)`.
///
/// A multiplier below 1.0 is treated as 1.0 (backoff never shrinks).
pub fn backoff_delay(
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    retry: u32,
) -> Duration {
    let multiplier = multiplier.max(1.0);
    let factor = multiplier.powi(retry.min(i32::MAX as u32) as i32);
    let delay = initial_delay.as_secs_f64() * factor;
    if !delay.is_finite() || delay >= max_delay.as_secs_f64() {
        max_delay
    } else {
        Duration::from_secs_f64(delay)
    }
}

/// Perturbs `delay` by up to `delay * jitter_factor` in either direction,
/// floored at zero, so synchronized callers do not retry in lockstep.
pub fn apply_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }
    let factor = jitter_factor.min(1.0);
    let r: f64 = rand::rng().random_range(-1.0..=1.0);
    let jittered = delay.as_secs_f64() * (1.0 + factor * r);
    Duration::from_secs_f64(jittered.max(0.0))
}
