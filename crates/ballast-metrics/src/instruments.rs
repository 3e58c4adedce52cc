//! Metric instruments.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub(crate) fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Adds one.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Adds `n`.
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A free-running gauge.
#[derive(Debug)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Gauge {
    pub(crate) fn new() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Sets the gauge to `v`.
    pub fn set(&self, v: f64) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }

    /// Adjusts the gauge by `delta` (negative to decrease).
    pub fn add(&self, delta: f64) {
        let _ = self
            .bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            });
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Summary statistics over a histogram's rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistributionStats {
    /// Samples recorded over the instrument's lifetime.
    pub count: u64,
    /// Smallest sample in the current window.
    pub min: f64,
    /// Largest sample in the current window.
    pub max: f64,
    /// Mean of the current window.
    pub mean: f64,
    /// Window percentiles.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
}

struct Window {
    samples: VecDeque<f64>,
    capacity: usize,
    total: u64,
}

impl Window {
    fn record(&mut self, v: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(v);
        self.total += 1;
    }

    fn stats(&self) -> DistributionStats {
        if self.samples.is_empty() {
            return DistributionStats {
                count: self.total,
                ..DistributionStats::default()
            };
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let sum: f64 = sorted.iter().sum();
        let pct = |p: f64| -> f64 {
            let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
            sorted[rank.clamp(1, sorted.len()) - 1]
        };
        DistributionStats {
            count: self.total,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: sum / sorted.len() as f64,
            p50: pct(50.0),
            p75: pct(75.0),
            p90: pct(90.0),
            p95: pct(95.0),
            p99: pct(99.0),
        }
    }
}

/// A histogram over a bounded rolling window of samples.
///
/// Once the window is full, each new sample evicts the oldest; percentiles
/// therefore describe recent behavior, not all-time behavior. The lifetime
/// sample count survives both eviction and [`Histogram::clear`].
pub struct Histogram {
    window: Mutex<Window>,
}

impl Histogram {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            window: Mutex::new(Window {
                samples: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                total: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        match self.window.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Records one sample.
    pub fn record(&self, v: f64) {
        self.lock().record(v);
    }

    /// Computes summary statistics over the current window.
    pub fn stats(&self) -> DistributionStats {
        self.lock().stats()
    }

    /// Drops all buffered samples; the lifetime count is kept.
    pub fn clear(&self) {
        self.lock().samples.clear();
    }
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Histogram")
            .field("count", &stats.count)
            .field("p50", &stats.p50)
            .field("p99", &stats.p99)
            .finish()
    }
}

/// Records wall-clock durations into a histogram of seconds.
pub struct Timer {
    histogram: Histogram,
}

impl Timer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            histogram: Histogram::new(capacity),
        }
    }

    /// Records an already-measured duration.
    pub fn record(&self, elapsed: Duration) {
        self.histogram.record(elapsed.as_secs_f64());
    }

    /// Starts a stopwatch; call [`TimerGuard::stop`] to record.
    ///
    /// Takes the `Arc` handle by value; clone it first if you keep one.
    pub fn start(self: Arc<Self>) -> TimerGuard {
        TimerGuard {
            timer: self,
            started: Instant::now(),
        }
    }

    /// Times a closure.
    pub fn time<R>(&self, f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let out = f();
        self.record(started.elapsed());
        out
    }

    /// Times a future.
    pub async fn time_async<F: std::future::Future>(&self, fut: F) -> F::Output {
        let started = Instant::now();
        let out = fut.await;
        self.record(started.elapsed());
        out
    }

    /// Statistics over recorded durations, in seconds.
    pub fn stats(&self) -> DistributionStats {
        self.histogram.stats()
    }

    /// Drops buffered durations; the lifetime count is kept.
    pub fn clear(&self) {
        self.histogram.clear();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("histogram", &self.histogram)
            .finish()
    }
}

/// A running stopwatch tied to a [`Timer`].
///
/// Dropping the guard without calling [`stop`](TimerGuard::stop) records
/// nothing; abandoned measurements do not skew the distribution.
pub struct TimerGuard {
    timer: Arc<Timer>,
    started: Instant,
}

impl TimerGuard {
    /// Stops the stopwatch, records the elapsed time, and returns it.
    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        self.timer.record(elapsed);
        elapsed
    }

    /// Elapsed time so far, without recording.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_monotonic() {
        let c = Counter::new();
        c.increment();
        c.add(4);
        assert_eq!(c.value(), 5);
    }

    #[test]
    fn gauge_moves_both_ways() {
        let g = Gauge::new();
        g.set(10.0);
        g.add(-3.5);
        assert!((g.value() - 6.5).abs() < f64::EPSILON);
    }

    #[test]
    fn histogram_percentiles_from_window() {
        let h = Histogram::new(100);
        for v in 1..=100 {
            h.record(f64::from(v));
        }
        let stats = h.stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert_eq!(stats.p50, 50.0);
        assert_eq!(stats.p90, 90.0);
        assert_eq!(stats.p99, 99.0);
    }

    #[test]
    fn window_evicts_oldest_beyond_capacity() {
        let h = Histogram::new(10);
        for v in 1..=20 {
            h.record(f64::from(v));
        }
        let stats = h.stats();
        // Window holds 11..=20, lifetime count still 20.
        assert_eq!(stats.count, 20);
        assert_eq!(stats.min, 11.0);
        assert_eq!(stats.max, 20.0);
    }

    #[test]
    fn clear_keeps_lifetime_count() {
        let h = Histogram::new(10);
        h.record(1.0);
        h.record(2.0);
        h.clear();
        let stats = h.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max, 0.0);
    }

    #[test]
    fn timer_guard_records_on_stop() {
        let t = Arc::new(Timer::new(16));
        let guard = Arc::clone(&t).start();
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = guard.stop();
        assert!(elapsed >= Duration::from_millis(5));
        assert_eq!(t.stats().count, 1);
    }

    #[tokio::test]
    async fn timer_times_futures() {
        let t = Timer::new(16);
        let out = t.time_async(async { 7 }).await;
        assert_eq!(out, 7);
        assert_eq!(t.stats().count, 1);
    }
}
