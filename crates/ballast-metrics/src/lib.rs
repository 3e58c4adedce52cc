//! In-process metrics registry.
//!
//! [`MetricsRegistry`] hands out shared instruments — counters, gauges,
//! histograms, and timers — keyed by `(name, label set)`. Asking twice for
//! the same key returns the same instrument, so callers never coordinate
//! registration.
//!
//! Histograms and timers keep a bounded rolling window of recent samples and
//! estimate percentiles from it; counters and gauges are plain atomics.
//! [`MetricsRegistry::snapshot`] produces a deep point-in-time copy;
//! [`MetricsRegistry::export`] additionally clears the histogram/timer
//! windows so each export covers one interval.
//!
//! ```
//! use ballast_metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new();
//! let requests = registry.counter("requests_total", &[("route", "/users")]);
//! requests.increment();
//!
//! let latency = registry.timer("request_duration_seconds", &[]);
//! latency.record(std::time::Duration::from_millis(12));
//!
//! let snapshot = registry.snapshot();
//! assert_eq!(snapshot.points.len(), 2);
//! ```

mod instruments;
mod registry;

pub use instruments::{Counter, DistributionStats, Gauge, Histogram, Timer, TimerGuard};
pub use registry::{MetricKind, MetricPoint, MetricValue, MetricsRegistry, MetricsSnapshot};
