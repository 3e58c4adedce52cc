//! Instrument registry and snapshots.

use crate::instruments::{Counter, DistributionStats, Gauge, Histogram, Timer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

/// Default number of samples a histogram/timer window retains.
pub const DEFAULT_WINDOW_CAPACITY: usize = 1024;

/// Identity of an instrument: name plus sorted label set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetricId {
    name: String,
    labels: Vec<(String, String)>,
}

impl MetricId {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        labels.sort();
        Self {
            name: name.to_owned(),
            labels,
        }
    }
}

/// What kind of instrument a [`MetricPoint`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetricKind {
    /// Monotonic counter.
    Counter,
    /// Free-running gauge.
    Gauge,
    /// Sample distribution.
    Histogram,
    /// Duration distribution, in seconds.
    Timer,
}

/// Snapshot value of one instrument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetricValue {
    /// Counter reading.
    Counter(u64),
    /// Gauge reading.
    Gauge(f64),
    /// Histogram/timer window statistics.
    Distribution(DistributionStats),
}

/// One instrument's state at snapshot time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricPoint {
    /// Instrument name.
    pub name: String,
    /// Sorted label set.
    pub labels: Vec<(String, String)>,
    /// Instrument kind.
    pub kind: MetricKind,
    /// Reading.
    pub value: MetricValue,
    /// When the reading was taken.
    pub timestamp: SystemTime,
}

/// A deep, point-in-time copy of every registered instrument.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    /// When the snapshot was taken.
    pub taken_at: SystemTime,
    /// One point per instrument.
    pub points: Vec<MetricPoint>,
}

impl MetricsSnapshot {
    /// Finds a point by name, ignoring labels.
    pub fn find(&self, name: &str) -> Option<&MetricPoint> {
        self.points.iter().find(|p| p.name == name)
    }

    /// Finds a point by name and exact label set.
    pub fn find_labeled(&self, name: &str, labels: &[(&str, &str)]) -> Option<&MetricPoint> {
        let id = MetricId::new(name, labels);
        self.points
            .iter()
            .find(|p| p.name == id.name && p.labels == id.labels)
    }
}

/// Shared registry of named instruments.
///
/// Get-or-create is idempotent per `(name, label set)`: every caller asking
/// for the same key receives a clone of the same `Arc`-backed instrument.
pub struct MetricsRegistry {
    counters: Mutex<HashMap<MetricId, Arc<Counter>>>,
    gauges: Mutex<HashMap<MetricId, Arc<Gauge>>>,
    histograms: Mutex<HashMap<MetricId, Arc<Histogram>>>,
    timers: Mutex<HashMap<MetricId, Arc<Timer>>>,
    window_capacity: usize,
}

fn lock<K, V>(m: &Mutex<HashMap<K, V>>) -> MutexGuard<'_, HashMap<K, V>> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MetricsRegistry {
    /// Creates a registry with the default window capacity.
    pub fn new() -> Self {
        Self::with_window_capacity(DEFAULT_WINDOW_CAPACITY)
    }

    /// Creates a registry whose histogram/timer windows hold at most
    /// `capacity` samples.
    pub fn with_window_capacity(capacity: usize) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            window_capacity: capacity.max(1),
        }
    }

    /// Returns the counter for `(name, labels)`, creating it on first use.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> Arc<Counter> {
        let id = MetricId::new(name, labels);
        Arc::clone(
            lock(&self.counters)
                .entry(id)
                .or_insert_with(|| Arc::new(Counter::new())),
        )
    }

    /// Returns the gauge for `(name, labels)`, creating it on first use.
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Arc<Gauge> {
        let id = MetricId::new(name, labels);
        Arc::clone(
            lock(&self.gauges)
                .entry(id)
                .or_insert_with(|| Arc::new(Gauge::new())),
        )
    }

    /// Returns the histogram for `(name, labels)`, creating it on first use.
    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Arc<Histogram> {
        let id = MetricId::new(name, labels);
        let capacity = self.window_capacity;
        Arc::clone(
            lock(&self.histograms)
                .entry(id)
                .or_insert_with(|| Arc::new(Histogram::new(capacity))),
        )
    }

    /// Returns the timer for `(name, labels)`, creating it on first use.
    pub fn timer(&self, name: &str, labels: &[(&str, &str)]) -> Arc<Timer> {
        let id = MetricId::new(name, labels);
        let capacity = self.window_capacity;
        Arc::clone(
            lock(&self.timers)
                .entry(id)
                .or_insert_with(|| Arc::new(Timer::new(capacity))),
        )
    }

    /// Takes a deep, point-in-time copy of every instrument.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.collect(false)
    }

    /// Takes a snapshot, then clears histogram and timer windows so the next
    /// export covers a fresh interval. Counters and gauges are untouched.
    pub fn export(&self) -> MetricsSnapshot {
        self.collect(true)
    }

    fn collect(&self, clear_windows: bool) -> MetricsSnapshot {
        let taken_at = SystemTime::now();
        let mut points = Vec::new();

        for (id, counter) in lock(&self.counters).iter() {
            points.push(MetricPoint {
                name: id.name.clone(),
                labels: id.labels.clone(),
                kind: MetricKind::Counter,
                value: MetricValue::Counter(counter.value()),
                timestamp: taken_at,
            });
        }
        for (id, gauge) in lock(&self.gauges).iter() {
            points.push(MetricPoint {
                name: id.name.clone(),
                labels: id.labels.clone(),
                kind: MetricKind::Gauge,
                value: MetricValue::Gauge(gauge.value()),
                timestamp: taken_at,
            });
        }
        for (id, histogram) in lock(&self.histograms).iter() {
            points.push(MetricPoint {
                name: id.name.clone(),
                labels: id.labels.clone(),
                kind: MetricKind::Histogram,
                value: MetricValue::Distribution(histogram.stats()),
                timestamp: taken_at,
            });
            if clear_windows {
                histogram.clear();
            }
        }
        for (id, timer) in lock(&self.timers).iter() {
            points.push(MetricPoint {
                name: id.name.clone(),
                labels: id.labels.clone(),
                kind: MetricKind::Timer,
                value: MetricValue::Distribution(timer.stats()),
                timestamp: taken_at,
            });
            if clear_windows {
                timer.clear();
            }
        }

        points.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
        MetricsSnapshot { taken_at, points }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("counters", &lock(&self.counters).len())
            .field("gauges", &lock(&self.gauges).len())
            .field("histograms", &lock(&self.histograms).len())
            .field("timers", &lock(&self.timers).len())
            .finish()
    }
}
