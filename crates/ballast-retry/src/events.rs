//! Events emitted by retry policies.

use ballast_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a retry policy instance.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and a retry will follow after `delay`.
    RetryScheduled {
        /// Policy instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The attempt about to run (2 = first retry).
        attempt: u32,
        /// Backoff delay before that attempt, jitter applied.
        delay: Duration,
    },

    /// An attempt succeeded.
    Succeeded {
        /// Policy instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Attempts it took, including the first.
        attempts: u32,
    },

    /// The policy gave up.
    Exhausted {
        /// Policy instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Attempts made, including the first.
        attempts: u32,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::Succeeded { .. } => "succeeded",
            Self::Exhausted { .. } => "exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::RetryScheduled { timestamp, .. }
            | Self::Succeeded { timestamp, .. }
            | Self::Exhausted { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::RetryScheduled { pattern_name, .. }
            | Self::Succeeded { pattern_name, .. }
            | Self::Exhausted { pattern_name, .. } => pattern_name,
        }
    }
}
