//! Events emitted by the bulkhead.

use ballast_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a bulkhead instance.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A caller received a slot.
    CallPermitted {
        /// Bulkhead instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Calls in flight after this one was admitted.
        in_flight: usize,
    },

    /// A caller was turned away because slots and queue are full.
    CallRejected {
        /// Bulkhead instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// A queued caller gave up waiting.
    WaitTimedOut {
        /// Bulkhead instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the caller waited.
        waited: Duration,
    },

    /// A slot was released.
    CallFinished {
        /// Bulkhead instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the slot was held.
        held_for: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::CallPermitted { .. } => "call_permitted",
            Self::CallRejected { .. } => "call_rejected",
            Self::WaitTimedOut { .. } => "wait_timed_out",
            Self::CallFinished { .. } => "call_finished",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::CallPermitted { timestamp, .. }
            | Self::CallRejected { timestamp, .. }
            | Self::WaitTimedOut { timestamp, .. }
            | Self::CallFinished { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::CallPermitted { pattern_name, .. }
            | Self::CallRejected { pattern_name, .. }
            | Self::WaitTimedOut { pattern_name, .. }
            | Self::CallFinished { pattern_name, .. } => pattern_name,
        }
    }
}
