//! Events emitted by the circuit breaker.

use crate::breaker::CircuitState;
use ballast_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a circuit breaker instance.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved to a new state.
    StateTransition {
        /// Breaker instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State before the transition.
        from_state: CircuitState,
        /// State after the transition.
        to_state: CircuitState,
    },

    /// A call was allowed through.
    CallPermitted {
        /// Breaker instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State when the call was permitted.
        state: CircuitState,
    },

    /// A call was rejected without executing.
    CallRejected {
        /// Breaker instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// A permitted call completed and was classified a success.
    SuccessRecorded {
        /// Breaker instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State when the outcome was recorded.
        state: CircuitState,
    },

    /// A permitted call completed and was classified a failure.
    FailureRecorded {
        /// Breaker instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State when the outcome was recorded.
        state: CircuitState,
        /// Consecutive failures after this one.
        consecutive_failures: u32,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => "state_transition",
            Self::CallPermitted { .. } => "call_permitted",
            Self::CallRejected { .. } => "call_rejected",
            Self::SuccessRecorded { .. } => "success_recorded",
            Self::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::StateTransition { timestamp, .. }
            | Self::CallPermitted { timestamp, .. }
            | Self::CallRejected { timestamp, .. }
            | Self::SuccessRecorded { timestamp, .. }
            | Self::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::StateTransition { pattern_name, .. }
            | Self::CallPermitted { pattern_name, .. }
            | Self::CallRejected { pattern_name, .. }
            | Self::SuccessRecorded { pattern_name, .. }
            | Self::FailureRecorded { pattern_name, .. } => pattern_name,
        }
    }
}
