//! Events emitted by the rate limiter.

use ballast_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a rate limiter instance.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// Tokens were consumed and the call may proceed.
    Consumed {
        /// Limiter instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Tokens taken.
        tokens: u32,
        /// Whole tokens remaining after the take.
        remaining: u64,
    },

    /// The call was denied.
    Rejected {
        /// Limiter instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Tokens the caller asked for.
        requested: u32,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Consumed { .. } => "consumed",
            Self::Rejected { .. } => "rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Consumed { timestamp, .. } | Self::Rejected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::Consumed { pattern_name, .. } | Self::Rejected { pattern_name, .. } => {
                pattern_name
            }
        }
    }
}
