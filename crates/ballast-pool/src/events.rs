//! Events emitted by pools.

use ballast_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Why a pooled resource was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    /// Failed a validation health check.
    ValidationFailed,
    /// Failed its reset on release.
    ResetFailed,
    /// Sat idle longer than `idle_timeout`.
    IdleExpired,
    /// Exceeded `max_age`.
    AgedOut,
    /// Evicted under memory pressure.
    MemoryPressure,
    /// No longer fits after the pool's capacity shrank.
    Surplus,
    /// The pool shut down or was drained.
    Shutdown,
}

/// Events emitted by a [`ResourcePool`](crate::ResourcePool) or
/// [`ObjectPool`](crate::ObjectPool) instance.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// The factory created a resource.
    ResourceCreated {
        /// Pool instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Pool-assigned resource id (0 for object pools).
        resource_id: u64,
    },

    /// A resource was destroyed.
    ResourceDestroyed {
        /// Pool instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Pool-assigned resource id (0 for object pools).
        resource_id: u64,
        /// Why it was destroyed.
        reason: DestroyReason,
    },

    /// A borrower received a resource.
    Acquired {
        /// Pool instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Pool-assigned resource id (0 for object pools).
        resource_id: u64,
    },

    /// A borrower returned a resource.
    Released {
        /// Pool instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Pool-assigned resource id (0 for object pools).
        resource_id: u64,
    },

    /// A queued borrower gave up waiting.
    AcquireTimedOut {
        /// Pool instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the borrower waited.
        waited: Duration,
    },

    /// An acquisition was rejected because pool and queue are full.
    QueueRejected {
        /// Pool instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// A maintenance pass finished.
    MaintenanceCompleted {
        /// Pool instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Idle resources evicted this pass.
        evicted: usize,
        /// Resources created to restore the minimum size.
        created: usize,
    },

    /// The pool finished shutting down or draining.
    ShutdownCompleted {
        /// Pool instance name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Resources force-forgotten because borrowers never returned them.
        abandoned: usize,
    },
}

impl ResilienceEvent for PoolEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::ResourceCreated { .. } => "resource_created",
            Self::ResourceDestroyed { .. } => "resource_destroyed",
            Self::Acquired { .. } => "acquired",
            Self::Released { .. } => "released",
            Self::AcquireTimedOut { .. } => "acquire_timed_out",
            Self::QueueRejected { .. } => "queue_rejected",
            Self::MaintenanceCompleted { .. } => "maintenance_completed",
            Self::ShutdownCompleted { .. } => "shutdown_completed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::ResourceCreated { timestamp, .. }
            | Self::ResourceDestroyed { timestamp, .. }
            | Self::Acquired { timestamp, .. }
            | Self::Released { timestamp, .. }
            | Self::AcquireTimedOut { timestamp, .. }
            | Self::QueueRejected { timestamp, .. }
            | Self::MaintenanceCompleted { timestamp, .. }
            | Self::ShutdownCompleted { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::ResourceCreated { pattern_name, .. }
            | Self::ResourceDestroyed { pattern_name, .. }
            | Self::Acquired { pattern_name, .. }
            | Self::Released { pattern_name, .. }
            | Self::AcquireTimedOut { pattern_name, .. }
            | Self::QueueRejected { pattern_name, .. }
            | Self::MaintenanceCompleted { pattern_name, .. }
            | Self::ShutdownCompleted { pattern_name, .. } => pattern_name,
        }
    }
}
