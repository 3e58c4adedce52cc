//! Core infrastructure for ballast.
//!
//! This crate provides the shared pieces every ballast pattern crate builds on:
//! - Event system for observability ([`events`])
//! - Unified error type for composed stacks ([`error`])
//! - Structured failure classification ([`classify`])
//! - Named-instance registry ([`registry`])

pub mod classify;
pub mod error;
pub mod events;
pub mod registry;

pub use classify::FailureKind;
pub use error::ResilienceError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use registry::Registry;
