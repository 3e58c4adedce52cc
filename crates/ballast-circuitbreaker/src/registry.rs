//! Named-instance breaker registry.

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::config::CircuitBreakerConfigBuilder;
use ballast_core::Registry;
use std::sync::Arc;

/// One circuit breaker per logical operation key, shared across callers.
///
/// The registry is an explicitly constructed value: create it once at
/// startup and hand it to whoever guards a downstream dependency. The first
/// caller of a key configures the breaker; later callers receive the same
/// instance and their configuration closure is not run.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: Registry<CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            breakers: Registry::new(),
        }
    }

    /// Returns the breaker for `key`, creating it on first use.
    ///
    /// `configure` receives a builder already named after the key.
    pub fn get_or_create<F>(&self, key: &str, configure: F) -> Arc<CircuitBreaker>
    where
        F: FnOnce(CircuitBreakerConfigBuilder) -> CircuitBreakerConfigBuilder,
    {
        self.breakers.get_or_create(key, || {
            Arc::new(configure(CircuitBreaker::builder().name(key)).build())
        })
    }

    /// Returns the breaker for `key` with default configuration.
    pub fn get_or_default(&self, key: &str) -> Arc<CircuitBreaker> {
        self.get_or_create(key, |builder| builder)
    }

    /// Returns the breaker for `key`, if one exists.
    pub fn get(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key)
    }

    /// Snapshot of every breaker's current state, for dashboards.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .values()
            .into_iter()
            .map(|b| (b.name().to_owned(), b.state()))
            .collect()
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// True when no breaker is registered.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
