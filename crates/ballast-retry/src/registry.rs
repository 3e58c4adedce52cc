//! Named-instance retry policy registry.

use crate::config::RetryConfigBuilder;
use crate::policy::RetryPolicy;
use ballast_core::Registry;
use std::sync::Arc;

/// One retry policy per logical operation key, shared across callers.
///
/// The registry is generic over the operation error type, so create one per
/// error domain (most services have exactly one). The first caller of a key
/// configures the policy; later callers receive the same instance.
pub struct RetryRegistry<E> {
    policies: Registry<RetryPolicy<E>>,
}

impl<E> RetryRegistry<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            policies: Registry::new(),
        }
    }

    /// Returns the policy for `key`, creating it on first use.
    ///
    /// `configure` receives a builder already named after the key.
    pub fn get_or_create<F>(&self, key: &str, configure: F) -> Arc<RetryPolicy<E>>
    where
        F: FnOnce(RetryConfigBuilder<E>) -> RetryConfigBuilder<E>,
    {
        self.policies.get_or_create(key, || {
            Arc::new(configure(RetryPolicy::builder().name(key)).build())
        })
    }

    /// Returns the policy for `key` with default configuration.
    pub fn get_or_default(&self, key: &str) -> Arc<RetryPolicy<E>> {
        self.get_or_create(key, |builder| builder)
    }

    /// Returns the policy for `key`, if one exists.
    pub fn get(&self, key: &str) -> Option<Arc<RetryPolicy<E>>> {
        self.policies.get(key)
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True when no policy is registered.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl<E> Default for RetryRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_policy() {
        let registry: RetryRegistry<std::io::Error> = RetryRegistry::new();
        let a = registry.get_or_create("fetch", |b| b.max_attempts(5));
        let b = registry.get_or_default("fetch");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }
}
