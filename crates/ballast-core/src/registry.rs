//! Named-instance registry.
//!
//! Breakers, retry policies, and pools are created once per logical key and
//! shared by every caller that asks for the same name. The registry is an
//! explicitly constructed value passed to whoever needs it — there are no
//! process-global singletons.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A get-or-create map from instance name to a shared instance.
pub struct Registry<T: ?Sized> {
    entries: Mutex<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Registry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the instance registered under `name`, creating it with
    /// `init` on first use. Callers racing on the same name all receive
    /// the same `Arc`.
    pub fn get_or_create<F>(&self, name: &str, init: F) -> Arc<T>
    where
        F: FnOnce() -> Arc<T>,
    {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = entries.get(name) {
            return Arc::clone(existing);
        }
        let created = init();
        entries.insert(name.to_owned(), Arc::clone(&created));
        created
    }

    /// Returns the instance under `name`, if one exists.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(name).map(Arc::clone)
    }

    /// Removes and returns the instance under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(name)
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.keys().cloned().collect()
    }

    /// All registered instances.
    pub fn values(&self) -> Vec<Arc<T>> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.values().map(Arc::clone).collect()
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_returns_same_instance() {
        let registry: Registry<String> = Registry::new();
        let a = registry.get_or_create("db", || Arc::new("instance".to_owned()));
        let b = registry.get_or_create("db", || Arc::new("other".to_owned()));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_names_get_distinct_instances() {
        let registry: Registry<String> = Registry::new();
        let a = registry.get_or_create("db", || Arc::new("a".to_owned()));
        let b = registry.get_or_create("queue", || Arc::new("b".to_owned()));
        assert!(!Arc::ptr_eq(&a, &b));
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["db", "queue"]);
    }

    #[test]
    fn remove_forgets_the_instance() {
        let registry: Registry<String> = Registry::new();
        registry.get_or_create("db", || Arc::new("a".to_owned()));
        assert!(registry.remove("db").is_some());
        assert!(registry.get("db").is_none());
        assert!(registry.is_empty());
    }
}
