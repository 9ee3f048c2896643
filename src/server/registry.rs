//! Registry of running servers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::RunningServer;

/// Map of server name to its running instance, shared with exit watchers.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: Arc<Mutex<BTreeMap<String, Arc<RunningServer>>>>,
}

impl ServerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Arc<RunningServer>>> {
        self.servers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Running instance registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<RunningServer>> {
        self.lock().get(name).cloned()
    }

    /// Whether `name` has a running instance.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Remove and return the instance registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<RunningServer>> {
        self.lock().remove(name)
    }

    /// Remove `name` only if it still maps to `instance`.
    ///
    /// An exit of an already replaced instance must not unregister its
    /// successor.
    pub fn remove_instance(&self, name: &str, instance: u64) -> bool {
        let mut servers = self.lock();
        if servers.get(name).is_some_and(|s| s.instance() == instance) {
            servers.remove(name);
            true
        } else {
            false
        }
    }

    /// Registered names in iteration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Number of registered servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
