//! Per-plugin-instance service namespaces.

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::store::{ScopedStore, ScopedStoreManager};

/// A [`ScopedStore`] addressed as `"<PluginType>.<instanceName>"`.
///
/// Two instances share a scope only if their computed identifiers collide,
/// which unique plugin names prevent.
#[derive(Debug, Clone)]
pub struct ServiceScope {
    store: Arc<ScopedStore>,
}

impl ServiceScope {
    /// Build the scope identifier for a plugin instance.
    pub fn scope_id(type_name: &str, instance_name: &str) -> String {
        format!("{}.{}", type_name, instance_name)
    }

    /// Get the process-wide service scope for a plugin instance.
    pub fn for_plugin(type_name: &str, instance_name: &str) -> Self {
        Self::in_manager(ScopedStoreManager::global(), type_name, instance_name)
    }

    /// Get the service scope for a plugin instance from a specific manager.
    pub fn in_manager(manager: &ScopedStoreManager, type_name: &str, instance_name: &str) -> Self {
        Self {
            store: manager.store(&Self::scope_id(type_name, instance_name)),
        }
    }

    /// Get the scope identifier.
    pub fn scope(&self) -> &str {
        self.store.scope()
    }

    /// Get the backing store.
    pub fn store(&self) -> &Arc<ScopedStore> {
        &self.store
    }

    /// Register a service under `name`, replacing any previous one.
    pub fn register<T: Any + Send + Sync>(&self, name: impl Into<String>, service: T) {
        self.store.insert(name, service);
    }

    /// Register an already shared service.
    pub fn register_arc<T: Any + Send + Sync>(&self, name: impl Into<String>, service: Arc<T>) {
        self.store.set(name, service);
    }

    /// Get a service by name.
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.store.get_as::<T>(name)
    }

    /// Check if a service is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    /// Registered service names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.store.keys()
    }
}
