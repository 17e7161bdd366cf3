//! Scoped key-value stores shared across the process.
//!
//! A [`ScopedStore`] is an ordered, type-erased mapping from names to values,
//! identified by a scope string. A [`ScopedStoreManager`] hands out exactly
//! one store per scope identifier. The process-wide manager returned by
//! [`ScopedStoreManager::global`] is intentional shared state: it is created
//! on first access and lives until the process exits.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// A value held by a [`ScopedStore`].
pub type StoreValue = Arc<dyn Any + Send + Sync>;

static GLOBAL_MANAGER: OnceLock<ScopedStoreManager> = OnceLock::new();

#[derive(Default)]
struct StoreInner {
    order: Vec<String>,
    entries: HashMap<String, StoreValue>,
}

/// An ordered name → value namespace identified by a scope string.
pub struct ScopedStore {
    scope: String,
    inner: RwLock<StoreInner>,
}

impl ScopedStore {
    fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Get the process-wide store for `scope`, creating it on first use.
    pub fn standard(scope: &str) -> Arc<ScopedStore> {
        ScopedStoreManager::global().store(scope)
    }

    /// Get the scope identifier.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Result<StoreValue> {
        self.inner
            .read()
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| Error::key_not_found(&self.scope, key))
    }

    /// Get a value by key, downcast to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        self.get(key)?
            .downcast::<T>()
            .map_err(|_| Error::TypeMismatch {
                scope: self.scope.clone(),
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Set a value, silently replacing any previous one.
    ///
    /// Replacing keeps the key's original insertion position.
    pub fn set(&self, key: impl Into<String>, value: StoreValue) -> Option<StoreValue> {
        let key = key.into();
        let mut inner = self.inner.write();
        let previous = inner.entries.insert(key.clone(), value);
        if previous.is_none() {
            inner.order.push(key);
        }
        previous
    }

    /// Insert a typed value.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Option<StoreValue> {
        self.set(key, Arc::new(value))
    }

    /// Set a value only if the key is absent. Returns false if the key was taken.
    pub fn set_if_absent(&self, key: impl Into<String>, value: StoreValue) -> bool {
        let key = key.into();
        let mut inner = self.inner.write();
        if inner.entries.contains_key(&key) {
            return false;
        }
        inner.entries.insert(key.clone(), value);
        inner.order.push(key);
        true
    }

    /// Explicitly remove a value.
    pub fn remove(&self, key: &str) -> Option<StoreValue> {
        let mut inner = self.inner.write();
        let removed = inner.entries.remove(key)?;
        inner.order.retain(|k| k != key);
        Some(removed)
    }

    /// Check if a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().entries.contains_key(key)
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// All values in key insertion order.
    pub fn values(&self) -> Vec<StoreValue> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|k| inner.entries.get(k).cloned())
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }
}

impl std::fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStore")
            .field("scope", &self.scope)
            .field("keys", &self.keys())
            .finish()
    }
}

/// Owns one [`ScopedStore`] per scope identifier.
///
/// Clones share the same stores.
#[derive(Clone, Default)]
pub struct ScopedStoreManager {
    stores: Arc<DashMap<String, Arc<ScopedStore>>>,
}

impl ScopedStoreManager {
    /// Create an empty manager, independent of the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide manager.
    pub fn global() -> &'static ScopedStoreManager {
        GLOBAL_MANAGER.get_or_init(ScopedStoreManager::new)
    }

    /// Get the store for `scope`, creating it on first use.
    pub fn store(&self, scope: &str) -> Arc<ScopedStore> {
        if let Some(store) = self.stores.get(scope) {
            return store.value().clone();
        }

        // Entry holds the shard lock, so concurrent first callers see one store.
        self.stores
            .entry(scope.to_string())
            .or_insert_with(|| {
                tracing::trace!(scope, "scoped store created");
                Arc::new(ScopedStore::new(scope))
            })
            .value()
            .clone()
    }

    /// Check if a store exists for `scope` without creating it.
    pub fn contains(&self, scope: &str) -> bool {
        self.stores.contains_key(scope)
    }

    /// All scope identifiers with a store.
    pub fn scopes(&self) -> Vec<String> {
        self.stores.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of stores.
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Check if both managers own the same stores.
    pub fn ptr_eq(&self, other: &ScopedStoreManager) -> bool {
        Arc::ptr_eq(&self.stores, &other.stores)
    }

    /// Check if no store has been created.
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::fmt::Debug for ScopedStoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStoreManager")
            .field("store_count", &self.stores.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_identity() {
        let manager = ScopedStoreManager::new();
        let a = manager.store("scope-a");
        let b = manager.store("scope-a");
        let c = manager.store("scope-c");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_cloned_manager_shares_stores() {
        let manager = ScopedStoreManager::new();
        let clone = manager.clone();
        clone.store("shared").insert("k", 7u16);

        assert!(manager.ptr_eq(&clone));
        assert!(!manager.ptr_eq(&ScopedStoreManager::new()));
        assert_eq!(*manager.store("shared").get_as::<u16>("k").unwrap(), 7);
    }

    #[test]
    fn test_standard_store_identity() {
        let a = ScopedStore::standard("store::tests::standard");
        let b = ScopedStore::standard("store::tests::standard");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(ScopedStoreManager::global().contains("store::tests::standard"));
    }

    #[test]
    fn test_get_set_order() {
        let store = ScopedStore::new("order");
        store.insert("b", 2u32);
        store.insert("a", 1u32);
        store.insert("c", 3u32);
        store.insert("b", 20u32);

        assert_eq!(store.keys(), vec!["b", "a", "c"]);
        let values: Vec<u32> = store
            .values()
            .into_iter()
            .map(|v| *v.downcast::<u32>().unwrap())
            .collect();
        assert_eq!(values, vec![20, 1, 3]);
    }

    #[test]
    fn test_get_missing_and_mismatch() {
        let store = ScopedStore::new("errors");
        assert!(matches!(store.get("nope"), Err(Error::KeyNotFound { .. })));

        store.insert("n", 5i64);
        assert!(matches!(
            store.get_as::<String>("n"),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(*store.get_as::<i64>("n").unwrap(), 5);
    }

    #[test]
    fn test_set_if_absent_and_remove() {
        let store = ScopedStore::new("absent");
        assert!(store.set_if_absent("k", Arc::new(1u8)));
        assert!(!store.set_if_absent("k", Arc::new(2u8)));
        assert_eq!(*store.get_as::<u8>("k").unwrap(), 1);

        assert!(store.remove("k").is_some());
        assert!(store.is_empty());
        assert!(store.keys().is_empty());
    }
}
