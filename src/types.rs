//! Registry of known plugin types and polymorphic "current instance" lookup.

use std::any::TypeId;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::plugin::{DynPluginHandle, PluginType};
use crate::registry::PluginRegistry;

static GLOBAL_TYPES: OnceLock<TypeRegistry> = OnceLock::new();

/// One registered plugin type.
#[derive(Clone, Copy)]
pub struct PluginTypeEntry {
    type_id: TypeId,
    name: &'static str,
    current: fn() -> Option<DynPluginHandle>,
    installed: fn() -> Vec<DynPluginHandle>,
}

impl PluginTypeEntry {
    /// Build the entry for `P`.
    pub fn of<P: PluginType>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            name: P::type_name(),
            current: current_of::<P>,
            installed: installed_of::<P>,
        }
    }

    /// Qualified name of the plugin type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Ask the type for its current instance.
    pub fn current(&self) -> Option<DynPluginHandle> {
        (self.current)()
    }

    /// Instances installed in the type's process-wide registry.
    pub fn installed(&self) -> Vec<DynPluginHandle> {
        (self.installed)()
    }
}

impl std::fmt::Debug for PluginTypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginTypeEntry")
            .field("name", &self.name)
            .finish()
    }
}

fn current_of<P: PluginType>() -> Option<DynPluginHandle> {
    P::current().map(|handle| handle.into_dyn())
}

fn installed_of<P: PluginType>() -> Vec<DynPluginHandle> {
    PluginRegistry::<P>::standard()
        .installed()
        .into_iter()
        .map(|handle| handle.into_dyn())
        .collect()
}

/// Ordered, append-once set of plugin types.
///
/// Every concrete plugin type registers once, either explicitly at program
/// start or implicitly on first use of [`PluginRegistry::standard`].
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: RwLock<Vec<PluginTypeEntry>>,
}

impl TypeRegistry {
    /// Create an empty registry, independent of the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        GLOBAL_TYPES.get_or_init(TypeRegistry::new)
    }

    /// Register `P`. Returns false if it was already registered.
    pub fn register<P: PluginType>(&self) -> bool {
        self.register_entry(PluginTypeEntry::of::<P>())
    }

    /// Register a prepared entry. Returns false if its type was already registered.
    pub fn register_entry(&self, entry: PluginTypeEntry) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.type_id == entry.type_id) {
            return false;
        }

        tracing::debug!(kind = entry.name, "plugin type registered");
        entries.push(entry);
        true
    }

    /// Check if `P` is registered.
    pub fn contains<P: PluginType>(&self) -> bool {
        let id = TypeId::of::<P>();
        self.entries.read().iter().any(|e| e.type_id == id)
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> Vec<PluginTypeEntry> {
        self.entries.read().clone()
    }

    /// Registered type names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|e| e.name).collect()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The first current instance reported by a registered type, in registration order.
    pub fn current(&self) -> Option<DynPluginHandle> {
        // Snapshot so resolvers can reenter the registry.
        self.entries().iter().find_map(PluginTypeEntry::current)
    }

    /// Every installed instance of every registered type.
    pub fn installed(&self) -> Vec<DynPluginHandle> {
        self.entries()
            .iter()
            .flat_map(PluginTypeEntry::installed)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Plugin, PluginHandle};

    struct Dormant;

    impl Plugin for Dormant {
        fn name(&self) -> &str {
            "dormant"
        }
    }

    impl PluginType for Dormant {}

    struct Active {
        name: String,
    }

    impl Plugin for Active {
        fn name(&self) -> &str {
            &self.name
        }
    }

    impl PluginType for Active {
        fn current() -> Option<PluginHandle<Self>> {
            PluginRegistry::<Self>::standard().get("active-1")
        }
    }

    #[test]
    fn test_register_idempotent() {
        let types = TypeRegistry::new();
        assert!(types.register::<Dormant>());
        assert!(!types.register::<Dormant>());
        assert_eq!(types.len(), 1);
        assert!(types.contains::<Dormant>());
        assert!(!types.contains::<Active>());
    }

    #[test]
    fn test_current_empty() {
        let types = TypeRegistry::new();
        assert!(types.current().is_none());

        types.register::<Dormant>();
        assert!(types.current().is_none());
    }

    #[test]
    fn test_current_resolves_in_order() {
        let types = TypeRegistry::new();
        types.register::<Dormant>();
        types.register::<Active>();
        assert_eq!(types.names(), vec![Dormant::type_name(), Active::type_name()]);

        PluginHandle::new(Active {
            name: "active-1".into(),
        })
        .install(&PluginRegistry::standard())
        .unwrap();

        let current = types.current().unwrap();
        assert_eq!(current.name(), "active-1");
        assert_eq!(current.kind(), Active::type_name());
    }

    #[test]
    fn test_standard_registry_registers_type() {
        struct Implicit;

        impl Plugin for Implicit {
            fn name(&self) -> &str {
                "implicit"
            }
        }

        impl PluginType for Implicit {}

        let _ = PluginRegistry::<Implicit>::standard();
        assert!(TypeRegistry::global().contains::<Implicit>());
    }
}
