//! Per-type registry of installed plugin instances.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lifecycle::LifecycleState;
use crate::plugin::{PluginHandle, PluginType};
use crate::store::{ScopedStore, ScopedStoreManager, StoreValue};
use crate::types::TypeRegistry;

/// Configuration for the plugin registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Whether installing under a taken name replaces the previous instance.
    pub allow_overwrite: bool,
}

impl RegistryConfig {
    /// Create a new registry configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow plugin overwrites.
    pub fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total plugins installed.
    pub total: usize,
    /// Plugins installed but not loaded.
    pub installed: usize,
    /// Plugins loaded.
    pub loaded: usize,
    /// Plugins unloaded.
    pub unloaded: usize,
}

impl RegistryStats {
    pub(crate) fn record(&mut self, state: LifecycleState) {
        self.total += 1;
        match state {
            LifecycleState::Installed => self.installed += 1,
            LifecycleState::Loaded => self.loaded += 1,
            LifecycleState::Unloaded => self.unloaded += 1,
            LifecycleState::Uninstalled => {}
        }
    }
}

/// Installed instances of one plugin type.
///
/// A registry is a view over the [`ScopedStore`] named after
/// [`PluginType::type_name`], so every registry for `P` built from the same
/// manager sees the same instances.
pub struct PluginRegistry<P: PluginType> {
    config: RegistryConfig,
    manager: ScopedStoreManager,
    store: Arc<ScopedStore>,
    _marker: PhantomData<fn() -> P>,
}

impl<P: PluginType> PluginRegistry<P> {
    /// The process-wide registry for `P`.
    ///
    /// First use also registers `P` with [`TypeRegistry::global`].
    pub fn standard() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// The process-wide registry for `P` with a custom configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        TypeRegistry::global().register::<P>();
        Self::new(ScopedStoreManager::global(), config)
    }

    /// The registry for `P` inside a specific store manager.
    pub fn new(manager: &ScopedStoreManager, config: RegistryConfig) -> Self {
        Self {
            config,
            manager: manager.clone(),
            store: manager.store(P::type_name()),
            _marker: PhantomData,
        }
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the scope identifier (the plugin type's qualified name).
    pub fn scope(&self) -> &str {
        self.store.scope()
    }

    /// Install a plugin under its name, then notify its delegate.
    ///
    /// The instance is visible in the registry before `plugin_did_install`
    /// runs. A failing delegate rolls the write back and the error propagates.
    /// With `allow_overwrite`, the replaced instance leaves the registry and
    /// returns to [`LifecycleState::Uninstalled`].
    pub fn install(&self, handle: PluginHandle<P>) -> Result<()> {
        let state = handle.state();
        if !state.can_install() {
            return Err(Error::invalid_state(
                LifecycleState::Uninstalled.to_string(),
                state.to_string(),
            ));
        }

        let name = handle.name().to_string();
        let value: StoreValue = Arc::new(handle.clone());

        let previous = if self.config.allow_overwrite {
            self.store.set(name.clone(), value)
        } else if self.store.set_if_absent(name.clone(), value) {
            None
        } else {
            return Err(Error::already_installed(P::type_name(), name));
        };

        handle.set_state(LifecycleState::Installed);
        handle.set_manager(Some(self.manager.clone()));
        tracing::info!(plugin = %name, kind = P::type_name(), "plugin installed");

        let plugin = handle.plugin();
        if let Err(err) = plugin.delegate().plugin_did_install(plugin) {
            match previous {
                Some(previous) => {
                    self.store.set(name, previous);
                }
                None => {
                    self.store.remove(&name);
                }
            }
            handle.set_state(LifecycleState::Uninstalled);
            handle.set_manager(None);
            return Err(err);
        }

        if let Some(evicted) = previous
            .as_ref()
            .and_then(|value| value.downcast_ref::<PluginHandle<P>>())
        {
            let state = evicted.state();
            if state == LifecycleState::Loaded {
                tracing::warn!(plugin = %name, kind = P::type_name(), "replacing a loaded plugin");
            }
            if !state.is_terminal() {
                evicted.set_state(LifecycleState::Uninstalled);
                evicted.set_manager(None);
            }
        }

        Ok(())
    }

    /// All installed instances in installation order.
    pub fn installed(&self) -> Vec<PluginHandle<P>> {
        self.store
            .values()
            .iter()
            .filter_map(|value| value.downcast_ref::<PluginHandle<P>>().cloned())
            .collect()
    }

    /// Get an installed instance by name.
    pub fn plugin(&self, name: &str) -> Result<PluginHandle<P>> {
        self.get(name)
            .ok_or_else(|| Error::not_found(P::type_name(), name))
    }

    /// Get an installed instance by name, if present.
    pub fn get(&self, name: &str) -> Option<PluginHandle<P>> {
        let value = self.store.get(name).ok()?;
        value.downcast_ref::<PluginHandle<P>>().cloned()
    }

    /// Check if a plugin is installed under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of all installed plugins.
    pub fn names(&self) -> Vec<String> {
        self.installed()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Number of installed plugins.
    pub fn len(&self) -> usize {
        self.installed().len()
    }

    /// Check if nothing is installed.
    pub fn is_empty(&self) -> bool {
        self.installed().is_empty()
    }

    /// Installed plugins in the given state.
    pub fn by_state(&self, state: LifecycleState) -> Vec<PluginHandle<P>> {
        self.installed()
            .into_iter()
            .filter(|p| p.state() == state)
            .collect()
    }

    /// Loaded plugins.
    pub fn loaded(&self) -> Vec<PluginHandle<P>> {
        self.by_state(LifecycleState::Loaded)
    }

    /// Get registry statistics.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for plugin in self.installed() {
            stats.record(plugin.state());
        }
        stats
    }
}

impl<P: PluginType> Clone for PluginRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            manager: self.manager.clone(),
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<P: PluginType> std::fmt::Debug for PluginRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("scope", &self.scope())
            .field("config", &self.config)
            .field("plugin_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::Delegate;
    use crate::plugin::Plugin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Widget {
        name: String,
        version: u32,
    }

    impl Widget {
        fn new(name: &str, version: u32) -> Self {
            Self {
                name: name.to_string(),
                version,
            }
        }
    }

    impl Plugin for Widget {
        fn name(&self) -> &str {
            &self.name
        }
    }

    impl PluginType for Widget {}

    fn create_registry(manager: &ScopedStoreManager) -> PluginRegistry<Widget> {
        PluginRegistry::new(manager, RegistryConfig::default())
    }

    #[test]
    fn test_registry_creation() {
        let manager = ScopedStoreManager::new();
        let registry = create_registry(&manager);
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.scope(), Widget::type_name());
    }

    #[test]
    fn test_install_and_lookup() {
        let manager = ScopedStoreManager::new();
        let registry = create_registry(&manager);

        let p1 = PluginHandle::new(Widget::new("p1", 1));
        let p2 = PluginHandle::new(Widget::new("p2", 1));
        p1.install(&registry).unwrap();
        p2.install(&registry).unwrap();

        let installed = registry.installed();
        assert_eq!(installed.len(), 2);
        assert!(installed[0].ptr_eq(&p1));
        assert!(installed[1].ptr_eq(&p2));

        assert!(registry.plugin("p1").unwrap().ptr_eq(&p1));
        assert_eq!(registry.names(), vec!["p1", "p2"]);
        assert_eq!(p1.state(), LifecycleState::Installed);
    }

    #[test]
    fn test_registries_share_scope() {
        let manager = ScopedStoreManager::new();
        let first = create_registry(&manager);
        let second = create_registry(&manager);

        PluginHandle::new(Widget::new("shared", 1))
            .install(&first)
            .unwrap();
        assert!(second.contains("shared"));
    }

    #[test]
    fn test_plugin_not_found() {
        let manager = ScopedStoreManager::new();
        let registry = create_registry(&manager);

        let err = registry.plugin("nonexistent").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(err.to_string().contains("nonexistent"));
        assert!(err.to_string().contains(Widget::type_name()));

        PluginHandle::new(Widget::new("present", 1))
            .install(&registry)
            .unwrap();
        assert!(matches!(
            registry.plugin("nonexistent"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_install_duplicate() {
        let manager = ScopedStoreManager::new();
        let registry = create_registry(&manager);

        PluginHandle::new(Widget::new("dup", 1))
            .install(&registry)
            .unwrap();
        let second = PluginHandle::new(Widget::new("dup", 2));
        let result = second.install(&registry);

        assert!(matches!(result, Err(Error::AlreadyInstalled { .. })));
        assert_eq!(second.state(), LifecycleState::Uninstalled);
        assert_eq!(registry.plugin("dup").unwrap().version, 1);
    }

    #[test]
    fn test_install_duplicate_with_overwrite() {
        let manager = ScopedStoreManager::new();
        let registry =
            PluginRegistry::<Widget>::new(&manager, RegistryConfig::new().with_allow_overwrite(true));

        let first = PluginHandle::new(Widget::new("dup", 1));
        let second = PluginHandle::new(Widget::new("dup", 2));
        first.install(&registry).unwrap();
        second.install(&registry).unwrap();

        let current = registry.plugin("dup").unwrap();
        assert!(current.ptr_eq(&second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_overwritten_instance_is_uninstalled() {
        let manager = ScopedStoreManager::new();
        let registry =
            PluginRegistry::<Widget>::new(&manager, RegistryConfig::new().with_allow_overwrite(true));

        let first = PluginHandle::new(Widget::new("dup", 1));
        let second = PluginHandle::new(Widget::new("dup", 2));
        first.install(&registry).unwrap();
        second.install(&registry).unwrap();

        assert_eq!(registry.plugin("dup").unwrap().version, 2);
        assert_eq!(first.state(), LifecycleState::Uninstalled);
        assert_eq!(second.state(), LifecycleState::Installed);
        assert!(matches!(first.load(), Err(Error::InvalidState { .. })));

        // Evicted, so it may take the slot back.
        first.install(&registry).unwrap();
        assert!(registry.plugin("dup").unwrap().ptr_eq(&first));
        assert_eq!(second.state(), LifecycleState::Uninstalled);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_install_twice_rejected() {
        let manager = ScopedStoreManager::new();
        let registry = create_registry(&manager);

        let handle = PluginHandle::new(Widget::new("once", 1));
        handle.install(&registry).unwrap();
        assert!(matches!(
            handle.install(&registry),
            Err(Error::InvalidState { .. })
        ));
    }

    struct Lookup {
        manager: Arc<ScopedStoreManager>,
        seen: AtomicUsize,
    }

    impl Delegate for Lookup {
        fn plugin_did_install(&self, plugin: &dyn Plugin) -> Result<()> {
            let registry = PluginRegistry::<Greeter>::new(&self.manager, RegistryConfig::default());
            registry.plugin(plugin.name())?;
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Refuse;

    impl Delegate for Refuse {
        fn plugin_did_install(&self, plugin: &dyn Plugin) -> Result<()> {
            Err(Error::transition_failed(plugin.name(), "install refused"))
        }
    }

    struct Greeter {
        name: String,
        delegate: Arc<dyn Delegate>,
    }

    impl Plugin for Greeter {
        fn name(&self) -> &str {
            &self.name
        }

        fn delegate(&self) -> Arc<dyn Delegate> {
            self.delegate.clone()
        }
    }

    impl PluginType for Greeter {}

    #[test]
    fn test_delegate_sees_installed_plugin() {
        let manager = Arc::new(ScopedStoreManager::new());
        let delegate = Arc::new(Lookup {
            manager: manager.clone(),
            seen: AtomicUsize::new(0),
        });
        let registry = PluginRegistry::<Greeter>::new(&manager, RegistryConfig::default());

        PluginHandle::new(Greeter {
            name: "hello".into(),
            delegate: delegate.clone(),
        })
        .install(&registry)
        .unwrap();

        assert_eq!(delegate.seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_delegate_rolls_back() {
        let manager = ScopedStoreManager::new();
        let registry = PluginRegistry::<Greeter>::new(&manager, RegistryConfig::default());

        let handle = PluginHandle::new(Greeter {
            name: "refused".into(),
            delegate: Arc::new(Refuse),
        });
        let result = handle.install(&registry);

        assert!(matches!(result, Err(Error::TransitionFailed { .. })));
        assert!(!registry.contains("refused"));
        assert_eq!(handle.state(), LifecycleState::Uninstalled);
    }

    #[test]
    fn test_registry_stats() {
        let manager = ScopedStoreManager::new();
        let registry = create_registry(&manager);

        let a = PluginHandle::new(Widget::new("a", 1));
        let b = PluginHandle::new(Widget::new("b", 1));
        a.install(&registry).unwrap();
        b.install(&registry).unwrap();
        a.load().unwrap();

        let stats = registry.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.loaded, 1);
        assert_eq!(stats.installed, 1);
        assert_eq!(registry.loaded().len(), 1);
    }
}
