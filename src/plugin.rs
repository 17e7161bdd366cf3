//! Plugin traits and the shared handle that carries lifecycle state.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::delegate::{Delegate, NoopDelegate};
use crate::discovery::DiscoveryContext;
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleState;
use crate::registry::PluginRegistry;
use crate::services::ServiceScope;
use crate::store::ScopedStoreManager;

/// Raw metadata describing a discovered plugin.
pub type Metadata = HashMap<String, String>;

/// Constructor arguments derived from [`Metadata`].
pub type Parameters = HashMap<String, String>;

/// A named, independently lifecycled unit of extension behavior.
pub trait Plugin: Send + Sync + 'static {
    /// Name of this instance, unique within its plugin type.
    fn name(&self) -> &str;

    /// Delegate notified at lifecycle transitions.
    fn delegate(&self) -> Arc<dyn Delegate> {
        Arc::new(NoopDelegate)
    }

    /// Start-up hook run by [`PluginHandle::load`].
    fn on_load(&self) -> Result<()> {
        Ok(())
    }

    /// Shutdown hook run by [`PluginHandle::unload`].
    fn on_unload(&self) -> Result<()> {
        Ok(())
    }
}

/// Type-level capabilities of a concrete plugin kind.
///
/// Each concrete plugin type is its own registry scope, keyed by
/// [`PluginType::type_name`].
pub trait PluginType: Plugin + Sized {
    /// Qualified name of the plugin type.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Produce constructed instances from external metadata.
    fn discover(ctx: &DiscoveryContext) -> Result<Vec<Self>> {
        let _ = ctx;
        Err(Error::not_implemented(Self::type_name(), "discover"))
    }

    /// Translate raw metadata into constructor arguments.
    fn construct_parameters(metadata: &Metadata) -> Result<Parameters> {
        let _ = metadata;
        Err(Error::not_implemented(
            Self::type_name(),
            "construct_parameters",
        ))
    }

    /// The currently active instance of this type, if it has one.
    ///
    /// Types without a sensible notion of "current" return `None` so that
    /// polymorphic resolution moves on to the next registered type.
    fn current() -> Option<PluginHandle<Self>> {
        None
    }
}

/// Upcast to `&dyn Plugin`.
///
/// Implemented for every sized plugin and for `dyn Plugin` itself.
pub trait AsPlugin: Plugin {
    /// Borrow as a trait object.
    fn as_plugin(&self) -> &dyn Plugin;
}

impl<P: Plugin> AsPlugin for P {
    fn as_plugin(&self) -> &dyn Plugin {
        self
    }
}

impl AsPlugin for dyn Plugin {
    fn as_plugin(&self) -> &dyn Plugin {
        self
    }
}

struct PluginCell<P: ?Sized> {
    kind: &'static str,
    state: RwLock<LifecycleState>,
    // Manager of the registry the plugin was installed into.
    manager: RwLock<Option<ScopedStoreManager>>,
    plugin: P,
}

/// Shared handle to a plugin instance and its lifecycle state.
///
/// Lifecycle calls on a single instance must be serialized by the caller.
pub struct PluginHandle<P: ?Sized = dyn Plugin> {
    cell: Arc<PluginCell<P>>,
}

/// Type-erased handle returned by polymorphic lookups.
pub type DynPluginHandle = PluginHandle<dyn Plugin>;

impl<P: PluginType> PluginHandle<P> {
    /// Wrap a freshly constructed plugin.
    pub fn new(plugin: P) -> Self {
        Self {
            cell: Arc::new(PluginCell {
                kind: P::type_name(),
                state: RwLock::new(LifecycleState::Uninstalled),
                manager: RwLock::new(None),
                plugin,
            }),
        }
    }

    /// Install into `registry`. See [`PluginRegistry::install`].
    pub fn install(&self, registry: &PluginRegistry<P>) -> Result<()> {
        registry.install(self.clone())
    }

    /// Erase the concrete plugin type.
    pub fn into_dyn(self) -> DynPluginHandle {
        let cell: Arc<PluginCell<dyn Plugin>> = self.cell;
        PluginHandle { cell }
    }
}

impl<P: AsPlugin + ?Sized> PluginHandle<P> {
    /// Get the plugin name.
    pub fn name(&self) -> &str {
        self.cell.plugin.name()
    }

    /// Get the qualified name of the plugin's type.
    pub fn kind(&self) -> &'static str {
        self.cell.kind
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.cell.state.read()
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        *self.cell.state.write() = state;
    }

    pub(crate) fn set_manager(&self, manager: Option<ScopedStoreManager>) {
        *self.cell.manager.write() = manager;
    }

    /// Borrow the plugin.
    pub fn plugin(&self) -> &P {
        &self.cell.plugin
    }

    /// Borrow the plugin as a trait object.
    pub fn as_plugin(&self) -> &dyn Plugin {
        self.cell.plugin.as_plugin()
    }

    /// Get the plugin's delegate.
    pub fn delegate(&self) -> Arc<dyn Delegate> {
        self.cell.plugin.delegate()
    }

    /// The service scope owned by this instance.
    ///
    /// Scopes live in the store manager of the registry the plugin was
    /// installed into, or in the process-wide manager before install.
    pub fn services(&self) -> ServiceScope {
        match &*self.cell.manager.read() {
            Some(manager) => ServiceScope::in_manager(manager, self.kind(), self.name()),
            None => ServiceScope::for_plugin(self.kind(), self.name()),
        }
    }

    /// Check if two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &PluginHandle<P>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Run the start-up hook, then notify the delegate.
    ///
    /// Only valid from [`LifecycleState::Installed`]. If the hook fails the
    /// plugin stays installed and the delegate is not called. If the delegate
    /// fails the plugin reverts to installed.
    pub fn load(&self) -> Result<()> {
        let state = self.state();
        if !state.can_load() {
            return Err(Error::invalid_state(
                LifecycleState::Installed.to_string(),
                state.to_string(),
            ));
        }

        let plugin = self.as_plugin();
        plugin.on_load()?;

        self.set_state(LifecycleState::Loaded);
        if let Err(err) = plugin.delegate().plugin_did_load(plugin) {
            self.set_state(LifecycleState::Installed);
            return Err(err);
        }

        tracing::debug!(plugin = %self.name(), kind = self.kind(), "plugin loaded");
        Ok(())
    }

    /// Run the shutdown hook, then notify the delegate.
    ///
    /// Unloading a plugin that is not loaded does nothing.
    pub fn unload(&self) -> Result<()> {
        let state = self.state();
        if !state.can_unload() {
            tracing::warn!(
                plugin = %self.name(),
                kind = self.kind(),
                %state,
                "unload ignored, plugin is not loaded"
            );
            return Ok(());
        }

        let plugin = self.as_plugin();
        plugin.on_unload()?;

        self.set_state(LifecycleState::Unloaded);
        if let Err(err) = plugin.delegate().plugin_did_unload(plugin) {
            self.set_state(LifecycleState::Loaded);
            return Err(err);
        }

        tracing::debug!(plugin = %self.name(), kind = self.kind(), "plugin unloaded");
        Ok(())
    }
}

impl<P: ?Sized> Clone for PluginHandle<P> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<P: ?Sized> Deref for PluginHandle<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.cell.plugin
    }
}

impl<P: AsPlugin + ?Sized> std::fmt::Debug for PluginHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .finish()
    }
}
