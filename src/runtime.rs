//! Plugin runtime driving discovery and the plugin lifecycle.

use std::sync::Arc;
#[cfg(feature = "metrics-prometheus")]
use std::time::Instant;

use parking_lot::RwLock;

use crate::delegate::LaunchOptions;
use crate::discovery::DiscoveryContext;
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleAction, LifecycleEvent, LifecycleHooks};
use crate::plugin::{AsPlugin, DynPluginHandle, PluginHandle, PluginType};
use crate::registry::{PluginRegistry, RegistryConfig, RegistryStats};
use crate::types::TypeRegistry;

#[cfg(feature = "metrics-prometheus")]
use crate::metrics::{MetricsConfig, PluginMetrics, Transition};

/// Configuration for the plugin runtime.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Registry configuration used for installs.
    pub registry: RegistryConfig,
    /// Whether discovered plugins are loaded right after install.
    pub auto_load: bool,
    /// Options passed to `application_did_launch`.
    pub launch_options: LaunchOptions,
    /// Metrics configuration. Metrics are disabled when unset.
    #[cfg(feature = "metrics-prometheus")]
    pub metrics: Option<MetricsConfig>,
}

impl RuntimeConfig {
    /// Create a new runtime configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registry configuration.
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Enable auto-load after install.
    pub fn with_auto_load(mut self, auto: bool) -> Self {
        self.auto_load = auto;
        self
    }

    /// Add a launch option.
    pub fn with_launch_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.launch_options.insert(key.into(), value.into());
        self
    }

    /// Enable metrics collection.
    #[cfg(feature = "metrics-prometheus")]
    pub fn with_metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Drives discovery, install, load and unload for a set of plugin types.
///
/// The runtime keeps its own [`TypeRegistry`] of the types it manages, while
/// instances live in the process-wide registries.
pub struct PluginRuntime {
    config: RuntimeConfig,
    types: TypeRegistry,
    hooks: Arc<RwLock<LifecycleHooks>>,
    #[cfg(feature = "metrics-prometheus")]
    metrics: Option<PluginMetrics>,
}

impl PluginRuntime {
    /// Create a new plugin runtime.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        #[cfg(feature = "metrics-prometheus")]
        let metrics = config
            .metrics
            .clone()
            .map(PluginMetrics::new)
            .transpose()?;

        Ok(Self {
            config,
            types: TypeRegistry::new(),
            hooks: Arc::new(RwLock::new(LifecycleHooks::new())),
            #[cfg(feature = "metrics-prometheus")]
            metrics,
        })
    }

    /// Create with default configuration.
    pub fn default_config() -> Result<Self> {
        Self::new(RuntimeConfig::default())
    }

    /// Get the runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Plugin types managed by this runtime.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Get the metrics collector, if enabled.
    #[cfg(feature = "metrics-prometheus")]
    pub fn metrics(&self) -> Option<&PluginMetrics> {
        self.metrics.as_ref()
    }

    /// Add a lifecycle event handler.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.hooks.write().on_event(handler);
    }

    /// Manage `P` with this runtime. Returns false if it was already managed.
    pub fn register<P: PluginType>(&self) -> bool {
        TypeRegistry::global().register::<P>();
        self.types.register::<P>()
    }

    /// The process-wide registry for `P`, using the runtime's registry configuration.
    pub fn registry<P: PluginType>(&self) -> PluginRegistry<P> {
        self.register::<P>();
        PluginRegistry::with_config(self.config.registry.clone())
    }

    /// Run `P`'s discovery and notify each produced plugin's delegate once.
    pub fn discover<P: PluginType>(&self, ctx: &DiscoveryContext) -> Result<Vec<PluginHandle<P>>> {
        self.register::<P>();

        let plugins = P::discover(ctx).map_err(|e| self.failed("<discovery>", P::type_name(), e))?;

        let mut handles = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let handle = PluginHandle::new(plugin);
            let plugin = handle.plugin();
            plugin
                .delegate()
                .plugin_did_discover(plugin)
                .map_err(|e| self.failed(handle.name(), handle.kind(), e))?;

            tracing::debug!(plugin = %handle.name(), kind = handle.kind(), "plugin discovered");
            self.emit(handle.name(), handle.kind(), LifecycleAction::Discovered);
            handles.push(handle);
        }

        Ok(handles)
    }

    /// Install a plugin into its type's process-wide registry.
    pub fn install<P: PluginType>(&self, handle: &PluginHandle<P>) -> Result<()> {
        handle
            .install(&self.registry::<P>())
            .map_err(|e| self.failed(handle.name(), handle.kind(), e))?;

        self.emit(handle.name(), handle.kind(), LifecycleAction::Installed);
        #[cfg(feature = "metrics-prometheus")]
        self.record(|m| m.record(handle.kind(), Transition::Install));

        Ok(())
    }

    /// Load a plugin.
    pub fn load<P: AsPlugin + ?Sized>(&self, handle: &PluginHandle<P>) -> Result<()> {
        #[cfg(feature = "metrics-prometheus")]
        let start = Instant::now();
        handle
            .load()
            .map_err(|e| self.failed(handle.name(), handle.kind(), e))?;

        self.emit(handle.name(), handle.kind(), LifecycleAction::Loaded);
        #[cfg(feature = "metrics-prometheus")]
        self.record(|m| m.record_load(handle.kind(), start.elapsed().as_secs_f64()));

        Ok(())
    }

    /// Unload a plugin. Plugins that are not loaded are left alone.
    pub fn unload<P: AsPlugin + ?Sized>(&self, handle: &PluginHandle<P>) -> Result<()> {
        let was_loaded = handle.state().can_unload();
        handle
            .unload()
            .map_err(|e| self.failed(handle.name(), handle.kind(), e))?;

        if was_loaded {
            self.emit(handle.name(), handle.kind(), LifecycleAction::Unloaded);
            #[cfg(feature = "metrics-prometheus")]
            self.record(|m| m.record(handle.kind(), Transition::Unload));
        }

        Ok(())
    }

    /// Discover, install and (with `auto_load`) load every plugin of type `P`.
    pub fn discover_and_install<P: PluginType>(
        &self,
        ctx: &DiscoveryContext,
    ) -> Result<Vec<PluginHandle<P>>> {
        let handles = self.discover::<P>(ctx)?;

        for handle in &handles {
            self.install(handle)?;
            if self.config.auto_load {
                self.load(handle)?;
            }
        }

        tracing::info!(
            kind = P::type_name(),
            count = handles.len(),
            "plugins discovered and installed"
        );
        Ok(handles)
    }

    /// Notify every installed plugin that the application launched.
    pub fn launch(&self) -> Result<()> {
        self.launch_with(&self.config.launch_options)
    }

    /// Notify every installed plugin that the application launched, with explicit options.
    pub fn launch_with(&self, options: &LaunchOptions) -> Result<()> {
        let installed = self.installed();
        for handle in &installed {
            let plugin = handle.as_plugin();
            plugin
                .delegate()
                .application_did_launch(plugin, options)
                .map_err(|e| self.failed(handle.name(), handle.kind(), e))?;
        }

        tracing::info!(plugins = installed.len(), "application launched");
        Ok(())
    }

    /// The current instance across managed types, in registration order.
    pub fn current(&self) -> Option<DynPluginHandle> {
        self.types.current()
    }

    /// Every installed instance of every managed type.
    pub fn installed(&self) -> Vec<DynPluginHandle> {
        self.types.installed()
    }

    /// Aggregated statistics over managed types.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for handle in self.installed() {
            stats.record(handle.state());
        }
        stats
    }

    /// Unload every loaded plugin of every managed type.
    pub fn unload_all(&self) -> Vec<Result<()>> {
        self.installed()
            .iter()
            .filter(|h| h.state().can_unload())
            .map(|h| self.unload(h))
            .collect()
    }

    fn failed(&self, name: &str, kind: &'static str, err: Error) -> Error {
        tracing::error!(plugin = name, kind, error = %err, "plugin lifecycle transition failed");
        self.emit(
            name,
            kind,
            LifecycleAction::Failed {
                message: err.to_string(),
            },
        );
        #[cfg(feature = "metrics-prometheus")]
        self.record(|m| m.record_failure(kind));
        err
    }

    // Handlers run on a snapshot so they may register further handlers.
    fn emit(&self, name: &str, kind: &'static str, action: LifecycleAction) {
        let hooks = self.hooks.read().clone();
        hooks.emit(name, kind, action);
    }

    #[cfg(feature = "metrics-prometheus")]
    fn record(&self, f: impl FnOnce(&PluginMetrics)) {
        if let Some(ref metrics) = self.metrics {
            f(metrics);
        }
    }
}

impl std::fmt::Debug for PluginRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("config", &self.config)
            .field("types", &self.types.names())
            .finish()
    }
}
