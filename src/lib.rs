//! # plugin-registry
//!
//! Runtime plugin registry and lifecycle coordinator.
//!
//! This crate provides:
//! - **Scoped Stores** - Process-wide, ordered name → value namespaces keyed by scope
//! - **Plugin Registries** - Installed instances of each plugin type, looked up by name
//! - **Type Registry** - Explicit registration of plugin types and polymorphic "current instance" lookup
//! - **Lifecycle Management** - Install, load and unload with delegate callbacks
//! - **Service Scopes** - A private service namespace for every plugin instance
//! - **Discovery** - Manifest-driven construction of plugin instances
//!
//! ## Quick Start
//!
//! ```rust
//! use plugin_registry::{Plugin, PluginHandle, PluginRegistry, PluginType};
//!
//! struct Greeter {
//!     name: String,
//! }
//!
//! impl Plugin for Greeter {
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//! }
//!
//! impl PluginType for Greeter {}
//!
//! let registry = PluginRegistry::<Greeter>::standard();
//! let greeter = PluginHandle::new(Greeter { name: "hello".into() });
//! greeter.install(&registry)?;
//! greeter.load()?;
//!
//! assert!(registry.plugin("hello")?.ptr_eq(&greeter));
//! # Ok::<(), plugin_registry::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Manifest parsing and directory scanning
//! - `metrics-prometheus`: Prometheus metrics integration

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod delegate;
mod discovery;
mod error;
mod lifecycle;
mod manifest;
mod plugin;
mod registry;
mod runtime;
mod services;
mod store;
mod types;

#[cfg(feature = "metrics-prometheus")]
mod metrics;

pub use delegate::{Delegate, LaunchOptions, NoopDelegate};
pub use discovery::DiscoveryContext;
pub use error::{Error, Result};
pub use lifecycle::{LifecycleAction, LifecycleEvent, LifecycleHooks, LifecycleState};
pub use manifest::{ManifestBuilder, PluginManifest};
pub use plugin::{AsPlugin, DynPluginHandle, Metadata, Parameters, Plugin, PluginHandle, PluginType};
pub use registry::{PluginRegistry, RegistryConfig, RegistryStats};
pub use runtime::{PluginRuntime, RuntimeConfig};
pub use services::ServiceScope;
pub use store::{ScopedStore, ScopedStoreManager, StoreValue};
pub use types::{PluginTypeEntry, TypeRegistry};

#[cfg(feature = "metrics-prometheus")]
pub use metrics::{MetricsConfig, PluginMetrics, Transition};

/// Crate version for compatibility checks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
