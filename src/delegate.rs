//! Delegate callbacks for plugin lifecycle transitions.

use std::collections::HashMap;

use crate::error::Result;
use crate::plugin::Plugin;

/// Options passed to [`Delegate::application_did_launch`].
pub type LaunchOptions = HashMap<String, String>;

/// Observer notified at each lifecycle transition.
///
/// Every hook defaults to a no-op, so implementors override only what they
/// need. A hook returning an error aborts the transition that called it and
/// the error reaches the caller unchanged.
pub trait Delegate: Send + Sync {
    /// The host application finished launching.
    fn application_did_launch(&self, plugin: &dyn Plugin, options: &LaunchOptions) -> Result<()> {
        let _ = (plugin, options);
        Ok(())
    }

    /// The plugin was written into its registry.
    fn plugin_did_install(&self, plugin: &dyn Plugin) -> Result<()> {
        let _ = plugin;
        Ok(())
    }

    /// The plugin was produced by discovery.
    fn plugin_did_discover(&self, plugin: &dyn Plugin) -> Result<()> {
        let _ = plugin;
        Ok(())
    }

    /// The plugin's start-up hook completed.
    fn plugin_did_load(&self, plugin: &dyn Plugin) -> Result<()> {
        let _ = plugin;
        Ok(())
    }

    /// The plugin's shutdown hook completed.
    fn plugin_did_unload(&self, plugin: &dyn Plugin) -> Result<()> {
        let _ = plugin;
        Ok(())
    }
}

/// Delegate used when a plugin supplies none.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelegate;

impl Delegate for NoopDelegate {}
