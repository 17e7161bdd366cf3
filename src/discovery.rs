//! Input handed to plugin discovery.

use std::collections::HashMap;
#[cfg(feature = "serde")]
use std::path::Path;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use crate::error::Result;
use crate::manifest::PluginManifest;

/// Manifests, search paths and free-form options available to
/// [`PluginType::discover`](crate::PluginType::discover).
#[derive(Debug, Clone, Default)]
pub struct DiscoveryContext {
    /// Known plugin manifests.
    pub manifests: Vec<PluginManifest>,
    /// Directories scanned for `*.toml` manifests.
    pub search_paths: Vec<PathBuf>,
    /// Free-form discovery options.
    pub options: HashMap<String, String>,
}

impl DiscoveryContext {
    /// Create an empty discovery context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a manifest.
    pub fn with_manifest(mut self, manifest: PluginManifest) -> Self {
        self.manifests.push(manifest);
        self
    }

    /// Add a directory to scan.
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    /// Set an option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Get an option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Enabled manifests declared for the given plugin type.
    pub fn manifests_for<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a PluginManifest> + 'a {
        self.manifests
            .iter()
            .filter(move |m| m.enabled && m.kind == kind)
    }

    /// Load manifests from every search path. Returns the number loaded.
    #[cfg(feature = "serde")]
    pub fn scan(&mut self) -> Result<usize> {
        let dirs = self.search_paths.clone();
        let mut loaded = 0;
        for dir in &dirs {
            if !dir.exists() {
                tracing::warn!("Plugin directory does not exist: {}", dir.display());
                continue;
            }
            loaded += self.load_dir(dir)?;
        }
        Ok(loaded)
    }

    /// Load every `*.toml` manifest in `dir`, in file name order.
    ///
    /// Invalid manifests are skipped with an error log rather than failing
    /// the whole directory.
    #[cfg(feature = "serde")]
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match PluginManifest::from_file(&path).and_then(|m| m.validate().map(|_| m)) {
                Ok(manifest) => {
                    tracing::debug!(
                        plugin = %manifest.name,
                        kind = %manifest.kind,
                        "Loaded manifest from {}",
                        path.display()
                    );
                    self.manifests.push(manifest);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to load manifest from {}: {}", path.display(), e);
                }
            }
        }

        Ok(loaded)
    }
}
