//! Declarative plugin metadata.
//!
//! A manifest describes one plugin instance for discovery: which plugin type
//! should build it, under what name, and with which raw metadata. The
//! metadata is handed to [`PluginType::construct_parameters`] unchanged.
//!
//! [`PluginType::construct_parameters`]: crate::PluginType::construct_parameters

use std::collections::HashMap;
#[cfg(feature = "serde")]
use std::path::Path;

use crate::error::{Error, Result};
use crate::plugin::Metadata;

#[cfg(feature = "serde")]
fn default_enabled() -> bool {
    true
}

/// Metadata for one discoverable plugin instance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PluginManifest {
    /// Plugin instance name.
    pub name: String,

    /// Plugin type that builds this instance.
    pub kind: String,

    /// Plugin version.
    #[cfg_attr(feature = "serde", serde(default))]
    pub version: Option<String>,

    /// Human-readable description.
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,

    /// Disabled manifests are skipped by discovery.
    #[cfg_attr(feature = "serde", serde(default = "default_enabled"))]
    pub enabled: bool,

    /// Custom metadata.
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: HashMap<String, String>,
}

impl PluginManifest {
    /// Create a new manifest with required fields.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            version: None,
            description: None,
            enabled: true,
            metadata: HashMap::new(),
        }
    }

    /// Load manifest from a TOML file.
    #[cfg(feature = "serde")]
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse manifest from TOML string.
    #[cfg(feature = "serde")]
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ManifestParse(e.to_string()))
    }

    /// Parse manifest from JSON string.
    #[cfg(feature = "serde")]
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::ManifestParse(e.to_string()))
    }

    /// Serialize to TOML string.
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ManifestParse(e.to_string()))
    }

    /// Serialize to JSON string.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::ManifestParse(e.to_string()))
    }

    /// Validate the manifest.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::missing_field("name"));
        }

        if self.kind.is_empty() {
            return Err(Error::missing_field("kind"));
        }

        // Names become part of service scope identifiers.
        if self.name.contains('.') {
            return Err(Error::invalid_manifest(format!(
                "plugin name may not contain '.': {}",
                self.name
            )));
        }

        Ok(())
    }

    /// Flatten into the mapping handed to `construct_parameters`.
    ///
    /// Custom metadata comes first; `name`, `kind` and `version` override
    /// entries with the same key.
    pub fn info(&self) -> Metadata {
        let mut info = self.metadata.clone();
        info.insert("name".to_string(), self.name.clone());
        info.insert("kind".to_string(), self.kind.clone());
        if let Some(ref version) = self.version {
            info.insert("version".to_string(), version.clone());
        }
        info
    }
}

/// Builder for creating manifests.
pub struct ManifestBuilder {
    manifest: PluginManifest,
}

impl ManifestBuilder {
    /// Create a new manifest builder.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            manifest: PluginManifest::new(name, kind),
        }
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.manifest.version = Some(version.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.manifest.description = Some(desc.into());
        self
    }

    /// Enable or disable the manifest.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.manifest.enabled = enabled;
        self
    }

    /// Add metadata.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.manifest.metadata.insert(key.into(), value.into());
        self
    }

    /// Build and validate the manifest.
    pub fn build(self) -> Result<PluginManifest> {
        self.manifest.validate()?;
        Ok(self.manifest)
    }

    /// Build without validation.
    pub fn build_unchecked(self) -> PluginManifest {
        self.manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_builder() {
        let manifest = ManifestBuilder::new("echo-1", "app::Echo")
            .version("1.0.0")
            .description("Echoes input")
            .metadata("prefix", ">> ")
            .build()
            .unwrap();

        assert_eq!(manifest.name, "echo-1");
        assert_eq!(manifest.kind, "app::Echo");
        assert!(manifest.enabled);
        assert_eq!(manifest.metadata.get("prefix").map(String::as_str), Some(">> "));
    }

    #[test]
    fn test_manifest_validation() {
        assert!(matches!(
            PluginManifest::new("", "app::Echo").validate(),
            Err(Error::MissingManifestField(_))
        ));
        assert!(matches!(
            PluginManifest::new("echo", "").validate(),
            Err(Error::MissingManifestField(_))
        ));
        assert!(matches!(
            PluginManifest::new("echo.1", "app::Echo").validate(),
            Err(Error::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_manifest_info() {
        let manifest = ManifestBuilder::new("echo", "app::Echo")
            .version("2.1.0")
            .metadata("name", "shadowed")
            .metadata("prefix", "#")
            .build_unchecked();

        let info = manifest.info();
        assert_eq!(info["name"], "echo");
        assert_eq!(info["kind"], "app::Echo");
        assert_eq!(info["version"], "2.1.0");
        assert_eq!(info["prefix"], "#");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_manifest_toml() {
        let toml = r#"
name = "echo-1"
kind = "app::Echo"
version = "1.0.0"

[metadata]
prefix = ">> "
"#;

        let manifest = PluginManifest::from_toml(toml).unwrap();
        assert_eq!(manifest.name, "echo-1");
        assert!(manifest.enabled);
        assert_eq!(manifest.metadata["prefix"], ">> ");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_manifest_parse_error() {
        let result = PluginManifest::from_toml("name = 3");
        assert!(matches!(result, Err(Error::ManifestParse(_))));
    }
}
