//! Error types for plugin registry operations.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during plugin registration and lifecycle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No plugin with the requested name is installed for a plugin type.
    #[error("no plugin named `{name}` is installed for plugin type `{kind}`")]
    NotFound {
        /// Qualified name of the plugin type.
        kind: String,
        /// Requested plugin name.
        name: String,
    },

    /// Key absent from a scoped store.
    #[error("key `{key}` not found in scope `{scope}`")]
    KeyNotFound {
        /// Scope identifier.
        scope: String,
        /// Requested key.
        key: String,
    },

    /// Stored value has a different type than requested.
    #[error("value `{key}` in scope `{scope}` is not a `{expected}`")]
    TypeMismatch {
        /// Scope identifier.
        scope: String,
        /// Requested key.
        key: String,
        /// Requested type name.
        expected: &'static str,
    },

    /// Another instance already owns the name in this plugin type's scope.
    #[error("plugin `{name}` is already installed for plugin type `{kind}`")]
    AlreadyInstalled {
        /// Qualified name of the plugin type.
        kind: String,
        /// Conflicting plugin name.
        name: String,
    },

    /// A plugin type never supplied a required capability.
    #[error("plugin type `{kind}` does not implement `{capability}`")]
    NotImplemented {
        /// Qualified name of the plugin type.
        kind: String,
        /// Name of the missing capability.
        capability: &'static str,
    },

    /// A start-up or shutdown hook failed.
    #[error("plugin `{plugin}` failed lifecycle transition: {reason}")]
    TransitionFailed {
        /// Plugin name.
        plugin: String,
        /// Failure reason reported by the hook.
        reason: String,
    },

    /// Plugin is in the wrong lifecycle state for the operation.
    #[error("invalid plugin state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state.
        expected: String,
        /// Actual state.
        actual: String,
    },

    /// Invalid manifest.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Missing required field in manifest.
    #[error("missing required manifest field: {0}")]
    MissingManifestField(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest parse error.
    #[cfg(feature = "serde")]
    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    /// Metrics registration error.
    #[cfg(feature = "metrics-prometheus")]
    #[error("metrics error: {0}")]
    Metrics(String),
}

impl Error {
    /// Create a plugin not found error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a scoped store key not found error.
    pub fn key_not_found(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self::KeyNotFound {
            scope: scope.into(),
            key: key.into(),
        }
    }

    /// Create an already installed error.
    pub fn already_installed(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyInstalled {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a not implemented error.
    pub fn not_implemented(kind: impl Into<String>, capability: &'static str) -> Self {
        Self::NotImplemented {
            kind: kind.into(),
            capability,
        }
    }

    /// Create a transition failed error.
    pub fn transition_failed(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransitionFailed {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid manifest error.
    pub fn invalid_manifest(msg: impl Into<String>) -> Self {
        Self::InvalidManifest(msg.into())
    }

    /// Create a missing manifest field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingManifestField(field.into())
    }

    /// Returns true if the caller can reasonably recover (e.g. by trying another name).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::KeyNotFound { .. }
                | Self::AlreadyInstalled { .. }
                | Self::InvalidState { .. }
        )
    }

    /// Returns true if this error points at a plugin type that is wired up incorrectly.
    ///
    /// These should be fixed at integration time rather than handled at runtime.
    pub fn is_integration_defect(&self) -> bool {
        matches!(self, Self::NotImplemented { .. } | Self::TypeMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("app::Echo", "missing");
        let msg = err.to_string();
        assert!(msg.contains("app::Echo"));
        assert!(msg.contains("missing"));

        let err = Error::not_implemented("app::Echo", "discover");
        assert_eq!(
            err.to_string(),
            "plugin type `app::Echo` does not implement `discover`"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::not_found("k", "n").is_recoverable());
        assert!(Error::already_installed("k", "n").is_recoverable());
        assert!(!Error::transition_failed("n", "boom").is_recoverable());

        assert!(Error::not_implemented("k", "discover").is_integration_defect());
        assert!(!Error::not_found("k", "n").is_integration_defect());
    }
}
