//! Plugin lifecycle states and the events observed by runtime handlers.

use std::sync::Arc;
use std::time::Instant;

/// Where a plugin instance is in its lifecycle.
///
/// Transitions only move forward: `Uninstalled → Installed → Loaded → Unloaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Constructed but not stored in a registry.
    #[default]
    Uninstalled,
    /// Stored in its type's registry.
    Installed,
    /// Start-up hook has run.
    Loaded,
    /// Shutdown hook has run. Terminal.
    Unloaded,
}

impl LifecycleState {
    /// Check if a registry may take the plugin.
    pub fn can_install(&self) -> bool {
        *self == Self::Uninstalled
    }

    /// Check if the plugin can be loaded.
    pub fn can_load(&self) -> bool {
        *self == Self::Installed
    }

    /// Check if the plugin can be unloaded.
    pub fn can_unload(&self) -> bool {
        *self == Self::Loaded
    }

    /// Check if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        *self == Self::Unloaded
    }

    /// Lowercase name, as used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninstalled => "uninstalled",
            Self::Installed => "installed",
            Self::Loaded => "loaded",
            Self::Unloaded => "unloaded",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Produced by its type's discovery.
    Discovered,
    /// Stored in a registry.
    Installed,
    /// Started.
    Loaded,
    /// Shut down.
    Unloaded,
    /// A transition was attempted and returned an error.
    Failed {
        /// Rendered error.
        message: String,
    },
}

impl LifecycleAction {
    /// Short name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Installed => "installed",
            Self::Loaded => "loaded",
            Self::Unloaded => "unloaded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A lifecycle notification delivered to runtime handlers.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    /// Plugin instance name.
    pub name: String,
    /// Qualified name of the plugin's type.
    pub kind: &'static str,
    /// What happened.
    pub action: LifecycleAction,
    /// When the runtime observed it.
    pub at: Instant,
}

impl LifecycleEvent {
    /// Stamp a new event with the current time.
    pub fn new(name: impl Into<String>, kind: &'static str, action: LifecycleAction) -> Self {
        Self {
            name: name.into(),
            kind,
            action,
            at: Instant::now(),
        }
    }

    /// Get the plugin name.
    pub fn plugin_name(&self) -> &str {
        &self.name
    }

    /// Get the plugin type name.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Get the event timestamp.
    pub fn timestamp(&self) -> Instant {
        self.at
    }

    /// Get the event name.
    pub fn event_name(&self) -> &'static str {
        self.action.as_str()
    }

    /// The error message of a failure event.
    pub fn failure(&self) -> Option<&str> {
        match &self.action {
            LifecycleAction::Failed { message } => Some(message),
            _ => None,
        }
    }
}

type Handler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Handlers called, in registration order, for every lifecycle event.
///
/// Clones share the handlers registered so far.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    handlers: Vec<Handler>,
}

impl LifecycleHooks {
    /// Create an empty handler list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lifecycle event handler.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// Build an event and hand it to every handler.
    ///
    /// Nothing is allocated when no handler is registered.
    pub fn emit(&self, name: &str, kind: &'static str, action: LifecycleAction) {
        if self.handlers.is_empty() {
            return;
        }

        let event = LifecycleEvent::new(name, kind, action);
        for handler in &self.handlers {
            handler(&event);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    #[test]
    fn test_states_only_move_forward() {
        assert_eq!(LifecycleState::default(), LifecycleState::Uninstalled);

        assert!(LifecycleState::Uninstalled.can_install());
        assert!(!LifecycleState::Installed.can_install());
        assert!(!LifecycleState::Unloaded.can_install());

        assert!(LifecycleState::Installed.can_load());
        assert!(!LifecycleState::Uninstalled.can_load());
        assert!(!LifecycleState::Unloaded.can_load());

        assert!(LifecycleState::Loaded.can_unload());
        assert!(!LifecycleState::Installed.can_unload());

        assert!(LifecycleState::Unloaded.is_terminal());
        assert!(!LifecycleState::Loaded.is_terminal());
        assert_eq!(LifecycleState::Loaded.to_string(), "loaded");
    }

    #[test]
    fn test_hooks_see_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut hooks = LifecycleHooks::new();
        hooks.on_event(move |event| {
            sink.lock()
                .push(format!("{}:{}", event.event_name(), event.plugin_name()));
        });

        hooks.emit("echo", "app::Echo", LifecycleAction::Installed);
        hooks.emit("echo", "app::Echo", LifecycleAction::Loaded);
        hooks.emit("echo", "app::Echo", LifecycleAction::Unloaded);

        assert_eq!(
            *seen.lock(),
            vec!["installed:echo", "loaded:echo", "unloaded:echo"]
        );
    }

    #[test]
    fn test_failure_carries_message() {
        let event = LifecycleEvent::new(
            "echo",
            "app::Echo",
            LifecycleAction::Failed {
                message: "port in use".into(),
            },
        );

        assert_eq!(event.kind(), "app::Echo");
        assert_eq!(event.event_name(), "failed");
        assert_eq!(event.failure(), Some("port in use"));
        assert_eq!(
            LifecycleEvent::new("echo", "app::Echo", LifecycleAction::Loaded).failure(),
            None
        );
    }
}
