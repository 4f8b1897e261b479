//! [`PluginRegistry`] – static plugin resolution.
//!
//! The configuration file declares plugins by name; the registry maps each
//! declared name to a factory function compiled into the binary.  There is
//! no runtime code loading: the tables are populated once at process start
//! and resolution is a pure lookup.
//!
//! Declared names are canonicalised before lookup by stripping the
//! conventional `_watcher` / `_action` suffix, so `"screen"` and
//! `"screen_watcher"` resolve the same factory.  An unknown name returns
//! [`RegistryError::NotFound`]; the caller logs it and drops that spec,
//! continuing with the rest of the configuration.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use vigil_types::{ActionSpec, WatcherSpec};

use crate::console::ConsoleAction;
use crate::contract::{Action, Watcher};
use crate::screen::ScreenWatcher;
use crate::system::SystemWatcher;

/// Errors arising from plugin resolution.  Both variants are recoverable:
/// the offending spec is dropped and the daemon continues.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no {kind} plugin registered under '{key}'")]
    NotFound { kind: &'static str, key: String },

    #[error("failed to construct {kind} '{key}': {details}")]
    Construction {
        kind: &'static str,
        key: String,
        details: String,
    },
}

/// Factory signature for watchers.  Construction may fail (e.g. a capture
/// backend is unavailable); the error is handled like an unknown name.
pub type WatcherFactory = fn(&WatcherSpec) -> Result<Arc<dyn Watcher>, RegistryError>;

/// Factory signature for actions.
pub type ActionFactory = fn(&ActionSpec) -> Result<Arc<dyn Action>, RegistryError>;

/// Static name→factory tables for watchers and actions.
///
/// Construct with [`PluginRegistry::with_builtins`] for the compiled-in
/// plugin set, or [`PluginRegistry::new`] plus `register_*` calls to build
/// a custom table (tests do this with mock factories).
#[derive(Default)]
pub struct PluginRegistry {
    watchers: HashMap<&'static str, WatcherFactory>,
    actions: HashMap<&'static str, ActionFactory>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in plugins:
    /// watchers `screen` and `system`, action `console`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_watcher("screen", |spec| Ok(Arc::new(ScreenWatcher::new(spec))));
        registry.register_watcher("system", |spec| Ok(Arc::new(SystemWatcher::new(spec))));
        registry.register_action("console", |spec| Ok(Arc::new(ConsoleAction::new(spec))));
        registry
    }

    /// Register a watcher factory under `key`.  A previously registered
    /// factory with the same key is replaced.
    pub fn register_watcher(&mut self, key: &'static str, factory: WatcherFactory) {
        self.watchers.insert(key, factory);
    }

    /// Register an action factory under `key`.  A previously registered
    /// factory with the same key is replaced.
    pub fn register_action(&mut self, key: &'static str, factory: ActionFactory) {
        self.actions.insert(key, factory);
    }

    /// Resolve `spec` to a constructed watcher instance.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when no factory is registered under the
    /// canonical form of `spec.name`, or [`RegistryError::Construction`]
    /// when the factory itself fails.
    pub fn resolve_watcher(&self, spec: &WatcherSpec) -> Result<Arc<dyn Watcher>, RegistryError> {
        let key = canonical(&spec.name, "_watcher");
        match self.watchers.get(key) {
            Some(factory) => factory(spec),
            None => Err(RegistryError::NotFound {
                kind: "watcher",
                key: key.to_string(),
            }),
        }
    }

    /// Resolve `spec` to a constructed action instance.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`PluginRegistry::resolve_watcher`].
    pub fn resolve_action(&self, spec: &ActionSpec) -> Result<Arc<dyn Action>, RegistryError> {
        let key = canonical(&spec.name, "_action");
        match self.actions.get(key) {
            Some(factory) => factory(spec),
            None => Err(RegistryError::NotFound {
                kind: "action",
                key: key.to_string(),
            }),
        }
    }
}

/// Strip the conventional kind suffix from a declared plugin name.
fn canonical<'a>(name: &'a str, suffix: &str) -> &'a str {
    name.strip_suffix(suffix).unwrap_or(name)
}
