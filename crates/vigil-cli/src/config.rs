//! Configuration loading – reads and validates `vigil.toml`.
//!
//! Configuration is the one place where a hard failure is correct: without
//! a valid file there is nothing meaningful to run, so every error from
//! here aborts startup with a non-zero exit.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use vigil_types::{ActionSpec, WatcherSpec};

/// Default config file, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "vigil.toml";

/// Fatal configuration faults.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Connection details for the analysis backend.  Both fields are required;
/// a config that omits them does not load.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the Ollama instance.
    pub host: String,
    /// Model name, e.g. `"llava"`.
    pub model: String,
}

/// The parsed configuration document.
///
/// All four top-level sections (`backend`, `watchers`, `actions`) are
/// required keys; an empty `watchers = []` list is valid and leads to the
/// "no active watchers" clean exit, but a missing key is a schema error.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub watchers: Vec<WatcherSpec>,
    pub actions: Vec<ActionSpec>,
}

impl Config {
    /// Schema validation beyond what serde enforces.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a zero interval, an empty name, or a
    /// duplicated name within either list.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_watchers = std::collections::HashSet::new();
        for w in &self.watchers {
            if w.name.is_empty() {
                return Err(ConfigError::Invalid("watcher with empty name".to_string()));
            }
            if w.interval == 0 {
                return Err(ConfigError::Invalid(format!(
                    "watcher '{}': interval must be >= 1",
                    w.name
                )));
            }
            if !seen_watchers.insert(&w.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate watcher name '{}'",
                    w.name
                )));
            }
        }

        let mut seen_actions = std::collections::HashSet::new();
        for a in &self.actions {
            if a.name.is_empty() {
                return Err(ConfigError::Invalid("action with empty name".to_string()));
            }
            if !seen_actions.insert(&a.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate action name '{}'",
                    a.name
                )));
            }
        }

        Ok(())
    }
}

/// Load, validate, and apply env overrides to the config at `path`.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut cfg: Config = toml::from_str(&raw)?;
    cfg.validate()?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `VIGIL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `VIGIL_OLLAMA_URL` | `backend.host` |
/// | `VIGIL_MODEL` | `backend.model` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(
        cfg,
        std::env::var("VIGIL_OLLAMA_URL").ok(),
        std::env::var("VIGIL_MODEL").ok(),
    );
}

/// Apply override values to `cfg`.  Separated from the env lookup so
/// tests can exercise it without touching process-global state.
fn apply_overrides(cfg: &mut Config, host: Option<String>, model: Option<String>) {
    if let Some(v) = host {
        cfg.backend.host = v;
    }
    if let Some(v) = model {
        cfg.backend.model = v;
    }
}
