//! [`ScreenWatcher`] – screenshot capture via an external command.
//!
//! The daemon never links a display stack.  Each cycle the watcher runs a
//! capture command that writes a PNG to stdout (`grim -` on wlroots
//! compositors, `scrot -` or similar elsewhere), base64-encodes the bytes,
//! and hands them to the analyzer as [`CollectedData::Image`].
//!
//! The command is taken from the `VIGIL_CAPTURE_CMD` environment variable
//! at construction time (whitespace-split, first token is the program),
//! falling back to `grim -`.
//!
//! Fault policy: capture failures are swallowed and logged – the watcher
//! returns `Ok(None)` so the cycle is skipped rather than failed.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::process::Command;
use tracing::{debug, warn};
use vigil_types::{CollectedData, VigilError, WatcherSpec};

use crate::contract::Watcher;

/// Default capture command: `grim -` writes a PNG of the full output to
/// stdout.
const DEFAULT_CAPTURE_CMD: &str = "grim -";

/// Watches the screen by taking one screenshot per cycle.
pub struct ScreenWatcher {
    name: String,
    /// Capture command, whitespace-split; first token is the program.
    command: Vec<String>,
}

impl ScreenWatcher {
    /// Build a screen watcher for `spec`, reading the capture command from
    /// `VIGIL_CAPTURE_CMD` (default [`DEFAULT_CAPTURE_CMD`]).
    pub fn new(spec: &WatcherSpec) -> Self {
        let raw = std::env::var("VIGIL_CAPTURE_CMD")
            .unwrap_or_else(|_| DEFAULT_CAPTURE_CMD.to_string());
        Self::with_command(spec, &raw)
    }

    /// Build a screen watcher with an explicit capture command line.
    pub fn with_command(spec: &WatcherSpec, command_line: &str) -> Self {
        let command: Vec<String> = command_line
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Self {
            name: spec.name.clone(),
            command,
        }
    }

    /// Run the capture command and return the raw PNG bytes from stdout.
    async fn capture(&self) -> Result<Vec<u8>, VigilError> {
        let (program, args) = self.command.split_first().ok_or_else(|| {
            VigilError::Collection {
                watcher: self.name.clone(),
                details: "empty capture command".to_string(),
            }
        })?;

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| VigilError::Collection {
                watcher: self.name.clone(),
                details: format!("failed to spawn '{program}': {e}"),
            })?;

        if !output.status.success() {
            return Err(VigilError::Collection {
                watcher: self.name.clone(),
                details: format!(
                    "capture command '{program}' exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Watcher for ScreenWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn watch(&self) -> Result<Option<CollectedData>, VigilError> {
        match self.capture().await {
            Ok(png) if png.is_empty() => {
                warn!(watcher = %self.name, "capture command produced no output");
                Ok(None)
            }
            Ok(png) => {
                let encoded = BASE64.encode(&png);
                debug!(watcher = %self.name, bytes = png.len(), "screenshot captured");
                Ok(Some(CollectedData::Image(encoded)))
            }
            Err(e) => {
                warn!(watcher = %self.name, error = %e, "screenshot capture failed; skipping cycle");
                Ok(None)
            }
        }
    }
}
