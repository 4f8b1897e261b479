//! [`SystemWatcher`] – CPU and memory utilisation snapshots.
//!
//! Each cycle samples global CPU usage (two refreshes spaced by sysinfo's
//! minimum update interval, so the first reading is not zero) and memory
//! usage, and returns them as a small pretty-printed JSON object for the
//! analyzer to reason about.

use async_trait::async_trait;
use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, System};
use tracing::debug;
use vigil_types::{CollectedData, VigilError, WatcherSpec};

use crate::contract::Watcher;

/// Watches host-level system statistics.
pub struct SystemWatcher {
    name: String,
}

impl SystemWatcher {
    pub fn new(spec: &WatcherSpec) -> Self {
        Self {
            name: spec.name.clone(),
        }
    }

    /// Take one CPU + memory sample.
    async fn sample(&self) -> (f32, f64) {
        let mut sys = System::new();
        // CPU usage is a delta between two refreshes.
        sys.refresh_cpu_usage();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu_percent = sys.global_cpu_usage();
        let memory_percent = if sys.total_memory() == 0 {
            0.0
        } else {
            sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
        };
        (cpu_percent, memory_percent)
    }
}

#[async_trait]
impl Watcher for SystemWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn watch(&self) -> Result<Option<CollectedData>, VigilError> {
        let (cpu_percent, memory_percent) = self.sample().await;
        debug!(watcher = %self.name, cpu_percent, memory_percent, "system sample taken");

        let snapshot = serde_json::json!({
            "cpu_percent": cpu_percent,
            "memory_percent": memory_percent,
        });
        let text = serde_json::to_string_pretty(&snapshot).map_err(|e| {
            VigilError::Collection {
                watcher: self.name.clone(),
                details: format!("failed to serialise sample: {e}"),
            }
        })?;

        Ok(Some(CollectedData::Text(text)))
    }
}
