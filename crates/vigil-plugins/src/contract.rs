//! The three capability contracts the runtime is built around.
//!
//! Data flows one way per cycle: a [`Watcher`] produces an observation, the
//! [`Analyzer`] turns it into text, every [`Action`] consumes that text.
//! All three are object-safe async traits so the orchestrator can hold
//! heterogeneous plugins behind `Arc<dyn _>` without knowing their types.

use async_trait::async_trait;
use vigil_types::{CollectedData, VigilError};

/// A component that produces one unit of observation data on demand.
///
/// # Contract
///
/// * `Ok(None)` is a valid, non-error outcome meaning "nothing collected
///   this cycle" – the orchestrator skips analysis and actions for it.
/// * Implementations choose their own fault policy: swallow-and-log
///   internally and return `Ok(None)`, or return `Err` and let the
///   orchestrator log it at the tick boundary.  Both are tolerated.
/// * `watch` is expected to complete well within the owning loop's
///   interval; ticks never overlap.
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Stable identifier, used in log lines and loop names.
    fn name(&self) -> &str;

    /// Produce one observation, or `None` when there is nothing to report.
    async fn watch(&self) -> Result<Option<CollectedData>, VigilError>;
}

impl std::fmt::Debug for dyn Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher").field("name", &self.name()).finish()
    }
}

/// A component that performs a side effect with a piece of analysis text.
///
/// Infallible at the boundary: implementations swallow and log their own
/// failures so one faulted action never blocks the rest of the action list.
#[async_trait]
pub trait Action: Send + Sync {
    /// Stable identifier, used in log lines.
    fn name(&self) -> &str;

    /// Consume one analysis result.
    async fn execute(&self, text: &str);
}

/// A component that transforms (observation, prompt) into model text.
///
/// Always returns a string: remote request/response failures are encoded
/// as descriptive error text rather than failing the calling cycle, so the
/// orchestrator always has something to hand to the actions.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, data: &CollectedData, prompt: &str) -> String;
}
