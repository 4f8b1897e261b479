//! [`Orchestrator`] – one independent timed loop per enabled watcher.
//!
//! Each loop runs as its own tokio task and drives the per-tick sequence
//!
//! `Idle → Collecting → Analyzing → Acting → Sleeping → Collecting → …`
//!
//! with `Stopping → Stopped` reachable from any state once the shutdown
//! flag is raised.  The current state of every loop is published on a
//! [`watch`] channel so the supervisor (and tests) can observe progress
//! without touching loop internals.
//!
//! # Failure isolation
//!
//! Any error escaping a tick is caught at the tick boundary, logged with
//! the watcher's name, and followed by the normal sleep – a watcher that
//! fails on every single call keeps retrying on its own interval forever.
//! Loops share only the read-only action list and the stateless analyzer,
//! so a failure or a slow analyzer call in one loop cannot block, delay,
//! or crash any other.
//!
//! # Shutdown
//!
//! [`Orchestrator::shutdown`] raises a shared [`AtomicBool`] once and then
//! awaits every loop's join handle.  The sleep phase is cut into slices of
//! [`OrchestratorConfig::poll_unit`] (one second in production) with the
//! flag checked between slices, so shutdown latency is bounded by one poll
//! unit regardless of how much sleep remains.  A second `shutdown` call
//! finds no handles left and is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;
use vigil_plugins::{Action, Analyzer, Watcher};
use vigil_types::{VigilError, WatcherSpec};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning knobs for the [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Granularity of the cancellable sleep: each watcher sleeps
    /// `interval` slices of this duration, checking the shutdown flag
    /// between slices.  One second in production; tests shrink it so
    /// multi-tick scenarios finish in milliseconds.
    pub poll_unit: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_unit: Duration::from_secs(1),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop state
// ─────────────────────────────────────────────────────────────────────────────

/// Observable state of a single watcher loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Loop task spawned, first tick not yet started.
    Idle,
    /// Calling the watcher's `watch()`.
    Collecting,
    /// Calling the analyzer with this cycle's data.
    Analyzing,
    /// Fanning the analysis text out to the action list.
    Acting,
    /// Waiting out the configured interval.
    Sleeping,
    /// Shutdown observed, finishing up.
    Stopping,
    /// Loop task exited.  Terminal.
    Stopped,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime pairing of a spawned watcher loop with its state channel.
struct LoopHandle {
    name: String,
    state_rx: watch::Receiver<LoopState>,
}

/// Owns every watcher loop and the shared shutdown signal.
///
/// Construct with [`Orchestrator::spawn`], which starts one tokio task per
/// watcher immediately.  Call [`Orchestrator::shutdown`] to stop them; it
/// returns only after every loop has reached [`LoopState::Stopped`].
pub struct Orchestrator {
    shutdown: Arc<AtomicBool>,
    /// Join handles, drained by the first `shutdown` call.
    joins: Mutex<Vec<JoinHandle<()>>>,
    loops: Vec<LoopHandle>,
}

impl Orchestrator {
    /// Spawn one loop per `(spec, watcher)` pair.
    ///
    /// `actions` and `analyzer` are shared read-only across all loops;
    /// each watcher instance is owned exclusively by its own loop.
    pub fn spawn(
        watchers: Vec<(WatcherSpec, Arc<dyn Watcher>)>,
        analyzer: Arc<dyn Analyzer>,
        actions: Arc<Vec<Arc<dyn Action>>>,
        config: OrchestratorConfig,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut joins = Vec::with_capacity(watchers.len());
        let mut loops = Vec::with_capacity(watchers.len());

        for (spec, watcher) in watchers {
            let (state_tx, state_rx) = watch::channel(LoopState::Idle);
            loops.push(LoopHandle {
                name: spec.name.clone(),
                state_rx,
            });
            info!(watcher = %spec.name, interval = spec.interval, "starting watcher loop");
            joins.push(tokio::spawn(watcher_loop(
                spec,
                watcher,
                Arc::clone(&analyzer),
                Arc::clone(&actions),
                Arc::clone(&shutdown),
                config.poll_unit,
                state_tx,
            )));
        }

        Self {
            shutdown,
            joins: Mutex::new(joins),
            loops,
        }
    }

    /// Number of running watcher loops.
    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Current state of the named loop, if it exists.
    pub fn loop_state(&self, name: &str) -> Option<LoopState> {
        self.loops
            .iter()
            .find(|l| l.name == name)
            .map(|l| *l.state_rx.borrow())
    }

    /// A fresh receiver for the named loop's state channel.
    pub fn state_rx(&self, name: &str) -> Option<watch::Receiver<LoopState>> {
        self.loops
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.state_rx.clone())
    }

    /// `true` once shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Broadcast the shutdown signal and wait for every loop to stop.
    ///
    /// Idempotent: the signal is a latch that is only ever raised, and the
    /// join handles are drained by the first caller, so a second call
    /// while (or after) one is in progress is a no-op.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);

        let handles: Vec<JoinHandle<()>> = self.joins.lock().await.drain(..).collect();
        if handles.is_empty() {
            return;
        }

        info!(loops = handles.len(), "shutdown requested; waiting for watcher loops");
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "watcher loop task failed to join");
            }
        }
        info!("all watcher loops stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// The per-watcher loop
// ─────────────────────────────────────────────────────────────────────────────

async fn watcher_loop(
    spec: WatcherSpec,
    watcher: Arc<dyn Watcher>,
    analyzer: Arc<dyn Analyzer>,
    actions: Arc<Vec<Arc<dyn Action>>>,
    shutdown: Arc<AtomicBool>,
    poll_unit: Duration,
    state_tx: watch::Sender<LoopState>,
) {
    while !shutdown.load(Ordering::Acquire) {
        let cycle = Uuid::new_v4();
        let span = info_span!("cycle", watcher = %spec.name, %cycle);

        // Any error escaping the tick is absorbed here; the loop always
        // proceeds to the sleep phase and retries on its own interval.
        if let Err(e) = run_tick(&spec, &watcher, &analyzer, &actions, &state_tx)
            .instrument(span)
            .await
        {
            error!(watcher = %spec.name, error = %e, "cycle failed");
        }

        let _ = state_tx.send(LoopState::Sleeping);
        for _ in 0..spec.interval {
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            tokio::time::sleep(poll_unit).await;
        }
    }

    let _ = state_tx.send(LoopState::Stopping);
    info!(watcher = %spec.name, "watcher loop exiting");
    let _ = state_tx.send(LoopState::Stopped);
}

/// One watch → analyze → act sequence.
async fn run_tick(
    spec: &WatcherSpec,
    watcher: &Arc<dyn Watcher>,
    analyzer: &Arc<dyn Analyzer>,
    actions: &Arc<Vec<Arc<dyn Action>>>,
    state_tx: &watch::Sender<LoopState>,
) -> Result<(), VigilError> {
    let _ = state_tx.send(LoopState::Collecting);
    let collected = watcher.watch().await?;

    let Some(data) = collected else {
        info!(watcher = %spec.name, "no data collected; skipping analysis");
        return Ok(());
    };

    let _ = state_tx.send(LoopState::Analyzing);
    info!(watcher = %spec.name, kind = data.kind(), bytes = data.len(), "analyzing collected data");
    let result = analyzer.analyze(&data, &spec.prompt).await;

    let _ = state_tx.send(LoopState::Acting);
    for action in actions.iter() {
        // Actions are infallible at the boundary (they swallow and log
        // their own faults), so every action in the list always runs.
        action.execute(&result).await;
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use vigil_types::CollectedData;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    /// Yields the scripted payloads in order, then `None` forever.
    struct ScriptedWatcher {
        name: String,
        script: StdMutex<VecDeque<Option<CollectedData>>>,
        calls: AtomicUsize,
    }

    impl ScriptedWatcher {
        fn new(name: &str, script: Vec<Option<&str>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                script: StdMutex::new(
                    script
                        .into_iter()
                        .map(|s| s.map(|t| CollectedData::Text(t.to_string())))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Watcher for ScriptedWatcher {
        fn name(&self) -> &str {
            &self.name
        }
        async fn watch(&self) -> Result<Option<CollectedData>, VigilError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.lock().unwrap().pop_front().flatten())
        }
    }

    /// Fails on every single call.
    struct FailingWatcher {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Watcher for FailingWatcher {
        fn name(&self) -> &str {
            "failing"
        }
        async fn watch(&self) -> Result<Option<CollectedData>, VigilError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(VigilError::Collection {
                watcher: "failing".to_string(),
                details: "simulated capture fault".to_string(),
            })
        }
    }

    /// Records every (data, prompt) pair and replies with a fixed string.
    struct MockAnalyzer {
        reply: String,
        calls: StdMutex<Vec<(CollectedData, String)>>,
    }

    impl MockAnalyzer {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: StdMutex::new(Vec::new()),
            })
        }
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Analyzer for MockAnalyzer {
        async fn analyze(&self, data: &CollectedData, prompt: &str) -> String {
            self.calls
                .lock()
                .unwrap()
                .push((data.clone(), prompt.to_string()));
            self.reply.clone()
        }
    }

    /// Counts calls and records received text.  `faulty` simulates an
    /// action whose internal work fails (swallowed per the contract).
    struct RecordingAction {
        name: String,
        faulty: bool,
        received: StdMutex<Vec<String>>,
    }

    impl RecordingAction {
        fn new(name: &str, faulty: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                faulty,
                received: StdMutex::new(Vec::new()),
            })
        }
        fn call_count(&self) -> usize {
            self.received.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Action for RecordingAction {
        fn name(&self) -> &str {
            &self.name
        }
        async fn execute(&self, text: &str) {
            self.received.lock().unwrap().push(text.to_string());
            if self.faulty {
                // The real implementations log the fault and return.
                tracing::warn!(action = %self.name, "simulated action fault (swallowed)");
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn spec(name: &str, interval: u64) -> WatcherSpec {
        WatcherSpec {
            name: name.to_string(),
            enabled: true,
            interval,
            prompt: "describe".to_string(),
        }
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            poll_unit: Duration::from_millis(5),
        }
    }

    /// Poll `condition` every 5 ms until it holds or ~2 s elapse.
    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within 2s");
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn immediate_shutdown_stops_every_loop_within_bound() {
        // Hour-long intervals: only the poll granularity may bound latency.
        let watchers: Vec<(WatcherSpec, Arc<dyn Watcher>)> = (0..3)
            .map(|i| {
                let name = format!("w{i}");
                (
                    spec(&name, 3600),
                    ScriptedWatcher::new(&name, vec![]) as Arc<dyn Watcher>,
                )
            })
            .collect();
        let analyzer = MockAnalyzer::new("unused");
        let actions: Arc<Vec<Arc<dyn Action>>> = Arc::new(vec![]);

        let orch = Orchestrator::spawn(watchers, analyzer, actions, fast_config());
        assert_eq!(orch.loop_count(), 3);

        tokio::time::timeout(Duration::from_secs(2), orch.shutdown())
            .await
            .expect("shutdown must complete within 2s");

        for name in ["w0", "w1", "w2"] {
            assert_eq!(orch.loop_state(name), Some(LoopState::Stopped));
        }
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let watchers: Vec<(WatcherSpec, Arc<dyn Watcher>)> = vec![(
            spec("w", 3600),
            ScriptedWatcher::new("w", vec![]) as Arc<dyn Watcher>,
        )];
        let orch = Orchestrator::spawn(
            watchers,
            MockAnalyzer::new("unused"),
            Arc::new(vec![]),
            fast_config(),
        );
        orch.shutdown().await;
        assert!(orch.is_shutting_down());
        // Second call finds no handles and returns immediately.
        orch.shutdown().await;
        assert_eq!(orch.loop_state("w"), Some(LoopState::Stopped));
    }

    #[tokio::test]
    async fn failing_watcher_keeps_retrying_on_its_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let watcher = Arc::new(FailingWatcher {
            calls: Arc::clone(&calls),
        });
        let analyzer = MockAnalyzer::new("unused");
        let action = RecordingAction::new("console", false);
        let actions: Arc<Vec<Arc<dyn Action>>> = Arc::new(vec![action.clone()]);

        let orch = Orchestrator::spawn(
            vec![(spec("failing", 1), watcher as Arc<dyn Watcher>)],
            analyzer.clone(),
            actions,
            fast_config(),
        );

        // Three consecutive failures must leave the loop alive.
        wait_until(|| calls.load(Ordering::SeqCst) >= 3).await;
        assert_ne!(orch.loop_state("failing"), Some(LoopState::Stopped));

        // The failed ticks must not have reached the analyzer or actions.
        assert_eq!(analyzer.call_count(), 0);
        assert_eq!(action.call_count(), 0);

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn middle_action_fault_does_not_block_the_rest() {
        let watcher = ScriptedWatcher::new("w", vec![Some("DATA1")]);
        let analyzer = MockAnalyzer::new("RESP1");
        let first = RecordingAction::new("first", false);
        let second = RecordingAction::new("second", true);
        let third = RecordingAction::new("third", false);
        let actions: Arc<Vec<Arc<dyn Action>>> =
            Arc::new(vec![first.clone(), second.clone(), third.clone()]);

        let orch = Orchestrator::spawn(
            vec![(spec("w", 3600), watcher as Arc<dyn Watcher>)],
            analyzer,
            actions,
            fast_config(),
        );

        wait_until(|| third.call_count() >= 1).await;
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 1);
        assert_eq!(third.call_count(), 1);

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn no_data_tick_skips_analyzer_and_actions() {
        // Tick 1: nothing collected.  Tick 2: data present.  The interval
        // (20 slices of 5 ms) leaves a wide window to observe the state
        // between the two ticks.
        let watcher = ScriptedWatcher::new("w", vec![None, Some("DATA1")]);
        let analyzer = MockAnalyzer::new("RESP1");
        let a = RecordingAction::new("a", false);
        let b = RecordingAction::new("b", false);
        let actions: Arc<Vec<Arc<dyn Action>>> = Arc::new(vec![a.clone(), b.clone()]);

        let orch = Orchestrator::spawn(
            vec![(spec("w", 20), watcher.clone() as Arc<dyn Watcher>)],
            analyzer.clone(),
            actions,
            fast_config(),
        );

        // After the first (empty) tick nothing downstream has run.
        wait_until(|| watcher.calls.load(Ordering::SeqCst) >= 1).await;
        assert_eq!(analyzer.call_count(), 0);
        assert_eq!(a.call_count(), 0);

        // The second tick carries data: exactly one analysis, N action calls.
        wait_until(|| b.call_count() >= 1).await;
        assert_eq!(analyzer.call_count(), 1);
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 1);

        orch.shutdown().await;
    }

    #[tokio::test]
    async fn end_to_end_scripted_scenario() {
        // Watcher A: interval 1, prompt "describe"; DATA1 on tick 1, absent
        // on tick 2.  Analyzer answers RESP1.  Console records side effects.
        let watcher = ScriptedWatcher::new("a", vec![Some("DATA1"), None]);
        let analyzer = MockAnalyzer::new("RESP1");
        let console = RecordingAction::new("console", false);
        let actions: Arc<Vec<Arc<dyn Action>>> = Arc::new(vec![console.clone()]);

        let orch = Orchestrator::spawn(
            vec![(spec("a", 1), watcher.clone() as Arc<dyn Watcher>)],
            analyzer.clone(),
            actions,
            fast_config(),
        );

        // Let both scripted ticks run.
        wait_until(|| watcher.calls.load(Ordering::SeqCst) >= 2).await;
        orch.shutdown().await;

        // Tick 1: one analyze call with ("DATA1", "describe"), console got RESP1.
        // Tick 2: no further calls anywhere.
        let analyzer_calls = analyzer.calls.lock().unwrap();
        assert_eq!(analyzer_calls.len(), 1);
        assert_eq!(
            analyzer_calls[0].0,
            CollectedData::Text("DATA1".to_string())
        );
        assert_eq!(analyzer_calls[0].1, "describe");
        assert_eq!(*console.received.lock().unwrap(), vec!["RESP1".to_string()]);
    }

    #[tokio::test]
    async fn analysis_error_text_still_reaches_actions() {
        // Chosen policy: the analyzer encodes backend failures as text and
        // the orchestrator fans that text out like any other result.
        let watcher = ScriptedWatcher::new("w", vec![Some("DATA1")]);
        let analyzer = MockAnalyzer::new("analysis failed: HTTP error: connection refused");
        let console = RecordingAction::new("console", false);
        let actions: Arc<Vec<Arc<dyn Action>>> = Arc::new(vec![console.clone()]);

        let orch = Orchestrator::spawn(
            vec![(spec("w", 3600), watcher as Arc<dyn Watcher>)],
            analyzer,
            actions,
            fast_config(),
        );

        wait_until(|| console.call_count() >= 1).await;
        orch.shutdown().await;

        let received = console.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].starts_with("analysis failed:"));
    }

    #[tokio::test]
    async fn loop_states_progress_through_the_cycle() {
        let watcher = ScriptedWatcher::new("w", vec![Some("DATA1")]);
        let analyzer = MockAnalyzer::new("RESP1");
        let console = RecordingAction::new("console", false);
        let actions: Arc<Vec<Arc<dyn Action>>> = Arc::new(vec![console.clone()]);

        let orch = Orchestrator::spawn(
            vec![(spec("w", 3600), watcher as Arc<dyn Watcher>)],
            analyzer,
            actions,
            fast_config(),
        );

        // After the first tick completes the loop must be sleeping.
        let mut rx = orch.state_rx("w").expect("loop exists");
        rx.wait_for(|s| *s == LoopState::Sleeping)
            .await
            .expect("loop reached Sleeping");

        orch.shutdown().await;
        assert_eq!(orch.loop_state("w"), Some(LoopState::Stopped));
    }

    #[tokio::test]
    async fn one_slow_watcher_does_not_delay_the_others() {
        /// Takes a long time inside `watch()`.
        struct SlowWatcher;

        #[async_trait]
        impl Watcher for SlowWatcher {
            fn name(&self) -> &str {
                "slow"
            }
            async fn watch(&self) -> Result<Option<CollectedData>, VigilError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
        }

        let fast = ScriptedWatcher::new("fast", vec![Some("DATA1")]);
        let analyzer = MockAnalyzer::new("RESP1");
        let console = RecordingAction::new("console", false);
        let actions: Arc<Vec<Arc<dyn Action>>> = Arc::new(vec![console.clone()]);

        let orch = Orchestrator::spawn(
            vec![
                (spec("slow", 1), Arc::new(SlowWatcher) as Arc<dyn Watcher>),
                (spec("fast", 1), fast as Arc<dyn Watcher>),
            ],
            analyzer,
            actions,
            fast_config(),
        );

        // The fast loop must complete its tick while the slow one is stuck.
        wait_until(|| console.call_count() >= 1).await;
        assert_eq!(orch.loop_state("slow"), Some(LoopState::Collecting));

        // Raise the flag without joining: `shutdown` would wait the full
        // 30 s for the in-flight `watch()` call, which is never preempted.
        orch.shutdown.store(true, Ordering::Release);
    }
}
