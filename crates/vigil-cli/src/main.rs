//! `vigil-cli` – the `vigil` monitoring daemon binary.
//!
//! Startup sequence:
//!
//! 1. Initialise structured logging (`RUST_LOG` filter, compact or JSON
//!    output via `VIGIL_LOG_FORMAT=json`).
//! 2. Load and validate the TOML config (the only fatal failure path).
//! 3. Resolve each enabled watcher/action spec through the
//!    [`PluginRegistry`]; unresolvable specs are logged and dropped.
//! 4. Spawn the orchestrator: one timed loop per watcher.
//! 5. Intercept **Ctrl-C** / SIGTERM and run the joinable shutdown before
//!    exiting 0.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use vigil_analyzer::OllamaAnalyzer;
use vigil_plugins::{Action, Analyzer, PluginRegistry, Watcher};
use vigil_runtime::{Orchestrator, OrchestratorConfig};
use vigil_types::WatcherSpec;

#[tokio::main]
async fn main() {
    init_tracing();
    print_banner();

    // ── Configuration (fatal on error) ────────────────────────────────────
    let path = config_path();
    let cfg = match config::load(&path) {
        Ok(cfg) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "cannot start without a valid configuration");
            std::process::exit(1);
        }
    };

    // ── Plugin resolution ─────────────────────────────────────────────────
    let registry = PluginRegistry::with_builtins();

    let mut watchers: Vec<(WatcherSpec, Arc<dyn Watcher>)> = Vec::new();
    for spec in &cfg.watchers {
        if !spec.enabled {
            info!(watcher = %spec.name, "disabled in config; skipping");
            continue;
        }
        match registry.resolve_watcher(spec) {
            Ok(instance) => {
                info!(watcher = %spec.name, interval = spec.interval, "watcher initialized");
                watchers.push((spec.clone(), instance));
            }
            Err(e) => warn!(watcher = %spec.name, error = %e, "dropping unresolvable watcher"),
        }
    }

    let mut actions: Vec<Arc<dyn Action>> = Vec::new();
    for spec in &cfg.actions {
        if !spec.enabled {
            info!(action = %spec.name, "disabled in config; skipping");
            continue;
        }
        match registry.resolve_action(spec) {
            Ok(instance) => {
                info!(action = %spec.name, "action initialized");
                actions.push(instance);
            }
            Err(e) => warn!(action = %spec.name, error = %e, "dropping unresolvable action"),
        }
    }

    // Nothing viable to run is an informational exit, not a crash.
    if watchers.is_empty() {
        info!("no active watchers after resolution; exiting");
        return;
    }
    if actions.is_empty() {
        info!("no active actions after resolution; exiting");
        return;
    }

    // ── Analyzer + orchestrator ───────────────────────────────────────────
    let analyzer: Arc<dyn Analyzer> =
        Arc::new(OllamaAnalyzer::new(&cfg.backend.host, &cfg.backend.model));
    info!(host = %cfg.backend.host, model = %cfg.backend.model, "analyzer ready");

    let orchestrator = Orchestrator::spawn(
        watchers,
        analyzer,
        Arc::new(actions),
        OrchestratorConfig::default(),
    );

    // ── Signal handling ───────────────────────────────────────────────────
    let shutdown_requested = Arc::new(Notify::new());
    let notify = Arc::clone(&shutdown_requested);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "Interrupt received – stopping monitoring …".yellow().bold());
        notify.notify_one();
    }) {
        warn!(error = %e, "failed to install signal handler; graceful shutdown on Ctrl-C will not be available");
    }

    info!(loops = orchestrator.loop_count(), "monitoring started; press Ctrl-C to exit");

    shutdown_requested.notified().await;
    orchestrator.shutdown().await;
    info!("all watcher loops stopped; exiting");
}

/// Config file path: `--config <path>`, a bare positional path, or
/// `vigil.toml` in the working directory.
fn config_path() -> PathBuf {
    config_path_from(std::env::args().skip(1))
}

/// Extracted from [`config_path`] so argument handling is testable
/// without spawning the binary.
fn config_path_from(mut args: impl Iterator<Item = String>) -> PathBuf {
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return PathBuf::from(path);
            }
        } else if !arg.starts_with('-') {
            return PathBuf::from(arg);
        }
    }
    PathBuf::from(config::DEFAULT_CONFIG_PATH)
}

/// Initialise tracing-subscriber using `RUST_LOG` (defaults to "info").
/// Set `VIGIL_LOG_FORMAT=json` to emit newline-delimited JSON logs for log
/// aggregators.  User-facing output still uses `println!`.
fn init_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("VIGIL_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

fn print_banner() {
    println!();
    println!("  {} {}", "vigil".bold().cyan(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Periodic monitoring daemon");
    println!();
}
