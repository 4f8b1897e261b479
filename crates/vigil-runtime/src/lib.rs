//! `vigil-runtime` – the scheduling and failure-isolation core.
//!
//! # Modules
//!
//! - [`orchestrator`] – [`Orchestrator`][orchestrator::Orchestrator]:
//!   spawns one independent timed loop per enabled watcher, drives the
//!   watch → analyze → act cycle on each tick, contains per-cycle failures
//!   so one faulting watcher never disturbs the others, and coordinates a
//!   joinable cooperative shutdown across all loops.
//!
//! Watcher loops share nothing mutable: the action list and the analyzer
//! are read-only after startup and held behind `Arc`, each watcher
//! instance is owned by exactly one loop, and the only cross-loop state is
//! the shutdown flag.

pub mod orchestrator;

pub use orchestrator::{LoopState, Orchestrator, OrchestratorConfig};
