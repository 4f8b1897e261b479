//! `vigil-plugins` – capability contracts and built-in plugins.
//!
//! The runtime never knows which concrete watchers and actions it is
//! driving; it holds trait objects resolved by name from the
//! [`PluginRegistry`][registry::PluginRegistry] at startup.
//!
//! # Modules
//!
//! - [`contract`] – the [`Watcher`][contract::Watcher],
//!   [`Action`][contract::Action], and [`Analyzer`][contract::Analyzer]
//!   async capability traits.
//! - [`registry`] – [`PluginRegistry`][registry::PluginRegistry]: a static
//!   name→factory table built at process start.  Unknown names resolve to
//!   [`RegistryError::NotFound`][registry::RegistryError] so a typo in the
//!   config drops one spec instead of crashing the daemon.
//! - [`screen`] – [`ScreenWatcher`][screen::ScreenWatcher]: one screenshot
//!   per cycle, base64-encoded, captured through an external command.
//! - [`system`] – [`SystemWatcher`][system::SystemWatcher]: CPU and memory
//!   utilisation as a JSON snapshot.
//! - [`console`] – [`ConsoleAction`][console::ConsoleAction]: prints the
//!   analysis text to stdout.

pub mod console;
pub mod contract;
pub mod registry;
pub mod screen;
pub mod system;

pub use console::ConsoleAction;
pub use contract::{Action, Analyzer, Watcher};
pub use registry::{PluginRegistry, RegistryError};
pub use screen::ScreenWatcher;
pub use system::SystemWatcher;
