//! [`ConsoleAction`] – print each analysis result to stdout.
//!
//! The daemon's log lines go through `tracing`; this action is the
//! user-facing output channel, so it deliberately uses plain `println!`.

use async_trait::async_trait;
use vigil_types::ActionSpec;

use crate::contract::Action;

/// Prints analysis text to stdout, prefixed with the action name.
pub struct ConsoleAction {
    name: String,
}

impl ConsoleAction {
    pub fn new(spec: &ActionSpec) -> Self {
        Self {
            name: spec.name.clone(),
        }
    }
}

#[async_trait]
impl Action for ConsoleAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, text: &str) {
        println!("[{}] {}", self.name, text);
    }
}
