//! Command parsing and execution boundary.
//!
//! The executor collaborator owns two decisions the engine deliberately
//! does not make: how an [`Intent`](crate::classifier::Intent) binds to a
//! concrete command, and whether that command is destructive. The
//! confirmation gate only inspects the `destructive` flag.

use crate::classifier::Intent;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An executable representation of an intent, bound to concrete
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// Command name, e.g. `"scan"`, `"block_ip"`.
    pub name: String,
    /// Whether executing this command is destructive. Destructive
    /// commands go through the confirmation gate when the session
    /// preferences ask for it.
    pub destructive: bool,
    /// Bound arguments. Kept last so the TOML store can serialize the
    /// record directly.
    #[serde(default)]
    pub args: HashMap<String, serde_json::Value>,
}

/// The result of running a command against the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Human-readable result body.
    pub output: String,
    /// Wall-clock execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// An abstract command parser and executor.
///
/// Implementations run commands against the underlying security
/// platform; the engine only sequences them.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Binds an intent to a concrete command, deciding destructiveness.
    ///
    /// # Errors
    ///
    /// Returns an error if the intent has no command mapping.
    async fn prepare(&self, intent: &Intent) -> Result<ParsedCommand>;

    /// Runs a prepared command.
    ///
    /// # Errors
    ///
    /// Returns an error on execution failure; the session records it
    /// and enters its error phase.
    async fn execute(&self, command: &ParsedCommand) -> Result<CommandOutput>;
}
