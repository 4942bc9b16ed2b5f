//! Session phase types.
//!
//! The phase is the single authoritative state of one conversation; it
//! only changes through the transition methods on
//! [`ChatSession`](crate::session::ChatSession).

use crate::executor::ParsedCommand;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a session currently sits in its input-to-response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting for user input.
    Idle,
    /// Input received, awaiting intent classification.
    Processing,
    /// A destructive command is gated behind a pending confirmation.
    WaitingConfirmation,
    /// A command is running against the executor.
    ExecutingCommand,
    /// The last intent was ambiguous; waiting for a follow-up.
    WaitingClarification,
    /// The last execution failed; waiting for acknowledgement.
    Error,
}

impl SessionPhase {
    /// Lowercase tag used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Processing => "processing",
            SessionPhase::WaitingConfirmation => "waiting_confirmation",
            SessionPhase::ExecutingCommand => "executing_command",
            SessionPhase::WaitingClarification => "waiting_clarification",
            SessionPhase::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed gate requiring explicit approval before a destructive
/// command executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// Prompt shown to the user.
    pub prompt: String,
    /// How long the gate stays open, in milliseconds.
    pub timeout_ms: u64,
    /// When the gate was opened.
    pub created_at: DateTime<Utc>,
    /// The command awaiting approval.
    pub command: ParsedCommand,
}

impl PendingConfirmation {
    pub fn new(prompt: impl Into<String>, timeout_ms: u64, command: ParsedCommand) -> Self {
        Self {
            prompt: prompt.into(),
            timeout_ms,
            created_at: Utc::now(),
            command,
        }
    }

    /// Milliseconds left before the gate expires, clamped at zero.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = now
            .signed_duration_since(self.created_at)
            .num_milliseconds()
            .max(0) as u64;
        self.timeout_ms.saturating_sub(elapsed)
    }

    /// Whether the gate has expired at `now`. Expiry always wins the
    /// race against a late reply.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_ms(now) == 0
    }
}
