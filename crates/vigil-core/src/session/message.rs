//! Conversation message types.
//!
//! Messages are append-only: callers submit a [`MessageDraft`] and the
//! context store assigns the id and timestamp, returning the stored
//! [`Message`]. A stored message is never mutated.

use crate::classifier::Intent;
use crate::executor::{CommandOutput, ParsedCommand};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Raw input from the user.
    UserInput,
    /// A reply produced for the user.
    AssistantResponse,
    /// Engine-side notice (confirmation expiry, degraded storage, ...).
    #[default]
    SystemMessage,
    /// Record of a completed command execution.
    CommandExecution,
    /// Surfaced execution failure.
    ErrorMessage,
    /// Prompt asking the user to approve a destructive command.
    ConfirmationRequest,
    /// Proactively offered next action.
    Suggestion,
}

/// One conversational turn as stored by the context store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned id, unique and time-ordered within a session.
    pub id: String,
    pub message_type: MessageType,
    pub content: String,
    /// Store-assigned timestamp, strictly increasing per session.
    pub timestamp: DateTime<Utc>,
    /// Id of the message this one replies to, for branching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Thread id, for branching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    // Table-valued fields stay below the plain ones so the TOML store
    // can serialize messages directly.
    /// Free-form metadata, validated only at collaborator boundaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    /// The intent that produced this message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    /// The parsed command this message records, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<ParsedCommand>,
    /// The execution output this message records, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<CommandOutput>,
}

/// A message as submitted by a caller, before the store assigns an id
/// and timestamp.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageDraft {
    pub message_type: MessageType,
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub command: Option<ParsedCommand>,
    #[serde(default)]
    pub execution: Option<CommandOutput>,
}

impl MessageDraft {
    /// Creates a draft with only a type and content.
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            message_type,
            content: content.into(),
            ..Default::default()
        }
    }

    /// Shorthand for a user-input draft.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageType::UserInput, content)
    }

    /// Shorthand for a system-message draft.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageType::SystemMessage, content)
    }

    /// Attaches the intent that produced this message.
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Attaches the command this message records.
    pub fn with_command(mut self, command: ParsedCommand) -> Self {
        self.command = Some(command);
        self
    }

    /// Attaches the execution output this message records.
    pub fn with_execution(mut self, execution: CommandOutput) -> Self {
        self.execution = Some(execution);
        self
    }
}
