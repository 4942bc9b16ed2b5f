//! Session domain model.
//!
//! This module contains the persisted `SessionState` record that
//! represents one conversation in the domain layer, independent of any
//! storage format.

use super::phase::PendingConfirmation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How results are rendered for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Plain,
}

/// Authentication status of the session's user against the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Authenticated,
    #[default]
    Unauthenticated,
    Expired,
}

/// Per-session behavior preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPreferences {
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub verbose_mode: bool,
    /// When true, destructive commands are gated behind a confirmation.
    #[serde(default = "default_true")]
    pub confirm_destructive: bool,
    /// When false, the suggestion engine is disabled entirely.
    #[serde(default = "default_true")]
    pub suggest_commands: bool,
    #[serde(default)]
    pub explain_commands: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SessionPreferences {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            verbose_mode: false,
            confirm_destructive: true,
            suggest_commands: true,
            explain_commands: false,
        }
    }
}

/// The persisted record of one conversation.
///
/// Mutated only through the session state machine's transitions and the
/// context store's patch operations; no other writer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Unique session identifier (UUID format).
    pub session_id: String,
    /// Owning user, if authenticated.
    #[serde(default)]
    pub user_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
    /// The topic of the most recent exchange, if any.
    #[serde(default)]
    pub current_topic: Option<String>,
    /// The command currently executing, if any.
    #[serde(default)]
    pub active_command: Option<String>,
    #[serde(default)]
    pub auth_status: AuthStatus,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub last_auth_check: Option<DateTime<Utc>>,
    // Table-valued fields stay below the plain ones so the TOML store
    // can serialize this record directly.
    /// At most one confirmation gate per session.
    #[serde(default)]
    pub pending_confirmation: Option<PendingConfirmation>,
    #[serde(default)]
    pub preferences: SessionPreferences,
    /// Entities extracted from the conversation.
    #[serde(default)]
    pub entities: HashMap<String, serde_json::Value>,
    /// Session-scoped variables.
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

impl SessionState {
    /// Creates a fresh, active session record.
    pub fn new(session_id: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id,
            start_time: now,
            last_activity: now,
            is_active: true,
            current_topic: None,
            active_command: None,
            auth_status: AuthStatus::default(),
            permissions: Vec::new(),
            last_auth_check: None,
            pending_confirmation: None,
            preferences: SessionPreferences::default(),
            entities: HashMap::new(),
            variables: HashMap::new(),
        }
    }

    /// Stamps the record as touched now.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// A partial update to a [`SessionState`]; `None` fields are left
/// untouched by `update_session`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    pub user_id: Option<String>,
    pub is_active: Option<bool>,
    pub current_topic: Option<Option<String>>,
    pub active_command: Option<Option<String>>,
    pub pending_confirmation: Option<Option<PendingConfirmation>>,
    pub preferences: Option<SessionPreferences>,
    pub auth_status: Option<AuthStatus>,
    pub permissions: Option<Vec<String>>,
    pub last_auth_check: Option<DateTime<Utc>>,
}

impl SessionPatch {
    /// Applies this patch to a state record, refreshing `last_activity`.
    pub fn apply(self, state: &mut SessionState) {
        if let Some(user_id) = self.user_id {
            state.user_id = Some(user_id);
        }
        if let Some(is_active) = self.is_active {
            state.is_active = is_active;
        }
        if let Some(current_topic) = self.current_topic {
            state.current_topic = current_topic;
        }
        if let Some(active_command) = self.active_command {
            state.active_command = active_command;
        }
        if let Some(pending) = self.pending_confirmation {
            state.pending_confirmation = pending;
        }
        if let Some(preferences) = self.preferences {
            state.preferences = preferences;
        }
        if let Some(auth_status) = self.auth_status {
            state.auth_status = auth_status;
        }
        if let Some(permissions) = self.permissions {
            state.permissions = permissions;
        }
        if let Some(last_auth_check) = self.last_auth_check {
            state.last_auth_check = Some(last_auth_check);
        }
        state.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_leaves_unset_fields_alone() {
        let mut state = SessionState::new("s-1", Some("analyst".to_string()));
        state.current_topic = Some("malware triage".to_string());

        let patch = SessionPatch {
            is_active: Some(false),
            ..Default::default()
        };
        patch.apply(&mut state);

        assert!(!state.is_active);
        assert_eq!(state.user_id.as_deref(), Some("analyst"));
        assert_eq!(state.current_topic.as_deref(), Some("malware triage"));
    }

    #[test]
    fn patch_can_clear_optional_fields() {
        let mut state = SessionState::new("s-1", None);
        state.current_topic = Some("phishing".to_string());

        let patch = SessionPatch {
            current_topic: Some(None),
            ..Default::default()
        };
        patch.apply(&mut state);

        assert_eq!(state.current_topic, None);
    }
}
