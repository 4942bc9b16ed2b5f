//! Context store trait.
//!
//! Defines the persistence interface for sessions, messages, and
//! conversation context, decoupling the engine from the storage
//! mechanism (in-memory, TOML files, a database, ...).

use super::context::{ContextPatch, ConversationContext};
use super::message::{Message, MessageDraft};
use super::model::{SessionPatch, SessionState};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// An abstract store for sessions, their message histories, and their
/// conversation contexts.
///
/// # Implementation notes
///
/// - A missing session is `Ok(None)` on reads, never an error; only
///   infrastructure failures (unreachable backend, corrupt data)
///   surface as `Err`.
/// - Message ids must be unique within a session and assigned in
///   arrival order; timestamps must be strictly increasing per session.
/// - Mutations for one session are serialized by the caller
///   (single-writer-per-session); different sessions may be accessed
///   concurrently.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Creates a session and its empty context, returning the record.
    async fn create_session(
        &self,
        session_id: &str,
        user_id: Option<String>,
    ) -> Result<SessionState>;

    /// Finds a session record by id.
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionState>>;

    /// Applies a partial update to a session record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<SessionState>;

    /// Deletes a session, its messages, and its context.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Appends a message, assigning its id and timestamp, and returns
    /// the stored message.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    async fn add_message(&self, session_id: &str, draft: MessageDraft) -> Result<Message>;

    /// Returns the most recent `limit` messages in chronological order;
    /// all messages when `limit` is `None`.
    async fn get_messages(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<Message>>;

    /// Case-insensitive substring search over message content, in
    /// chronological order.
    async fn search_messages(&self, session_id: &str, query: &str) -> Result<Vec<Message>>;

    /// Returns the conversation context for a session.
    async fn get_context(&self, session_id: &str) -> Result<Option<ConversationContext>>;

    /// Applies a partial update to a conversation context.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    async fn update_context(
        &self,
        session_id: &str,
        patch: ContextPatch,
    ) -> Result<ConversationContext>;

    /// Replaces the full conversation context for a session.
    ///
    /// Used by the state machine to write back a context it mutated
    /// over a whole turn, keeping phase and context in step.
    async fn put_context(&self, session_id: &str, context: ConversationContext) -> Result<()>;

    /// Sets an extracted entity on the session.
    async fn set_entity(&self, session_id: &str, name: &str, value: serde_json::Value)
        -> Result<()>;

    /// Reads an extracted entity from the session.
    async fn get_entity(&self, session_id: &str, name: &str) -> Result<Option<serde_json::Value>>;

    /// Sets a session-scoped variable.
    async fn set_variable(
        &self,
        session_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<()>;

    /// Reads a session-scoped variable.
    async fn get_variable(&self, session_id: &str, name: &str)
        -> Result<Option<serde_json::Value>>;

    /// Deletes sessions whose `last_activity` predates the cutoff,
    /// returning the number deleted.
    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<usize>;
}
