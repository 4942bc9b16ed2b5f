//! In-memory ContextStore implementation.
//!
//! The default backend for tests and ephemeral runs. Everything lives
//! in one `RwLock`-guarded map; per-session write discipline is the
//! caller's responsibility, per the `ContextStore` contract.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use vigil_core::error::{Result, VigilError};
use vigil_core::session::{
    ContextPatch, ContextStore, ConversationContext, Message, MessageDraft, SessionPatch,
    SessionState,
};

#[derive(Debug, Clone)]
struct StoredSession {
    context: ConversationContext,
    messages: Vec<Message>,
}

impl StoredSession {
    fn new(context: ConversationContext) -> Self {
        Self {
            context,
            messages: Vec::new(),
        }
    }
}

/// A `ContextStore` backed by a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the stored message, assigning the next id in the
    /// session's sequence and clamping the timestamp so it is strictly
    /// greater than the previous message's. Zero-padding keeps the ids
    /// ordered under plain string comparison.
    fn seal(draft: MessageDraft, previous: Option<&Message>, seq: usize) -> Message {
        let now = Utc::now();
        let timestamp = match previous {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::milliseconds(1),
            _ => now,
        };
        Message {
            id: format!("msg-{:06}", seq),
            message_type: draft.message_type,
            content: draft.content,
            timestamp,
            metadata: draft.metadata,
            intent: draft.intent,
            command: draft.command,
            execution: draft.execution,
            reply_to: draft.reply_to,
            thread_id: draft.thread_id,
        }
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn create_session(
        &self,
        session_id: &str,
        user_id: Option<String>,
    ) -> Result<SessionState> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return Err(VigilError::data_access(format!(
                "session '{}' already exists",
                session_id
            )));
        }
        let state = SessionState::new(session_id, user_id);
        sessions.insert(
            session_id.to_string(),
            StoredSession::new(ConversationContext::new(state.clone())),
        );
        Ok(state)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionState>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|stored| stored.context.session.clone()))
    }

    async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<SessionState> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| VigilError::not_found("session", session_id))?;
        patch.apply(&mut stored.context.session);
        Ok(stored.context.session.clone())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn add_message(&self, session_id: &str, draft: MessageDraft) -> Result<Message> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| VigilError::not_found("session", session_id))?;
        let message = Self::seal(draft, stored.messages.last(), stored.messages.len() + 1);
        stored.messages.push(message.clone());
        stored.context.session.touch();
        Ok(message)
    }

    async fn get_messages(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        let sessions = self.sessions.read().await;
        let Some(stored) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        let messages = &stored.messages;
        let skip = limit
            .map(|n| messages.len().saturating_sub(n))
            .unwrap_or(0);
        Ok(messages[skip..].to_vec())
    }

    async fn search_messages(&self, session_id: &str, query: &str) -> Result<Vec<Message>> {
        let needle = query.to_lowercase();
        let sessions = self.sessions.read().await;
        let Some(stored) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        Ok(stored
            .messages
            .iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn get_context(&self, session_id: &str) -> Result<Option<ConversationContext>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|stored| stored.context.clone()))
    }

    async fn update_context(
        &self,
        session_id: &str,
        patch: ContextPatch,
    ) -> Result<ConversationContext> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| VigilError::not_found("session", session_id))?;
        patch.apply(&mut stored.context);
        Ok(stored.context.clone())
    }

    async fn put_context(&self, session_id: &str, context: ConversationContext) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| VigilError::not_found("session", session_id))?;
        stored.context = context;
        Ok(())
    }

    async fn set_entity(
        &self,
        session_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| VigilError::not_found("session", session_id))?;
        stored
            .context
            .session
            .entities
            .insert(name.to_string(), value);
        Ok(())
    }

    async fn get_entity(&self, session_id: &str, name: &str) -> Result<Option<serde_json::Value>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .and_then(|stored| stored.context.session.entities.get(name).cloned()))
    }

    async fn set_variable(
        &self,
        session_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| VigilError::not_found("session", session_id))?;
        stored
            .context
            .session
            .variables
            .insert(name.to_string(), value);
        Ok(())
    }

    async fn get_variable(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .and_then(|stored| stored.context.session.variables.get(name).cloned()))
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| stored.context.session.last_activity >= older_than);
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::session::MessageType;

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let store = InMemoryContextStore::new();
        store
            .create_session("s-1", Some("analyst".to_string()))
            .await
            .unwrap();

        let session = store.get_session("s-1").await.unwrap().unwrap();
        assert_eq!(session.user_id.as_deref(), Some("analyst"));
        assert!(session.is_active);

        assert!(store.get_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryContextStore::new();
        store.create_session("s-1", None).await.unwrap();
        assert!(store.create_session("s-1", None).await.is_err());
    }

    #[tokio::test]
    async fn message_ids_unique_and_timestamps_strictly_increasing() {
        let store = InMemoryContextStore::new();
        store.create_session("s-1", None).await.unwrap();

        let mut ids = std::collections::HashSet::new();
        for i in 0..20 {
            let message = store
                .add_message("s-1", MessageDraft::user(format!("turn {}", i)))
                .await
                .unwrap();
            assert!(ids.insert(message.id));
        }

        let messages = store.get_messages("s-1", None).await.unwrap();
        assert_eq!(messages.len(), 20);
        for pair in messages.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[tokio::test]
    async fn message_ids_follow_the_session_sequence() {
        let store = InMemoryContextStore::new();
        store.create_session("a", None).await.unwrap();
        store.create_session("b", None).await.unwrap();

        let first = store.add_message("a", MessageDraft::user("one")).await.unwrap();
        let second = store.add_message("a", MessageDraft::user("two")).await.unwrap();
        assert_eq!(first.id, "msg-000001");
        assert_eq!(second.id, "msg-000002");

        // Each session numbers its own messages.
        let other = store.add_message("b", MessageDraft::user("one")).await.unwrap();
        assert_eq!(other.id, "msg-000001");
    }

    #[tokio::test]
    async fn get_messages_returns_last_n_in_chronological_order() {
        let store = InMemoryContextStore::new();
        store.create_session("s-1", None).await.unwrap();
        for i in 0..5 {
            store
                .add_message("s-1", MessageDraft::user(format!("m{}", i)))
                .await
                .unwrap();
        }

        let last_two = store.get_messages("s-1", Some(2)).await.unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].content, "m3");
        assert_eq!(last_two[1].content, "m4");
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let store = InMemoryContextStore::new();
        store.create_session("s-1", None).await.unwrap();
        store
            .add_message("s-1", MessageDraft::user("Scan Network 10.0.0.0/24"))
            .await
            .unwrap();
        store
            .add_message(
                "s-1",
                MessageDraft::new(MessageType::CommandExecution, "scan finished"),
            )
            .await
            .unwrap();
        store
            .add_message("s-1", MessageDraft::user("check status"))
            .await
            .unwrap();

        let hits = store.search_messages("s-1", "SCAN").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn entities_and_variables_roundtrip() {
        let store = InMemoryContextStore::new();
        store.create_session("s-1", None).await.unwrap();

        store
            .set_entity("s-1", "target", serde_json::json!("10.0.0.7"))
            .await
            .unwrap();
        store
            .set_variable("s-1", "page_size", serde_json::json!(50))
            .await
            .unwrap();

        assert_eq!(
            store.get_entity("s-1", "target").await.unwrap(),
            Some(serde_json::json!("10.0.0.7"))
        );
        assert_eq!(
            store.get_variable("s-1", "page_size").await.unwrap(),
            Some(serde_json::json!(50))
        );
        assert_eq!(store.get_entity("s-1", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_sessions() {
        let store = InMemoryContextStore::new();
        store.create_session("fresh", None).await.unwrap();
        store.create_session("stale", None).await.unwrap();

        // Backdate the stale session.
        {
            let mut sessions = store.sessions.write().await;
            sessions.get_mut("stale").unwrap().context.session.last_activity =
                Utc::now() - Duration::days(30);
        }

        let removed = store.cleanup(Utc::now() - Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_session("stale").await.unwrap().is_none());
        assert!(store.get_session("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_missing_session_is_not_found() {
        let store = InMemoryContextStore::new();
        let err = store
            .update_session("ghost", SessionPatch::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
