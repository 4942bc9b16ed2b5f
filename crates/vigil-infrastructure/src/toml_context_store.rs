//! TOML-file ContextStore implementation.
//!
//! One TOML document per session under a base directory:
//!
//! ```text
//! base_dir/
//! └── sessions/
//!     ├── <session-id-1>.toml
//!     └── <session-id-2>.toml
//! ```
//!
//! Sessions survive process restarts; the application layer rehydrates
//! a `ChatSession` from the stored context.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vigil_core::error::{Result, VigilError};
use vigil_core::session::{
    ContextPatch, ContextStore, ConversationContext, Message, MessageDraft, SessionPatch,
    SessionState,
};

/// On-disk shape of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionDocument {
    context: ConversationContext,
    #[serde(default)]
    messages: Vec<Message>,
}

/// A `ContextStore` that persists each session as a TOML file.
pub struct TomlContextStore {
    base_dir: PathBuf,
}

impl TomlContextStore {
    /// Creates a store rooted at `base_dir`, creating the sessions
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("sessions"))?;
        Ok(Self { base_dir })
    }

    /// Creates a store at the default location (`~/.vigil`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or
    /// the directory cannot be created.
    pub fn default_location() -> Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| VigilError::config("could not determine home directory"))?;
        Self::new(home_dir.join(".vigil"))
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join("sessions")
            .join(format!("{}.toml", session_id))
    }

    fn load(&self, session_id: &str) -> Result<Option<SessionDocument>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let document = toml::from_str(&raw)?;
        Ok(Some(document))
    }

    fn load_required(&self, session_id: &str) -> Result<SessionDocument> {
        self.load(session_id)?
            .ok_or_else(|| VigilError::not_found("session", session_id))
    }

    fn save(&self, session_id: &str, document: &SessionDocument) -> Result<()> {
        let path = self.session_path(session_id);
        let raw = toml::to_string_pretty(document)?;
        // Write via a temp file so a crash never leaves a half-written
        // session behind.
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Same sealing discipline as the in-memory store: sequence ids,
    /// strictly increasing timestamps.
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
impl ContextStore for TomlContextStore {
    async fn create_session(
        &self,
        session_id: &str,
        user_id: Option<String>,
    ) -> Result<SessionState> {
        if self.session_path(session_id).exists() {
            return Err(VigilError::data_access(format!(
                "session '{}' already exists",
                session_id
            )));
        }
        let state = SessionState::new(session_id, user_id);
        let document = SessionDocument {
            context: ConversationContext::new(state.clone()),
            messages: Vec::new(),
        };
        self.save(session_id, &document)?;
        Ok(state)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionState>> {
        Ok(self
            .load(session_id)?
            .map(|document| document.context.session))
    }

    async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<SessionState> {
        let mut document = self.load_required(session_id)?;
        patch.apply(&mut document.context.session);
        self.save(session_id, &document)?;
        Ok(document.context.session)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let path = self.session_path(session_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    async fn add_message(&self, session_id: &str, draft: MessageDraft) -> Result<Message> {
        let mut document = self.load_required(session_id)?;
        let message = Self::seal(draft, document.messages.last(), document.messages.len() + 1);
        document.messages.push(message.clone());
        document.context.session.touch();
        self.save(session_id, &document)?;
        Ok(message)
    }

    async fn get_messages(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        let Some(document) = self.load(session_id)? else {
            return Ok(Vec::new());
        };
        let messages = document.messages;
        let skip = limit
            .map(|n| messages.len().saturating_sub(n))
            .unwrap_or(0);
        Ok(messages[skip..].to_vec())
    }

    async fn search_messages(&self, session_id: &str, query: &str) -> Result<Vec<Message>> {
        let needle = query.to_lowercase();
        let Some(document) = self.load(session_id)? else {
            return Ok(Vec::new());
        };
        Ok(document
            .messages
            .into_iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .collect())
    }

    async fn get_context(&self, session_id: &str) -> Result<Option<ConversationContext>> {
        Ok(self.load(session_id)?.map(|document| document.context))
    }

    async fn update_context(
        &self,
        session_id: &str,
        patch: ContextPatch,
    ) -> Result<ConversationContext> {
        let mut document = self.load_required(session_id)?;
        patch.apply(&mut document.context);
        self.save(session_id, &document)?;
        Ok(document.context)
    }

    async fn put_context(&self, session_id: &str, context: ConversationContext) -> Result<()> {
        let mut document = self.load_required(session_id)?;
        document.context = context;
        self.save(session_id, &document)?;
        Ok(())
    }

    async fn set_entity(
        &self,
        session_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut document = self.load_required(session_id)?;
        document
            .context
            .session
            .entities
            .insert(name.to_string(), value);
        self.save(session_id, &document)?;
        Ok(())
    }

    async fn get_entity(&self, session_id: &str, name: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .load(session_id)?
            .and_then(|document| document.context.session.entities.get(name).cloned()))
    }

    async fn set_variable(
        &self,
        session_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut document = self.load_required(session_id)?;
        document
            .context
            .session
            .variables
            .insert(name.to_string(), value);
        self.save(session_id, &document)?;
        Ok(())
    }

    async fn get_variable(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self
            .load(session_id)?
            .and_then(|document| document.context.session.variables.get(name).cloned()))
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let sessions_dir = self.base_dir.join("sessions");
        let mut removed = 0;
        for entry in fs::read_dir(&sessions_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(document) = toml::from_str::<SessionDocument>(&raw) else {
                // Unreadable documents are left for manual inspection.
                tracing::warn!(path = %path.display(), "skipping unparseable session file");
                continue;
            };
            if document.context.session.last_activity < older_than {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::session::MessageDraft;

    fn store() -> (tempfile::TempDir, TomlContextStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlContextStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn session_survives_reopen() {
        let (dir, store) = store();
        store
            .create_session("s-1", Some("analyst".to_string()))
            .await
            .unwrap();
        store
            .add_message("s-1", MessageDraft::user("scan network 10.0.0.0/24"))
            .await
            .unwrap();
        drop(store);

        let reopened = TomlContextStore::new(dir.path()).unwrap();
        let session = reopened.get_session("s-1").await.unwrap().unwrap();
        assert_eq!(session.user_id.as_deref(), Some("analyst"));

        let messages = reopened.get_messages("s-1", None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "scan network 10.0.0.0/24");
    }

    #[tokio::test]
    async fn message_ids_keep_counting_across_reopen() {
        let (dir, store) = store();
        store.create_session("s-1", None).await.unwrap();
        let first = store
            .add_message("s-1", MessageDraft::user("one"))
            .await
            .unwrap();
        drop(store);

        let reopened = TomlContextStore::new(dir.path()).unwrap();
        let second = reopened
            .add_message("s-1", MessageDraft::user("two"))
            .await
            .unwrap();
        assert_eq!(first.id, "msg-000001");
        assert_eq!(second.id, "msg-000002");
        assert!(first.id < second.id);
        assert!(first.timestamp < second.timestamp);
    }

    #[tokio::test]
    async fn missing_session_reads_are_none_not_errors() {
        let (_dir, store) = store();
        assert!(store.get_session("ghost").await.unwrap().is_none());
        assert!(store.get_context("ghost").await.unwrap().is_none());
        assert!(store.get_messages("ghost", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn context_roundtrips_through_toml() {
        let (_dir, store) = store();
        store.create_session("s-1", None).await.unwrap();

        let mut context = store.get_context("s-1").await.unwrap().unwrap();
        context
            .recent_commands
            .push("vuln_scan".to_string());
        context.error_count = 2;
        store.put_context("s-1", context.clone()).await.unwrap();

        let loaded = store.get_context("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.error_count, 2);
        assert_eq!(loaded.recent_commands.latest().map(String::as_str), Some("vuln_scan"));
    }

    #[tokio::test]
    async fn cleanup_deletes_stale_files() {
        let (_dir, store) = store();
        store.create_session("fresh", None).await.unwrap();
        store.create_session("stale", None).await.unwrap();

        let mut context = store.get_context("stale").await.unwrap().unwrap();
        context.session.last_activity = Utc::now() - Duration::days(60);
        store.put_context("stale", context).await.unwrap();

        let removed = store.cleanup(Utc::now() - Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_session("stale").await.unwrap().is_none());
    }
}
