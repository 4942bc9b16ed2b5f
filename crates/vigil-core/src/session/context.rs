//! Conversation context.
//!
//! The context aggregates one session's state record with bounded
//! rolling windows over recent activity, the active workflow (if any),
//! and running interaction statistics. The suggestion engine reads it;
//! the state machine and orchestrator write it.

use super::model::SessionState;
use crate::classifier::Intent;
use crate::workflow::WorkflowState;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Capacity of the rolling windows over recent activity.
pub const RECENT_WINDOW_CAPACITY: usize = 5;

/// A bounded FIFO window: pushing beyond capacity evicts the oldest
/// entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentWindow<T> {
    items: VecDeque<T>,
}

impl<T> Default for RecentWindow<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::with_capacity(RECENT_WINDOW_CAPACITY),
        }
    }
}

impl<T> RecentWindow<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, evicting the oldest when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() == RECENT_WINDOW_CAPACITY {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// The most recent entry, if any.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

/// An entity observed in the conversation, kept in the recency window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedEntity {
    pub name: String,
    pub value: serde_json::Value,
}

/// The accumulated state of a session.
///
/// The active workflow's step pointer lives inside [`WorkflowState`],
/// so "step defined iff workflow defined" holds by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub error_count: u32,
    /// Running mean of execution time, in milliseconds.
    #[serde(default)]
    pub average_response_time_ms: f64,
    #[serde(default)]
    pub total_interactions: u64,
    #[serde(default)]
    pub recent_commands: RecentWindow<String>,
    // Table-valued fields stay below the plain ones so the TOML store
    // can serialize the context directly.
    pub session: SessionState,
    #[serde(default)]
    pub recent_intents: RecentWindow<Intent>,
    #[serde(default)]
    pub recent_entities: RecentWindow<ObservedEntity>,
    /// The active workflow, if a guided procedure is underway.
    #[serde(default)]
    pub workflow: Option<WorkflowState>,
}

impl ConversationContext {
    /// Creates an empty context around a fresh session record.
    pub fn new(session: SessionState) -> Self {
        Self {
            session,
            recent_intents: RecentWindow::new(),
            recent_entities: RecentWindow::new(),
            recent_commands: RecentWindow::new(),
            workflow: None,
            last_error: None,
            error_count: 0,
            average_response_time_ms: 0.0,
            total_interactions: 0,
        }
    }

    /// An ephemeral default used when the backing store is unreachable.
    pub fn ephemeral(session_id: impl Into<String>) -> Self {
        Self::new(SessionState::new(session_id, None))
    }

    /// The active workflow's step pointer, if a workflow is underway.
    pub fn workflow_step(&self) -> Option<usize> {
        self.workflow.as_ref().map(|w| w.current_step)
    }

    /// Records a classified intent and its extracted entities into the
    /// rolling windows and the session's entity map.
    pub fn observe_intent(&mut self, intent: &Intent) {
        for (name, value) in &intent.entities {
            self.session
                .entities
                .insert(name.clone(), value.clone());
            self.recent_entities.push(ObservedEntity {
                name: name.clone(),
                value: value.clone(),
            });
        }
        self.recent_intents.push(intent.clone());
    }

    /// Folds one completed interaction into the running statistics.
    pub fn record_interaction(&mut self, elapsed_ms: u64) {
        let completed = self.total_interactions as f64;
        self.average_response_time_ms =
            (self.average_response_time_ms * completed + elapsed_ms as f64) / (completed + 1.0);
        self.total_interactions += 1;
    }
}

/// A partial update to a [`ConversationContext`]; `None` fields are
/// left untouched by `update_context`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextPatch {
    pub workflow: Option<Option<WorkflowState>>,
    pub last_error: Option<Option<String>>,
    pub error_count: Option<u32>,
}

impl ContextPatch {
    pub fn apply(self, context: &mut ConversationContext) {
        if let Some(workflow) = self.workflow {
            context.workflow = workflow;
        }
        if let Some(last_error) = self.last_error {
            context.last_error = last_error;
        }
        if let Some(error_count) = self.error_count {
            context.error_count = error_count;
        }
        context.session.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_oldest_first() {
        let mut window = RecentWindow::new();
        for i in 0..7 {
            window.push(i);
        }
        assert_eq!(window.len(), RECENT_WINDOW_CAPACITY);
        let items: Vec<_> = window.iter().copied().collect();
        assert_eq!(items, vec![2, 3, 4, 5, 6]);
        assert_eq!(window.latest(), Some(&6));
    }

    #[test]
    fn observe_intent_fills_windows_and_entity_map() {
        let mut context = ConversationContext::ephemeral("s-1");
        let mut intent = Intent::new("threat_scan", 0.9);
        intent
            .entities
            .insert("target".to_string(), serde_json::json!("10.0.0.0/24"));

        context.observe_intent(&intent);

        assert_eq!(context.recent_intents.len(), 1);
        assert_eq!(context.recent_entities.len(), 1);
        assert_eq!(
            context.session.entities.get("target"),
            Some(&serde_json::json!("10.0.0.0/24"))
        );
    }

    #[test]
    fn running_average_over_interactions() {
        let mut context = ConversationContext::ephemeral("s-1");
        context.record_interaction(100);
        context.record_interaction(300);
        assert_eq!(context.total_interactions, 2);
        assert!((context.average_response_time_ms - 200.0).abs() < f64::EPSILON);
    }
}
