//! Engine events.
//!
//! State-machine transitions, confirmation outcomes, and workflow step
//! completions are published on an explicit broadcast channel. The
//! rendering layer and the tests subscribe; nothing registers listeners
//! implicitly.

use super::message::Message;
use super::phase::SessionPhase;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// How a confirmation gate was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

/// Typed events emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A session moved between phases.
    PhaseChanged {
        session_id: String,
        from: SessionPhase,
        to: SessionPhase,
    },
    /// A destructive command was gated behind a confirmation.
    ConfirmationRequested {
        session_id: String,
        prompt: String,
        timeout_ms: u64,
    },
    /// A confirmation gate was closed.
    ConfirmationResolved {
        session_id: String,
        outcome: ConfirmationOutcome,
    },
    /// A guided procedure started.
    WorkflowStarted {
        session_id: String,
        workflow_id: String,
        total_steps: usize,
    },
    /// The current workflow step was completed or skipped.
    WorkflowStepResolved {
        session_id: String,
        workflow_id: String,
        step_index: usize,
        skipped: bool,
    },
    /// A workflow was detached from its session before finishing.
    WorkflowAbandoned {
        session_id: String,
        workflow_id: String,
    },
    /// A message was appended to the session history.
    MessageAppended {
        session_id: String,
        message: Message,
    },
    /// The backing store was unreachable; the session degraded to an
    /// ephemeral context.
    StorageDegraded { session_id: String, detail: String },
}

/// Broadcast fan-out for [`EngineEvent`]s.
///
/// Cloning the bus clones the sender; each subscriber gets an
/// independent receiver. Publishing never blocks and never fails the
/// engine: with no subscribers the event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, event: EngineEvent) {
        // No subscribers is fine; lagging subscribers drop old events.
        let _ = self.sender.send(event);
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(EngineEvent::PhaseChanged {
            session_id: "s-1".to_string(),
            from: SessionPhase::Idle,
            to: SessionPhase::Processing,
        });

        match rx.recv().await.unwrap() {
            EngineEvent::PhaseChanged { session_id, to, .. } => {
                assert_eq!(session_id, "s-1");
                assert_eq!(to, SessionPhase::Processing);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        bus.publish(EngineEvent::StorageDegraded {
            session_id: "s-1".to_string(),
            detail: "store offline".to_string(),
        });
    }
}
