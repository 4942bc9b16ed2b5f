//! Session use case.
//!
//! `SessionUseCase` drives one input-to-response cycle at a time per
//! session: lazy confirmation-expiry check, per-phase dispatch through
//! the state machine, execution against the collaborators, and
//! write-back to the context store. A per-session `tokio::sync::Mutex`
//! serializes turns; a second input arriving mid-flight waits on the
//! lock instead of interleaving.
//!
//! Storage failures never fail a turn: the session degrades to its
//! in-memory context and a warning event is published.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;
use vigil_core::classifier::IntentClassifier;
use vigil_core::confirmation::{ConfirmationManager, ConfirmationReply, ConfirmationResolution};
use vigil_core::error::{Result, VigilError};
use vigil_core::executor::{CommandExecutor, ParsedCommand};
use vigil_core::session::store::ContextStore;
use vigil_core::session::{
    ChatSession, ConfirmationOutcome, ConversationContext, EngineEvent, EventBus, Message,
    MessageDraft, MessageType, SessionPhase,
};
use vigil_core::suggestion::{self, ContextualSuggestion};
use vigil_core::workflow::{StepAdvance, WorkflowOrchestrator, WorkflowState};
use vigil_core::EngineConfig;

/// What one turn produced, for the rendering layer.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub phase: SessionPhase,
    /// Messages appended during this turn, in order.
    pub messages: Vec<Message>,
    pub suggestions: Vec<ContextualSuggestion>,
}

/// A read-only view of a session for display.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: SessionPhase,
    /// Prompt and remaining milliseconds of an open confirmation gate.
    pub pending_confirmation: Option<(String, u64)>,
    pub current_topic: Option<String>,
    pub total_interactions: u64,
    pub error_count: u32,
    /// `(workflow name, current step, total steps)` when one is active.
    pub workflow: Option<(String, usize, usize)>,
}

struct SessionEntry {
    session: Arc<Mutex<ChatSession>>,
    /// True once the store proved unreachable for this session; the
    /// context then lives only in memory.
    degraded: bool,
}

/// Coordinates the state machine, the collaborators, and the store for
/// all live sessions.
pub struct SessionUseCase {
    store: Arc<dyn ContextStore>,
    classifier: Arc<dyn IntentClassifier>,
    executor: Arc<dyn CommandExecutor>,
    confirmations: ConfirmationManager,
    orchestrator: WorkflowOrchestrator,
    events: EventBus,
    config: EngineConfig,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionUseCase {
    pub fn new(
        store: Arc<dyn ContextStore>,
        classifier: Arc<dyn IntentClassifier>,
        executor: Arc<dyn CommandExecutor>,
        events: EventBus,
        config: EngineConfig,
    ) -> Self {
        Self {
            orchestrator: WorkflowOrchestrator::new(events.clone()),
            store,
            classifier,
            executor,
            confirmations: ConfirmationManager::new(),
            events,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The event bus; subscribe for phase changes, confirmations, and
    /// workflow progress.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Opens a new session, generating an id when none is given.
    ///
    /// If the store is unreachable the session starts in degraded mode
    /// with an ephemeral context.
    pub async fn open_session(
        &self,
        session_id: Option<String>,
        user_id: Option<String>,
    ) -> Result<String> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let (context, degraded) = match self.store.create_session(&session_id, user_id).await {
            Ok(state) => (ConversationContext::new(state), false),
            Err(err) if err.is_data_access() => {
                self.degrade(&session_id, &err);
                (ConversationContext::ephemeral(session_id.clone()), true)
            }
            Err(err) => return Err(err),
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                session: Arc::new(Mutex::new(ChatSession::new(context))),
                degraded,
            },
        );
        tracing::info!(session_id = %session_id, degraded, "session opened");
        Ok(session_id)
    }

    /// Returns the live session, rehydrating from the store when it is
    /// not already in memory.
    async fn entry(&self, session_id: &str) -> Result<Arc<Mutex<ChatSession>>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(session_id) {
                return Ok(entry.session.clone());
            }
        }

        let (context, degraded) = match self.store.get_context(session_id).await {
            Ok(Some(context)) => (context, false),
            Ok(None) => return Err(VigilError::not_found("session", session_id)),
            Err(err) if err.is_data_access() => {
                // Tolerate a missing context rather than crashing.
                self.degrade(session_id, &err);
                (ConversationContext::ephemeral(session_id), true)
            }
            Err(err) => return Err(err),
        };

        let session = Arc::new(Mutex::new(ChatSession::rehydrate(context)));
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert(SessionEntry {
                session,
                degraded,
            });
        Ok(entry.session.clone())
    }

    fn degrade(&self, session_id: &str, err: &VigilError) {
        tracing::warn!(session_id, error = %err, "context store unreachable, degrading");
        self.events.publish(EngineEvent::StorageDegraded {
            session_id: session_id.to_string(),
            detail: err.to_string(),
        });
    }

    async fn mark_degraded(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.degraded = true;
        }
    }

    /// Appends a message via the store, falling back to a locally
    /// sealed message when the session is degraded.
    async fn append(
        &self,
        session_id: &str,
        draft: MessageDraft,
        report: &mut Vec<Message>,
    ) {
        let message = match self.store.add_message(session_id, draft.clone()).await {
            Ok(message) => message,
            Err(err) => {
                if err.is_data_access() {
                    self.degrade(session_id, &err);
                    self.mark_degraded(session_id).await;
                }
                Message {
                    id: Uuid::new_v4().to_string(),
                    message_type: draft.message_type,
                    content: draft.content,
                    timestamp: Utc::now(),
                    reply_to: draft.reply_to,
                    thread_id: draft.thread_id,
                    metadata: draft.metadata,
                    intent: draft.intent,
                    command: draft.command,
                    execution: draft.execution,
                }
            }
        };
        self.events.publish(EngineEvent::MessageAppended {
            session_id: session_id.to_string(),
            message: message.clone(),
        });
        report.push(message);
    }

    /// Writes the live context back to the store at the end of a turn.
    async fn persist(&self, session: &ChatSession) {
        let session_id = session.session_id().to_string();
        if let Err(err) = self
            .store
            .put_context(&session_id, session.context.clone())
            .await
        {
            if err.is_data_access() {
                self.degrade(&session_id, &err);
                self.mark_degraded(&session_id).await;
            } else {
                tracing::error!(session_id = %session_id, error = %err, "context write-back failed");
            }
        }
    }

    fn publish_phase(&self, session_id: &str, from: SessionPhase, to: SessionPhase) {
        if from != to {
            self.events.publish(EngineEvent::PhaseChanged {
                session_id: session_id.to_string(),
                from,
                to,
            });
        }
    }

    /// Settles an expired confirmation gate, if one is open. Called on
    /// every touch of the session, per the lazy-expiry design.
    async fn settle_expiry(
        &self,
        session: &mut ChatSession,
        report: &mut Vec<Message>,
    ) -> Result<()> {
        if session.phase() != SessionPhase::WaitingConfirmation {
            return Ok(());
        }
        let from = session.phase();
        match self
            .confirmations
            .resolve(session, ConfirmationReply::TimeoutCheck, Utc::now())?
        {
            ConfirmationResolution::Expired => {
                let session_id = session.session_id().to_string();
                self.publish_phase(&session_id, from, session.phase());
                self.events.publish(EngineEvent::ConfirmationResolved {
                    session_id: session_id.clone(),
                    outcome: ConfirmationOutcome::Expired,
                });
                self.append(
                    &session_id,
                    MessageDraft::system("Confirmation expired; the command was not executed."),
                    report,
                )
                .await;
            }
            ConfirmationResolution::StillPending { .. } => {}
            other => {
                return Err(VigilError::internal(format!(
                    "timeout check resolved unexpectedly: {:?}",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Handles one unit of user input, driving the full cycle to
    /// completion.
    pub async fn handle_input(&self, session_id: &str, text: &str) -> Result<TurnReport> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.lock().await;
        let mut report = Vec::new();

        self.settle_expiry(&mut session, &mut report).await?;
        if !report.is_empty() {
            // The gate lapsed and this input was its reply; consume it
            // rather than classifying it as a fresh request.
            self.persist(&session).await;
            return Ok(TurnReport {
                phase: session.phase(),
                messages: report,
                suggestions: Vec::new(),
            });
        }

        match session.phase() {
            SessionPhase::WaitingConfirmation => {
                self.handle_confirmation_reply(&mut session, text, &mut report)
                    .await?;
            }
            SessionPhase::Error => {
                // New input doubles as acknowledgement of the failure.
                let from = session.phase();
                session.acknowledge_error()?;
                self.publish_phase(session_id, from, session.phase());
                self.run_classification_turn(&mut session, text, &mut report)
                    .await?;
            }
            SessionPhase::Idle | SessionPhase::WaitingClarification => {
                self.run_classification_turn(&mut session, text, &mut report)
                    .await?;
            }
            phase @ (SessionPhase::Processing | SessionPhase::ExecutingCommand) => {
                // Unreachable under the per-session lock; a turn never
                // yields in these phases.
                return Err(VigilError::InvalidTransition {
                    phase: phase.as_str().to_string(),
                    event: "user_input",
                });
            }
        }

        self.persist(&session).await;

        let suggestions = suggestion::suggest(&session.context, &self.config);
        Ok(TurnReport {
            phase: session.phase(),
            messages: report,
            suggestions,
        })
    }

    async fn handle_confirmation_reply(
        &self,
        session: &mut ChatSession,
        text: &str,
        report: &mut Vec<Message>,
    ) -> Result<()> {
        let session_id = session.session_id().to_string();
        let Some(reply) = ConfirmationReply::from_text(text) else {
            // Leave the gate open; the deadline keeps running.
            self.append(
                &session_id,
                MessageDraft::system("Please answer yes, no, or cancel."),
                report,
            )
            .await;
            return Ok(());
        };

        let from = session.phase();
        let resolution = self.confirmations.resolve(session, reply, Utc::now())?;
        self.publish_phase(&session_id, from, session.phase());

        match resolution {
            ConfirmationResolution::Accepted(command) => {
                self.events.publish(EngineEvent::ConfirmationResolved {
                    session_id: session_id.clone(),
                    outcome: ConfirmationOutcome::Accepted,
                });
                self.run_command_inner(session, command, report).await?;
            }
            ConfirmationResolution::Declined | ConfirmationResolution::Cancelled => {
                let outcome = if resolution == ConfirmationResolution::Declined {
                    ConfirmationOutcome::Declined
                } else {
                    ConfirmationOutcome::Cancelled
                };
                self.events.publish(EngineEvent::ConfirmationResolved {
                    session_id: session_id.clone(),
                    outcome,
                });
                self.append(
                    &session_id,
                    MessageDraft::system("Command cancelled."),
                    report,
                )
                .await;
            }
            ConfirmationResolution::Expired => {
                self.events.publish(EngineEvent::ConfirmationResolved {
                    session_id: session_id.clone(),
                    outcome: ConfirmationOutcome::Expired,
                });
                self.append(
                    &session_id,
                    MessageDraft::system("Confirmation expired; the command was not executed."),
                    report,
                )
                .await;
            }
            ConfirmationResolution::StillPending { .. } => {}
        }
        Ok(())
    }

    /// Classifies fresh input and routes it: direct execution, the
    /// confirmation gate, or clarification.
    async fn run_classification_turn(
        &self,
        session: &mut ChatSession,
        text: &str,
        report: &mut Vec<Message>,
    ) -> Result<()> {
        let session_id = session.session_id().to_string();
        let from = session.phase();
        session.receive_input()?;
        self.publish_phase(&session_id, from, session.phase());

        let intent = match self.classifier.classify(text, &session.context).await {
            Ok(intent) => intent,
            Err(err) => {
                self.append(&session_id, MessageDraft::user(text), report).await;
                self.fault_turn(session, &err, report).await;
                return Ok(());
            }
        };
        session.context.observe_intent(&intent);
        session.context.session.current_topic = Some(intent.intent_type.clone());

        self.append(
            &session_id,
            MessageDraft::user(text).with_intent(intent.clone()),
            report,
        )
        .await;

        if !intent.is_confident(self.config.confidence_threshold) {
            let from = session.phase();
            session.request_clarification()?;
            self.publish_phase(&session_id, from, session.phase());
            self.append(
                &session_id,
                MessageDraft::new(
                    MessageType::AssistantResponse,
                    format!(
                        "I'm not sure what you meant by \"{}\". Could you be more specific?",
                        text
                    ),
                ),
                report,
            )
            .await;
            return Ok(());
        }

        let command = match self.executor.prepare(&intent).await {
            Ok(command) => command,
            Err(err) => {
                self.fault_turn(session, &err, report).await;
                return Ok(());
            }
        };

        if command.destructive && session.context.session.preferences.confirm_destructive {
            let from = session.phase();
            let prompt = format!(
                "'{}' is destructive. Run it? (yes/no)",
                command.name
            );
            let pending = self.confirmations.begin(
                session,
                prompt.clone(),
                self.config.confirmation_timeout_ms,
                command,
            )?;
            self.publish_phase(&session_id, from, session.phase());
            self.events.publish(EngineEvent::ConfirmationRequested {
                session_id: session_id.clone(),
                prompt: pending.prompt.clone(),
                timeout_ms: pending.timeout_ms,
            });
            self.append(
                &session_id,
                MessageDraft::new(MessageType::ConfirmationRequest, prompt),
                report,
            )
            .await;
            return Ok(());
        }

        let from = session.phase();
        session.begin_execution(&command)?;
        self.publish_phase(&session_id, from, session.phase());
        self.run_command_inner(session, command, report).await
    }

    /// Executes a prepared command; the session is already in
    /// `ExecutingCommand`.
    async fn run_command_inner(
        &self,
        session: &mut ChatSession,
        command: ParsedCommand,
        report: &mut Vec<Message>,
    ) -> Result<()> {
        let session_id = session.session_id().to_string();
        let from = session.phase();
        match self.executor.execute(&command).await {
            Ok(output) => {
                session.complete_execution(output.elapsed_ms)?;
                self.publish_phase(&session_id, from, session.phase());
                self.append(
                    &session_id,
                    MessageDraft::new(MessageType::CommandExecution, output.output.clone())
                        .with_command(command)
                        .with_execution(output),
                    report,
                )
                .await;
            }
            Err(err) => {
                session.fail_execution(err.to_string())?;
                self.publish_phase(&session_id, from, session.phase());
                self.append(
                    &session_id,
                    MessageDraft::new(
                        MessageType::ErrorMessage,
                        format!("Command '{}' failed: {}", command.name, err),
                    ),
                    report,
                )
                .await;
            }
        }
        Ok(())
    }

    /// Routes a collaborator failure mid-turn into the error phase, so
    /// the session stays alive instead of wedging in `Processing`. The
    /// next input (or an explicit acknowledgement) recovers it.
    async fn fault_turn(
        &self,
        session: &mut ChatSession,
        err: &VigilError,
        report: &mut Vec<Message>,
    ) {
        let session_id = session.session_id().to_string();
        tracing::error!(session_id = %session_id, error = %err, "collaborator fault mid-turn");
        let from = session.phase();
        session.fault(err.to_string());
        self.publish_phase(&session_id, from, session.phase());
        self.append(
            &session_id,
            MessageDraft::new(
                MessageType::ErrorMessage,
                format!("Request failed: {}", err),
            ),
            report,
        )
        .await;
    }

    /// Acknowledges a failure explicitly, returning the session to
    /// idle.
    pub async fn acknowledge_error(&self, session_id: &str) -> Result<()> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.lock().await;
        let from = session.phase();
        session.acknowledge_error()?;
        self.publish_phase(session_id, from, session.phase());
        self.persist(&session).await;
        Ok(())
    }

    /// Cancels an open confirmation gate or a pending clarification;
    /// for a gate this is equivalent to letting it expire.
    pub async fn cancel_pending(&self, session_id: &str) -> Result<TurnReport> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.lock().await;
        let mut report = Vec::new();

        if session.phase() == SessionPhase::WaitingClarification {
            let from = session.phase();
            session.cancel_clarification()?;
            self.publish_phase(session_id, from, session.phase());
            self.append(session_id, MessageDraft::system("Never mind."), &mut report)
                .await;
            self.persist(&session).await;
            return Ok(TurnReport {
                phase: session.phase(),
                messages: report,
                suggestions: Vec::new(),
            });
        }

        let from = session.phase();
        let resolution =
            self.confirmations
                .resolve(&mut session, ConfirmationReply::Cancel, Utc::now())?;
        self.publish_phase(session_id, from, session.phase());
        let outcome = match resolution {
            ConfirmationResolution::Expired => ConfirmationOutcome::Expired,
            _ => ConfirmationOutcome::Cancelled,
        };
        self.events.publish(EngineEvent::ConfirmationResolved {
            session_id: session_id.to_string(),
            outcome,
        });
        self.append(
            session_id,
            MessageDraft::system("Command cancelled."),
            &mut report,
        )
        .await;
        self.persist(&session).await;

        Ok(TurnReport {
            phase: session.phase(),
            messages: report,
            suggestions: Vec::new(),
        })
    }

    /// A read-only view for the rendering layer. Touching the session
    /// this way also settles a lapsed confirmation gate.
    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.lock().await;
        let mut report = Vec::new();
        self.settle_expiry(&mut session, &mut report).await?;
        if !report.is_empty() {
            self.persist(&session).await;
        }

        let now = Utc::now();
        Ok(SessionSnapshot {
            session_id: session_id.to_string(),
            phase: session.phase(),
            pending_confirmation: session
                .pending_confirmation()
                .map(|p| (p.prompt.clone(), p.remaining_ms(now))),
            current_topic: session.context.session.current_topic.clone(),
            total_interactions: session.context.total_interactions,
            error_count: session.context.error_count,
            workflow: session
                .context
                .workflow
                .as_ref()
                .map(|w| (w.name.clone(), w.current_step, w.total_steps)),
        })
    }

    /// Suggestions for the next turn, from the live context.
    pub async fn suggestions(&self, session_id: &str) -> Result<Vec<ContextualSuggestion>> {
        let entry = self.entry(session_id).await?;
        let session = entry.lock().await;
        Ok(suggestion::suggest(&session.context, &self.config))
    }

    /// Starts a named workflow on the session. The orchestrator works
    /// on the live context, so this succeeds even in degraded mode.
    pub async fn start_workflow(
        &self,
        session_id: &str,
        template_id: &str,
    ) -> Result<WorkflowState> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.lock().await;
        let workflow = self
            .orchestrator
            .start_workflow(&mut session.context, template_id)?;
        self.persist(&session).await;
        Ok(workflow)
    }

    /// Completes the current workflow step with a result.
    pub async fn advance_workflow_step(
        &self,
        session_id: &str,
        result: serde_json::Value,
    ) -> Result<StepAdvance> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.lock().await;
        let advance = self.orchestrator.advance_step(&mut session.context, result)?;
        self.persist(&session).await;
        Ok(advance)
    }

    /// Skips the current workflow step.
    pub async fn skip_workflow_step(&self, session_id: &str) -> Result<StepAdvance> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.lock().await;
        let advance = self.orchestrator.skip_step(&mut session.context)?;
        self.persist(&session).await;
        Ok(advance)
    }

    /// Abandons the active workflow, keeping its step history.
    pub async fn abandon_workflow(&self, session_id: &str) -> Result<WorkflowState> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.lock().await;
        let workflow = self.orchestrator.abandon_workflow(&mut session.context)?;
        self.persist(&session).await;
        Ok(workflow)
    }

    /// Ids of the sessions currently live in this process, sorted.
    pub async fn session_ids(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Deletes a session from memory and from the store.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        drop(sessions);
        self.store.delete_session(session_id).await
    }

    /// Removes sessions idle since before the cutoff; returns the
    /// count deleted from the store.
    pub async fn cleanup(&self, older_than: chrono::DateTime<Utc>) -> Result<usize> {
        let removed = self.store.cleanup(older_than).await?;
        let mut sessions = self.sessions.write().await;
        // Drop in-memory handles whose backing record is gone.
        let mut stale = Vec::new();
        for session_id in sessions.keys() {
            if self.store.get_session(session_id).await?.is_none() {
                stale.push(session_id.clone());
            }
        }
        for session_id in stale {
            sessions.remove(&session_id);
        }
        Ok(removed)
    }
}
