//! End-to-end scenarios for the session engine, driven through the
//! use case with scripted collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use vigil_core::classifier::{Intent, IntentClassifier};
use vigil_core::error::{Result, VigilError};
use vigil_core::executor::{CommandExecutor, CommandOutput, ParsedCommand};
use vigil_core::session::store::ContextStore;
use vigil_core::session::{
    ContextPatch, ConversationContext, EngineEvent, EventBus, Message, MessageDraft, MessageType,
    SessionPatch, SessionPhase, SessionState,
};
use vigil_core::EngineConfig;
use vigil_application::SessionUseCase;
use vigil_infrastructure::{logging, InMemoryContextStore};

/// Classifier scripted with fixed intents per phrase.
struct ScriptedClassifier {
    intents: HashMap<&'static str, Intent>,
}

impl ScriptedClassifier {
    fn new() -> Self {
        let mut intents = HashMap::new();

        let mut scan = Intent::new("threat_scan", 0.92);
        scan.entities
            .insert("target".to_string(), serde_json::json!("10.0.0.0/24"));
        intents.insert("scan network 10.0.0.0/24", scan);

        intents.insert("purge old logs", Intent::new("purge_logs", 0.88));
        intents.insert("check status", Intent::new("status_check", 0.41));
        intents.insert("system", Intent::new("status_check", 0.85));
        intents.insert("scan again", Intent::new("threat_scan", 0.9));
        intents.insert("break things", Intent::new("flaky_op", 0.95));
        intents.insert("frobnicate the flux", Intent::new("unmapped_op", 0.95));

        Self { intents }
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, text: &str, _context: &ConversationContext) -> Result<Intent> {
        Ok(self
            .intents
            .get(text)
            .cloned()
            .unwrap_or_else(|| Intent::new("unknown", 0.2)))
    }
}

/// Executor that maps intent types to commands one-to-one and fails on
/// request.
struct ScriptedExecutor {
    destructive: HashSet<&'static str>,
    failing: HashSet<&'static str>,
}

impl ScriptedExecutor {
    fn new() -> Self {
        Self {
            destructive: HashSet::from(["purge_logs"]),
            failing: HashSet::from(["flaky_op"]),
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn prepare(&self, intent: &Intent) -> Result<ParsedCommand> {
        if intent.intent_type == "unmapped_op" {
            return Err(VigilError::execution("no command mapping for 'unmapped_op'"));
        }
        Ok(ParsedCommand {
            name: intent.intent_type.clone(),
            destructive: self.destructive.contains(intent.intent_type.as_str()),
            args: intent.entities.clone(),
        })
    }

    async fn execute(&self, command: &ParsedCommand) -> Result<CommandOutput> {
        if self.failing.contains(command.name.as_str()) {
            return Err(VigilError::execution("backend returned 503"));
        }
        Ok(CommandOutput {
            output: format!("{} completed", command.name),
            elapsed_ms: 42,
        })
    }
}

fn engine_with_config(config: EngineConfig) -> SessionUseCase {
    logging::init_test();
    SessionUseCase::new(
        Arc::new(InMemoryContextStore::new()),
        Arc::new(ScriptedClassifier::new()),
        Arc::new(ScriptedExecutor::new()),
        EventBus::default(),
        config,
    )
}

fn engine() -> SessionUseCase {
    engine_with_config(EngineConfig::default())
}

fn message_types(messages: &[Message]) -> Vec<MessageType> {
    messages.iter().map(|m| m.message_type).collect()
}

#[tokio::test]
async fn scenario_confident_non_destructive_runs_directly() {
    let engine = engine();
    let mut events = engine.events().subscribe();
    let sid = engine.open_session(None, None).await.unwrap();

    let report = engine
        .handle_input(&sid, "scan network 10.0.0.0/24")
        .await
        .unwrap();

    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::UserInput, MessageType::CommandExecution]
    );

    // The phase walk is idle -> processing -> executing_command -> idle.
    let mut walk = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::PhaseChanged { from, to, .. } = event {
            walk.push((from, to));
        }
    }
    assert_eq!(
        walk,
        vec![
            (SessionPhase::Idle, SessionPhase::Processing),
            (SessionPhase::Processing, SessionPhase::ExecutingCommand),
            (SessionPhase::ExecutingCommand, SessionPhase::Idle),
        ]
    );

    let snapshot = engine.snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.total_interactions, 1);
    assert_eq!(snapshot.error_count, 0);
}

#[tokio::test]
async fn scenario_destructive_command_opens_gate_with_default_timeout() {
    let engine = engine();
    let mut events = engine.events().subscribe();
    let sid = engine.open_session(None, None).await.unwrap();

    let report = engine.handle_input(&sid, "purge old logs").await.unwrap();
    assert_eq!(report.phase, SessionPhase::WaitingConfirmation);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::UserInput, MessageType::ConfirmationRequest]
    );

    let mut requested_timeout = None;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::ConfirmationRequested { timeout_ms, .. } = event {
            requested_timeout = Some(timeout_ms);
        }
    }
    assert_eq!(requested_timeout, Some(30_000));

    let snapshot = engine.snapshot(&sid).await.unwrap();
    let (_, remaining) = snapshot.pending_confirmation.unwrap();
    assert!(remaining <= 30_000);
}

#[tokio::test]
async fn scenario_expired_gate_resolves_on_next_touch() {
    // Zero timeout: the gate lapses before any reply can arrive.
    let engine = engine_with_config(EngineConfig {
        confirmation_timeout_ms: 0,
        ..Default::default()
    });
    let sid = engine.open_session(None, None).await.unwrap();

    engine.handle_input(&sid, "purge old logs").await.unwrap();

    // A late affirmative must not execute the command.
    let report = engine.handle_input(&sid, "yes").await.unwrap();
    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(message_types(&report.messages), vec![MessageType::SystemMessage]);
    assert!(report.messages[0].content.contains("expired"));

    let snapshot = engine.snapshot(&sid).await.unwrap();
    // Expiry is a normal outcome, not an error; nothing executed.
    assert_eq!(snapshot.error_count, 0);
    assert_eq!(snapshot.total_interactions, 0);
}

#[tokio::test]
async fn scenario_affirmative_in_time_executes_gated_command() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    engine.handle_input(&sid, "purge old logs").await.unwrap();
    let report = engine.handle_input(&sid, "yes").await.unwrap();

    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::CommandExecution]
    );
    assert!(report.messages[0].content.contains("purge_logs completed"));
}

#[tokio::test]
async fn scenario_negative_reply_drops_the_command() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    engine.handle_input(&sid, "purge old logs").await.unwrap();
    let report = engine.handle_input(&sid, "no").await.unwrap();

    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(message_types(&report.messages), vec![MessageType::SystemMessage]);

    let snapshot = engine.snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.total_interactions, 0);
}

#[tokio::test]
async fn scenario_ambiguous_input_clarifies_then_executes() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    let report = engine.handle_input(&sid, "check status").await.unwrap();
    assert_eq!(report.phase, SessionPhase::WaitingClarification);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::UserInput, MessageType::AssistantResponse]
    );

    let report = engine.handle_input(&sid, "system").await.unwrap();
    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::UserInput, MessageType::CommandExecution]
    );
}

#[tokio::test]
async fn pending_clarification_can_be_cancelled() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    engine.handle_input(&sid, "check status").await.unwrap();
    let report = engine.cancel_pending(&sid).await.unwrap();

    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(message_types(&report.messages), vec![MessageType::SystemMessage]);
}

#[tokio::test]
async fn scenario_incident_response_workflow_advances_one_step() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    let workflow = engine
        .start_workflow(&sid, "incident_response")
        .await
        .unwrap();
    assert_eq!(workflow.current_step, 0);
    assert_eq!(workflow.total_steps, 6);

    let advance = engine
        .advance_workflow_step(&sid, serde_json::json!({"hosts": 3}))
        .await
        .unwrap();
    assert_eq!(advance.resolved_step, 0);
    assert_eq!(advance.current_step, 1);
    assert!(!advance.finished);

    let snapshot = engine.snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.workflow, Some(("Incident Response".to_string(), 1, 6)));
}

#[tokio::test]
async fn workflow_cannot_advance_past_its_final_step() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    engine.start_workflow(&sid, "threat_hunting").await.unwrap();
    for _ in 0..5 {
        engine.skip_workflow_step(&sid).await.unwrap();
    }

    let err = engine.skip_workflow_step(&sid).await.unwrap_err();
    assert!(matches!(err, VigilError::WorkflowComplete { .. }));
}

#[tokio::test]
async fn abandoned_workflow_returns_its_step_history() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    engine
        .start_workflow(&sid, "vulnerability_assessment")
        .await
        .unwrap();
    engine
        .advance_workflow_step(&sid, serde_json::json!("inventory done"))
        .await
        .unwrap();

    let abandoned = engine.abandon_workflow(&sid).await.unwrap();
    assert!(abandoned.steps[0].completed);
    assert_eq!(abandoned.current_step, 1);

    let snapshot = engine.snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.workflow, None);
}

#[tokio::test]
async fn scenario_frequent_intent_ranks_above_rare_one() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    engine
        .handle_input(&sid, "scan network 10.0.0.0/24")
        .await
        .unwrap();
    engine.handle_input(&sid, "scan again").await.unwrap();
    engine.handle_input(&sid, "system").await.unwrap();

    let suggestions = engine.suggestions(&sid).await.unwrap();
    let scan = suggestions
        .iter()
        .find(|s| s.content.contains("threat_scan"))
        .expect("threat_scan suggestion");
    let status = suggestions
        .iter()
        .find(|s| s.content.contains("status_check"))
        .expect("status_check suggestion");
    assert!(scan.confidence > status.confidence);
}

#[tokio::test]
async fn execution_failure_holds_error_until_next_input() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    let report = engine.handle_input(&sid, "break things").await.unwrap();
    assert_eq!(report.phase, SessionPhase::Error);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::UserInput, MessageType::ErrorMessage]
    );

    let snapshot = engine.snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.error_count, 1);

    // The next input acknowledges the failure and is processed fresh.
    let report = engine
        .handle_input(&sid, "scan network 10.0.0.0/24")
        .await
        .unwrap();
    assert_eq!(report.phase, SessionPhase::Idle);
}

/// Classifier whose backend is down: every call errors.
struct FaultyClassifier;

#[async_trait]
impl IntentClassifier for FaultyClassifier {
    async fn classify(&self, _: &str, _: &ConversationContext) -> Result<Intent> {
        Err(VigilError::internal("classifier backend unavailable"))
    }
}

#[tokio::test]
async fn classifier_fault_moves_session_to_error_and_stays_recoverable() {
    logging::init_test();
    let engine = SessionUseCase::new(
        Arc::new(InMemoryContextStore::new()),
        Arc::new(FaultyClassifier),
        Arc::new(ScriptedExecutor::new()),
        EventBus::default(),
        EngineConfig::default(),
    );
    let sid = engine.open_session(None, None).await.unwrap();

    // The turn completes with a report instead of bubbling the failure.
    let report = engine
        .handle_input(&sid, "scan network 10.0.0.0/24")
        .await
        .unwrap();
    assert_eq!(report.phase, SessionPhase::Error);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::UserInput, MessageType::ErrorMessage]
    );

    let snapshot = engine.snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.error_count, 1);

    // The session is not wedged: an explicit acknowledgement returns
    // it to idle.
    engine.acknowledge_error(&sid).await.unwrap();
    assert_eq!(engine.snapshot(&sid).await.unwrap().phase, SessionPhase::Idle);
}

#[tokio::test]
async fn command_preparation_fault_recovers_on_next_input() {
    let engine = engine();
    let sid = engine.open_session(None, None).await.unwrap();

    let report = engine.handle_input(&sid, "frobnicate the flux").await.unwrap();
    assert_eq!(report.phase, SessionPhase::Error);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::UserInput, MessageType::ErrorMessage]
    );

    // The next input acknowledges the fault and is processed fresh.
    let report = engine
        .handle_input(&sid, "scan network 10.0.0.0/24")
        .await
        .unwrap();
    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(engine.snapshot(&sid).await.unwrap().error_count, 1);
}

#[tokio::test]
async fn session_survives_engine_restart_via_store() {
    logging::init_test();
    let store = Arc::new(InMemoryContextStore::new());
    let engine = SessionUseCase::new(
        store.clone(),
        Arc::new(ScriptedClassifier::new()),
        Arc::new(ScriptedExecutor::new()),
        EventBus::default(),
        EngineConfig::default(),
    );
    let sid = engine.open_session(None, Some("analyst".to_string())).await.unwrap();
    engine
        .handle_input(&sid, "scan network 10.0.0.0/24")
        .await
        .unwrap();
    drop(engine);

    let revived = SessionUseCase::new(
        store,
        Arc::new(ScriptedClassifier::new()),
        Arc::new(ScriptedExecutor::new()),
        EventBus::default(),
        EngineConfig::default(),
    );
    let snapshot = revived.snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.total_interactions, 1);
    assert_eq!(snapshot.current_topic.as_deref(), Some("threat_scan"));
}

/// A store whose backend is unreachable: every write errors, every
/// read comes back empty.
struct OfflineStore;

#[async_trait]
impl ContextStore for OfflineStore {
    async fn create_session(&self, _: &str, _: Option<String>) -> Result<SessionState> {
        Err(VigilError::data_access("store offline"))
    }
    async fn get_session(&self, _: &str) -> Result<Option<SessionState>> {
        Ok(None)
    }
    async fn update_session(&self, _: &str, _: SessionPatch) -> Result<SessionState> {
        Err(VigilError::data_access("store offline"))
    }
    async fn delete_session(&self, _: &str) -> Result<()> {
        Err(VigilError::data_access("store offline"))
    }
    async fn add_message(&self, _: &str, _: MessageDraft) -> Result<Message> {
        Err(VigilError::data_access("store offline"))
    }
    async fn get_messages(&self, _: &str, _: Option<usize>) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
    async fn search_messages(&self, _: &str, _: &str) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
    async fn get_context(&self, _: &str) -> Result<Option<ConversationContext>> {
        Err(VigilError::data_access("store offline"))
    }
    async fn update_context(&self, _: &str, _: ContextPatch) -> Result<ConversationContext> {
        Err(VigilError::data_access("store offline"))
    }
    async fn put_context(&self, _: &str, _: ConversationContext) -> Result<()> {
        Err(VigilError::data_access("store offline"))
    }
    async fn set_entity(&self, _: &str, _: &str, _: serde_json::Value) -> Result<()> {
        Err(VigilError::data_access("store offline"))
    }
    async fn get_entity(&self, _: &str, _: &str) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
    async fn set_variable(&self, _: &str, _: &str, _: serde_json::Value) -> Result<()> {
        Err(VigilError::data_access("store offline"))
    }
    async fn get_variable(&self, _: &str, _: &str) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
    async fn cleanup(&self, _: DateTime<Utc>) -> Result<usize> {
        Err(VigilError::data_access("store offline"))
    }
}

#[tokio::test]
async fn unreachable_store_degrades_instead_of_crashing() {
    logging::init_test();
    let engine = SessionUseCase::new(
        Arc::new(OfflineStore),
        Arc::new(ScriptedClassifier::new()),
        Arc::new(ScriptedExecutor::new()),
        EventBus::default(),
        EngineConfig::default(),
    );
    let mut events = engine.events().subscribe();

    let sid = engine.open_session(None, None).await.unwrap();
    let report = engine
        .handle_input(&sid, "scan network 10.0.0.0/24")
        .await
        .unwrap();

    // The turn still completes against the ephemeral context.
    assert_eq!(report.phase, SessionPhase::Idle);
    assert_eq!(
        message_types(&report.messages),
        vec![MessageType::UserInput, MessageType::CommandExecution]
    );

    let mut degraded = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, EngineEvent::StorageDegraded { .. }) {
            degraded = true;
        }
    }
    assert!(degraded);
}

#[tokio::test]
async fn degraded_session_still_runs_workflows() {
    logging::init_test();
    let engine = SessionUseCase::new(
        Arc::new(OfflineStore),
        Arc::new(ScriptedClassifier::new()),
        Arc::new(ScriptedExecutor::new()),
        EventBus::default(),
        EngineConfig::default(),
    );
    let sid = engine.open_session(None, None).await.unwrap();

    let workflow = engine
        .start_workflow(&sid, "incident_response")
        .await
        .unwrap();
    assert_eq!(workflow.total_steps, 6);

    let advance = engine
        .advance_workflow_step(&sid, serde_json::json!("scope set"))
        .await
        .unwrap();
    assert_eq!(advance.current_step, 1);

    let snapshot = engine.snapshot(&sid).await.unwrap();
    assert_eq!(
        snapshot.workflow,
        Some(("Incident Response".to_string(), 1, 6))
    );
}

#[tokio::test]
async fn cleanup_removes_stale_sessions_end_to_end() {
    logging::init_test();
    let store = Arc::new(InMemoryContextStore::new());
    let engine = SessionUseCase::new(
        store.clone(),
        Arc::new(ScriptedClassifier::new()),
        Arc::new(ScriptedExecutor::new()),
        EventBus::default(),
        EngineConfig::default(),
    );
    let sid = engine.open_session(None, None).await.unwrap();

    // Nothing is stale yet.
    let cutoff = Utc::now() - chrono::Duration::days(7);
    assert_eq!(engine.cleanup(cutoff).await.unwrap(), 0);
    assert!(store.get_session(&sid).await.unwrap().is_some());

    // Everything is stale against a future cutoff.
    let removed = engine
        .cleanup(Utc::now() + chrono::Duration::days(1))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_session(&sid).await.unwrap().is_none());
}
