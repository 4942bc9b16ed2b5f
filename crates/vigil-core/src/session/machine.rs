//! Session state machine.
//!
//! [`ChatSession`] owns the single authoritative phase of one
//! conversation and the live context it mutates. Every phase change
//! goes through a transition method; an event that is not legal in the
//! current phase is rejected with
//! [`VigilError::InvalidTransition`](crate::error::VigilError), never
//! silently coerced.
//!
//! The pending confirmation lives inside the session record, so the
//! phase and the gate are always updated under the same `&mut self`
//! borrow: `WaitingConfirmation` with no pending confirmation (or the
//! reverse) cannot be observed between transitions.

use super::context::ConversationContext;
use super::phase::{PendingConfirmation, SessionPhase};
use crate::error::{Result, VigilError};
use crate::executor::ParsedCommand;

/// The runtime object for one active conversation.
///
/// Discarded or rehydrated from the context store across process
/// restarts; not persisted verbatim.
#[derive(Debug, Clone)]
pub struct ChatSession {
    phase: SessionPhase,
    /// The live context; the application layer writes it back to the
    /// store at the end of each turn.
    pub context: ConversationContext,
}

impl ChatSession {
    /// Wraps a context in a fresh idle session.
    pub fn new(context: ConversationContext) -> Self {
        Self {
            phase: SessionPhase::Idle,
            context,
        }
    }

    /// Rebuilds a session from a stored context.
    ///
    /// A persisted pending confirmation puts the session back into
    /// `WaitingConfirmation`; expiry is then settled lazily on the next
    /// touch, like any other interaction.
    pub fn rehydrate(context: ConversationContext) -> Self {
        let phase = if context.session.pending_confirmation.is_some() {
            SessionPhase::WaitingConfirmation
        } else {
            SessionPhase::Idle
        };
        Self { phase, context }
    }

    pub fn session_id(&self) -> &str {
        &self.context.session.session_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        self.context.session.pending_confirmation.as_ref()
    }

    fn reject(&self, event: &'static str) -> VigilError {
        VigilError::InvalidTransition {
            phase: self.phase.as_str().to_string(),
            event,
        }
    }

    fn transition(&mut self, to: SessionPhase) -> SessionPhase {
        let from = self.phase;
        self.phase = to;
        self.context.session.touch();
        tracing::debug!(
            session_id = %self.session_id(),
            from = %from,
            to = %to,
            "session phase change"
        );
        from
    }

    /// User input arrived: `Idle` or `WaitingClarification` moves to
    /// `Processing`. A clarification follow-up is re-resolved with the
    /// entities accumulated so far.
    pub fn receive_input(&mut self) -> Result<()> {
        match self.phase {
            SessionPhase::Idle | SessionPhase::WaitingClarification => {
                self.transition(SessionPhase::Processing);
                Ok(())
            }
            _ => Err(self.reject("user_input")),
        }
    }

    /// Intent resolved confidently to a non-destructive command (or a
    /// confirmation was accepted): start executing.
    pub fn begin_execution(&mut self, command: &ParsedCommand) -> Result<()> {
        match self.phase {
            SessionPhase::Processing | SessionPhase::WaitingConfirmation => {
                self.context.session.active_command = Some(command.name.clone());
                self.transition(SessionPhase::ExecutingCommand);
                Ok(())
            }
            _ => Err(self.reject("begin_execution")),
        }
    }

    /// Intent resolved confidently to a destructive command: open the
    /// confirmation gate.
    ///
    /// # Errors
    ///
    /// `ConfirmationPending` if a gate is already open; only one may
    /// exist per session.
    pub fn require_confirmation(&mut self, pending: PendingConfirmation) -> Result<()> {
        if self.phase != SessionPhase::Processing {
            return Err(self.reject("require_confirmation"));
        }
        if self.context.session.pending_confirmation.is_some() {
            return Err(VigilError::ConfirmationPending(
                self.session_id().to_string(),
            ));
        }
        self.context.session.pending_confirmation = Some(pending);
        self.transition(SessionPhase::WaitingConfirmation);
        Ok(())
    }

    /// Intent was ambiguous or low-confidence: ask for clarification.
    pub fn request_clarification(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Processing {
            return Err(self.reject("request_clarification"));
        }
        self.transition(SessionPhase::WaitingClarification);
        Ok(())
    }

    /// Clears the gate and returns to `Idle` (decline, expiry, or
    /// explicit cancel — all equivalent outcomes).
    pub(crate) fn close_confirmation(&mut self) -> Result<PendingConfirmation> {
        if self.phase != SessionPhase::WaitingConfirmation {
            return Err(self.reject("close_confirmation"));
        }
        let pending = self
            .context
            .session
            .pending_confirmation
            .take()
            .ok_or_else(|| {
                VigilError::internal("waiting_confirmation phase with no pending confirmation")
            })?;
        self.transition(SessionPhase::Idle);
        Ok(pending)
    }

    /// Clears the gate and starts executing the confirmed command.
    pub(crate) fn accept_confirmation(&mut self) -> Result<ParsedCommand> {
        if self.phase != SessionPhase::WaitingConfirmation {
            return Err(self.reject("accept_confirmation"));
        }
        let pending = self
            .context
            .session
            .pending_confirmation
            .take()
            .ok_or_else(|| {
                VigilError::internal("waiting_confirmation phase with no pending confirmation")
            })?;
        let command = pending.command;
        self.context.session.active_command = Some(command.name.clone());
        self.transition(SessionPhase::ExecutingCommand);
        Ok(command)
    }

    /// Drops a pending clarification without answering it.
    pub fn cancel_clarification(&mut self) -> Result<()> {
        if self.phase != SessionPhase::WaitingClarification {
            return Err(self.reject("cancel_clarification"));
        }
        self.transition(SessionPhase::Idle);
        Ok(())
    }

    /// Executor finished: fold the interaction into the running stats
    /// and return to `Idle`.
    pub fn complete_execution(&mut self, elapsed_ms: u64) -> Result<()> {
        if self.phase != SessionPhase::ExecutingCommand {
            return Err(self.reject("complete_execution"));
        }
        if let Some(name) = self.context.session.active_command.take() {
            self.context.recent_commands.push(name);
        }
        self.context.record_interaction(elapsed_ms);
        self.transition(SessionPhase::Idle);
        Ok(())
    }

    /// Executor failed: record the error and hold in `Error` until
    /// acknowledged.
    pub fn fail_execution(&mut self, detail: impl Into<String>) -> Result<()> {
        if self.phase != SessionPhase::ExecutingCommand {
            return Err(self.reject("fail_execution"));
        }
        self.context.session.active_command = None;
        self.context.last_error = Some(detail.into());
        self.context.error_count += 1;
        self.transition(SessionPhase::Error);
        Ok(())
    }

    /// User acknowledged the failure: back to `Idle`. The error stays
    /// recorded on the context.
    pub fn acknowledge_error(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Error {
            return Err(self.reject("acknowledge_error"));
        }
        self.transition(SessionPhase::Idle);
        Ok(())
    }

    /// Unrecoverable internal fault: legal from any phase. Clears any
    /// pending gate so the error phase is not left holding a stale one.
    pub fn fault(&mut self, detail: impl Into<String>) {
        self.context.session.pending_confirmation = None;
        self.context.session.active_command = None;
        self.context.last_error = Some(detail.into());
        self.context.error_count += 1;
        self.transition(SessionPhase::Error);
    }

    /// Phase/gate pairing invariant, checked by tests after every
    /// transition.
    pub fn invariants_hold(&self) -> bool {
        match self.phase {
            SessionPhase::WaitingConfirmation => {
                self.context.session.pending_confirmation.is_some()
            }
            _ => self.context.session.pending_confirmation.is_none(),
        }
    }
}
