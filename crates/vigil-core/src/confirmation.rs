//! Confirmation gate resolution.
//!
//! Destructive commands wait behind a [`PendingConfirmation`] with a
//! deadline. Expiry is enforced lazily: the gate is re-checked whenever
//! the session is next touched (a reply, a status query, or a sweep),
//! and an expired gate always resolves to [`ConfirmationResolution::Expired`]
//! no matter what the late reply says.

use crate::error::{Result, VigilError};
use crate::executor::ParsedCommand;
use crate::session::{ChatSession, PendingConfirmation, SessionPhase};
use chrono::{DateTime, Utc};

/// A caller's input to `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationReply {
    /// The user approved the command.
    Affirmative,
    /// The user declined the command.
    Negative,
    /// The user explicitly cancelled the gate.
    Cancel,
    /// No reply; just settle expiry if the deadline passed.
    TimeoutCheck,
}

impl ConfirmationReply {
    /// Interprets a free-text reply as an affirmative or negative,
    /// when it clearly is one.
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "y" | "yes" | "confirm" | "ok" | "proceed" => Some(Self::Affirmative),
            "n" | "no" | "deny" | "abort" => Some(Self::Negative),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// The settled outcome of a `resolve` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationResolution {
    /// Gate approved in time; the command may now execute.
    Accepted(ParsedCommand),
    /// Gate declined; the command is dropped.
    Declined,
    /// Deadline passed before a usable reply arrived.
    Expired,
    /// Gate cancelled explicitly; equivalent to expiry for the session.
    Cancelled,
    /// `TimeoutCheck` before the deadline: nothing changes.
    StillPending { remaining_ms: u64 },
}

/// Opens and settles confirmation gates on a [`ChatSession`].
///
/// Stateless by design: the gate itself lives in the session record, so
/// the manager can be shared freely between sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationManager;

impl ConfirmationManager {
    pub fn new() -> Self {
        Self
    }

    /// Opens a gate for a destructive command.
    ///
    /// # Errors
    ///
    /// - `ConfirmationPending` if a gate is already open for the
    ///   session (a usage error by the caller, never an overwrite).
    /// - `InvalidTransition` if the session is not in `Processing`.
    pub fn begin(
        &self,
        session: &mut ChatSession,
        prompt: impl Into<String>,
        timeout_ms: u64,
        command: ParsedCommand,
    ) -> Result<PendingConfirmation> {
        let pending = PendingConfirmation::new(prompt, timeout_ms, command);
        session.require_confirmation(pending.clone())?;
        tracing::info!(
            session_id = %session.session_id(),
            command = %pending.command.name,
            timeout_ms = pending.timeout_ms,
            "confirmation gate opened"
        );
        Ok(pending)
    }

    /// Settles the gate against a reply or a lazy expiry check.
    ///
    /// Expiry is evaluated first and wins every race: a reply arriving
    /// at or after the deadline resolves `Expired` even if affirmative.
    ///
    /// # Errors
    ///
    /// - `NoPendingConfirmation` if no gate is open.
    pub fn resolve(
        &self,
        session: &mut ChatSession,
        reply: ConfirmationReply,
        now: DateTime<Utc>,
    ) -> Result<ConfirmationResolution> {
        if session.phase() != SessionPhase::WaitingConfirmation {
            return Err(VigilError::NoPendingConfirmation(
                session.session_id().to_string(),
            ));
        }
        let expired = session
            .pending_confirmation()
            .map(|p| p.is_expired(now))
            .unwrap_or(true);

        if expired {
            session.close_confirmation()?;
            tracing::info!(session_id = %session.session_id(), "confirmation expired");
            return Ok(ConfirmationResolution::Expired);
        }

        match reply {
            ConfirmationReply::Affirmative => {
                let command = session.accept_confirmation()?;
                Ok(ConfirmationResolution::Accepted(command))
            }
            ConfirmationReply::Negative => {
                session.close_confirmation()?;
                Ok(ConfirmationResolution::Declined)
            }
            ConfirmationReply::Cancel => {
                session.close_confirmation()?;
                Ok(ConfirmationResolution::Cancelled)
            }
            ConfirmationReply::TimeoutCheck => {
                let remaining_ms = session
                    .pending_confirmation()
                    .map(|p| p.remaining_ms(now))
                    .unwrap_or(0);
                Ok(ConfirmationResolution::StillPending { remaining_ms })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConversationContext;
    use chrono::Duration;

    fn gated_session() -> (ChatSession, ConfirmationManager) {
        let mut session = ChatSession::new(ConversationContext::ephemeral("s-1"));
        session.receive_input().unwrap();
        let manager = ConfirmationManager::new();
        manager
            .begin(
                &mut session,
                "Run 'block_ip 203.0.113.9'?",
                30_000,
                ParsedCommand {
                    name: "block_ip".to_string(),
                    args: Default::default(),
                    destructive: true,
                },
            )
            .unwrap();
        (session, manager)
    }

    #[test]
    fn affirmative_before_deadline_is_accepted() {
        let (mut session, manager) = gated_session();
        let now = session.pending_confirmation().unwrap().created_at + Duration::seconds(5);

        match manager
            .resolve(&mut session, ConfirmationReply::Affirmative, now)
            .unwrap()
        {
            ConfirmationResolution::Accepted(command) => assert_eq!(command.name, "block_ip"),
            other => panic!("expected Accepted, got {:?}", other),
        }
        assert_eq!(session.phase(), SessionPhase::ExecutingCommand);
    }

    #[test]
    fn late_affirmative_resolves_expired() {
        let (mut session, manager) = gated_session();
        let late = session.pending_confirmation().unwrap().created_at + Duration::seconds(31);

        let resolution = manager
            .resolve(&mut session, ConfirmationReply::Affirmative, late)
            .unwrap();
        assert_eq!(resolution, ConfirmationResolution::Expired);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.pending_confirmation().is_none());
    }

    #[test]
    fn expiry_at_exact_deadline_wins() {
        let (mut session, manager) = gated_session();
        let boundary = session.pending_confirmation().unwrap().created_at
            + Duration::milliseconds(30_000);

        let resolution = manager
            .resolve(&mut session, ConfirmationReply::Affirmative, boundary)
            .unwrap();
        assert_eq!(resolution, ConfirmationResolution::Expired);
    }

    #[test]
    fn negative_and_cancel_return_to_idle() {
        for reply in [ConfirmationReply::Negative, ConfirmationReply::Cancel] {
            let (mut session, manager) = gated_session();
            let now = session.pending_confirmation().unwrap().created_at + Duration::seconds(1);
            manager.resolve(&mut session, reply, now).unwrap();
            assert_eq!(session.phase(), SessionPhase::Idle);
            assert!(session.invariants_hold());
        }
    }

    #[test]
    fn timeout_check_before_deadline_keeps_waiting() {
        let (mut session, manager) = gated_session();
        let now = session.pending_confirmation().unwrap().created_at + Duration::seconds(10);

        match manager
            .resolve(&mut session, ConfirmationReply::TimeoutCheck, now)
            .unwrap()
        {
            ConfirmationResolution::StillPending { remaining_ms } => {
                assert_eq!(remaining_ms, 20_000)
            }
            other => panic!("expected StillPending, got {:?}", other),
        }
        assert_eq!(session.phase(), SessionPhase::WaitingConfirmation);
    }

    #[test]
    fn resolving_without_a_gate_is_an_error() {
        let mut session = ChatSession::new(ConversationContext::ephemeral("s-1"));
        let manager = ConfirmationManager::new();
        let err = manager
            .resolve(&mut session, ConfirmationReply::Affirmative, chrono::Utc::now())
            .unwrap_err();
        assert!(matches!(err, VigilError::NoPendingConfirmation(_)));
    }

    #[test]
    fn free_text_reply_interpretation() {
        assert_eq!(
            ConfirmationReply::from_text("  YES "),
            Some(ConfirmationReply::Affirmative)
        );
        assert_eq!(
            ConfirmationReply::from_text("no"),
            Some(ConfirmationReply::Negative)
        );
        assert_eq!(
            ConfirmationReply::from_text("cancel"),
            Some(ConfirmationReply::Cancel)
        );
        assert_eq!(ConfirmationReply::from_text("maybe later"), None);
    }
}
