//! Session domain module.
//!
//! This module contains all session-related domain models, the state
//! machine, the context store interface, and the event bus.
//!
//! # Module structure
//!
//! - `model`: persisted session record (`SessionState`, preferences)
//! - `message`: conversation message types (`Message`, `MessageDraft`)
//! - `phase`: state-machine phases and the pending-confirmation gate
//! - `context`: `ConversationContext` and the bounded recency windows
//! - `machine`: `ChatSession`, the transition table as methods
//! - `event`: typed engine events over a broadcast channel
//! - `store`: `ContextStore` persistence trait

mod context;
mod event;
mod machine;
mod message;
mod model;
mod phase;
pub mod store;

pub use context::{
    ContextPatch, ConversationContext, ObservedEntity, RecentWindow, RECENT_WINDOW_CAPACITY,
};
pub use event::{ConfirmationOutcome, EngineEvent, EventBus};
pub use machine::ChatSession;
pub use message::{Message, MessageDraft, MessageType};
pub use model::{AuthStatus, OutputFormat, SessionPatch, SessionPreferences, SessionState};
pub use phase::{PendingConfirmation, SessionPhase};
pub use store::ContextStore;

// Re-exported so the context can embed the active workflow without a
// circular module path in user code.
pub use crate::workflow::WorkflowState;
