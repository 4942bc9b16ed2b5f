//! Guided multi-step procedures.
//!
//! - `model`: `WorkflowState` and `WorkflowStep`
//! - `template`: built-in procedure definitions
//! - `orchestrator`: step-pointer discipline over the live context

mod model;
mod orchestrator;
pub mod template;

pub use model::{WorkflowState, WorkflowStep};
pub use orchestrator::{StepAdvance, WorkflowOrchestrator};
