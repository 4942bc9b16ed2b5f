//! Workflow domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One step of a guided procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_id: String,
    pub name: String,
    pub description: String,
    /// Command bound to this step, if the step maps to one directly.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub skipped: bool,
    /// Result recorded on completion. Kept last: a JSON object here
    /// serializes as a TOML table.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl WorkflowStep {
    /// Whether this step has already been resolved one way or the other.
    pub fn is_resolved(&self) -> bool {
        self.completed || self.skipped
    }
}

/// A named, multi-step guided procedure in progress.
///
/// `current_step` only ever moves forward, by exactly one per
/// advance/skip, and never exceeds `total_steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub name: String,
    pub description: String,
    pub current_step: usize,
    pub total_steps: usize,
    pub start_time: DateTime<Utc>,
    /// Rough duration estimate, in minutes, for display.
    #[serde(default)]
    pub estimated_duration_min: Option<u32>,
    pub steps: Vec<WorkflowStep>,
    /// Workflow-scoped variables accumulated across steps.
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

impl WorkflowState {
    /// Whether every step has been advanced past.
    pub fn is_finished(&self) -> bool {
        self.current_step >= self.total_steps
    }

    /// The step the pointer currently sits on, if any remain.
    pub fn current(&self) -> Option<&WorkflowStep> {
        self.steps.get(self.current_step)
    }
}
