//! Workflow orchestration.
//!
//! The orchestrator owns the step-pointer discipline: one increment per
//! advance/skip, never past the final step, each step resolved at most
//! once. Callers cannot move the pointer any other way.
//!
//! It operates on the live [`ConversationContext`] under the caller's
//! per-session lock; persisting the mutated context is the caller's
//! job, so workflows keep working when the backing store is degraded.

use super::model::WorkflowState;
use super::template;
use crate::error::{Result, VigilError};
use crate::session::{ConversationContext, EngineEvent, EventBus};

/// How a step was resolved by [`WorkflowOrchestrator::advance_step`] or
/// [`WorkflowOrchestrator::skip_step`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepAdvance {
    pub workflow_id: String,
    /// Index of the step that was just resolved.
    pub resolved_step: usize,
    /// The new pointer position.
    pub current_step: usize,
    /// Whether the whole workflow is now finished.
    pub finished: bool,
}

/// Drives named guided procedures attached to sessions.
pub struct WorkflowOrchestrator {
    events: EventBus,
}

impl WorkflowOrchestrator {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }

    /// Instantiates a template and attaches it to the context at step 0.
    ///
    /// # Errors
    ///
    /// - `UnknownTemplate` for ids with no built-in.
    /// - `Internal` if a workflow is already attached; abandon it first.
    pub fn start_workflow(
        &self,
        context: &mut ConversationContext,
        template_id: &str,
    ) -> Result<WorkflowState> {
        let workflow = template::template(template_id)?.instantiate();

        let session_id = context.session.session_id.clone();
        if let Some(active) = &context.workflow {
            return Err(VigilError::internal(format!(
                "session '{}' already runs workflow '{}'",
                session_id, active.workflow_id
            )));
        }

        context.workflow = Some(workflow.clone());
        context.session.touch();

        tracing::info!(
            session_id = %session_id,
            workflow_id = template_id,
            total_steps = workflow.total_steps,
            "workflow started"
        );
        self.events.publish(EngineEvent::WorkflowStarted {
            session_id,
            workflow_id: workflow.workflow_id.clone(),
            total_steps: workflow.total_steps,
        });
        Ok(workflow)
    }

    /// Marks the current step completed with `result` and moves the
    /// pointer forward by one.
    pub fn advance_step(
        &self,
        context: &mut ConversationContext,
        result: serde_json::Value,
    ) -> Result<StepAdvance> {
        self.resolve_step(context, Some(result))
    }

    /// Marks the current step skipped and moves the pointer forward by
    /// one, exactly as `advance_step` does.
    pub fn skip_step(&self, context: &mut ConversationContext) -> Result<StepAdvance> {
        self.resolve_step(context, None)
    }

    fn resolve_step(
        &self,
        context: &mut ConversationContext,
        result: Option<serde_json::Value>,
    ) -> Result<StepAdvance> {
        let session_id = context.session.session_id.clone();
        let skipped = result.is_none();

        let advance = {
            let workflow = context
                .workflow
                .as_mut()
                .ok_or_else(|| VigilError::NoActiveWorkflow(session_id.clone()))?;

            // A call at or past the final step is a no-op error, never
            // an out-of-range increment.
            if workflow.is_finished() {
                return Err(VigilError::WorkflowComplete {
                    workflow_id: workflow.workflow_id.clone(),
                    total_steps: workflow.total_steps,
                });
            }

            let index = workflow.current_step;
            {
                let step = &mut workflow.steps[index];
                if step.is_resolved() {
                    return Err(VigilError::internal(format!(
                        "step '{}' of workflow '{}' resolved twice",
                        step.step_id, workflow.workflow_id
                    )));
                }
                match result {
                    Some(value) => {
                        step.completed = true;
                        step.result = Some(value);
                    }
                    None => step.skipped = true,
                }
            }
            workflow.current_step += 1;

            StepAdvance {
                workflow_id: workflow.workflow_id.clone(),
                resolved_step: index,
                current_step: workflow.current_step,
                finished: workflow.is_finished(),
            }
        };
        context.session.touch();

        tracing::info!(
            session_id = %session_id,
            workflow_id = %advance.workflow_id,
            step = advance.resolved_step,
            skipped,
            "workflow step resolved"
        );
        self.events.publish(EngineEvent::WorkflowStepResolved {
            session_id,
            workflow_id: advance.workflow_id.clone(),
            step_index: advance.resolved_step,
            skipped,
        });
        Ok(advance)
    }

    /// Detaches the workflow from the context without touching its step
    /// history.
    pub fn abandon_workflow(&self, context: &mut ConversationContext) -> Result<WorkflowState> {
        let session_id = context.session.session_id.clone();
        let workflow = context
            .workflow
            .take()
            .ok_or_else(|| VigilError::NoActiveWorkflow(session_id.clone()))?;
        context.session.touch();

        tracing::info!(
            session_id = %session_id,
            workflow_id = %workflow.workflow_id,
            at_step = workflow.current_step,
            "workflow abandoned"
        );
        self.events.publish(EngineEvent::WorkflowAbandoned {
            session_id,
            workflow_id: workflow.workflow_id.clone(),
        });
        Ok(workflow)
    }
}
