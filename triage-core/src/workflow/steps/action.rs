//! Terminal action step: dispatch approved remediation actions

use crate::models::{ActionRecord, ActionStatus, HumanDecision, IncidentWorkflowState};
use crate::workflow::router::StepName;
use crate::workflow::steps::{IncidentStep, StepReport};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// External remediation-action execution backend.
///
/// Failures are reported per action inside the returned records; one failed
/// action never aborts the rest of the batch.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Dispatch every action implied by the decision and report each outcome
    async fn execute(&self, decision: &HumanDecision) -> Vec<ActionRecord>;
}

/// Stand-in backend that simulates one service restart
pub struct SimulatedActionExecutor;

#[async_trait]
impl ActionExecutor for SimulatedActionExecutor {
    async fn execute(&self, decision: &HumanDecision) -> Vec<ActionRecord> {
        vec![ActionRecord {
            tool: "remediation.restart_service".to_string(),
            status: ActionStatus::Success,
            details: "Simulated restart of the affected service deployment.".to_string(),
            human_comment: decision.comment.clone(),
        }]
    }
}

/// Terminal step: executes the approved remediation and closes the thread.
///
/// The engine halts after this step regardless of router output.
pub struct ActionStep {
    executor: Arc<dyn ActionExecutor>,
}

impl ActionStep {
    /// Create an action step over the given execution backend
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl IncidentStep for ActionStep {
    fn name(&self) -> StepName {
        StepName::Action
    }

    async fn run(&self, state: &mut IncidentWorkflowState) -> Result<StepReport> {
        let Some(decision) = state.human_decision.clone() else {
            bail!(
                "action step reached without a human decision on thread {}",
                state.thread_id
            );
        };

        if decision.approved {
            tracing::info!(
                thread_id = %state.thread_id,
                approver = %decision.approver,
                "dispatching approved remediation actions"
            );
            let actions = self.executor.execute(&decision).await;
            for action in &actions {
                if action.status == ActionStatus::Failed {
                    tracing::warn!(
                        tool = %action.tool,
                        details = %action.details,
                        "remediation action failed"
                    );
                }
            }
            state.actions.extend(actions);
        } else {
            tracing::info!(
                thread_id = %state.thread_id,
                approver = %decision.approver,
                "remediation was not approved, closing thread without actions"
            );
        }

        state.done = true;
        state.next_node = None;
        Ok(StepReport::advance())
    }
}
