//! Human approval gate: the workflow's one true suspension point

use crate::models::{HumanDecision, IncidentWorkflowState};
use crate::workflow::approval::ApprovalManager;
use crate::workflow::router::StepName;
use crate::workflow::steps::{IncidentStep, StepReport};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

/// How the gate obtains the human decision
pub enum GateMode {
    /// Immediately synthesize an approved decision. Demonstration mode;
    /// production deployments use `Managed` or `Suspend`.
    Synthetic {
        /// Identity recorded as the approver
        approver: String,
    },
    /// Raise an approval request and wait in-process up to the timeout;
    /// when no decision arrives the thread parks in the store instead.
    Managed {
        /// Shared approval manager routing decisions to waiting gates
        manager: Arc<ApprovalManager>,
        /// How long to wait in-process before parking
        timeout_seconds: u64,
    },
    /// Park immediately; a decision arrives later through the engine's
    /// resume entry point.
    Suspend,
}

/// Gate step between the judge and action dispatch.
///
/// Whatever the mode, an approved decision routes to the action step and
/// the decision always references the judgment it responds to.
pub struct HumanGateStep {
    mode: GateMode,
}

impl HumanGateStep {
    /// Create a gate with the given decision mode
    pub fn new(mode: GateMode) -> Self {
        Self { mode }
    }

    /// Convenience constructor for the synthetic demonstration gate
    pub fn synthetic() -> Self {
        Self::new(GateMode::Synthetic {
            approver: "synthetic-sre@example.com".to_string(),
        })
    }

    fn apply_decision(state: &mut IncidentWorkflowState, mut decision: HumanDecision) {
        if decision.based_on_judgment.is_none() {
            decision.based_on_judgment = state.judgment.clone();
        }
        state.human_decision = Some(decision);
        state.next_node = Some(StepName::Action.as_str().to_string());
    }
}

#[async_trait]
impl IncidentStep for HumanGateStep {
    fn name(&self) -> StepName {
        StepName::HumanGate
    }

    async fn run(&self, state: &mut IncidentWorkflowState) -> Result<StepReport> {
        match &self.mode {
            GateMode::Synthetic { approver } => {
                tracing::info!(
                    thread_id = %state.thread_id,
                    "synthesizing approval decision"
                );
                let decision = HumanDecision {
                    approved: true,
                    approver: approver.clone(),
                    comment: Some(
                        "Looks good. Proceed, and watch the error rate for ten minutes \
                         after the change."
                            .to_string(),
                    ),
                    based_on_judgment: state.judgment.clone(),
                };
                Self::apply_decision(state, decision);
                Ok(StepReport::advance())
            }

            GateMode::Managed {
                manager,
                timeout_seconds,
            } => {
                let description = format!(
                    "Approve remediation plan for incident {}",
                    state.incident.id
                );
                let (approval_id, rx) =
                    manager.request_approval(&state.thread_id, description)?;

                match timeout(Duration::from_secs(*timeout_seconds), rx).await {
                    Ok(Ok(decision)) => {
                        Self::apply_decision(state, decision);
                        Ok(StepReport::advance())
                    }
                    Ok(Err(_)) | Err(_) => {
                        tracing::warn!(
                            thread_id = %state.thread_id,
                            approval_id = %approval_id,
                            "no approval decision in time, parking thread"
                        );
                        manager.expire(approval_id)?;
                        state.next_node = Some(StepName::HumanGate.as_str().to_string());
                        Ok(StepReport::suspended())
                    }
                }
            }

            GateMode::Suspend => {
                tracing::info!(
                    thread_id = %state.thread_id,
                    "parking thread pending external approval"
                );
                state.next_node = Some(StepName::HumanGate.as_str().to_string());
                Ok(StepReport::suspended())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Incident, JudgeDecision, Judgment};
    use crate::workflow::state_store::ThreadStateStore;
    use crate::workflow::steps::StepOutcome;
    use tempfile::tempdir;

    fn state_with_judgment() -> IncidentWorkflowState {
        let mut state = IncidentWorkflowState::new(
            "t-1",
            Incident {
                id: "INC-1".to_string(),
                summary: None,
                severity: None,
                source: None,
                service: None,
            },
        );
        state.judgment = Some(Judgment {
            decision: JudgeDecision::ProceedToHumanReview,
            approved: true,
            reason: "ready".to_string(),
            chosen_index: -1,
            required_changes: vec![],
            safety_warnings: vec![],
        });
        state
    }

    #[tokio::test]
    async fn test_synthetic_gate_approves_and_references_judgment() {
        let gate = HumanGateStep::synthetic();
        let mut state = state_with_judgment();

        let report = gate.run(&mut state).await.unwrap();

        assert_eq!(report.outcome, StepOutcome::Continue);
        let decision = state.human_decision.as_ref().unwrap();
        assert!(decision.approved);
        assert!(decision.based_on_judgment.is_some());
        assert_eq!(state.next_node.as_deref(), Some("action"));
    }

    #[tokio::test]
    async fn test_suspend_gate_parks_the_thread() {
        let gate = HumanGateStep::new(GateMode::Suspend);
        let mut state = state_with_judgment();

        let report = gate.run(&mut state).await.unwrap();

        assert_eq!(report.outcome, StepOutcome::Suspended);
        assert!(state.human_decision.is_none());
        assert_eq!(state.next_node.as_deref(), Some("human_gate"));
    }

    #[tokio::test]
    async fn test_managed_gate_receives_in_process_decision() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ThreadStateStore::new(dir.path().join("threads.json")).unwrap());
        let manager = Arc::new(ApprovalManager::new(store));

        let gate = HumanGateStep::new(GateMode::Managed {
            manager: manager.clone(),
            timeout_seconds: 5,
        });
        let mut state = state_with_judgment();

        let responder = {
            let manager = manager.clone();
            tokio::spawn(async move {
                // Wait until the gate has raised its request, then respond
                loop {
                    let pending = manager.pending_for("t-1");
                    if let Some(request) = pending.first() {
                        manager
                            .respond(
                                request.id,
                                HumanDecision {
                                    approved: true,
                                    approver: "operator1".to_string(),
                                    comment: None,
                                    based_on_judgment: None,
                                },
                            )
                            .unwrap();
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        let report = gate.run(&mut state).await.unwrap();
        responder.await.unwrap();

        assert_eq!(report.outcome, StepOutcome::Continue);
        let decision = state.human_decision.as_ref().unwrap();
        assert_eq!(decision.approver, "operator1");
        // The judgment reference is filled in from the thread state
        assert!(decision.based_on_judgment.is_some());
        assert_eq!(state.next_node.as_deref(), Some("action"));
    }

    #[tokio::test]
    async fn test_managed_gate_parks_on_timeout() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ThreadStateStore::new(dir.path().join("threads.json")).unwrap());
        let manager = Arc::new(ApprovalManager::new(store));

        let gate = HumanGateStep::new(GateMode::Managed {
            manager: manager.clone(),
            timeout_seconds: 0,
        });
        let mut state = state_with_judgment();

        let report = gate.run(&mut state).await.unwrap();
        assert_eq!(report.outcome, StepOutcome::Suspended);
        assert!(manager.pending_for("t-1").is_empty());
    }
}
