//! Workflow execution engine

use crate::models::{
    HumanDecision, Incident, IncidentWorkflowState, StateTransition, TransitionKind,
};
use crate::workflow::router::{route, RouteTarget, StepName};
use crate::workflow::state_store::ThreadStateStore;
use crate::workflow::steps::{IncidentStep, StepOutcome};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Default upper bound on router dispatches per run
pub const DEFAULT_MAX_CYCLES: u32 = 25;

/// Per-step state snapshot emitted while a thread executes
#[derive(Debug, Clone, Serialize)]
pub struct StepSnapshot {
    /// Step that just ran
    pub step: StepName,
    /// Thread state after the step
    pub state: IncidentWorkflowState,
    /// Set when the step substituted fallback output for the model reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The action step completed and the thread is done
    Completed,
    /// The thread is parked awaiting an external human decision
    AwaitingApproval,
    /// The router reported terminal before the thread was done
    /// (unknown `next_node`)
    RoutedTerminal,
    /// The cycle cap tripped before a terminal state was reached
    CycleLimitReached,
}

/// Final result of a run, carrying the last persisted state
#[derive(Debug, Clone)]
pub struct RunResult {
    /// How the run ended
    pub outcome: RunOutcome,
    /// Thread state at the end of the run
    pub state: IncidentWorkflowState,
}

/// Drives one incident thread: route, run the step, persist, repeat until
/// a terminal state, a suspension, or the cycle cap.
///
/// The engine owns no cross-thread mutable state; distinct threads may run
/// concurrently against the same (internally synchronized) store.
pub struct WorkflowEngine {
    store: Arc<ThreadStateStore>,
    reviewer: Arc<dyn IncidentStep>,
    judge: Arc<dyn IncidentStep>,
    human_gate: Arc<dyn IncidentStep>,
    action: Arc<dyn IncidentStep>,
    max_cycles: u32,
    snapshots: Option<UnboundedSender<StepSnapshot>>,
}

impl WorkflowEngine {
    /// Create an engine over a store and the four workflow steps
    pub fn new(
        store: Arc<ThreadStateStore>,
        reviewer: Arc<dyn IncidentStep>,
        judge: Arc<dyn IncidentStep>,
        human_gate: Arc<dyn IncidentStep>,
        action: Arc<dyn IncidentStep>,
    ) -> Self {
        Self {
            store,
            reviewer,
            judge,
            human_gate,
            action,
            max_cycles: DEFAULT_MAX_CYCLES,
            snapshots: None,
        }
    }

    /// Override the cycle cap
    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Emit a snapshot after every executed step
    pub fn with_snapshot_sender(mut self, sender: UnboundedSender<StepSnapshot>) -> Self {
        self.snapshots = Some(sender);
        self
    }

    fn step_for(&self, name: StepName) -> &dyn IncidentStep {
        match name {
            StepName::Reviewer => self.reviewer.as_ref(),
            StepName::Judge => self.judge.as_ref(),
            StepName::HumanGate => self.human_gate.as_ref(),
            StepName::Action => self.action.as_ref(),
        }
    }

    /// Run a thread to completion, suspension, or the cycle cap.
    ///
    /// A thread id already present in the store resumes from its persisted
    /// state; the supplied incident is only used to create fresh threads.
    pub async fn run(&self, incident: Incident, thread_id: &str) -> Result<RunResult> {
        let state = match self.store.get_thread(thread_id) {
            Some(existing) => {
                tracing::info!(thread_id = %thread_id, "resuming persisted thread");
                existing
            }
            None => {
                let state = IncidentWorkflowState::new(thread_id, incident);
                self.store
                    .upsert_thread(&state)
                    .context("Failed to persist fresh thread")?;
                self.record_transition(thread_id, None, "reviewer", TransitionKind::Start)?;
                state
            }
        };

        self.drive(state).await
    }

    /// Re-enter a parked thread with an external human decision.
    ///
    /// Fails unless the thread exists and is actually waiting at the gate.
    pub async fn resume(
        &self,
        thread_id: &str,
        mut decision: HumanDecision,
    ) -> Result<RunResult> {
        let mut state = self
            .store
            .get_thread(thread_id)
            .with_context(|| format!("No persisted thread with id {}", thread_id))?;

        if state.done {
            bail!("thread {} is already complete", thread_id);
        }
        if route(&state) != RouteTarget::Step(StepName::HumanGate) {
            bail!(
                "thread {} is not awaiting a human decision (next_node={:?})",
                thread_id,
                state.next_node
            );
        }

        if decision.based_on_judgment.is_none() {
            decision.based_on_judgment = state.judgment.clone();
        }
        state.human_decision = Some(decision);
        state.next_node = Some(StepName::Action.as_str().to_string());
        state.updated_at = Utc::now();

        self.store
            .upsert_thread(&state)
            .context("Failed to persist resumed thread")?;
        self.record_transition(
            thread_id,
            Some(StepName::HumanGate.as_str()),
            StepName::Action.as_str(),
            TransitionKind::Resume,
        )?;

        self.drive(state).await
    }

    async fn drive(&self, mut state: IncidentWorkflowState) -> Result<RunResult> {
        let mut cycles = 0u32;

        loop {
            let name = match route(&state) {
                RouteTarget::Terminal => {
                    let outcome = if state.done {
                        RunOutcome::Completed
                    } else {
                        RunOutcome::RoutedTerminal
                    };
                    return Ok(RunResult { outcome, state });
                }
                RouteTarget::Step(name) => name,
            };

            if cycles >= self.max_cycles {
                tracing::warn!(
                    thread_id = %state.thread_id,
                    max_cycles = self.max_cycles,
                    "cycle cap reached, halting thread"
                );
                return Ok(RunResult {
                    outcome: RunOutcome::CycleLimitReached,
                    state,
                });
            }
            cycles += 1;

            let report = self
                .step_for(name)
                .run(&mut state)
                .await
                .with_context(|| format!("Step '{}' failed", name))?;

            state.updated_at = Utc::now();
            state
                .validate()
                .with_context(|| format!("Step '{}' left the thread state invalid", name))?;

            self.store
                .upsert_thread(&state)
                .context("Failed to persist thread state")?;

            let (kind, to_step) = match report.outcome {
                StepOutcome::Suspended => (TransitionKind::Suspend, name.as_str().to_string()),
                StepOutcome::Continue => (
                    TransitionKind::Step,
                    state.next_node.clone().unwrap_or_else(|| "end".to_string()),
                ),
            };
            self.record_transition(&state.thread_id, Some(name.as_str()), &to_step, kind)?;

            if let Some(cause) = &report.fallback {
                tracing::warn!(
                    thread_id = %state.thread_id,
                    step = %name,
                    cause = %cause,
                    "step substituted deterministic fallback for model output"
                );
            }

            if let Some(sender) = &self.snapshots {
                let _ = sender.send(StepSnapshot {
                    step: name,
                    state: state.clone(),
                    fallback: report.fallback.as_ref().map(|c| c.to_string()),
                    timestamp: Utc::now(),
                });
            }

            match report.outcome {
                StepOutcome::Suspended => {
                    return Ok(RunResult {
                        outcome: RunOutcome::AwaitingApproval,
                        state,
                    });
                }
                StepOutcome::Continue => {}
            }

            // The action step is terminal regardless of router output
            if state.done {
                return Ok(RunResult {
                    outcome: RunOutcome::Completed,
                    state,
                });
            }
        }
    }

    fn record_transition(
        &self,
        thread_id: &str,
        from_step: Option<&str>,
        to_step: &str,
        kind: TransitionKind,
    ) -> Result<()> {
        self.store
            .record_transition(StateTransition {
                id: Uuid::new_v4(),
                thread_id: thread_id.to_string(),
                from_step: from_step.map(|s| s.to_string()),
                to_step: to_step.to_string(),
                kind,
                timestamp: Utc::now(),
            })
            .context("Failed to record state transition")
    }
}
