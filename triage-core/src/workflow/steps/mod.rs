//! Workflow step trait and implementations

pub mod action;
pub mod human_gate;
pub mod judge;
pub mod reviewer;

pub use action::*;
pub use human_gate::*;
pub use judge::*;
pub use reviewer::*;

use crate::llm::FallbackCause;
use crate::models::IncidentWorkflowState;
use crate::workflow::router::StepName;
use anyhow::Result;
use async_trait::async_trait;

/// What the engine should do after a step ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Persist and route again
    Continue,
    /// Persist and park the thread until an external decision arrives
    Suspended,
}

/// Result of one step execution, including fallback provenance so the
/// engine can log degraded model output
#[derive(Debug, Clone)]
pub struct StepReport {
    /// What the engine should do next
    pub outcome: StepOutcome,
    /// Set when the step substituted a deterministic fallback for model
    /// output
    pub fallback: Option<FallbackCause>,
}

impl StepReport {
    /// Continue routing, genuine output
    pub fn advance() -> Self {
        Self {
            outcome: StepOutcome::Continue,
            fallback: None,
        }
    }

    /// Continue routing, fallback output was substituted
    pub fn advance_with_fallback(cause: FallbackCause) -> Self {
        Self {
            outcome: StepOutcome::Continue,
            fallback: Some(cause),
        }
    }

    /// Park the thread awaiting an external decision
    pub fn suspended() -> Self {
        Self {
            outcome: StepOutcome::Suspended,
            fallback: None,
        }
    }
}

/// One step of the incident-triage workflow.
///
/// A step owns the thread state for the duration of `run`: it mutates the
/// state in place (appending proposals, storing judgments, setting
/// `next_node`) and hands control back to the engine.
#[async_trait]
pub trait IncidentStep: Send + Sync {
    /// Routing identity of this step
    fn name(&self) -> StepName;

    /// Execute against the current thread state
    async fn run(&self, state: &mut IncidentWorkflowState) -> Result<StepReport>;
}
