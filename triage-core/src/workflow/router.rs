//! Pure routing from thread state to the next step

use crate::models::IncidentWorkflowState;
use serde::{Deserialize, Serialize};

/// Closed set of workflow step identifiers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    /// Drafts a remediation proposal from incident + retrieved runbooks
    Reviewer,
    /// Critiques the accumulated proposals
    Judge,
    /// Waits for (or synthesizes) the human approval decision
    HumanGate,
    /// Dispatches the approved remediation actions; always terminal
    Action,
}

impl StepName {
    /// Canonical wire name stored in `next_node`
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Reviewer => "reviewer",
            StepName::Judge => "judge",
            StepName::HumanGate => "human_gate",
            StepName::Action => "action",
        }
    }

    /// Parse a wire name; anything outside the fixed set is None
    pub fn parse(name: &str) -> Option<StepName> {
        match name {
            "reviewer" => Some(StepName::Reviewer),
            "judge" => Some(StepName::Judge),
            "human_gate" => Some(StepName::HumanGate),
            "action" => Some(StepName::Action),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the engine should go next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Run the named step
    Step(StepName),
    /// Stop the loop
    Terminal,
}

/// Map the current state to the next step.
///
/// Policy: a done thread is terminal; an unset `next_node` enters at the
/// reviewer; an unknown `next_node` value is terminal (graceful degradation
/// for an unexpected writer, surfaced as a warning rather than an error).
pub fn route(state: &IncidentWorkflowState) -> RouteTarget {
    if state.done {
        return RouteTarget::Terminal;
    }

    match &state.next_node {
        None => RouteTarget::Step(StepName::Reviewer),
        Some(name) => match StepName::parse(name) {
            Some(step) => RouteTarget::Step(step),
            None => {
                tracing::warn!(
                    thread_id = %state.thread_id,
                    next_node = %name,
                    "unknown next_node value, treating as terminal"
                );
                RouteTarget::Terminal
            }
        },
    }
}
