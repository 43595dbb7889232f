//! Workflow thread state

use crate::models::incident::{ActionRecord, HumanDecision, Incident, Judgment, Proposal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a thread state violates its invariants
#[derive(Error, Debug)]
pub enum StateValidationError {
    #[error("thread is done but still names a next step: {0}")]
    DoneWithNextNode(String),

    #[error("judgment chose proposal {chosen} but only {available} proposal(s) exist")]
    ChosenIndexOutOfRange { chosen: i64, available: usize },

    #[error("proposal {index} has confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange { index: usize, confidence: f64 },
}

/// Aggregate state of one incident-triage thread.
///
/// Exactly one state exists per thread identifier. Steps mutate it in place
/// and hand it back to the engine; it is never shared between threads.
/// `next_node` stays a plain string in the persisted form so a store written
/// by a newer version (or by hand) loads without error; the router parses it
/// into the closed step-name set and treats anything else as terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentWorkflowState {
    /// Workflow thread identifier
    pub thread_id: String,
    /// The incident under triage, immutable once ingested
    pub incident: Incident,
    /// Append-only list of reviewer proposals
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    /// Current judgment; each judge pass overwrites the previous one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<Judgment>,
    /// Decision supplied by the human approver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_decision: Option<HumanDecision>,
    /// Remediation actions dispatched so far
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
    /// Wire name of the step to run next; None routes to the default entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node: Option<String>,
    /// Terminal flag; once set the router always reports terminal
    #[serde(default)]
    pub done: bool,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl IncidentWorkflowState {
    /// Create a fresh thread state for an incident
    pub fn new(thread_id: impl Into<String>, incident: Incident) -> Self {
        Self {
            thread_id: thread_id.into(),
            incident,
            proposals: Vec::new(),
            judgment: None,
            human_decision: None,
            actions: Vec::new(),
            next_node: None,
            done: false,
            updated_at: Utc::now(),
        }
    }

    /// Check the state invariants at a step boundary
    pub fn validate(&self) -> Result<(), StateValidationError> {
        if self.done {
            if let Some(next) = &self.next_node {
                return Err(StateValidationError::DoneWithNextNode(next.clone()));
            }
        }

        if let Some(judgment) = &self.judgment {
            if judgment.chosen_index >= 0
                && judgment.chosen_index as usize >= self.proposals.len()
            {
                return Err(StateValidationError::ChosenIndexOutOfRange {
                    chosen: judgment.chosen_index,
                    available: self.proposals.len(),
                });
            }
        }

        for (index, proposal) in self.proposals.iter().enumerate() {
            if !(0.0..=1.0).contains(&proposal.confidence) {
                return Err(StateValidationError::ConfidenceOutOfRange {
                    index,
                    confidence: proposal.confidence,
                });
            }
        }

        Ok(())
    }
}
