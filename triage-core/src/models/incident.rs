//! Incident triage data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A production incident as ingested from the alerting pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Incident identifier, e.g. "INC-12345"
    pub id: String,
    /// Free-text summary of the observed impact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Severity label, e.g. "P1"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// System that raised the incident
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Affected service name, used as a retrieval metadata filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// A structured remediation plan drafted by the reviewer step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Short restatement of the incident
    pub incident_summary: String,
    /// Affected service name
    pub service: String,
    /// Identifiers of the runbook chunks the plan draws on
    pub used_runbook_ids: Vec<String>,
    /// Ordered diagnostic steps
    pub diagnostic_steps: Vec<String>,
    /// Ordered remediation steps
    pub remediation_plan: Vec<String>,
    /// Ordered rollback steps
    pub rollback_plan: Vec<String>,
    /// Runbook excerpts the plan references
    pub referenced_runbook_snippets: Vec<String>,
    /// Risk markers, including the fallback marker when drafting degraded
    pub risk_flags: Vec<String>,
    /// Self-reported confidence in [0, 1]
    pub confidence: f64,
}

/// Decision produced by the judge step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JudgeDecision {
    /// Plan is good enough to show a human approver
    ProceedToHumanReview,
    /// Plan needs another reviewer pass
    NeedsMoreWork,
    /// No proposal is acceptable
    RejectAll,
}

/// Structured critique of the accumulated proposals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    /// Outcome of the critique
    pub decision: JudgeDecision,
    /// Whether the chosen plan is ready for a human approver
    pub approved: bool,
    /// Short explanation of the decision
    pub reason: String,
    /// Index of the chosen proposal, -1 when none was chosen
    pub chosen_index: i64,
    /// Improvements required before the plan can proceed
    pub required_changes: Vec<String>,
    /// Safety concerns raised during the critique
    pub safety_warnings: Vec<String>,
}

/// Out-of-band decision supplied by a human approver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanDecision {
    /// Whether the approver signed off on the plan
    pub approved: bool,
    /// Identity of the approver
    pub approver: String,
    /// Free-text comment from the approver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// The judgment this decision responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub based_on_judgment: Option<Judgment>,
}

/// Outcome of a single dispatched remediation action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Backend reported success
    Success,
    /// Backend reported failure; the batch continues regardless
    Failed,
}

/// Record of one remediation action dispatched to the execution backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Tool identifier on the execution backend
    pub tool: String,
    /// Execution status
    pub status: ActionStatus,
    /// Human-readable outcome details
    pub details: String,
    /// Comment carried over from the approving human
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_comment: Option<String>,
}

/// Reason a state transition was recorded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Thread created
    Start,
    /// A step ran to completion
    Step,
    /// Workflow parked awaiting an external decision
    Suspend,
    /// Workflow re-entered with an external decision
    Resume,
}

/// Audit record of one workflow transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Unique transition ID
    pub id: Uuid,
    /// Workflow thread this transition belongs to
    pub thread_id: String,
    /// Step that produced the transition (None for thread creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_step: Option<String>,
    /// Routing target after the transition
    pub to_step: String,
    /// Why the transition was recorded
    pub kind: TransitionKind,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}
