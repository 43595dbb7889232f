//! SRE judge step: critique accumulated proposals

use crate::llm::{parse_llm_json, FallbackCause, LanguageModel, ParseOutcome};
use crate::models::{Incident, IncidentWorkflowState, JudgeDecision, Judgment, Proposal};
use crate::workflow::router::StepName;
use crate::workflow::steps::{IncidentStep, StepReport};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

const FALLBACK_WARNING: &str = "LLM_parse_error_fallback";

const JUDGE_SYSTEM_PROMPT: &str = "\
You are an expert Site Reliability Engineer (SRE) acting as a critical \
reviewer of remediation plans for production incidents.

You will be given:
1) A JSON description of the incident
2) A list of one or more SRE proposals (each with diagnostic_steps, \
remediation_plan, etc.)

Your job is to:
- Identify the best proposal (or reject them all)
- Highlight any obvious safety issues, blast radius risks, or missing steps
- Decide whether the plan is ready to send to a human SRE for approval

You MUST respond in strict JSON with the following keys:
- decision: one of 'proceed_to_human_review', 'needs_more_work', 'reject_all'
- approved: boolean indicating whether this is good enough to show a human
- reason: short string explanation
- chosen_index: integer index of the chosen proposal (or -1 if rejected)
- required_changes: list of short strings describing required improvements
- safety_warnings: list of short strings";

/// Critiques the proposal list and stores a single current judgment.
///
/// An empty proposal list short-circuits to a deterministic rejection with
/// no model call. Always routes to the human gate.
pub struct JudgeStep {
    model: Arc<dyn LanguageModel>,
}

impl JudgeStep {
    /// Create a judge over the shared model client
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn evaluate(
        &self,
        incident: &Incident,
        proposals: &[Proposal],
    ) -> ParseOutcome<Judgment> {
        let user_prompt = format!(
            "INCIDENT JSON:\n{}\n\nSRE PROPOSALS:\n{}\n\n\
             Now produce the JSON response as specified.",
            serde_json::to_string_pretty(incident).unwrap_or_default(),
            serde_json::to_string_pretty(proposals).unwrap_or_default(),
        );

        let raw = match self.model.complete(JUDGE_SYSTEM_PROMPT, &user_prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                return ParseOutcome::Fallback {
                    value: fallback_judgment(proposals),
                    cause: FallbackCause::ModelUnavailable(e.to_string()),
                }
            }
        };

        match parse_llm_json::<Judgment>(&raw) {
            Ok(judgment) => {
                // chosen_index must reference an existing proposal when set
                if judgment.chosen_index >= 0
                    && judgment.chosen_index as usize >= proposals.len()
                {
                    return ParseOutcome::Fallback {
                        value: fallback_judgment(proposals),
                        cause: FallbackCause::SchemaViolation(format!(
                            "chosen_index {} out of range for {} proposal(s)",
                            judgment.chosen_index,
                            proposals.len()
                        )),
                    };
                }
                if judgment.chosen_index < -1 {
                    return ParseOutcome::Fallback {
                        value: fallback_judgment(proposals),
                        cause: FallbackCause::SchemaViolation(format!(
                            "chosen_index {} is not a valid proposal reference",
                            judgment.chosen_index
                        )),
                    };
                }
                ParseOutcome::Parsed(judgment)
            }
            Err(e) => ParseOutcome::Fallback {
                value: fallback_judgment(proposals),
                cause: FallbackCause::InvalidJson(e.to_string()),
            },
        }
    }
}

/// Deterministic rejection used when no proposals exist
fn reject_all_judgment() -> Judgment {
    Judgment {
        decision: JudgeDecision::RejectAll,
        approved: false,
        reason: "No proposals were provided by the reviewer.".to_string(),
        chosen_index: -1,
        required_changes: vec!["Need at least one proposal.".to_string()],
        safety_warnings: vec!["empty_proposals".to_string()],
    }
}

/// Local heuristic substituted when the model output is unusable: pick the
/// highest-confidence proposal, lowest index winning ties
fn fallback_judgment(proposals: &[Proposal]) -> Judgment {
    let mut best_index = 0usize;
    for (index, proposal) in proposals.iter().enumerate() {
        if proposal.confidence > proposals[best_index].confidence {
            best_index = index;
        }
    }

    Judgment {
        decision: JudgeDecision::ProceedToHumanReview,
        approved: false,
        reason: "Falling back to local heuristic; chose the best-confidence proposal."
            .to_string(),
        chosen_index: best_index as i64,
        required_changes: vec![
            "Have a human SRE double-check the remediation steps.".to_string()
        ],
        safety_warnings: vec![FALLBACK_WARNING.to_string()],
    }
}

#[async_trait]
impl IncidentStep for JudgeStep {
    fn name(&self) -> StepName {
        StepName::Judge
    }

    async fn run(&self, state: &mut IncidentWorkflowState) -> Result<StepReport> {
        tracing::info!(
            incident_id = %state.incident.id,
            proposals = state.proposals.len(),
            "evaluating proposals"
        );

        let report = if state.proposals.is_empty() {
            state.judgment = Some(reject_all_judgment());
            StepReport::advance()
        } else {
            let outcome = self.evaluate(&state.incident, &state.proposals).await;
            let report = match outcome.fallback_cause().cloned() {
                Some(cause) => StepReport::advance_with_fallback(cause),
                None => StepReport::advance(),
            };
            state.judgment = Some(outcome.into_value());
            report
        };

        state.next_node = Some(StepName::HumanGate.as_str().to_string());
        Ok(report)
    }
}
