//! SRE reviewer step: draft a remediation proposal

use crate::llm::{parse_llm_json, FallbackCause, LanguageModel, ParseOutcome};
use crate::models::{Incident, IncidentWorkflowState, Proposal};
use crate::retrieval::{RetrievedChunk, RunbookRetriever};
use crate::workflow::router::StepName;
use crate::workflow::steps::{IncidentStep, StepReport};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

const FALLBACK_RISK_FLAG: &str = "LLM_parse_error_fallback";
const GENERIC_QUERY: &str = "production incident";

const REVIEWER_SYSTEM_PROMPT: &str = "\
You are an expert Site Reliability Engineer (SRE) responsible for triaging \
production incidents. You are calm, methodical, and safety-focused.

You will be given:
1) A JSON description of a production incident
2) A list of runbook chunks retrieved from a vector database

Your job is to synthesize a clear, actionable plan that a human SRE could \
follow. You MUST respond in strict JSON with the following keys:
- incident_summary: short string
- service: short string
- used_runbook_ids: list of strings
- diagnostic_steps: list of short, ordered strings
- remediation_plan: list of short, ordered strings
- rollback_plan: list of short, ordered strings
- referenced_runbook_snippets: list of short strings
- risk_flags: list of short strings
- confidence: number between 0 and 1";

/// Drafts one remediation proposal per invocation.
///
/// Retrieves the runbook chunks nearest the incident summary, prompts the
/// language-model service for a proposal, and appends the (parsed or
/// fallback) proposal to the thread state. Always routes to the judge.
pub struct ReviewerStep {
    retriever: Arc<RunbookRetriever>,
    model: Arc<dyn LanguageModel>,
    top_k: usize,
}

impl ReviewerStep {
    /// Create a reviewer over the shared retriever and model client
    pub fn new(
        retriever: Arc<RunbookRetriever>,
        model: Arc<dyn LanguageModel>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            model,
            top_k,
        }
    }

    async fn draft_proposal(
        &self,
        incident: &Incident,
        runbooks: &[RetrievedChunk],
    ) -> ParseOutcome<Proposal> {
        let user_prompt = format!(
            "INCIDENT JSON:\n{}\n\nRUNBOOK CHUNKS (each has id, text, metadata, score):\n{}\n\n\
             Now produce the JSON response as specified.",
            serde_json::to_string_pretty(incident).unwrap_or_default(),
            serde_json::to_string_pretty(runbooks).unwrap_or_default(),
        );

        let raw = match self.model.complete(REVIEWER_SYSTEM_PROMPT, &user_prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                return ParseOutcome::Fallback {
                    value: fallback_proposal(incident, runbooks),
                    cause: FallbackCause::ModelUnavailable(e.to_string()),
                }
            }
        };

        match parse_llm_json::<Proposal>(&raw) {
            Ok(mut proposal) => {
                if !(0.0..=1.0).contains(&proposal.confidence) {
                    tracing::warn!(
                        confidence = proposal.confidence,
                        "reviewer confidence outside [0, 1], clamping"
                    );
                    proposal.confidence = proposal.confidence.clamp(0.0, 1.0);
                }
                ParseOutcome::Parsed(proposal)
            }
            Err(e) => ParseOutcome::Fallback {
                value: fallback_proposal(incident, runbooks),
                cause: FallbackCause::InvalidJson(e.to_string()),
            },
        }
    }
}

/// Deterministic proposal substituted when the model output is unusable
fn fallback_proposal(incident: &Incident, runbooks: &[RetrievedChunk]) -> Proposal {
    Proposal {
        incident_summary: incident
            .summary
            .clone()
            .unwrap_or_else(|| "Unknown incident".to_string()),
        service: incident
            .service
            .clone()
            .unwrap_or_else(|| "unknown-service".to_string()),
        used_runbook_ids: runbooks.iter().map(|r| r.chunk.id.clone()).collect(),
        diagnostic_steps: vec![
            "Inspect recent error spikes and latency for the affected service.".to_string(),
            "Check logs and recent deployments around the time of impact.".to_string(),
        ],
        remediation_plan: vec![
            "If a recent deployment correlates with the incident, roll back to the \
             previous known-good version."
                .to_string(),
        ],
        rollback_plan: vec![
            "Redeploy the previous known-good artifact via the standard pipeline.".to_string(),
        ],
        referenced_runbook_snippets: runbooks
            .iter()
            .take(3)
            .map(|r| r.chunk.text.clone())
            .collect(),
        risk_flags: vec![FALLBACK_RISK_FLAG.to_string()],
        confidence: 0.5,
    }
}

#[async_trait]
impl IncidentStep for ReviewerStep {
    fn name(&self) -> StepName {
        StepName::Reviewer
    }

    async fn run(&self, state: &mut IncidentWorkflowState) -> Result<StepReport> {
        let incident = state.incident.clone();
        tracing::info!(incident_id = %incident.id, "drafting proposal");

        let query = incident
            .summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| GENERIC_QUERY.to_string());

        let mut metadata_filter = BTreeMap::new();
        if let Some(service) = &incident.service {
            metadata_filter.insert("service".to_string(), service.clone());
        }

        let runbooks = self
            .retriever
            .query(&query, self.top_k, &metadata_filter)
            .await;

        let outcome = self.draft_proposal(&incident, &runbooks).await;
        let report = match outcome.fallback_cause().cloned() {
            Some(cause) => StepReport::advance_with_fallback(cause),
            None => StepReport::advance(),
        };

        state.proposals.push(outcome.into_value());
        state.next_node = Some(StepName::Judge.as_str().to_string());

        Ok(report)
    }
}
