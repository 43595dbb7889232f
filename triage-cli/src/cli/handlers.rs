//! Command handler implementations

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use triage_core::llm::{HttpLanguageModel, LanguageModel, NullLanguageModel};
use triage_core::models::{HumanDecision, Incident, TriageConfig};
use triage_core::retrieval::{build_index, HashEmbedder, RetrievalError, RunbookRetriever};
use triage_core::workflow::{
    ActionStep, GateMode, HumanGateStep, JudgeStep, ReviewerStep, RunOutcome,
    SimulatedActionExecutor, ThreadStateStore, WorkflowEngine,
};

/// Incident files may carry the incident bare or under an `incident` key
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum IncidentFile {
    Wrapped { incident: Incident },
    Bare(Incident),
}

impl IncidentFile {
    fn into_incident(self) -> Incident {
        match self {
            IncidentFile::Wrapped { incident } => incident,
            IncidentFile::Bare(incident) => incident,
        }
    }
}

fn read_incident(path: &Path) -> Result<Incident> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read incident file {}", path.display()))?;
    let parsed: IncidentFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse incident JSON {}", path.display()))?;
    Ok(parsed.into_incident())
}

fn language_model(config: &TriageConfig) -> Arc<dyn LanguageModel> {
    match HttpLanguageModel::from_config(&config.llm) {
        Ok(model) => Arc::new(model),
        Err(_) => {
            tracing::warn!(
                "no language-model endpoint configured, running on deterministic fallbacks"
            );
            Arc::new(NullLanguageModel)
        }
    }
}

fn build_engine(
    config: &TriageConfig,
    gate: HumanGateStep,
) -> Result<(Arc<ThreadStateStore>, WorkflowEngine)> {
    let store = Arc::new(ThreadStateStore::new(&config.workflow.store_path)?);
    let retriever = Arc::new(RunbookRetriever::new(
        config.retrieval.artifact_dir.clone(),
        Arc::new(HashEmbedder::new()),
    ));
    let model = language_model(config);

    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(ReviewerStep::new(
            retriever,
            model.clone(),
            config.retrieval.top_k,
        )),
        Arc::new(JudgeStep::new(model)),
        Arc::new(gate),
        Arc::new(ActionStep::new(Arc::new(SimulatedActionExecutor))),
    )
    .with_max_cycles(config.workflow.max_cycles);

    Ok((store, engine))
}

/// Build the retrieval artifacts from a runbook directory
pub fn handle_build_index(
    config: &TriageConfig,
    source: &Path,
    artifacts: Option<&Path>,
) -> Result<()> {
    let artifact_dir = artifacts.unwrap_or(&config.retrieval.artifact_dir);
    let embedder = HashEmbedder::new();

    match build_index(source, artifact_dir, &embedder) {
        Ok(summary) => {
            println!(
                "Indexed {} runbook chunk(s) into {}",
                summary.chunks_indexed,
                artifact_dir.display()
            );
            Ok(())
        }
        // An empty corpus is a logged no-op, not a failure
        Err(RetrievalError::EmptyCorpus(dir)) => {
            println!("No runbook files found under {}, nothing indexed", dir.display());
            Ok(())
        }
        Err(e) => Err(e).context("index build failed"),
    }
}

/// Run an incident thread, streaming one snapshot per step to stdout
pub async fn handle_run(
    config: &TriageConfig,
    incident_path: &Path,
    thread: Option<String>,
    wait_approval: bool,
) -> Result<()> {
    let incident = read_incident(incident_path)?;
    let thread_id = thread.unwrap_or_else(|| incident.id.clone());

    let gate = if wait_approval {
        HumanGateStep::new(GateMode::Suspend)
    } else {
        HumanGateStep::synthetic()
    };
    let (_store, engine) = build_engine(config, gate)?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let engine = engine.with_snapshot_sender(tx);

    let printer = tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!(error = %e, "failed to serialize snapshot"),
            }
        }
    });

    let result = engine.run(incident, &thread_id).await?;
    drop(engine);
    printer.await.context("snapshot printer task failed")?;

    match result.outcome {
        RunOutcome::Completed => {
            println!(
                "Thread {} completed with {} recorded action(s)",
                thread_id,
                result.state.actions.len()
            );
        }
        RunOutcome::AwaitingApproval => {
            println!(
                "Thread {} is parked awaiting approval; complete it with \
                 `triage resume --thread {}`",
                thread_id, thread_id
            );
        }
        RunOutcome::RoutedTerminal => {
            println!(
                "Thread {} halted on an unknown routing target before completion",
                thread_id
            );
        }
        RunOutcome::CycleLimitReached => {
            println!(
                "Thread {} exceeded the cycle cap ({}) and was halted",
                thread_id, config.workflow.max_cycles
            );
        }
    }

    Ok(())
}

/// Apply a human decision to a parked thread and run it to completion
pub async fn handle_resume(
    config: &TriageConfig,
    thread_id: &str,
    approved: bool,
    approver: String,
    comment: Option<String>,
) -> Result<()> {
    let (_store, engine) = build_engine(config, HumanGateStep::new(GateMode::Suspend))?;

    let decision = HumanDecision {
        approved,
        approver,
        comment,
        based_on_judgment: None,
    };

    let result = engine.resume(thread_id, decision).await?;
    println!(
        "Thread {} resumed: done={}, {} recorded action(s)",
        thread_id,
        result.state.done,
        result.state.actions.len()
    );

    Ok(())
}

/// Print the persisted state and transition history of a thread
pub fn handle_status(config: &TriageConfig, thread_id: &str) -> Result<()> {
    let store = ThreadStateStore::new(&config.workflow.store_path)?;

    let Some(state) = store.get_thread(thread_id) else {
        println!("No thread with id {}", thread_id);
        return Ok(());
    };

    println!("{}", serde_json::to_string_pretty(&state)?);

    let transitions = store.transitions_for(thread_id);
    if !transitions.is_empty() {
        println!("\nTransitions:");
        for t in transitions {
            println!(
                "  {} {:?} {} -> {}",
                t.timestamp.format("%Y-%m-%dT%H:%M:%S"),
                t.kind,
                t.from_step.as_deref().unwrap_or("-"),
                t.to_step
            );
        }
    }

    Ok(())
}
