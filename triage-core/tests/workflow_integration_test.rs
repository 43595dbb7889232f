//! End-to-end workflow tests over a real store and a degraded index

use std::sync::Arc;

use triage_core::llm::NullLanguageModel;
use triage_core::models::{HumanDecision, Incident};
use triage_core::retrieval::{HashEmbedder, RunbookRetriever};
use triage_core::workflow::{
    ActionStep, GateMode, HumanGateStep, JudgeStep, ReviewerStep, RunOutcome,
    SimulatedActionExecutor, StepName, ThreadStateStore, WorkflowEngine,
};

fn checkout_incident() -> Incident {
    Incident {
        id: "INC-1".to_string(),
        summary: Some("High error rate on checkout".to_string()),
        severity: Some("P1".to_string()),
        source: Some("alerting".to_string()),
        service: Some("checkout-api".to_string()),
    }
}

/// Build an engine over the given store path with no index artifacts and no
/// configured language model, so every step exercises its degraded path.
fn build_engine(
    store_path: &std::path::Path,
    artifact_dir: &std::path::Path,
    gate: HumanGateStep,
) -> (Arc<ThreadStateStore>, WorkflowEngine) {
    let store = Arc::new(ThreadStateStore::new(store_path).unwrap());
    let retriever = Arc::new(RunbookRetriever::new(
        artifact_dir,
        Arc::new(HashEmbedder::new()),
    ));
    let model = Arc::new(NullLanguageModel);

    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(ReviewerStep::new(retriever, model.clone(), 5)),
        Arc::new(JudgeStep::new(model)),
        Arc::new(gate),
        Arc::new(ActionStep::new(Arc::new(SimulatedActionExecutor))),
    );

    (store, engine)
}

#[tokio::test]
async fn test_full_run_with_missing_index_terminates_with_one_action() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, engine) = build_engine(
        &dir.path().join("threads.json"),
        &dir.path().join("artifacts"),
        HumanGateStep::synthetic(),
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let engine = engine.with_snapshot_sender(tx);

    let result = engine.run(checkout_incident(), "INC-1").await.unwrap();

    assert_eq!(result.outcome, RunOutcome::Completed);
    assert!(result.state.done);
    assert!(result.state.next_node.is_none());
    assert_eq!(result.state.actions.len(), 1);
    assert_eq!(result.state.proposals.len(), 1);
    assert!(result.state.judgment.is_some());
    assert!(result.state.human_decision.as_ref().unwrap().approved);

    // The steps ran in the canonical order
    let mut steps = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        steps.push(snapshot.step);
    }
    assert_eq!(
        steps,
        vec![
            StepName::Reviewer,
            StepName::Judge,
            StepName::HumanGate,
            StepName::Action
        ]
    );
}

#[tokio::test]
async fn test_run_persists_state_after_every_step() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = build_engine(
        &dir.path().join("threads.json"),
        &dir.path().join("artifacts"),
        HumanGateStep::synthetic(),
    );

    engine.run(checkout_incident(), "INC-1").await.unwrap();

    let persisted = store.get_thread("INC-1").unwrap();
    assert!(persisted.done);
    assert_eq!(persisted.actions.len(), 1);

    // Start + one transition per executed step
    let transitions = store.transitions_for("INC-1");
    assert_eq!(transitions.len(), 5);
}

#[tokio::test]
async fn test_suspend_and_resume_across_engine_instances() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("threads.json");
    let artifact_dir = dir.path().join("artifacts");

    // First process: run until the gate parks the thread
    {
        let (_store, engine) = build_engine(
            &store_path,
            &artifact_dir,
            HumanGateStep::new(GateMode::Suspend),
        );
        let result = engine.run(checkout_incident(), "INC-1").await.unwrap();
        assert_eq!(result.outcome, RunOutcome::AwaitingApproval);
        assert!(!result.state.done);
        assert_eq!(result.state.next_node.as_deref(), Some("human_gate"));
    }

    // Second process: resume the parked thread with an approval
    let (store, engine) = build_engine(
        &store_path,
        &artifact_dir,
        HumanGateStep::new(GateMode::Suspend),
    );
    assert_eq!(store.find_incomplete().len(), 1);

    let result = engine
        .resume(
            "INC-1",
            HumanDecision {
                approved: true,
                approver: "operator1".to_string(),
                comment: Some("approved after review".to_string()),
                based_on_judgment: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Completed);
    assert_eq!(result.state.actions.len(), 1);
    // The applied decision references the stored judgment
    assert!(result
        .state
        .human_decision
        .as_ref()
        .unwrap()
        .based_on_judgment
        .is_some());
    assert!(store.find_incomplete().is_empty());
}

#[tokio::test]
async fn test_resume_with_denial_closes_without_actions() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("threads.json");
    let artifact_dir = dir.path().join("artifacts");

    let (_store, engine) = build_engine(
        &store_path,
        &artifact_dir,
        HumanGateStep::new(GateMode::Suspend),
    );
    engine.run(checkout_incident(), "INC-1").await.unwrap();

    let result = engine
        .resume(
            "INC-1",
            HumanDecision {
                approved: false,
                approver: "operator1".to_string(),
                comment: Some("blast radius too large".to_string()),
                based_on_judgment: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Completed);
    assert!(result.state.done);
    assert!(result.state.actions.is_empty());
}

#[tokio::test]
async fn test_resume_rejects_threads_not_at_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, engine) = build_engine(
        &dir.path().join("threads.json"),
        &dir.path().join("artifacts"),
        HumanGateStep::synthetic(),
    );

    let decision = HumanDecision {
        approved: true,
        approver: "operator1".to_string(),
        comment: None,
        based_on_judgment: None,
    };

    // Unknown thread
    assert!(engine.resume("missing", decision.clone()).await.is_err());

    // Completed thread
    engine.run(checkout_incident(), "INC-1").await.unwrap();
    assert!(engine.resume("INC-1", decision).await.is_err());
}

#[tokio::test]
async fn test_unknown_next_node_halts_as_routed_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("threads.json");
    let artifact_dir = dir.path().join("artifacts");

    let (store, engine) = build_engine(&store_path, &artifact_dir, HumanGateStep::synthetic());

    // Simulate a store written by an unknown writer
    let mut state =
        triage_core::models::IncidentWorkflowState::new("INC-1", checkout_incident());
    state.next_node = Some("orchestrator".to_string());
    store.upsert_thread(&state).unwrap();

    let result = engine.run(checkout_incident(), "INC-1").await.unwrap();
    assert_eq!(result.outcome, RunOutcome::RoutedTerminal);
    assert!(!result.state.done);
}

#[tokio::test]
async fn test_cycle_cap_halts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, engine) = build_engine(
        &dir.path().join("threads.json"),
        &dir.path().join("artifacts"),
        HumanGateStep::synthetic(),
    );

    // The happy path needs four dispatches; a cap of two must trip first
    let engine = engine.with_max_cycles(2);
    let result = engine.run(checkout_incident(), "INC-1").await.unwrap();

    assert_eq!(result.outcome, RunOutcome::CycleLimitReached);
    assert!(!result.state.done);
}

#[tokio::test]
async fn test_distinct_threads_run_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("threads.json");
    let artifact_dir = dir.path().join("artifacts");

    let (store, engine) = build_engine(&store_path, &artifact_dir, HumanGateStep::synthetic());
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut incident = checkout_incident();
            incident.id = format!("INC-{}", i);
            engine.run(incident, &format!("INC-{}", i)).await.unwrap()
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.state.actions.len(), 1);
    }
    assert!(store.find_incomplete().is_empty());
}
