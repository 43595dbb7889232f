//! # Triage Core Library
//!
//! Automated first-pass triage of production incidents: retrieve relevant
//! runbook excerpts, draft a remediation proposal, critique it, gate on a
//! human decision, and dispatch the approved remediation.
//!
//! The two load-bearing pieces are [`workflow`] (the resumable per-thread
//! state machine) and [`retrieval`] (semantic search over a persisted
//! embedding index). The language-model service, the embedding model, and
//! the action-execution backend are external collaborators behind traits.

pub mod llm;
pub mod models;
pub mod retrieval;
pub mod services;
pub mod workflow;
