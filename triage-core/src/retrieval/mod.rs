//! Semantic retrieval over embedded runbook chunks

pub mod builder;
pub mod embedding;
pub mod index;
pub mod retriever;

pub use builder::*;
pub use embedding::*;
pub use index::*;
pub use retriever::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the retrieval subsystem
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("no runbook files found under {0}")]
    EmptyCorpus(PathBuf),

    #[error("embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index artifact parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One unit of retrievable runbook text with attached metadata.
///
/// Created by the ingestion build and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunbookChunk {
    /// Chunk identifier (source filename stem)
    pub id: String,
    /// Full chunk text
    pub text: String,
    /// String-keyed metadata, e.g. `service`, `filename`, `relative_path`
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A chunk returned from a query together with its distance score.
///
/// Smaller scores are better; the synthetic degraded-mode chunk carries 0.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The matched chunk
    pub chunk: RunbookChunk,
    /// Squared-Euclidean distance between query and chunk embeddings
    pub score: f32,
}
