//! Flat exact nearest-neighbor index

use crate::retrieval::RetrievalError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Exact squared-Euclidean nearest-neighbor index over dense vectors.
///
/// Every query scans all vectors; corpora here are runbook-sized (hundreds
/// of documents), so a flat scan is both exact and fast enough. Ties in
/// distance are broken by insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimension
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    /// Vector dimension this index accepts
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index holds no vectors
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append a vector; its position becomes its identifier
    pub fn add(&mut self, vector: Vec<f32>) -> Result<(), RetrievalError> {
        if vector.len() != self.dim {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.vectors.push(vector);
        Ok(())
    }

    /// Return the `k` nearest vectors as `(position, squared distance)`,
    /// best first. Distance ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, squared_distance(query, v)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    /// Persist the index as a JSON artifact
    pub fn save_to_file(&self, path: &Path) -> Result<(), RetrievalError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a persisted index artifact
    pub fn load_from_file(path: &Path) -> Result<Self, RetrievalError> {
        let content = std::fs::read_to_string(path)?;
        let index: FlatIndex = serde_json::from_str(&content)?;
        Ok(index)
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
