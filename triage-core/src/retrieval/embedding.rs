//! Text embedding for similarity search

use sha2::{Digest, Sha256};

/// Dimension of the built-in feature-hashing embedder
pub const EMBEDDING_DIM: usize = 256;

/// Maps text to a fixed-size vector for nearest-neighbor search.
///
/// Production deployments inject a client for a real embedding model; the
/// built-in [`HashEmbedder`] keeps the subsystem self-contained and
/// deterministic.
pub trait TextEmbedder: Send + Sync {
    /// Output vector dimension
    fn dimension(&self) -> usize;

    /// Embed a text into a vector of `dimension()` components
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic bag-of-words feature-hashing embedder.
///
/// Each lowercased alphanumeric token is hashed with SHA-256; the first
/// eight digest bytes pick a bucket and the ninth picks a sign. The result
/// is L2-normalized so squared-Euclidean distance behaves like cosine
/// distance. Identical text always embeds to an identical vector.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    /// Create an embedder with the default dimension
    pub fn new() -> Self {
        Self::with_dimension(EMBEDDING_DIM)
    }

    /// Create an embedder with an explicit dimension
    pub fn with_dimension(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEmbedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];

        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_be_bytes(digest[..8].try_into().unwrap()) as usize % self.dim;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("restart the checkout service");
        let b = embedder.embed("restart the checkout service");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_embedding_is_normalized() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("roll back the last deployment");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_different_texts_embed_differently() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("database connection pool exhausted");
        let b = embedder.embed("certificate expired on the load balancer");
        assert_ne!(a, b);
    }

    #[test]
    fn test_tokenization_ignores_punctuation_and_case() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("Restart the service!");
        let b = embedder.embed("restart, the service");
        assert_eq!(a, b);
    }
}
