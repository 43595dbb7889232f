//! Shared runbook retriever with lazy, single-flight index loading

use crate::retrieval::{
    FlatIndex, RetrievalError, RetrievedChunk, RunbookChunk, TextEmbedder, INDEX_FILE_NAME,
    METADATA_FILE_NAME,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Loaded index plus the parallel chunk metadata
struct LoadedIndex {
    index: FlatIndex,
    chunks: Vec<RunbookChunk>,
}

impl LoadedIndex {
    fn from_artifacts(artifact_dir: &Path) -> Result<Self, RetrievalError> {
        let index_path = artifact_dir.join(INDEX_FILE_NAME);
        let metadata_path = artifact_dir.join(METADATA_FILE_NAME);

        let index = FlatIndex::load_from_file(&index_path)?;
        let metadata = std::fs::read_to_string(&metadata_path)?;
        let chunks: Vec<RunbookChunk> = serde_json::from_str(&metadata)?;

        Ok(Self { index, chunks })
    }
}

/// Shared, read-mostly handle over the persisted retrieval artifacts.
///
/// Constructed once at process start and passed by reference to every
/// caller. The artifacts are loaded lazily on first query; concurrent first
/// callers race to a single load. A failed load (typically: artifacts were
/// never built) is cached as degraded mode rather than retried, and every
/// subsequent query answers with one synthetic placeholder chunk.
pub struct RunbookRetriever {
    artifact_dir: PathBuf,
    embedder: Arc<dyn TextEmbedder>,
    loaded: OnceCell<Option<Arc<LoadedIndex>>>,
}

impl RunbookRetriever {
    /// Create a retriever over the given artifact directory
    pub fn new(artifact_dir: impl Into<PathBuf>, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            embedder,
            loaded: OnceCell::new(),
        }
    }

    /// Whether the index failed to load and queries run in degraded mode.
    ///
    /// Only meaningful after the first query has forced initialization.
    pub fn is_degraded(&self) -> bool {
        matches!(self.loaded.get(), Some(None))
    }

    async fn loaded(&self) -> Option<Arc<LoadedIndex>> {
        self.loaded
            .get_or_init(|| async {
                match LoadedIndex::from_artifacts(&self.artifact_dir) {
                    Ok(loaded) => {
                        tracing::info!(
                            artifact_dir = %self.artifact_dir.display(),
                            chunks = loaded.chunks.len(),
                            "runbook index loaded"
                        );
                        Some(Arc::new(loaded))
                    }
                    Err(e) => {
                        tracing::warn!(
                            artifact_dir = %self.artifact_dir.display(),
                            error = %e,
                            "runbook index unavailable, degrading to synthetic results"
                        );
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Retrieve the `top_k` chunks nearest to `query`, best first.
    ///
    /// The nearest `top_k` are taken in index order, then any result whose
    /// metadata does not match every key/value pair in `metadata_filter` is
    /// discarded. With no loaded index this returns the single synthetic
    /// chunk so callers never fail on a missing index.
    pub async fn query(
        &self,
        query: &str,
        top_k: usize,
        metadata_filter: &BTreeMap<String, String>,
    ) -> Vec<RetrievedChunk> {
        let Some(loaded) = self.loaded().await else {
            return vec![synthetic_chunk(metadata_filter)];
        };

        let query_vector = self.embedder.embed(query);
        loaded
            .index
            .search(&query_vector, top_k)
            .into_iter()
            .filter_map(|(position, score)| {
                let chunk = loaded.chunks.get(position)?;
                let matches_filter = metadata_filter
                    .iter()
                    .all(|(k, v)| chunk.metadata.get(k) == Some(v));
                matches_filter.then(|| RetrievedChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect()
    }
}

fn synthetic_chunk(metadata_filter: &BTreeMap<String, String>) -> RetrievedChunk {
    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), "synthetic".to_string());
    if let Some(service) = metadata_filter.get("service") {
        metadata.insert("service".to_string(), service.clone());
    }

    RetrievedChunk {
        chunk: RunbookChunk {
            id: "synthetic-0".to_string(),
            text: "Synthetic runbook: investigate recent deployments and roll back \
                   if correlated with errors."
                .to_string(),
            metadata,
        },
        score: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{build_index, HashEmbedder};
    use tempfile::tempdir;

    fn build_test_corpus() -> (tempfile::TempDir, tempfile::TempDir) {
        let source = tempdir().unwrap();
        let artifacts = tempdir().unwrap();
        std::fs::write(
            source.path().join("checkout-errors.md"),
            "High error rate on checkout after a deployment. Roll back the release.",
        )
        .unwrap();
        std::fs::write(
            source.path().join("db-failover.md"),
            "Database primary unreachable. Promote the replica.",
        )
        .unwrap();
        std::fs::write(
            source.path().join("cache-warmup.md"),
            "Cold cache after restart. Run the warmup job before routing traffic.",
        )
        .unwrap();

        let embedder = HashEmbedder::new();
        build_index(source.path(), artifacts.path(), &embedder).unwrap();
        (source, artifacts)
    }

    #[tokio::test]
    async fn test_exact_text_query_ranks_its_document_first() {
        let (_source, artifacts) = build_test_corpus();
        let retriever = RunbookRetriever::new(artifacts.path(), Arc::new(HashEmbedder::new()));

        let results = retriever
            .query(
                "Database primary unreachable. Promote the replica.",
                3,
                &BTreeMap::new(),
            )
            .await;

        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.id, "db-failover");
        assert!(results[0].score < 1e-6);
    }

    #[tokio::test]
    async fn test_metadata_filter_excludes_mismatches() {
        let (_source, artifacts) = build_test_corpus();
        let retriever = RunbookRetriever::new(artifacts.path(), Arc::new(HashEmbedder::new()));

        let mut filter = BTreeMap::new();
        filter.insert("filename".to_string(), "db-failover.md".to_string());

        let results = retriever.query("database replica", 3, &filter).await;
        assert!(results
            .iter()
            .all(|r| r.chunk.metadata.get("filename").map(String::as_str)
                == Some("db-failover.md")));
    }

    #[tokio::test]
    async fn test_service_filter_excludes_other_services() {
        let artifacts = tempdir().unwrap();
        let embedder = HashEmbedder::new();

        // Hand-built artifacts with service metadata, as an ingestion job
        // with service tagging would produce them
        let docs = [
            ("checkout-errors", "checkout-api", "Checkout errors after a deploy."),
            ("orders-db-failover", "orders-db", "Database failover steps."),
            ("checkout-latency", "checkout-api", "Checkout latency triage."),
        ];
        let mut index = FlatIndex::new(embedder.dimension());
        let mut chunks = Vec::new();
        for (id, service, text) in docs {
            index.add(embedder.embed(text)).unwrap();
            let mut metadata = BTreeMap::new();
            metadata.insert("service".to_string(), service.to_string());
            chunks.push(RunbookChunk {
                id: id.to_string(),
                text: text.to_string(),
                metadata,
            });
        }
        index
            .save_to_file(&artifacts.path().join(INDEX_FILE_NAME))
            .unwrap();
        std::fs::write(
            artifacts.path().join(METADATA_FILE_NAME),
            serde_json::to_string(&chunks).unwrap(),
        )
        .unwrap();

        let retriever = RunbookRetriever::new(artifacts.path(), Arc::new(HashEmbedder::new()));
        let mut filter = BTreeMap::new();
        filter.insert("service".to_string(), "checkout-api".to_string());

        let results = retriever.query("checkout deploy errors", 3, &filter).await;
        assert!(!results.is_empty());
        assert!(results
            .iter()
            .all(|r| r.chunk.metadata.get("service").map(String::as_str)
                == Some("checkout-api")));
    }

    #[tokio::test]
    async fn test_missing_artifacts_degrade_to_synthetic_chunk() {
        let artifacts = tempdir().unwrap();
        let retriever = RunbookRetriever::new(artifacts.path(), Arc::new(HashEmbedder::new()));

        let mut filter = BTreeMap::new();
        filter.insert("service".to_string(), "checkout-api".to_string());

        let results = retriever.query("anything", 5, &filter).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "synthetic-0");
        assert_eq!(results[0].score, 0.0);
        assert_eq!(
            results[0].chunk.metadata.get("source").map(String::as_str),
            Some("synthetic")
        );
        assert_eq!(
            results[0].chunk.metadata.get("service").map(String::as_str),
            Some("checkout-api")
        );
        assert!(retriever.is_degraded());
    }

    #[tokio::test]
    async fn test_concurrent_first_queries_initialize_once() {
        let (_source, artifacts) = build_test_corpus();
        let retriever = Arc::new(RunbookRetriever::new(
            artifacts.path(),
            Arc::new(HashEmbedder::new()),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let retriever = retriever.clone();
            handles.push(tokio::spawn(async move {
                retriever
                    .query("checkout deployment rollback", 2, &BTreeMap::new())
                    .await
            }));
        }

        for handle in handles {
            let results = handle.await.unwrap();
            assert!(!results.is_empty());
            assert_ne!(results[0].chunk.id, "synthetic-0");
        }
        assert!(!retriever.is_degraded());
    }
}
