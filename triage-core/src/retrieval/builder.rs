//! Runbook corpus ingestion: directory of text files to persisted artifacts

use crate::retrieval::{FlatIndex, RetrievalError, RunbookChunk, TextEmbedder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filename of the persisted nearest-neighbor index
pub const INDEX_FILE_NAME: &str = "runbooks.index.json";

/// Filename of the persisted chunk metadata array
pub const METADATA_FILE_NAME: &str = "runbooks.meta.json";

const TEXT_EXTENSIONS: &[&str] = &["md", "txt"];

/// Summary of a completed index build
#[derive(Debug, Clone)]
pub struct IndexBuildSummary {
    /// Number of chunks embedded and indexed
    pub chunks_indexed: usize,
    /// Path of the written index artifact
    pub index_path: PathBuf,
    /// Path of the written metadata artifact
    pub metadata_path: PathBuf,
}

/// Build the retrieval artifacts from a directory of runbook files.
///
/// Every `.md`/`.txt` file under `source_dir` becomes one chunk with
/// id = filename stem and metadata = {filename, relative_path}. Unreadable
/// files are skipped with a warning; a corpus with no readable files yields
/// [`RetrievalError::EmptyCorpus`] and writes nothing.
pub fn build_index(
    source_dir: &Path,
    artifact_dir: &Path,
    embedder: &dyn TextEmbedder,
) -> Result<IndexBuildSummary, RetrievalError> {
    let chunks = read_runbook_files(source_dir);
    if chunks.is_empty() {
        tracing::warn!(
            source_dir = %source_dir.display(),
            "no runbook files found, nothing to index"
        );
        return Err(RetrievalError::EmptyCorpus(source_dir.to_path_buf()));
    }

    let mut index = FlatIndex::new(embedder.dimension());
    for chunk in &chunks {
        index.add(embedder.embed(&chunk.text))?;
    }

    std::fs::create_dir_all(artifact_dir)?;
    let index_path = artifact_dir.join(INDEX_FILE_NAME);
    let metadata_path = artifact_dir.join(METADATA_FILE_NAME);

    index.save_to_file(&index_path)?;
    let metadata_json = serde_json::to_string_pretty(&chunks)?;
    std::fs::write(&metadata_path, metadata_json)?;

    tracing::info!(
        chunks = chunks.len(),
        index_path = %index_path.display(),
        metadata_path = %metadata_path.display(),
        "runbook index built"
    );

    Ok(IndexBuildSummary {
        chunks_indexed: chunks.len(),
        index_path,
        metadata_path,
    })
}

/// Read all text-like files under `source_dir`, skipping unreadable ones
fn read_runbook_files(source_dir: &Path) -> Vec<RunbookChunk> {
    let mut chunks = Vec::new();

    for entry in WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        if !matches!(extension.as_deref(), Some(ext) if TEXT_EXTENSIONS.contains(&ext)) {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable runbook file");
                continue;
            }
        };

        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("runbook")
            .to_string();
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("runbook")
            .to_string();
        let relative_path = path
            .strip_prefix(source_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        let mut metadata = BTreeMap::new();
        metadata.insert("filename".to_string(), filename);
        metadata.insert("relative_path".to_string(), relative_path);

        chunks.push(RunbookChunk { id, text, metadata });
    }

    chunks
}
