//! Offline preparation of the vector index: insurer JSON documents are split
//! into chunks, written to disk, merged, and finally embedded and upserted.

pub mod chunker;

pub use chunker::{chunk_company, validate_chunks, Chunk, ChunkType};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::retrieval::{ChunkMetadata, Embedder, RetrievalError, VectorIndex, VectorRecord};

pub const PREPROCESSED_SUFFIX: &str = "_preprocessed.json";

/// Default name of the merged output written by `combine`.
pub const COMBINED_FILE: &str = "all_companies_preprocessed.json";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing required key: {0}")]
    MissingKey(String),
    #[error("Invalid document: {0}")]
    InvalidShape(String),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

pub fn load_company(path: &Path) -> Result<serde_json::Value, IngestError> {
    let raw = std::fs::read_to_string(path)?;
    let doc = serde_json::from_str(&raw)?;
    info!("Loaded {}", path.display());
    Ok(doc)
}

pub fn save_chunks(chunks: &[Chunk], path: &Path) -> Result<(), IngestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(chunks)?)?;
    info!("Saved {} chunks to {}", chunks.len(), path.display());
    Ok(())
}

pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>, IngestError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Default output path for a raw company file: `<stem>_preprocessed.json`
/// next to the input.
pub fn preprocessed_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "company".to_string());
    input.with_file_name(format!("{}{}", stem, PREPROCESSED_SUFFIX))
}

/// Loads, chunks, validates and saves one company document.
pub fn preprocess_file(input: &Path, output: &Path) -> Result<Vec<Chunk>, IngestError> {
    let doc = load_company(input)?;
    let chunks = chunk_company(&doc)?;
    validate_chunks(&chunks, &doc);
    save_chunks(&chunks, output)?;
    Ok(chunks)
}

/// Merges every `*_preprocessed.json` in `dir`, in file-name order. Files
/// that do not hold a chunk list are skipped, as is `output` (the file the
/// merge will be written to) so a rerun does not fold in its own result.
pub fn combine(dir: &Path, output: &Path) -> Result<Vec<Chunk>, IngestError> {
    let output = std::fs::canonicalize(output).unwrap_or_else(|_| output.to_path_buf());

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(PREPROCESSED_SUFFIX))
                .unwrap_or(false)
        })
        .filter(|p| std::fs::canonicalize(p).map(|c| c != output).unwrap_or(true))
        .collect();
    files.sort();

    let mut combined = Vec::new();
    for file in &files {
        match load_chunks(file) {
            Ok(chunks) => combined.extend(chunks),
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }

    info!("Combined {} files, {} chunks", files.len(), combined.len());
    Ok(combined)
}

/// Embeds each chunk and upserts them `batch_size` at a time. Returns the
/// number of vectors the index acknowledged.
pub async fn upload(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    batch_size: usize,
) -> Result<usize, IngestError> {
    let mut written = 0;

    for (batch_no, batch) in chunks.chunks(batch_size.max(1)).enumerate() {
        let mut records = Vec::with_capacity(batch.len());
        for chunk in batch {
            let values = embedder.embed(&chunk.text).await?;
            records.push(VectorRecord {
                id: chunk.chunk_id.clone(),
                values,
                metadata: ChunkMetadata {
                    company_id: Some(chunk.company_id.clone()),
                    product_id: chunk.product_id.clone(),
                    chunk_type: Some(chunk.chunk_type.as_str().to_string()),
                    text: Some(chunk.text.clone()),
                },
            });
        }

        written += index.upsert(&records).await?;
        info!(batch = batch_no + 1, total = written, "Upserted batch");
    }

    Ok(written)
}
