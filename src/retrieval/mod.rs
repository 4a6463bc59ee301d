//! Clients for the two external retrieval services: the sentence embedding
//! endpoint and the managed vector index holding insurer chunks.

pub mod embedding;
pub mod pinecone;

pub use embedding::HttpEmbedder;
pub use pinecone::PineconeIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("Embedding service failed: {0}")]
    Embedding(String),
    #[error("Vector index error: {0}")]
    Index(String),
}

/// Metadata stored next to each vector. Every field is optional on the way
/// back because older uploads did not always carry all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest `top_k` chunks to `vector`, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, RetrievalError>;

    /// Returns the number of vectors the index reports as written.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize, RetrievalError>;
}
