use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::retrieval::{Embedder, RetrievalError};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Sentence-embedding service (MiniLM, 384 dimensions) that accepts
/// `{"text": ...}` and answers `{"embedding": [...]}`.
pub struct HttpEmbedder {
    client: Client,
    url: String,
}

impl HttpEmbedder {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|e| RetrievalError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Embedding(format!(
                "status {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(RetrievalError::Embedding("empty embedding".to_string()));
        }

        debug!(dimensions = body.embedding.len(), "Embedded text");
        Ok(body.embedding)
    }
}
