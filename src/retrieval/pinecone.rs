use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::PineconeConfig;
use crate::retrieval::{RetrievalError, ScoredChunk, VectorIndex, VectorRecord};

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredChunk>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

/// Pinecone data-plane client for a single index host.
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    pub fn new(host: String, api_key: String, namespace: Option<String>) -> Self {
        let host = host.trim_end_matches('/').to_string();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };

        Self {
            client: Client::new(),
            host,
            api_key,
            namespace,
        }
    }

    pub fn from_config(config: &PineconeConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.api_key.clone(),
            config.namespace.clone(),
        )
    }

    async fn post(
        &self,
        path: &str,
        mut body: serde_json::Value,
    ) -> Result<reqwest::Response, RetrievalError> {
        if let Some(namespace) = &self.namespace {
            body["namespace"] = json!(namespace);
        }

        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Index(format!("{} {}: {}", path, status, text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });

        let response = self.post("/query", body).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        debug!(matches = parsed.matches.len(), top_k, "Vector query complete");
        Ok(parsed.matches)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize, RetrievalError> {
        if records.is_empty() {
            return Ok(0);
        }

        let response = self.post("/vectors/upsert", json!({ "vectors": records })).await?;
        let parsed: UpsertResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        Ok(parsed.upserted_count)
    }
}
