use serde::{Deserialize, Serialize};

use crate::retrieval::ScoredChunk;

const MISSING: &str = "N/A";

/// A retrieved chunk as reported back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub score: f32,
    pub company_id: Option<String>,
    pub product_id: Option<String>,
    pub text: Option<String>,
}

impl From<&ScoredChunk> for Source {
    fn from(chunk: &ScoredChunk) -> Self {
        Self {
            id: chunk.id.clone(),
            score: chunk.score,
            company_id: chunk.metadata.company_id.clone(),
            product_id: chunk.metadata.product_id.clone(),
            text: chunk.metadata.text.clone(),
        }
    }
}

/// Renders retrieved chunks into the numbered context block handed to the model.
pub fn format_context(matches: &[ScoredChunk]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "Result {}:\nCompany: {}\nProduct: {}\nChunk ID: {}\nText: {}",
                i + 1,
                m.metadata.company_id.as_deref().unwrap_or(MISSING),
                m.metadata.product_id.as_deref().unwrap_or(MISSING),
                m.id,
                m.metadata.text.as_deref().unwrap_or(MISSING),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
