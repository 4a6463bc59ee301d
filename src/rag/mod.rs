//! Retrieval-augmented answering for insurance questions.
//!
//! A query is embedded, the nearest insurer chunks are fetched from the
//! vector index, rendered into a numbered context block, and sent to the
//! completion API together with the chat's recent history. When the request
//! names a chat, the exchange is appended to it.

pub mod context;
pub mod pipeline;
pub mod prompt;

pub use context::{format_context, Source};
pub use pipeline::{AnswerRequest, AnswerResponse, Assistant, AssistantSettings, RagError};
