pub mod models;
pub mod ollama;
pub mod openai;

use ollama::OllamaProvider;
use openai::OpenAiProvider;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use models::{ChatOptions, ChatResponse, Message};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("API Error: {0}")]
    Api(String),
    #[error("Invalid response from completion API")]
    InvalidResponse,
    #[error("Rate Limited")]
    RateLimited,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<ChatResponse, LlmError>;

    fn supported_models(&self) -> Vec<&str>;
}

/// Builds the configured completion provider.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_default(config: &AppConfig) -> Option<Arc<dyn LlmProvider>> {
        match config.llm.provider.as_str() {
            // DeepSeek speaks the OpenAI chat-completions dialect
            "openai" | "deepseek" => {
                let cfg = config.llm.openai.as_ref()?;
                Some(Arc::new(OpenAiProvider::new(
                    cfg.api_key.clone(),
                    cfg.api_base.clone(),
                    cfg.default_model.clone(),
                )))
            }
            "ollama" => {
                let cfg = config.llm.ollama.as_ref()?;
                Some(Arc::new(OllamaProvider::new(
                    cfg.base_url.clone(),
                    cfg.default_model.clone(),
                )))
            }
            _ => None,
        }
    }
}

/// Prepends the system prompt, if any, the way both chat APIs expect it.
pub(crate) fn with_system_prompt(messages: &[Message], options: &ChatOptions) -> Vec<Message> {
    let mut final_messages = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = &options.system_prompt {
        final_messages.push(Message::new("system", system.clone()));
    }
    final_messages.extend_from_slice(messages);
    final_messages
}
