use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::llm::{
    models::{ChatOptions, ChatResponse, Message, Usage},
    with_system_prompt, LlmError, LlmProvider,
};

/// Local Ollama server, handy when developing without a hosted API key.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, default_model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<ChatResponse, LlmError> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let final_messages = with_system_prompt(messages, &options);

        let mut body = json!({
            "model": model,
            "messages": final_messages,
            "stream": false,
            "options": {
                "temperature": options.temperature.unwrap_or(0.3),
            }
        });
        if let Some(max_tokens) = options.max_tokens {
            body["options"]["num_predict"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Ollama Error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let content = json["message"]["content"]
            .as_str()
            .ok_or(LlmError::InvalidResponse)?
            .to_string();

        let usage = match (json["prompt_eval_count"].as_u64(), json["eval_count"].as_u64()) {
            (Some(input), Some(output)) => Some(Usage {
                input_tokens: input as u32,
                output_tokens: output as u32,
            }),
            _ => None,
        };

        Ok(ChatResponse {
            content,
            model: model.to_string(),
            usage,
        })
    }

    fn supported_models(&self) -> Vec<&str> {
        vec!["llama3.2", "mistral"]
    }
}
