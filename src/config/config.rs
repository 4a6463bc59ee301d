use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// Empty disables API key checks.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub default_model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub default_model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub openai: Option<OpenAiConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PineconeConfig {
    pub host: String,
    pub api_key: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    pub embedding_url: String,
    pub pinecone: PineconeConfig,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_max_history")]
    pub max_history_messages: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_chat_name")]
    pub default_chat_name: String,
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history_messages: default_max_history(),
            temperature: default_temperature(),
            default_chat_name: default_chat_name(),
            title_max_chars: default_title_max_chars(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

fn default_top_k() -> usize {
    30
}

fn default_max_history() -> usize {
    10
}

fn default_temperature() -> f32 {
    0.3
}

fn default_chat_name() -> String {
    "New Chat".to_string()
}

fn default_title_max_chars() -> usize {
    40
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("POLICYPILOT").separator("__"))
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;
        app_config.expand_env_values();

        Ok(app_config)
    }

    // Expand values written like ${DEEPSEEK_API_KEY}
    fn expand_env_values(&mut self) {
        self.server.host = expand_env(&self.server.host);
        self.database.path = expand_env(&self.database.path);

        for key in self.auth.api_keys.iter_mut() {
            *key = expand_env(key);
        }
        self.auth.api_keys.retain(|key| !key.is_empty());

        if let Some(ref mut openai) = self.llm.openai {
            openai.api_base = expand_env(&openai.api_base);
            openai.api_key = expand_env(&openai.api_key);
        }
        if let Some(ref mut ollama) = self.llm.ollama {
            ollama.base_url = expand_env(&ollama.base_url);
        }

        self.retrieval.embedding_url = expand_env(&self.retrieval.embedding_url);
        self.retrieval.pinecone.host = expand_env(&self.retrieval.pinecone.host);
        self.retrieval.pinecone.api_key = expand_env(&self.retrieval.pinecone.api_key);
    }
}

pub fn expand_env(val: &str) -> String {
    if val.starts_with("${") && val.ends_with('}') {
        let var_name = &val[2..val.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else {
        val.to_string()
    }
}
