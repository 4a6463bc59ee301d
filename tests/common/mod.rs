#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use policypilot::config::{
    AppConfig, AuthConfig, ChatConfig, DatabaseConfig, LlmConfig, OpenAiConfig, PineconeConfig,
    RetrievalConfig, ServerConfig,
};
use policypilot::db::{get_connection, DbPool};
use policypilot::llm::{
    models::{ChatOptions, ChatResponse, Message, Usage},
    LlmError, LlmProvider,
};
use policypilot::rag::{Assistant, AssistantSettings};
use policypilot::retrieval::{
    ChunkMetadata, Embedder, RetrievalError, ScoredChunk, VectorIndex, VectorRecord,
};

pub fn test_pool() -> DbPool {
    get_connection(&DatabaseConfig {
        path: ":memory:".to_string(),
    })
    .unwrap()
}

pub fn test_config(api_keys: Vec<String>) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            path: ":memory:".to_string(),
        },
        auth: AuthConfig { api_keys },
        llm: LlmConfig {
            provider: "deepseek".to_string(),
            openai: Some(OpenAiConfig {
                api_base: "http://127.0.0.1:1".to_string(),
                api_key: "sk-test".to_string(),
                default_model: "deepseek-chat".to_string(),
            }),
            ollama: None,
        },
        retrieval: RetrievalConfig {
            embedding_url: "http://127.0.0.1:1/embed".to_string(),
            pinecone: PineconeConfig {
                host: "http://127.0.0.1:1".to_string(),
                api_key: "pc-test".to_string(),
                namespace: None,
            },
            top_k: 30,
        },
        chat: ChatConfig::default(),
    }
}

pub fn chunk(id: &str, company: &str, product: &str, text: &str, score: f32) -> ScoredChunk {
    ScoredChunk {
        id: id.to_string(),
        score,
        metadata: ChunkMetadata {
            company_id: Some(company.to_string()),
            product_id: Some(product.to_string()),
            chunk_type: Some("premium".to_string()),
            text: Some(text.to_string()),
        },
    }
}

pub fn sample_matches() -> Vec<ScoredChunk> {
    vec![
        chunk(
            "c-1",
            "britam",
            "britam_family_funeral",
            "Premium for Family Funeral: KES 1,500 monthly.",
            0.91,
        ),
        chunk(
            "c-2",
            "jubilee",
            "jubilee_last_expense",
            "Coverage for Last Expense: KES 80,000.",
            0.84,
        ),
    ]
}

#[derive(Default)]
pub struct MockEmbedder {
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl MockEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(RetrievalError::Embedding("status 503 Service Unavailable".to_string()));
        }
        Ok(vec![0.1, 0.2, 0.3])
    }
}

#[derive(Default)]
pub struct MockIndex {
    pub matches: Vec<ScoredChunk>,
    pub queries: Mutex<Vec<usize>>,
    pub upserts: Mutex<Vec<Vec<VectorRecord>>>,
}

impl MockIndex {
    pub fn with_matches(matches: Vec<ScoredChunk>) -> Self {
        Self {
            matches,
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorIndex for MockIndex {
    async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.queries.lock().unwrap().push(top_k);
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize, RetrievalError> {
        self.upserts.lock().unwrap().push(records.to_vec());
        Ok(records.len())
    }
}

pub struct MockLlm {
    pub answer: String,
    pub fail: bool,
    pub calls: Mutex<Vec<(Vec<Message>, ChatOptions)>>,
}

impl MockLlm {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: String::new(),
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn last_call(&self) -> (Vec<Message>, ChatOptions) {
        self.calls.lock().unwrap().last().cloned().expect("llm was not called")
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<ChatResponse, LlmError> {
        self.calls.lock().unwrap().push((messages.to_vec(), options));
        if self.fail {
            return Err(LlmError::Api("Completion API failed 502: upstream".to_string()));
        }
        Ok(ChatResponse {
            content: self.answer.clone(),
            model: "mock-model".to_string(),
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 5,
            }),
        })
    }

    fn supported_models(&self) -> Vec<&str> {
        vec!["mock-model"]
    }
}

pub struct Harness {
    pub assistant: Assistant,
    pub embedder: Arc<MockEmbedder>,
    pub index: Arc<MockIndex>,
    pub llm: Arc<MockLlm>,
    pub pool: DbPool,
}

pub fn harness_with(
    embedder: MockEmbedder,
    index: MockIndex,
    llm: MockLlm,
    settings: AssistantSettings,
) -> Harness {
    let embedder = Arc::new(embedder);
    let index = Arc::new(index);
    let llm = Arc::new(llm);
    let pool = test_pool();

    let assistant = Assistant::new(
        embedder.clone(),
        index.clone(),
        llm.clone(),
        pool.clone(),
        settings,
    );

    Harness {
        assistant,
        embedder,
        index,
        llm,
        pool,
    }
}

pub fn harness() -> Harness {
    harness_with(
        MockEmbedder::default(),
        MockIndex::with_matches(sample_matches()),
        MockLlm::answering("Britam pays out fastest; Jubilee is cheapest."),
        AssistantSettings::default(),
    )
}

/// Binds an actix `App` factory to a random local port and returns its base URL.
#[allow(unused_macros)]
macro_rules! spawn_fake {
    ($factory:expr) => {{
        let server = actix_web::HttpServer::new($factory)
            .workers(1)
            .bind(("127.0.0.1", 0))
            .expect("bind fake server");
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }};
}
