use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::{service::DbService, Chat, DbPool, Role};
use crate::llm::{
    models::{ChatOptions, ChatResponse, Message as LlmMessage},
    LlmError, LlmProvider, ProviderFactory,
};
use crate::rag::context::{format_context, Source};
use crate::rag::prompt::{chat_title, user_prompt, SYSTEM_PROMPT};
use crate::retrieval::{Embedder, HttpEmbedder, PineconeIndex, RetrievalError, VectorIndex};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Query must be a string")]
    InvalidQuery,
    #[error("Chat {0} not found")]
    ChatNotFound(Uuid),
    #[error("Chat {0} belongs to another user")]
    Forbidden(Uuid),
    #[error("Chat {0} has no question to answer again")]
    NothingToRegenerate(Uuid),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),
    #[error("Database lock poisoned")]
    Lock,
}

#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub query: String,
    pub chat_id: Option<Uuid>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub top_k: usize,
    pub max_history_messages: usize,
    pub temperature: f32,
    pub model: Option<String>,
    pub default_chat_name: String,
    pub title_max_chars: usize,
}

impl AssistantSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            max_history_messages: config.chat.max_history_messages,
            temperature: config.chat.temperature,
            model: None,
            default_chat_name: config.chat.default_chat_name.clone(),
            title_max_chars: config.chat.title_max_chars,
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            top_k: 30,
            max_history_messages: 10,
            temperature: 0.3,
            model: None,
            default_chat_name: "New Chat".to_string(),
            title_max_chars: 40,
        }
    }
}

/// State loaded for a chat before the model is called.
struct ChatContext {
    id: Uuid,
    chat_name: String,
    is_first_exchange: bool,
    history: Vec<LlmMessage>,
}

/// The user turn a regeneration answers again, and the assistant turn it replaces.
struct RegenerationTarget {
    chat_name: String,
    query: String,
    replaced_id: Option<i64>,
    history: Vec<LlmMessage>,
}

/// Embed, retrieve, prompt, complete, persist.
#[derive(Clone)]
pub struct Assistant {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmProvider>,
    pool: DbPool,
    settings: AssistantSettings,
}

impl Assistant {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmProvider>,
        pool: DbPool,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            pool,
            settings,
        }
    }

    /// Wires the HTTP embedder, Pinecone index and configured completion
    /// provider. `None` when the provider section is missing or unknown.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Option<Self> {
        let llm = ProviderFactory::create_default(config)?;
        Some(Self::new(
            Arc::new(HttpEmbedder::new(config.retrieval.embedding_url.clone())),
            Arc::new(PineconeIndex::from_config(&config.retrieval.pinecone)),
            llm,
            pool,
            AssistantSettings::from_config(config),
        ))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RagError> {
        self.pool.lock().map_err(|_| RagError::Lock)
    }

    pub async fn answer(&self, req: AnswerRequest) -> Result<AnswerResponse, RagError> {
        let query = req.query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidQuery);
        }

        // The connection guard must be released before any network call.
        let chat = match req.chat_id {
            Some(id) => Some(self.load_chat(id, req.user_id.as_deref())?),
            None => None,
        };

        info!(chat_id = ?req.chat_id, "Answering query");

        let history = chat.as_ref().map(|c| c.history.clone()).unwrap_or_default();
        let (completion, sources) = self.generate(query, history).await?;

        let chat_name = match chat {
            Some(chat) => Some(self.persist_exchange(
                &chat,
                query,
                &completion.content,
                &completion.model,
                &sources,
            )?),
            None => None,
        };

        Ok(AnswerResponse {
            answer: completion.content,
            sources,
            chat_id: req.chat_id,
            chat_name,
        })
    }

    /// Drops the chat's last answer and answers the question before it again.
    /// A chat whose last turn is an unanswered question gets that question answered.
    pub async fn regenerate(
        &self,
        chat_id: Uuid,
        user_id: Option<&str>,
    ) -> Result<AnswerResponse, RagError> {
        let target = self.load_regeneration(chat_id, user_id)?;
        info!(chat_id = %chat_id, replaced = ?target.replaced_id, "Regenerating answer");

        let (completion, sources) = self.generate(&target.query, target.history).await?;

        {
            let conn = self.lock()?;
            DbService::in_transaction(&conn, |conn| {
                if let Some(id) = target.replaced_id {
                    DbService::delete_message(conn, id)?;
                }
                DbService::insert_message(
                    conn,
                    chat_id,
                    Role::Assistant,
                    &completion.content,
                    Some(&completion.model),
                    serde_json::json!({ "sources": sources }),
                )?;
                Ok(())
            })?;
        }

        Ok(AnswerResponse {
            answer: completion.content,
            sources,
            chat_id: Some(chat_id),
            chat_name: Some(target.chat_name),
        })
    }

    /// Embeds the query, searches the index and asks the model, with
    /// `history` placed ahead of the templated question.
    async fn generate(
        &self,
        query: &str,
        mut messages: Vec<LlmMessage>,
    ) -> Result<(ChatResponse, Vec<Source>), RagError> {
        let vector = self.embedder.embed(query).await?;
        let matches = self.index.query(&vector, self.settings.top_k).await?;
        if matches.is_empty() {
            warn!("Vector search returned no matches");
        }

        let context = format_context(&matches);
        messages.push(LlmMessage::new("user", user_prompt(query, &context)));

        let options = ChatOptions {
            model: self.settings.model.clone(),
            temperature: Some(self.settings.temperature),
            max_tokens: None,
            system_prompt: Some(SYSTEM_PROMPT.to_string()),
        };

        let completion = self.llm.chat(&messages, options).await?;
        let sources = matches.iter().map(Source::from).collect();
        Ok((completion, sources))
    }

    fn owned_chat(conn: &Connection, id: Uuid, user_id: Option<&str>) -> Result<Chat, RagError> {
        let chat = DbService::get_chat(conn, id)?.ok_or(RagError::ChatNotFound(id))?;
        if let Some(user_id) = user_id {
            if chat.user_id != user_id {
                return Err(RagError::Forbidden(id));
            }
        }
        Ok(chat)
    }

    fn load_chat(&self, id: Uuid, user_id: Option<&str>) -> Result<ChatContext, RagError> {
        let conn = self.lock()?;
        let chat = Self::owned_chat(&conn, id, user_id)?;

        let is_first_exchange = DbService::count_messages(&conn, id)? == 0;
        let history = if self.settings.max_history_messages == 0 {
            Vec::new()
        } else {
            DbService::recent_messages(&conn, id, self.settings.max_history_messages)?
                .into_iter()
                .map(|m| LlmMessage::new(m.role.as_str(), m.content))
                .collect()
        };

        Ok(ChatContext {
            id,
            chat_name: chat.chat_name,
            is_first_exchange,
            history,
        })
    }

    fn load_regeneration(
        &self,
        id: Uuid,
        user_id: Option<&str>,
    ) -> Result<RegenerationTarget, RagError> {
        let conn = self.lock()?;
        let chat = Self::owned_chat(&conn, id, user_id)?;

        let max_history = self.settings.max_history_messages;
        let mut messages = DbService::recent_messages(&conn, id, max_history + 2)?;

        let replaced_id = match messages.last() {
            Some(last) if last.role == Role::Assistant => {
                let last_id = last.id;
                messages.pop();
                Some(last_id)
            }
            _ => None,
        };
        let question = match messages.pop() {
            Some(m) if m.role == Role::User => m,
            _ => return Err(RagError::NothingToRegenerate(id)),
        };

        let skip = messages.len().saturating_sub(max_history);
        let history = messages
            .into_iter()
            .skip(skip)
            .map(|m| LlmMessage::new(m.role.as_str(), m.content))
            .collect();

        Ok(RegenerationTarget {
            chat_name: chat.chat_name,
            query: question.content,
            replaced_id,
            history,
        })
    }

    /// Appends the user turn then the assistant turn, renaming the chat if
    /// this was its first exchange, all in one transaction. Returns the chat's
    /// current name.
    fn persist_exchange(
        &self,
        chat: &ChatContext,
        query: &str,
        answer: &str,
        model: &str,
        sources: &[Source],
    ) -> Result<String, RagError> {
        let conn = self.lock()?;
        let title = (chat.is_first_exchange && chat.chat_name == self.settings.default_chat_name)
            .then(|| chat_title(query, self.settings.title_max_chars));

        DbService::in_transaction(&conn, |conn| {
            DbService::insert_message(conn, chat.id, Role::User, query, None, serde_json::json!({}))?;
            DbService::insert_message(
                conn,
                chat.id,
                Role::Assistant,
                answer,
                Some(model),
                serde_json::json!({ "sources": sources }),
            )?;
            if let Some(title) = &title {
                DbService::rename_chat(conn, chat.id, title)?;
            }
            Ok(())
        })?;

        if let Some(title) = title {
            info!(chat_id = %chat.id, title = %title, "Renamed chat from first message");
            return Ok(title);
        }

        Ok(chat.chat_name.clone())
    }
}
