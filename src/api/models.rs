use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub chat_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameChatRequest {
    pub chat_name: Option<String>,
}

/// `query` stays untyped so a non-string value is answered with a 400
/// carrying our own message instead of a deserializer error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQueryRequest {
    pub query: Option<serde_json::Value>,
    pub chat_id: Option<Uuid>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListChatsQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_offset")]
    pub offset: usize,
}

/// Optional `?userId=` owner check.
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_offset")]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

fn default_offset() -> usize {
    0
}
