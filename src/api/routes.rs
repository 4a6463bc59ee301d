use actix_web::{delete, get, patch, post, web, HttpResponse};
use duckdb::Connection;
use serde_json::json;
use std::sync::MutexGuard;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::models::{
    ChatQueryRequest, CreateChatRequest, ListChatsQuery, OwnerQuery, PaginationQuery,
    RenameChatRequest,
};
use crate::db::{service::DbService, DbPool};
use crate::rag::{AnswerRequest, Assistant, RagError};

type ApiResult = Result<HttpResponse, ApiError>;

fn lock(pool: &DbPool) -> Result<MutexGuard<'_, Connection>, ApiError> {
    pool.lock()
        .map_err(|_| ApiError::Internal("Database lock poisoned".to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// --- Chats ---

#[post("/createchat")]
pub async fn create_chat(pool: web::Data<DbPool>, req: web::Json<CreateChatRequest>) -> ApiResult {
    let req = req.into_inner();
    let (user_id, chat_name) = match (non_blank(req.user_id), non_blank(req.chat_name)) {
        (Some(user_id), Some(chat_name)) => (user_id, chat_name),
        _ => {
            return Err(ApiError::BadRequest(
                "userId and chat_name are required".to_string(),
            ))
        }
    };

    let conn = lock(&pool)?;
    let chat = DbService::insert_chat(&conn, &user_id, &chat_name)?;
    info!(chat_id = %chat.id, user_id = %user_id, "Created chat");

    Ok(HttpResponse::Ok().json(json!({ "id": chat.id })))
}

#[get("/chats")]
pub async fn list_chats(pool: web::Data<DbPool>, query: web::Query<ListChatsQuery>) -> ApiResult {
    let query = query.into_inner();
    let user_id = non_blank(query.user_id)
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let conn = lock(&pool)?;
    let chats = DbService::list_chats(&conn, &user_id, query.limit, query.offset)?;
    Ok(HttpResponse::Ok().json(chats))
}

#[get("/chats/{id}")]
pub async fn get_chat(pool: web::Data<DbPool>, id: web::Path<Uuid>) -> ApiResult {
    let id = id.into_inner();
    let conn = lock(&pool)?;

    match DbService::get_chat(&conn, id)? {
        Some(chat) => Ok(HttpResponse::Ok().json(chat)),
        None => Err(ApiError::NotFound(format!("Chat {} not found", id))),
    }
}

#[patch("/chats/{id}")]
pub async fn rename_chat(
    pool: web::Data<DbPool>,
    id: web::Path<Uuid>,
    req: web::Json<RenameChatRequest>,
) -> ApiResult {
    let id = id.into_inner();
    let chat_name = non_blank(req.into_inner().chat_name)
        .ok_or_else(|| ApiError::BadRequest("chat_name is required".to_string()))?;

    let conn = lock(&pool)?;
    if !DbService::rename_chat(&conn, id, chat_name.trim())? {
        return Err(ApiError::NotFound(format!("Chat {} not found", id)));
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[delete("/chats/{id}")]
pub async fn delete_chat(pool: web::Data<DbPool>, id: web::Path<Uuid>) -> ApiResult {
    let id = id.into_inner();
    let conn = lock(&pool)?;

    if DbService::get_chat(&conn, id)?.is_none() {
        return Err(ApiError::NotFound(format!("Chat {} not found", id)));
    }

    DbService::delete_chat(&conn, id)?;
    info!(chat_id = %id, "Deleted chat");
    Ok(HttpResponse::NoContent().finish())
}

// --- Messages ---

#[get("/chats/{id}/messages")]
pub async fn get_messages(
    pool: web::Data<DbPool>,
    id: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> ApiResult {
    let id = id.into_inner();
    let conn = lock(&pool)?;

    if DbService::get_chat(&conn, id)?.is_none() {
        return Err(ApiError::NotFound(format!("Chat {} not found", id)));
    }

    let messages = DbService::get_messages(&conn, id, query.limit, query.offset)?;
    Ok(HttpResponse::Ok().json(messages))
}

#[post("/chat")]
pub async fn post_chat(assistant: web::Data<Assistant>, req: web::Json<ChatQueryRequest>) -> ApiResult {
    let req = req.into_inner();
    let query = match req.query {
        Some(serde_json::Value::String(q)) => q,
        _ => return Err(RagError::InvalidQuery.into()),
    };

    let response = assistant
        .answer(AnswerRequest {
            query,
            chat_id: req.chat_id,
            user_id: req.user_id,
        })
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

#[post("/chats/{id}/regenerate")]
pub async fn regenerate(
    assistant: web::Data<Assistant>,
    id: web::Path<Uuid>,
    query: web::Query<OwnerQuery>,
) -> ApiResult {
    let owner = non_blank(query.into_inner().user_id);
    let response = assistant.regenerate(id.into_inner(), owner.as_deref()).await?;
    Ok(HttpResponse::Ok().json(response))
}

// Extractor failures get the same `{"error"}` shape as every other failure.

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .service(create_chat)
            .service(list_chats)
            .service(get_chat)
            .service(rename_chat)
            .service(delete_chat)
            .service(get_messages)
            .service(regenerate)
            .service(post_chat),
    );
}
