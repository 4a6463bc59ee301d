use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::rag::RagError;

/// Every failure leaves the API as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidQuery | RagError::NothingToRegenerate(_) => {
                ApiError::BadRequest(err.to_string())
            }
            RagError::ChatNotFound(_) => ApiError::NotFound(err.to_string()),
            RagError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
            other => {
                error!("Chat API Error: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<duckdb::Error> for ApiError {
    fn from(err: duckdb::Error) -> Self {
        error!("Database error: {}", err);
        ApiError::Internal(err.to_string())
    }
}
