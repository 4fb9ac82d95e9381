/// Error types for the HTTP surface and for tool execution.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::clients::db::DbError;
use crate::clients::kv::KvError;
use crate::clients::slack::SlackError;
use crate::clients::todoist::TodoistError;

/// Errors raised outside tool execution: startup, configuration and the
/// request gate.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(
        "Valid API key required. Include in Authorization header as 'Bearer YOUR_KEY' or X-API-Key header."
    )]
    Unauthorized,
    #[error("{0}")]
    Config(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Config(_) | AppError::HttpClient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::Unauthorized => "Unauthorized",
            AppError::Config(_) | AppError::HttpClient(_) => "Internal Server Error",
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": error,
            "message": self.to_string(),
        }))
    }
}

/// Failure of a single tool call. Reported to the client as an `isError`
/// result rather than a JSON-RPC error.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Todoist(#[from] TodoistError),
    #[error(transparent)]
    Slack(#[from] SlackError),
}
