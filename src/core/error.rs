/// HTTP-facing errors.
///
/// Every variant renders as `{ "error": "<message>" }` with the matching
/// status code.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Missing sessionId query parameter")]
    MissingSessionId,
    #[error("Session not found. Please reconnect via GET /mcp")]
    SessionNotFound,
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Invalid JSON-RPC message: {0}")]
    InvalidMessage(String),
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ResponseError for HttpError {
    fn status_code(&self) -> StatusCode {
        match self {
            HttpError::MissingSessionId
            | HttpError::UnknownMethod(_)
            | HttpError::InvalidMessage(_)
            | HttpError::InvalidFileName(_) => StatusCode::BAD_REQUEST,
            HttpError::SessionNotFound | HttpError::FileNotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}
