//! services/api/src/web/response.rs
//!
//! The JSON envelope returned by every endpoint, and the mapping from port
//! errors to HTTP statuses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use learning_progress_core::ports::PortError;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

/// `{ "error": bool, "message": string, "data": ... }`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }
}

pub type HandlerResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ErrorResponse>;

pub fn respond<T>(status: StatusCode, message: impl Into<String>, data: T) -> HandlerResult<T> {
    Ok((status, Json(ApiResponse::ok(message, data))))
}

/// An error leaving a handler. Rendered as the envelope with `error: true`.
#[derive(Debug)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<PortError> for ErrorResponse {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(msg) => Self::not_found(msg),
            PortError::InvalidInput(msg) | PortError::AlreadyExists(msg) => Self::bad_request(msg),
            PortError::Unexpected(msg) => {
                error!("Unexpected port error: {}", msg);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred")
            }
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            error: true,
            message: self.message,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Parses a path segment as an id, naming the parameter in the 400 message.
pub fn parse_id(name: &str, raw: &str) -> Result<Uuid, ErrorResponse> {
    if raw.trim().is_empty() {
        return Err(ErrorResponse::bad_request(format!("Missing {} parameter", name)));
    }
    Uuid::parse_str(raw).map_err(|_| ErrorResponse::bad_request(format!("Invalid {} parameter", name)))
}
