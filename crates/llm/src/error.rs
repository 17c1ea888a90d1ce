use axum::response::IntoResponse;
use http::StatusCode;

use crate::protocol::anthropic::error::{Error as AnthropicError, ErrorResponse};

/// Errors raised while fulfilling an Anthropic Messages request against
/// Bedrock. Each variant maps to exactly one Anthropic error `type` and HTTP
/// status code; see [`LlmError::status_and_body`].
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream at capacity: {0}")]
    Overloaded(String),

    #[error("upstream api error: {0}")]
    Api(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

impl LlmError {
    pub fn status_and_body(&self) -> (StatusCode, ErrorResponse) {
        let error = match self {
            Self::InvalidRequest(msg) => AnthropicError::invalid_request_error(msg.clone()),
            Self::Authentication(msg) => AnthropicError::authentication_error(msg.clone()),
            Self::Permission(msg) => AnthropicError::permission_error(msg.clone()),
            Self::NotFound(msg) => AnthropicError::not_found_error(msg.clone()),
            Self::RateLimited(msg) => AnthropicError::rate_limit_error(msg.clone()),
            Self::Overloaded(msg) => AnthropicError::overloaded_error(msg.clone()),
            Self::Api(msg) => AnthropicError::api_error(msg.clone()),
            Self::Internal(msg) => AnthropicError::api_error(msg.clone()),
        };

        let status = match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Overloaded(_) | Self::Internal(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Api(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, ErrorResponse::new(error))
    }
}

impl IntoResponse for LlmError {
    fn into_response(self) -> axum::response::Response {
        // Log once, at the boundary, with severity proportional to the status class.
        let (status, body) = self.status_and_body();

        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::warn!("{self}");
        }

        (status, axum::Json(body)).into_response()
    }
}
