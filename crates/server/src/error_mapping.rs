//! Renders every fallible path this crate drives (upstream errors, PTC
//! orchestration errors, standalone code-execution errors, and this crate's
//! own extraction/validation failures) into the one Anthropic error body
//! shape. `llm::LlmError` already implements `IntoResponse` on its own;
//! `ptc::PtcError` and `codeexec::CodeExecError` don't carry an `axum`
//! dependency, so their translation lives here instead.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use llm::protocol::anthropic::error::{Error as AnthropicError, ErrorResponse};

pub fn bad_request_error(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(AnthropicError::invalid_request_error(message)))).into_response()
}

pub fn ptc_error_response(error: ptc::PtcError) -> Response {
    let (status, anthropic_error) = match &error {
        ptc::PtcError::DockerUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, AnthropicError::api_error(msg.clone())),
        ptc::PtcError::Sandbox(inner) => sandbox_error_parts(inner),
        ptc::PtcError::Upstream(inner) => {
            let (status, body) = inner.status_and_body();
            return (status, Json(body)).into_response();
        }
        ptc::PtcError::NoPendingExecution(id) => (
            StatusCode::BAD_REQUEST,
            AnthropicError::invalid_request_error(format!("no pending code execution for container {id}")),
        ),
        ptc::PtcError::SessionNotFound(id) => {
            (StatusCode::BAD_REQUEST, AnthropicError::invalid_request_error(format!("unknown container {id}")))
        }
        ptc::PtcError::UnmatchedToolResult(id) => (
            StatusCode::BAD_REQUEST,
            AnthropicError::invalid_request_error(format!("tool_result does not match any pending call in container {id}")),
        ),
        ptc::PtcError::GeneratorExhausted => {
            (StatusCode::INTERNAL_SERVER_ERROR, AnthropicError::api_error("sandbox execution ended without a result"))
        }
    };

    log_by_status(status, &error);
    (status, Json(ErrorResponse::new(anthropic_error))).into_response()
}

pub fn codeexec_error_response(error: codeexec::CodeExecError) -> Response {
    let (status, anthropic_error) = match &error {
        codeexec::CodeExecError::DockerUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, AnthropicError::api_error(msg.clone())),
        codeexec::CodeExecError::Sandbox(inner) => sandbox_error_parts(inner),
        codeexec::CodeExecError::Upstream(inner) => {
            let (status, body) = inner.status_and_body();
            return (status, Json(body)).into_response();
        }
    };

    log_by_status(status, &error);
    (status, Json(ErrorResponse::new(anthropic_error))).into_response()
}

fn sandbox_error_parts(error: &sandbox::SandboxError) -> (StatusCode, AnthropicError) {
    match error {
        sandbox::SandboxError::DockerUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, AnthropicError::api_error(msg.clone())),
        sandbox::SandboxError::ContainerCreate(msg) => (StatusCode::SERVICE_UNAVAILABLE, AnthropicError::api_error(msg.clone())),
        sandbox::SandboxError::Ipc(msg) => (StatusCode::INTERNAL_SERVER_ERROR, AnthropicError::api_error(msg.clone())),
        sandbox::SandboxError::Timeout(seconds) => {
            (StatusCode::INTERNAL_SERVER_ERROR, AnthropicError::timeout_error(format!("sandbox execution timed out after {seconds}s")))
        }
        sandbox::SandboxError::CodeExecution(msg) => (StatusCode::INTERNAL_SERVER_ERROR, AnthropicError::api_error(msg.clone())),
        sandbox::SandboxError::SessionNotFound(id) => {
            (StatusCode::BAD_REQUEST, AnthropicError::invalid_request_error(format!("unknown container {id}")))
        }
    }
}

fn log_by_status(status: StatusCode, error: &dyn std::error::Error) {
    if status.is_server_error() {
        log::error!("{error}");
    } else {
        log::warn!("{error}");
    }
}
