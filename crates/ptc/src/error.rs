//! Errors raised while orchestrating a Programmatic Tool Calling round trip.

/// Errors surfaced by [`crate::service::PtcService`].
///
/// Each variant maps to an Anthropic error `type` the same way [`llm::LlmError`]
/// does; `C10`'s HTTP layer is responsible for that translation, so this type
/// only needs to say what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum PtcError {
    #[error("Programmatic Tool Calling requires Docker, which is not reachable: {0}")]
    DockerUnavailable(String),

    #[error(transparent)]
    Sandbox(#[from] sandbox::SandboxError),

    #[error(transparent)]
    Upstream(#[from] llm::LlmError),

    #[error("no pending code execution for session {0}")]
    NoPendingExecution(String),

    #[error("sandbox session {0} not found")]
    SessionNotFound(String),

    #[error("tool_result does not match any pending call in session {0}")]
    UnmatchedToolResult(String),

    #[error("sandbox code execution finished without yielding a result")]
    GeneratorExhausted,
}

pub type Result<T> = std::result::Result<T, PtcError>;
