//! Errors raised while orchestrating a standalone code-execution loop.

/// Errors surfaced by [`crate::service::CodeExecService`]. Mirrors
/// [`llm::LlmError`]'s shape so `C10`'s HTTP layer can translate either the
/// same way.
#[derive(Debug, thiserror::Error)]
pub enum CodeExecError {
    #[error("standalone code execution requires Docker, which is not reachable: {0}")]
    DockerUnavailable(String),

    #[error(transparent)]
    Sandbox(#[from] sandbox::SandboxError),

    #[error(transparent)]
    Upstream(#[from] llm::LlmError),
}

pub type Result<T> = std::result::Result<T, CodeExecError>;
