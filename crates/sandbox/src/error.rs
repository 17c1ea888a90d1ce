/// Errors raised while creating, driving, or tearing down a sandbox container.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("docker is not available: {0}")]
    DockerUnavailable(String),

    #[error("failed to create sandbox container: {0}")]
    ContainerCreate(String),

    #[error("sandbox ipc error: {0}")]
    Ipc(String),

    #[error("sandbox execution timed out after {0}s")]
    Timeout(f64),

    #[error("sandbox code execution failed: {0}")]
    CodeExecution(String),

    #[error("unknown sandbox session: {0}")]
    SessionNotFound(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
