/// Programmatic Tool Calling (PTC) sandbox configuration.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct PtcConfig {
    /// Whether Programmatic Tool Calling is enabled at all.
    pub enabled: bool,

    /// Docker image used for PTC sandbox containers.
    pub sandbox_image: String,

    /// Docker memory limit string (e.g. "256m") applied to each sandbox container.
    pub memory_limit: String,

    /// CPU quota, in microseconds per `cpu_period`, enforced on each sandbox container.
    pub cpu_quota: i64,

    /// CPU accounting period, in microseconds.
    pub cpu_period: i64,

    /// Wall-clock budget, in seconds, for a single `execute_code` call.
    pub execution_timeout_seconds: u64,

    /// Whether sandbox containers run with networking disabled.
    pub network_disabled: bool,

    /// How long an idle session is kept alive before expiring.
    pub session_timeout_seconds: u64,

    /// How often the background reaper scans for expired sessions.
    pub cleanup_interval_seconds: u64,

    /// Window, in milliseconds, during which parallel tool calls from a
    /// single `execute_code` invocation are collected into one batch.
    pub tool_call_batch_window_ms: u64,
}

impl Default for PtcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sandbox_image: "python:3.11-slim".to_string(),
            memory_limit: "256m".to_string(),
            cpu_quota: 50_000,
            cpu_period: 100_000,
            execution_timeout_seconds: 60,
            network_disabled: true,
            session_timeout_seconds: 270,
            cleanup_interval_seconds: 60,
            tool_call_batch_window_ms: 100,
        }
    }
}

impl PtcConfig {
    pub(crate) fn validate(&self) -> Result<(), crate::Error> {
        if !self.enabled {
            return Ok(());
        }

        if self.sandbox_image.trim().is_empty() {
            return Err(crate::Error::Invalid {
                key: "ptc.sandbox_image".to_string(),
                reason: "must not be empty when PTC is enabled".to_string(),
            });
        }

        if self.session_timeout_seconds == 0 {
            return Err(crate::Error::Invalid {
                key: "ptc.session_timeout_seconds".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Standalone server-side code-execution configuration.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct StandaloneConfig {
    /// Whether standalone (non-PTC) code execution is enabled at all.
    pub enabled: bool,

    /// Timeout, in seconds, for a single `bash_code_execution` invocation.
    pub bash_timeout_seconds: u64,

    /// Maximum number of agent-loop iterations before giving up.
    pub max_iterations: u32,

    /// Docker image used for standalone sandbox containers.
    pub sandbox_image: String,

    /// Docker memory limit string (e.g. "512m") applied to each sandbox container.
    pub memory_limit: String,

    /// CPU quota, in microseconds per `cpu_period`, enforced on each sandbox container.
    pub cpu_quota: i64,

    /// CPU accounting period, in microseconds.
    pub cpu_period: i64,

    /// Whether sandbox containers run with networking disabled.
    pub network_disabled: bool,

    /// How long an idle session is kept alive before expiring.
    pub session_timeout_seconds: u64,

    /// How often the background reaper scans for expired sessions.
    pub cleanup_interval_seconds: u64,

    /// Working directory inside the container that bash commands and
    /// text-editor operations are confined to.
    pub workspace_dir: String,

    /// Largest file the text-editor tool will read or write, in bytes.
    pub max_file_size_bytes: u64,
}

impl Default for StandaloneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bash_timeout_seconds: 30,
            max_iterations: 25,
            sandbox_image: "python:3.11-slim".to_string(),
            memory_limit: "512m".to_string(),
            cpu_quota: 100_000,
            cpu_period: 100_000,
            network_disabled: true,
            session_timeout_seconds: 270,
            cleanup_interval_seconds: 60,
            workspace_dir: "/workspace".to_string(),
            max_file_size_bytes: 10 * 1024 * 1024,
        }
    }
}

impl StandaloneConfig {
    pub(crate) fn validate(&self) -> Result<(), crate::Error> {
        if !self.enabled {
            return Ok(());
        }

        if self.max_iterations == 0 {
            return Err(crate::Error::Invalid {
                key: "standalone.max_iterations".to_string(),
                reason: "must be greater than zero when standalone execution is enabled".to_string(),
            });
        }

        if self.sandbox_image.trim().is_empty() {
            return Err(crate::Error::Invalid {
                key: "standalone.sandbox_image".to_string(),
                reason: "must not be empty when standalone execution is enabled".to_string(),
            });
        }

        if self.session_timeout_seconds == 0 {
            return Err(crate::Error::Invalid {
                key: "standalone.session_timeout_seconds".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
