//! Docker-backed container driver: create a sandbox container, inject the
//! runner script, attach before starting it (to avoid losing the `__READY__`
//! preamble), and speak the line-delimited IPC protocol over the attached
//! stdio stream.
//!
//! Grounded on `original_source/app/services/ptc/sandbox.py`'s
//! `create_session`/`_copy_file_to_container`/`_send_to_container`/
//! `_read_from_container`. `bollard`'s `attach_container` already demultiplexes
//! Docker's 8-byte-header stream framing into [`bollard::container::LogOutput`]
//! variants, so unlike the reference implementation (which talks to a raw
//! socket) this driver never has to parse that framing by hand.

use std::time::Duration;

use bollard::{
    container::{AttachContainerOptions, Config, CreateContainerOptions, LogOutput, UploadToContainerOptions},
    Docker,
};
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::{
    error::{Result, SandboxError},
    protocol::{self, ToolResultPayload},
};

pub struct SandboxLimits {
    pub image: String,
    pub memory_limit: String,
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub network_disabled: bool,
    pub working_dir: String,
}

/// A live container attached over stdio, ready to exchange IPC lines.
pub struct ContainerHandle {
    pub container_id: String,
    docker: Docker,
    input: Box<dyn tokio::io::AsyncWrite + Unpin + Send>,
    output: std::pin::Pin<Box<dyn Stream<Item = std::result::Result<LogOutput, bollard::errors::Error>> + Send>>,
    buffer: String,
}

pub async fn connect() -> Result<Docker> {
    Docker::connect_with_local_defaults().map_err(|e| SandboxError::DockerUnavailable(e.to_string()))
}

/// Creates, provisions, attaches, and starts a sandbox container running the
/// given runner script at `/tmp/runner.py`.
pub async fn create_container(
    docker: &Docker,
    limits: &SandboxLimits,
    runner_script: &str,
    ready_marker: &str,
) -> Result<ContainerHandle> {
    let name = format!("sandbox-{}", uuid::Uuid::new_v4().simple());

    let host_config = bollard::models::HostConfig {
        memory: parse_memory_limit(&limits.memory_limit),
        cpu_quota: Some(limits.cpu_quota),
        cpu_period: Some(limits.cpu_period as u64),
        network_mode: limits.network_disabled.then(|| "none".to_string()),
        security_opt: Some(vec!["no-new-privileges".to_string()]),
        cap_drop: Some(vec!["ALL".to_string()]),
        ..Default::default()
    };

    let config = Config {
        image: Some(limits.image.clone()),
        cmd: Some(vec!["python".to_string(), "-u".to_string(), "/tmp/runner.py".to_string()]),
        working_dir: Some(limits.working_dir.clone()),
        open_stdin: Some(true),
        attach_stdin: Some(true),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        host_config: Some(host_config),
        ..Default::default()
    };

    let created = docker
        .create_container(Some(CreateContainerOptions { name: name.clone(), platform: None }), config)
        .await
        .map_err(|e| SandboxError::ContainerCreate(e.to_string()))?;

    let container_id = created.id;

    if let Err(e) = upload_runner_script(docker, &container_id, runner_script).await {
        let _ = docker.remove_container(&container_id, None).await;
        return Err(e);
    }

    let attach_options = AttachContainerOptions::<String> {
        stdin: Some(true),
        stdout: Some(true),
        stderr: Some(true),
        stream: Some(true),
        logs: Some(false),
        ..Default::default()
    };

    let attached = docker
        .attach_container(&container_id, Some(attach_options))
        .await
        .map_err(|e| SandboxError::ContainerCreate(format!("failed to attach before start: {e}")))?;

    docker
        .start_container::<String>(&container_id, None)
        .await
        .map_err(|e| SandboxError::ContainerCreate(format!("failed to start container: {e}")))?;

    let mut handle = ContainerHandle {
        container_id,
        docker: docker.clone(),
        input: attached.input,
        output: attached.output.boxed(),
        buffer: String::new(),
    };

    handle.wait_for_ready(ready_marker, Duration::from_secs(10)).await?;

    Ok(handle)
}

async fn upload_runner_script(docker: &Docker, container_id: &str, script: &str) -> Result<()> {
    let mut archive_builder = tar::Builder::new(Vec::new());
    let bytes = script.as_bytes();

    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();

    archive_builder
        .append_data(&mut header, "runner.py", bytes)
        .map_err(|e| SandboxError::ContainerCreate(format!("failed to build runner archive: {e}")))?;

    let archive = archive_builder
        .into_inner()
        .map_err(|e| SandboxError::ContainerCreate(format!("failed to finalize runner archive: {e}")))?;

    docker
        .upload_to_container(
            container_id,
            Some(UploadToContainerOptions { path: "/tmp".to_string(), ..Default::default() }),
            archive.into(),
        )
        .await
        .map_err(|e| SandboxError::ContainerCreate(format!("failed to upload runner script: {e}")))
}

fn parse_memory_limit(limit: &str) -> Option<i64> {
    let lower = limit.to_ascii_lowercase();
    let (digits, multiplier) = if let Some(stripped) = lower.strip_suffix('g') {
        (stripped, 1024 * 1024 * 1024)
    } else if let Some(stripped) = lower.strip_suffix('m') {
        (stripped, 1024 * 1024)
    } else if let Some(stripped) = lower.strip_suffix('k') {
        (stripped, 1024)
    } else {
        (lower.as_str(), 1)
    };

    digits.trim().parse::<i64>().ok().map(|n| n * multiplier)
}

impl ContainerHandle {
    /// Writes a line-delimited payload to the container's stdin.
    pub async fn send(&mut self, data: &str) -> Result<()> {
        self.input
            .write_all(data.as_bytes())
            .await
            .map_err(|e| SandboxError::Ipc(format!("failed to write to container stdin: {e}")))?;
        self.input.flush().await.map_err(|e| SandboxError::Ipc(format!("failed to flush container stdin: {e}")))
    }

    pub async fn send_code(&mut self, code: &str) -> Result<()> {
        self.send(&format!("{}\n{code}\n{}\n", protocol::PTC_CODE_START, protocol::PTC_CODE_END)).await
    }

    pub async fn send_tool_result(&mut self, call_id: &str, result: Option<serde_json::Value>, error: Option<String>) -> Result<()> {
        let payload = ToolResultPayload { call_id: call_id.to_string(), result, error };
        let json = serde_json::to_string(&payload).map_err(|e| SandboxError::Ipc(e.to_string()))?;
        self.send(&format!("{}{json}{}\n", protocol::PTC_TOOL_RESULT_START, protocol::PTC_TOOL_RESULT_END)).await
    }

    pub async fn send_standalone_command(&mut self, kind: &str, input: serde_json::Value) -> Result<()> {
        let command = protocol::StandaloneCommand { kind: kind.to_string(), input };
        let json = serde_json::to_string(&command).map_err(|e| SandboxError::Ipc(e.to_string()))?;
        self.send(&format!("{}{json}{}\n", protocol::STANDALONE_COMMAND_START, protocol::STANDALONE_COMMAND_END)).await
    }

    pub async fn close(mut self) {
        let _ = self.send(&format!("{}\n", protocol::EXIT_SESSION)).await;
        let _ = self.docker.stop_container(&self.container_id, None).await;
        let _ = self.docker.remove_container(&self.container_id, None).await;
    }

    /// Reads the next available chunk off the attached stream, with a
    /// wall-clock `timeout`. Returns `None` on timeout (not EOF).
    pub async fn read_chunk(&mut self, timeout: Duration) -> Result<Option<String>> {
        match tokio::time::timeout(timeout, self.output.next()).await {
            Ok(Some(Ok(log))) => Ok(Some(log_output_to_string(log))),
            Ok(Some(Err(e))) => Err(SandboxError::Ipc(format!("attach stream error: {e}"))),
            Ok(None) => Err(SandboxError::Ipc("container stream closed unexpectedly".to_string())),
            Err(_) => Ok(None),
        }
    }

    /// Reads chunks until a full line is assembled, an overall `timeout`
    /// elapses, or the stream is exhausted.
    pub async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(pos) = self.buffer.find('\n') {
                let line = self.buffer[..pos].to_string();
                self.buffer.drain(..=pos);
                return Ok(Some(line));
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match self.read_chunk(remaining.min(Duration::from_millis(500))).await? {
                Some(chunk) => self.buffer.push_str(&chunk),
                None => continue,
            }
        }
    }

    async fn wait_for_ready(&mut self, marker: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(SandboxError::ContainerCreate("container failed to become ready".to_string()));
            }

            if let Some(line) = self.read_line(remaining).await? {
                if line.contains(marker) {
                    return Ok(());
                }
            }
        }
    }
}

fn log_output_to_string(log: LogOutput) -> String {
    match log {
        LogOutput::StdOut { message } | LogOutput::StdErr { message } | LogOutput::Console { message } => {
            String::from_utf8_lossy(&message).into_owned()
        }
        LogOutput::StdIn { message } => String::from_utf8_lossy(&message).into_owned(),
    }
}
