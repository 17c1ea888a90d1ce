//! Orchestrates a standalone code-execution round trip: detects and
//! rewrites the inbound request, runs the agentic bash loop against a
//! single sandbox session, and accumulates the whole trace into one
//! response. Unlike Programmatic Tool Calling, nothing here ever suspends
//! across an HTTP request boundary — the loop runs to a terminal
//! `stop_reason` or `max_iterations` before returning.
//!
//! Grounded on
//! `original_source/app/services/standalone_code_execution_service.py`'s
//! `StandaloneCodeExecutionService.handle_request`/`_run_agent_loop`.

use std::sync::Arc;
use std::time::Duration;

use llm::BedrockClient;
use llm::protocol::anthropic::messages::{
    Container, InputMessage, InputMessageContent, InputMessageStructuredContent, MessageResponse, RequestToolResultBlock, Request,
    ResponseContent, ResponseServerToolUseBlock, Role, Usage, response_content_vec_to_input_content,
};
use sandbox::{RunnerKind, SessionHandle, SessionLimits, SessionStore};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::bash;
use crate::error::{CodeExecError, Result};
use crate::rewrite;

/// Name of the rewritten tool a standalone agent loop actually drives.
const BASH_TOOL_NAME: &str = "bash_code_execution";

/// A completed standalone round, together with the container identity to
/// surface on the HTTP response.
pub struct CodeExecOutcome {
    pub response: MessageResponse,
    pub container: Container,
}

/// Standalone server-side code-execution orchestrator (C9). One instance
/// per process; holds its own sandbox session store, separate from PTC's.
pub struct CodeExecService {
    sessions: Arc<SessionStore>,
    bash_timeout: Duration,
    max_iterations: u32,
    workspace_dir: String,
    max_file_size_bytes: u64,
}

impl CodeExecService {
    pub fn new(standalone_config: &config::StandaloneConfig) -> Self {
        let limits = SessionLimits {
            image: standalone_config.sandbox_image.clone(),
            memory_limit: standalone_config.memory_limit.clone(),
            cpu_quota: standalone_config.cpu_quota,
            cpu_period: standalone_config.cpu_period,
            network_disabled: standalone_config.network_disabled,
            session_timeout_seconds: standalone_config.session_timeout_seconds,
        };

        Self {
            sessions: SessionStore::new(RunnerKind::Standalone, limits),
            bash_timeout: Duration::from_secs(standalone_config.bash_timeout_seconds),
            max_iterations: standalone_config.max_iterations,
            workspace_dir: standalone_config.workspace_dir.clone(),
            max_file_size_bytes: standalone_config.max_file_size_bytes,
        }
    }

    /// Shared handle to the session store, for wiring up the reaper task and
    /// the `/ready` health check.
    pub fn session_store(&self) -> Arc<SessionStore> {
        self.sessions.clone()
    }

    pub async fn is_docker_available(&self) -> bool {
        self.sessions.docker_available().await
    }

    /// Closes every live sandbox session. Called from the SIGTERM/SIGINT
    /// shutdown path.
    pub async fn shutdown(&self) {
        self.sessions.close_all().await;
    }

    /// Entry point for a standalone code-execution request. Runs the full
    /// agent loop and returns the accumulated trace in one response.
    pub async fn handle_request(
        &self,
        request: Request,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
        container_id: Option<String>,
    ) -> Result<CodeExecOutcome> {
        if !self.is_docker_available().await {
            return Err(CodeExecError::DockerUnavailable("docker daemon is not reachable".to_string()));
        }

        let session = self.get_or_create_session(container_id.as_deref()).await?;
        let session = self.acquire(session).await?;

        let result = self.run_agent_loop(request, &session, bedrock, resolved_model_id).await;
        self.sessions.release(&session.id).await;

        let (content, usage, stop_reason, model) = result?;

        let mut response = MessageResponse::new(new_message_id(), model, content, usage);
        response.stop_reason = Some(stop_reason);
        Ok(self.finish(session.id.clone(), response).await)
    }

    async fn get_or_create_session(&self, container_id: Option<&str>) -> Result<SessionHandle> {
        if let Some(id) = container_id
            && let Some(session) = self.sessions.get(id).await
        {
            return Ok(session);
        }

        self.create_session().await
    }

    async fn create_session(&self) -> Result<SessionHandle> {
        let runner_script = sandbox::runner::standalone_runner_script(&self.workspace_dir, self.bash_timeout.as_secs(), self.max_file_size_bytes);
        Ok(self.sessions.create(Vec::new(), runner_script).await?)
    }

    /// Acquires exclusive use of `session` for this loop. A session left
    /// busy by an abandoned earlier call is replaced with a fresh one rather
    /// than surfaced as an error, matching PTC's inconsistent-session rule.
    async fn acquire(&self, session: SessionHandle) -> Result<SessionHandle> {
        if self.sessions.acquire(&session.id).await.is_some() {
            return Ok(session);
        }

        log::warn!(
            target: "codeexec::service",
            "session {} is busy for a new standalone request; replacing with a fresh session",
            session.id
        );
        self.sessions.close(&session.id).await;

        let fresh = self.create_session().await?;
        self.sessions.acquire(&fresh.id).await.ok_or_else(|| sandbox::SandboxError::Ipc("session unavailable immediately after creation".to_string()))?;
        Ok(fresh)
    }

    async fn finish(&self, session_id: String, response: MessageResponse) -> CodeExecOutcome {
        let expires_at = self.sessions.expires_at(&session_id).await.map(sandbox::format_expires_at).unwrap_or_default();
        CodeExecOutcome { response, container: Container { id: session_id, expires_at } }
    }

    /// Drives the agentic loop: call upstream, execute every `bash_code_execution`
    /// tool use, extend history, repeat while `stop_reason == tool_use`, up to
    /// `max_iterations`. Returns the accumulated trace, total usage, the
    /// terminal stop reason, and the model name to report.
    async fn run_agent_loop(
        &self,
        request: Request,
        session: &SessionHandle,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
    ) -> Result<(Vec<ResponseContent>, Usage, llm::protocol::anthropic::messages::StopReason, String)> {
        use llm::protocol::anthropic::messages::StopReason;

        let bedrock_request = rewrite::prepare_bedrock_request(&request);
        let mut history = bedrock_request.messages.clone();

        let mut accumulated = Vec::new();
        let mut usage = Usage::new(0, 0);
        let mut iterations = 0u32;

        loop {
            iterations += 1;

            let mut turn_request = bedrock_request.clone();
            turn_request.messages = history.clone();

            let claude_response = bedrock.invoke(&turn_request, resolved_model_id).await?;
            usage.accumulate(&claude_response.usage);

            let has_bash_calls = claude_response
                .content
                .iter()
                .any(|block| matches!(block, ResponseContent::ToolUse(tool_use) if tool_use.name == BASH_TOOL_NAME));

            if !has_bash_calls || iterations > self.max_iterations {
                accumulated.extend(claude_response.content.iter().cloned());
                return Ok((accumulated, usage, claude_response.stop_reason.unwrap_or(StopReason::EndTurn), claude_response.model));
            }

            let mut tool_results = Vec::new();
            for block in claude_response.content.iter() {
                let call = match block {
                    ResponseContent::ToolUse(tool_use) if tool_use.name == BASH_TOOL_NAME => tool_use,
                    other => {
                        accumulated.push(other.clone());
                        continue;
                    }
                };

                let command = call.input.get("command").and_then(Value::as_str).unwrap_or_default();
                let restart = call.input.get("restart").and_then(Value::as_bool).unwrap_or(false);

                let execution = bash::run_bash(session, command, restart, self.bash_timeout).await;

                let (server_tool_use, tool_result_block, tool_result_content, is_error) = match execution {
                    Ok(result) => {
                        let server_tool_use = ResponseServerToolUseBlock {
                            id: call.id.clone(),
                            input: call.input.clone(),
                            name: BASH_TOOL_NAME.to_string(),
                            unknown_fields: Default::default(),
                        };
                        let content = json!({
                            "stdout": result.stdout,
                            "stderr": result.stderr,
                            "return_code": result.return_code,
                        });
                        let tool_result_block = ResponseContent::BashCodeExecutionToolResult(
                            llm::protocol::anthropic::messages::ResponseBashCodeExecutionToolResultBlock {
                                content: content.clone(),
                                tool_use_id: call.id.clone(),
                                unknown_fields: Default::default(),
                            },
                        );
                        (server_tool_use, tool_result_block, content, result.return_code != 0)
                    }
                    Err(error) => {
                        let server_tool_use = ResponseServerToolUseBlock {
                            id: call.id.clone(),
                            input: call.input.clone(),
                            name: BASH_TOOL_NAME.to_string(),
                            unknown_fields: Default::default(),
                        };
                        let content = json!({"stdout": "", "stderr": error.to_string(), "return_code": 1});
                        let tool_result_block = ResponseContent::BashCodeExecutionToolResult(
                            llm::protocol::anthropic::messages::ResponseBashCodeExecutionToolResultBlock {
                                content: content.clone(),
                                tool_use_id: call.id.clone(),
                                unknown_fields: Default::default(),
                            },
                        );
                        (server_tool_use, tool_result_block, content, true)
                    }
                };

                accumulated.push(ResponseContent::ServerToolUse(server_tool_use));
                accumulated.push(tool_result_block);

                tool_results.push(RequestToolResultBlock {
                    tool_use_id: call.id.clone(),
                    content: Some(tool_result_content),
                    is_error: Some(is_error),
                    cache_control: None,
                    unknown_fields: Default::default(),
                });
            }

            let assistant = InputMessage {
                role: Role::Assistant,
                content: InputMessageContent::Items(response_content_vec_to_input_content(&claude_response.content)),
                unknown_fields: Default::default(),
            };
            let user = InputMessage {
                role: Role::User,
                content: InputMessageContent::Items(tool_results.into_iter().map(InputMessageStructuredContent::ToolResult).collect()),
                unknown_fields: Default::default(),
            };

            history.push(assistant);
            history.push(user);
        }
    }
}

fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}
