//! Orchestrates a Programmatic Tool Calling round trip end to end: detects
//! and rewrites the inbound request, drives sandbox code through the
//! executor's pause/resume state machine, and replays completed rounds back
//! into conversation history before asking Claude to continue.
//!
//! Grounded on `original_source/app/services/ptc_service.py`'s
//! `PTCService.handle_ptc_request`/`_handle_code_execution`/
//! `_complete_code_execution`/`handle_tool_result_continuation`/
//! `resume_execution`/`_finalize_code_execution`.

use std::sync::Arc;
use std::time::Duration;

use llm::BedrockClient;
use llm::protocol::anthropic::messages::{
    Container, InputMessage, InputMessageContent, InputMessageStructuredContent, MessageResponse, RequestToolResultBlock,
    RequestToolUseBlock, Request, ResponseContent, ResponseToolUseBlock, Role, Tool, response_content_vec_to_input_content,
};
use sandbox::protocol::ExecutionResult;
use sandbox::{PendingExecution, RunnerKind, SessionHandle, SessionLimits, SessionStore};
use serde_json::{Value, json};

use crate::detect;
use crate::error::{PtcError, Result};
use crate::executor::{Executor, StepOutcome};
use crate::history_filter;
use crate::ids;
use crate::response;
use crate::rewrite;

/// A completed or paused PTC round, together with the container identity to
/// surface on the HTTP response.
pub struct PtcOutcome {
    pub response: MessageResponse,
    pub container: Container,
}

/// Incoming answer to one pending sandbox tool call, as extracted from a
/// client's `tool_result` content block: the `tool_use_id` the client is
/// answering, the result payload (absent on error), and whether it errored.
pub struct ToolResultAnswer {
    pub tool_use_id: String,
    pub content: Option<Value>,
    pub is_error: bool,
}

/// Programmatic Tool Calling orchestrator (C8). One instance per process;
/// holds the sandbox session store and the tuning knobs that govern how a
/// round of `execute_code` is driven.
pub struct PtcService {
    sessions: Arc<SessionStore>,
    batch_window: Duration,
    execution_timeout: Duration,
}

impl PtcService {
    pub fn new(ptc_config: &config::PtcConfig) -> Self {
        let limits = SessionLimits {
            image: ptc_config.sandbox_image.clone(),
            memory_limit: ptc_config.memory_limit.clone(),
            cpu_quota: ptc_config.cpu_quota,
            cpu_period: ptc_config.cpu_period,
            network_disabled: ptc_config.network_disabled,
            session_timeout_seconds: ptc_config.session_timeout_seconds,
        };

        Self {
            sessions: SessionStore::new(RunnerKind::Ptc, limits),
            batch_window: Duration::from_millis(ptc_config.tool_call_batch_window_ms),
            execution_timeout: Duration::from_secs(ptc_config.execution_timeout_seconds),
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

    /// Entry point for a fresh (non-continuation) PTC request.
    pub async fn handle_request(
        &self,
        request: Request,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
        container_id: Option<String>,
    ) -> Result<PtcOutcome> {
        if !self.is_docker_available().await {
            return Err(PtcError::DockerUnavailable("docker daemon is not reachable".to_string()));
        }

        let ptc_tools = detect::ptc_callable_tools(&request);
        let session = self.get_or_create_session(container_id.as_deref(), &ptc_tools).await?;
        let bedrock_request = rewrite::prepare_bedrock_request(&request, &ptc_tools);

        let claude_response = bedrock.invoke(&bedrock_request, resolved_model_id).await?;

        self.drive(claude_response, session, request, ptc_tools, bedrock, resolved_model_id).await
    }

    /// Entry point for a request carrying `tool_result`s answering a
    /// previously suspended `execute_code` call.
    pub async fn handle_tool_result_continuation(
        &self,
        session_id: &str,
        answers: Vec<ToolResultAnswer>,
        original_request: Request,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
    ) -> Result<PtcOutcome> {
        let pending =
            self.sessions.take_pending(session_id).await.ok_or_else(|| PtcError::NoPendingExecution(session_id.to_string()))?;
        let session = self.sessions.get(session_id).await.ok_or_else(|| PtcError::SessionNotFound(session_id.to_string()))?;

        let ordered = match_pending_answers(&pending, answers, session_id)?;
        let ptc_tools = detect::ptc_callable_tools(&original_request);

        let executor = Executor::new(session.clone(), self.batch_window, self.execution_timeout);
        let outcome = match executor.resume(&ordered).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.sessions.release(session_id).await;
                return Err(error);
            }
        };

        match outcome {
            StepOutcome::ToolCall(call) => {
                self.sessions
                    .set_pending(
                        session_id,
                        PendingExecution {
                            server_tool_use_id: pending.server_tool_use_id.clone(),
                            code: pending.code.clone(),
                            pending_call_ids: vec![call.call_id.clone()],
                            tool_calls_count: pending.tool_calls_count + 1,
                        },
                    )
                    .await;
                let response = response::build_tool_use_response_minimal(&call, &pending.server_tool_use_id, &original_request.model);
                Ok(self.finish(session_id.to_string(), response).await)
            }
            StepOutcome::Batch(batch) => {
                self.sessions
                    .set_pending(
                        session_id,
                        PendingExecution {
                            server_tool_use_id: pending.server_tool_use_id.clone(),
                            code: pending.code.clone(),
                            pending_call_ids: batch.requests.iter().map(|call| call.call_id.clone()).collect(),
                            tool_calls_count: pending.tool_calls_count + batch.requests.len() as u32,
                        },
                    )
                    .await;
                let response =
                    response::build_batch_tool_use_response_minimal(&batch, &pending.server_tool_use_id, &original_request.model);
                Ok(self.finish(session_id.to_string(), response).await)
            }
            StepOutcome::Done(result) => {
                self.sessions.release(session_id).await;
                self.finalize_code_execution(
                    result,
                    &pending.server_tool_use_id,
                    &pending.code,
                    session,
                    original_request,
                    ptc_tools,
                    bedrock,
                    resolved_model_id,
                )
                .await
            }
        }
    }

    async fn get_or_create_session(&self, container_id: Option<&str>, ptc_tools: &[Tool]) -> Result<SessionHandle> {
        if let Some(id) = container_id {
            if let Some(session) = self.sessions.get(id).await {
                return Ok(session);
            }
        }

        self.create_session(ptc_tools).await
    }

    async fn create_session(&self, ptc_tools: &[Tool]) -> Result<SessionHandle> {
        let tools: Vec<Value> = ptc_tools.iter().map(tool_definition).collect();
        let runner_script = sandbox::runner::ptc_runner_script(&tools, true);
        Ok(self.sessions.create(tools, runner_script).await?)
    }

    /// Acquires a session for a new `execute_code` invocation. A session left
    /// busy or mid-pending from an earlier, abandoned round is never
    /// surfaced as an error: it is closed and silently replaced with a fresh
    /// one (see §7's "inconsistent session" rule).
    async fn acquire_for_execution(&self, session: SessionHandle, ptc_tools: &[Tool]) -> Result<SessionHandle> {
        if let Some(acquired) = self.sessions.acquire(&session.id).await {
            return Ok(acquired);
        }

        log::warn!(
            target: "ptc::service",
            "session {} is busy or mid-pending for a new execute_code call; replacing with a fresh session",
            session.id
        );
        self.sessions.close(&session.id).await;

        let fresh = self.create_session(ptc_tools).await?;
        self.sessions.acquire(&fresh.id).await.ok_or_else(|| PtcError::SessionNotFound(fresh.id.clone()))
    }

    async fn finish(&self, session_id: String, response: MessageResponse) -> PtcOutcome {
        let expires_at = self.sessions.expires_at(&session_id).await.map(sandbox::format_expires_at).unwrap_or_default();
        PtcOutcome { response, container: Container { id: session_id, expires_at } }
    }

    /// Looks for an `execute_code` call in a freshly-received Bedrock
    /// response and either drives it or finishes the round.
    async fn drive(
        &self,
        claude_response: MessageResponse,
        session: SessionHandle,
        original_request: Request,
        ptc_tools: Vec<Tool>,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
    ) -> Result<PtcOutcome> {
        let Some(call) = find_execute_code_call(&claude_response) else {
            return Ok(self.finish(session.id.clone(), response::add_direct_caller_to_tool_use(claude_response)).await);
        };

        let code = code_argument(call);
        self.handle_code_execution(code, claude_response, session, original_request, ptc_tools, bedrock, resolved_model_id).await
    }

    /// Starts a brand-new round of `execute_code` against `code` and drives
    /// it to its first pause or its terminal result.
    async fn handle_code_execution(
        &self,
        code: String,
        claude_response: MessageResponse,
        session: SessionHandle,
        original_request: Request,
        ptc_tools: Vec<Tool>,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
    ) -> Result<PtcOutcome> {
        let code_execution_tool_id = ids::new_code_execution_tool_id();
        let session = self.acquire_for_execution(session, &ptc_tools).await?;

        let executor = Executor::new(session.clone(), self.batch_window, self.execution_timeout);
        let outcome = match executor.start(&code).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.sessions.release(&session.id).await;
                return Err(error);
            }
        };

        match outcome {
            StepOutcome::ToolCall(call) => {
                self.sessions
                    .set_pending(
                        &session.id,
                        PendingExecution {
                            server_tool_use_id: code_execution_tool_id.clone(),
                            code: code.clone(),
                            pending_call_ids: vec![call.call_id.clone()],
                            tool_calls_count: 1,
                        },
                    )
                    .await;
                let response = response::build_tool_use_response(&call, &code_execution_tool_id, &claude_response, &code);
                Ok(self.finish(session.id.clone(), response).await)
            }
            StepOutcome::Batch(batch) => {
                self.sessions
                    .set_pending(
                        &session.id,
                        PendingExecution {
                            server_tool_use_id: code_execution_tool_id.clone(),
                            code: code.clone(),
                            pending_call_ids: batch.requests.iter().map(|call| call.call_id.clone()).collect(),
                            tool_calls_count: batch.requests.len() as u32,
                        },
                    )
                    .await;
                let response = response::build_batch_tool_use_response(&batch, &code_execution_tool_id, &claude_response, &code);
                Ok(self.finish(session.id.clone(), response).await)
            }
            StepOutcome::Done(result) => {
                self.sessions.release(&session.id).await;
                self.complete_code_execution(result, &claude_response, session, original_request, ptc_tools, bedrock, resolved_model_id)
                    .await
            }
        }
    }

    /// Finishes a round of `execute_code` whose originating `tool_use` block
    /// is still in hand (the response was just produced by this same call),
    /// replaying the model's actual content into history.
    async fn complete_code_execution(
        &self,
        result: ExecutionResult,
        claude_response: &MessageResponse,
        session: SessionHandle,
        original_request: Request,
        ptc_tools: Vec<Tool>,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
    ) -> Result<PtcOutcome> {
        let execute_call =
            find_execute_code_call(claude_response).ok_or_else(|| PtcError::NoPendingExecution(session.id.clone()))?;

        let tool_result_content = tool_result_content_value(&result);
        let is_error = !result.success;

        let filtered = history_filter::filter_non_direct_tool_calls(original_request.messages.clone());
        let assistant = assistant_message_from_response(claude_response);
        let user = tool_result_message(&execute_call.id, tool_result_content, is_error);

        self.continue_conversation(filtered, assistant, user, &original_request, &ptc_tools, session, bedrock, resolved_model_id).await
    }

    /// Finishes a round of `execute_code` that was suspended across an HTTP
    /// call boundary: the original `claude_response` is long gone, so a
    /// minimal synthetic `execute_code` tool_use stands in for it in history.
    async fn finalize_code_execution(
        &self,
        result: ExecutionResult,
        code_execution_tool_id: &str,
        code: &str,
        session: SessionHandle,
        original_request: Request,
        ptc_tools: Vec<Tool>,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
    ) -> Result<PtcOutcome> {
        let tool_result_content = tool_result_content_value(&result);
        let is_error = !result.success;

        let filtered = history_filter::filter_non_direct_tool_calls(original_request.messages.clone());
        let synthetic_id = ids::execute_code_tool_use_id(code_execution_tool_id);
        let assistant = synthetic_execute_code_message(&synthetic_id, code);
        let user = tool_result_message(&synthetic_id, tool_result_content, is_error);

        self.continue_conversation(filtered, assistant, user, &original_request, &ptc_tools, session, bedrock, resolved_model_id).await
    }

    /// Appends the completed round's assistant/`tool_result` pair to history,
    /// calls Bedrock again, and either starts another round of
    /// `execute_code` or returns the model's final answer.
    async fn continue_conversation(
        &self,
        mut history: Vec<InputMessage>,
        assistant: InputMessage,
        user: InputMessage,
        original_request: &Request,
        ptc_tools: &[Tool],
        session: SessionHandle,
        bedrock: &BedrockClient,
        resolved_model_id: &str,
    ) -> Result<PtcOutcome> {
        history.push(assistant);
        history.push(user);

        let mut continuation_request = rewrite::prepare_bedrock_request(original_request, ptc_tools);
        continuation_request.messages = history;

        let claude_response = bedrock.invoke(&continuation_request, resolved_model_id).await?;

        let Some(call) = find_execute_code_call(&claude_response) else {
            return Ok(self.finish(session.id.clone(), response::add_direct_caller_to_tool_use(claude_response)).await);
        };

        let code = code_argument(call);
        let mut next_original = original_request.clone();
        next_original.messages = continuation_request.messages;

        self.handle_code_execution(code, claude_response, session, next_original, ptc_tools.to_vec(), bedrock, resolved_model_id).await
    }
}

fn find_execute_code_call(response: &MessageResponse) -> Option<&ResponseToolUseBlock> {
    response.content.iter().find_map(|block| match block {
        ResponseContent::ToolUse(tool_use) if tool_use.name == "execute_code" => Some(tool_use),
        _ => None,
    })
}

fn code_argument(call: &ResponseToolUseBlock) -> String {
    call.input.get("code").and_then(Value::as_str).unwrap_or_default().to_string()
}

fn tool_definition(tool: &Tool) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn tool_result_content_value(result: &ExecutionResult) -> Value {
    if result.success {
        Value::String(result.stdout.clone())
    } else {
        Value::String(format!("Error: {}", result.stderr.clone().unwrap_or_default()))
    }
}

fn assistant_message_from_response(response: &MessageResponse) -> InputMessage {
    InputMessage {
        role: Role::Assistant,
        content: InputMessageContent::Items(response_content_vec_to_input_content(&response.content)),
        unknown_fields: Default::default(),
    }
}

fn synthetic_execute_code_message(tool_use_id: &str, code: &str) -> InputMessage {
    InputMessage {
        role: Role::Assistant,
        content: InputMessageContent::Items(vec![InputMessageStructuredContent::ToolUse(RequestToolUseBlock {
            id: tool_use_id.to_string(),
            input: json!({ "code": code }),
            name: "execute_code".to_string(),
            caller: None,
            cache_control: None,
            unknown_fields: Default::default(),
        })]),
        unknown_fields: Default::default(),
    }
}

fn tool_result_message(tool_use_id: &str, content: Value, is_error: bool) -> InputMessage {
    InputMessage {
        role: Role::User,
        content: InputMessageContent::Items(vec![InputMessageStructuredContent::ToolResult(RequestToolResultBlock {
            tool_use_id: tool_use_id.to_string(),
            content: Some(content),
            is_error: Some(is_error),
            cache_control: None,
            unknown_fields: Default::default(),
        })]),
        unknown_fields: Default::default(),
    }
}

/// Reads the trailing `tool_result` blocks off a request's last message, as
/// answers to a previously suspended sandbox round. Returns `None` when the
/// last message isn't a `User` turn made entirely of `tool_result` blocks —
/// the caller's signal that this is a fresh request rather than a
/// continuation of a paused `execute_code` call.
pub fn extract_tool_result_answers(request: &Request) -> Option<Vec<ToolResultAnswer>> {
    let last = request.messages.last()?;
    if last.role != Role::User {
        return None;
    }

    let InputMessageContent::Items(items) = &last.content else {
        return None;
    };

    if items.is_empty() || !items.iter().all(|item| matches!(item, InputMessageStructuredContent::ToolResult(_))) {
        return None;
    }

    Some(
        items
            .iter()
            .filter_map(|item| match item {
                InputMessageStructuredContent::ToolResult(result) => Some(ToolResultAnswer {
                    tool_use_id: result.tool_use_id.clone(),
                    content: result.content.clone(),
                    is_error: result.is_error.unwrap_or(false),
                }),
                _ => None,
            })
            .collect(),
    )
}

/// Matches each pending sandbox call to the client's answer for it, keyed by
/// the deterministic `tool_use_id` derived from the call's own id (see
/// `ids::tool_use_id_for_call`), and converts an error answer into the
/// `(None, Some(message))` shape `Executor::resume` expects.
fn match_pending_answers(
    pending: &PendingExecution,
    answers: Vec<ToolResultAnswer>,
    session_id: &str,
) -> Result<Vec<(String, Option<Value>, Option<String>)>> {
    pending
        .pending_call_ids
        .iter()
        .map(|call_id| {
            let expected = ids::tool_use_id_for_call(call_id);
            let answer = answers
                .iter()
                .find(|answer| answer.tool_use_id == expected)
                .ok_or_else(|| PtcError::UnmatchedToolResult(session_id.to_string()))?;

            if answer.is_error {
                let message = answer.content.as_ref().map(stringify_tool_result).unwrap_or_default();
                Ok((call_id.clone(), None, Some(message)))
            } else {
                Ok((call_id.clone(), answer.content.clone(), None))
            }
        })
        .collect()
}

fn stringify_tool_result(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
