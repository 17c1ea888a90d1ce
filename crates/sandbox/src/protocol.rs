//! IPC line-protocol constants and payload shapes shared between the host
//! process and the runner script executing inside a sandbox container.
//!
//! Grounded on `original_source/app/services/ptc/sandbox.py` (PTC markers,
//! `RUNNER_SCRIPT_VERSION`) and `.../ptc/standalone_sandbox.py` (standalone
//! markers, `STANDALONE_RUNNER_VERSION`) — two distinct protocols that happen
//! to share a transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current PTC runner protocol version. Sessions whose container reports a
/// different version are treated as incompatible and recycled.
pub const PTC_RUNNER_VERSION: u32 = 3;

/// Current standalone runner protocol version.
pub const STANDALONE_RUNNER_VERSION: u32 = 1;

pub const PTC_TOOL_CALL_START: &str = "__PTC_TOOL_CALL__";
pub const PTC_TOOL_CALL_END: &str = "__PTC_END_CALL__";
pub const PTC_TOOL_RESULT_START: &str = "__PTC_TOOL_RESULT__";
pub const PTC_TOOL_RESULT_END: &str = "__PTC_END_RESULT__";
pub const PTC_OUTPUT_START: &str = "__PTC_OUTPUT__";
pub const PTC_OUTPUT_END: &str = "__PTC_END_OUTPUT__";
pub const PTC_CODE_START: &str = "__CODE_START__";
pub const PTC_CODE_END: &str = "__CODE_END__";
pub const PTC_READY: &str = "__READY__";

pub const STANDALONE_COMMAND_START: &str = "__STANDALONE_CMD__";
pub const STANDALONE_COMMAND_END: &str = "__STANDALONE_END_CMD__";
pub const STANDALONE_RESULT_START: &str = "__STANDALONE_RESULT__";
pub const STANDALONE_RESULT_END: &str = "__STANDALONE_END_RESULT__";
pub const STANDALONE_READY: &str = "__STANDALONE_READY__";

/// Sent to either runner to end the session cleanly.
pub const EXIT_SESSION: &str = "__EXIT_SESSION__";

/// A tool call emitted by PTC sandbox code, paused until the caller supplies
/// [`ToolCallResult`].
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// One or more [`ToolCallRequest`]s collected within the batch window —
/// the runner emits several calls in a row when sandbox code ran them
/// concurrently.
#[derive(Debug, Clone)]
pub struct BatchToolCallRequest {
    pub requests: Vec<ToolCallRequest>,
}

/// What `execute_code` produced once the runner stops emitting tool calls.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(rename = "output", default)]
    pub stdout: String,
    #[serde(rename = "error", default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub tool_calls_count: u32,
    #[serde(default)]
    pub execution_time_ms: f64,
}

/// A single standalone command dispatched to the bash/text-editor runner.
#[derive(Debug, Clone, Serialize)]
pub struct StandaloneCommand {
    #[serde(rename = "type")]
    pub kind: String,
    pub input: Value,
}

/// Result of a `bash_code_execution` command, as emitted by the standalone
/// runner script's `execute_bash`.
#[derive(Debug, Clone, Deserialize)]
pub struct BashExecutionResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub return_code: i32,
}

/// Wire payload injected back into PTC sandbox code for a completed tool call.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ToolResultPayload {
    pub call_id: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}
