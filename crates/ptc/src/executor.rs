//! Drives a single `execute_code` invocation to completion, pausing whenever
//! sandbox code calls out to a tool and resuming once the caller supplies a
//! result.
//!
//! The reference implementation is an async generator: `execute_code()` is a
//! coroutine that `yield`s a `ToolCallRequest`/`BatchToolCallRequest` and
//! resumes via `asend()` once a result is available, or returns a terminal
//! `ExecutionResult`. Rust has no stable generator syntax, so this is
//! expressed as an explicit state machine instead: [`Executor::start`] and
//! [`Executor::resume`] each read from the container until the next pause or
//! completion point and return a [`StepOutcome`], mirroring one `yield`/
//! `return` of the Python generator. Nothing about the container's own
//! protocol changes; this only changes how the host drives it.
//!
//! Grounded on `original_source/app/services/ptc/sandbox.py`'s
//! `PTCSandboxExecutor.execute_code`/`_inject_tool_result`/`inject_tool_error`.

use std::time::Duration;

use sandbox::SessionHandle;
use sandbox::protocol::{
    BatchToolCallRequest, ExecutionResult, PTC_OUTPUT_END, PTC_OUTPUT_START, PTC_TOOL_CALL_END, PTC_TOOL_CALL_START,
    ToolCallRequest,
};
use serde_json::Value;
use tokio::time::Instant;

use crate::error::{PtcError, Result};

/// What a step of code execution produced.
#[derive(Debug)]
pub enum StepOutcome {
    /// Sandbox code is waiting on a single tool call.
    ToolCall(ToolCallRequest),
    /// Sandbox code issued several tool calls concurrently (an
    /// `asyncio.gather`) and is waiting on all of their results together.
    Batch(BatchToolCallRequest),
    /// `execute_code` returned; the sandbox is idle again.
    Done(ExecutionResult),
}

/// Drives one `execute_code` call against a session's container.
pub struct Executor {
    session: SessionHandle,
    batch_window: Duration,
    timeout: Duration,
}

impl Executor {
    pub fn new(session: SessionHandle, batch_window: Duration, timeout: Duration) -> Self {
        Self { session, batch_window, timeout }
    }

    /// Sends `code` to the sandbox and waits for the first pause or result.
    pub async fn start(&self, code: &str) -> Result<StepOutcome> {
        self.session.send_code(code).await?;
        self.next().await
    }

    /// Supplies the result for one pending call and resumes execution. Used
    /// for both a single pending call and one call out of a batch — the
    /// sandbox side only unblocks once every call in the batch has a result.
    pub async fn resume_one(&self, call_id: &str, result: Option<Value>, error: Option<String>) -> Result<StepOutcome> {
        self.resume(&[(call_id.to_string(), result, error)]).await
    }

    /// Supplies results for every pending call in a batch at once and
    /// resumes execution.
    pub async fn resume(&self, results: &[(String, Option<Value>, Option<String>)]) -> Result<StepOutcome> {
        for (call_id, result, error) in results {
            self.session.send_tool_result(call_id, result.clone(), error.clone()).await?;
        }
        self.next().await
    }

    /// Reads from the container until sandbox code pauses on tool call(s) or
    /// `execute_code` completes.
    async fn next(&self) -> Result<StepOutcome> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PtcError::Sandbox(sandbox::SandboxError::Timeout(self.timeout.as_secs_f64())));
            }

            let Some(line) = self.session.read_line(remaining.min(Duration::from_millis(500))).await? else {
                continue;
            };

            if let Some(payload) = extract(&line, PTC_TOOL_CALL_START, PTC_TOOL_CALL_END) {
                let Ok(call) = serde_json::from_str::<ToolCallRequest>(&payload) else {
                    log::warn!(target: "ptc::executor", "dropping malformed tool call line: {line}");
                    continue;
                };

                let mut pending = vec![call];
                return Ok(match self.collect_batch(&mut pending).await? {
                    Some(early_result) => {
                        log::warn!(
                            target: "ptc::executor",
                            "execute_code produced output while {} call(s) were still pending; treating as complete",
                            pending.len()
                        );
                        StepOutcome::Done(early_result)
                    }
                    None if pending.len() == 1 => StepOutcome::ToolCall(pending.into_iter().next().unwrap()),
                    None => StepOutcome::Batch(BatchToolCallRequest { requests: pending }),
                });
            }

            if let Some(payload) = extract(&line, PTC_OUTPUT_START, PTC_OUTPUT_END) {
                let result = serde_json::from_str::<ExecutionResult>(&payload)
                    .map_err(|e| PtcError::Sandbox(sandbox::SandboxError::Ipc(format!("malformed execution result: {e}"))))?;
                return Ok(StepOutcome::Done(result));
            }
        }
    }

    /// Collects additional tool calls that arrive within the batching
    /// window, so sandbox code that ran several tool calls via
    /// `asyncio.gather` is resumed with all of them at once rather than one
    /// round trip per call. Returns `Some` if a final-output line arrived
    /// during the window instead.
    async fn collect_batch(&self, pending: &mut Vec<ToolCallRequest>) -> Result<Option<ExecutionResult>> {
        let window_deadline = Instant::now() + self.batch_window;

        loop {
            let remaining = window_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let Some(line) = self.session.read_line(remaining.min(Duration::from_millis(50))).await? else {
                continue;
            };

            if let Some(payload) = extract(&line, PTC_TOOL_CALL_START, PTC_TOOL_CALL_END) {
                if let Ok(call) = serde_json::from_str::<ToolCallRequest>(&payload) {
                    pending.push(call);
                }
                continue;
            }

            if let Some(payload) = extract(&line, PTC_OUTPUT_START, PTC_OUTPUT_END) {
                let result = serde_json::from_str::<ExecutionResult>(&payload)
                    .map_err(|e| PtcError::Sandbox(sandbox::SandboxError::Ipc(format!("malformed execution result: {e}"))))?;
                return Ok(Some(result));
            }
        }
    }
}

fn extract(line: &str, start: &str, end: &str) -> Option<String> {
    let start_idx = line.find(start)? + start.len();
    let end_idx = line[start_idx..].find(end)? + start_idx;
    Some(line[start_idx..end_idx].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_marker_payload() {
        let line = format!("{PTC_TOOL_CALL_START}{{\"call_id\":\"c1\"}}{PTC_TOOL_CALL_END}");
        assert_eq!(extract(&line, PTC_TOOL_CALL_START, PTC_TOOL_CALL_END), Some("{\"call_id\":\"c1\"}".to_string()));
    }

    #[test]
    fn extract_returns_none_without_markers() {
        assert_eq!(extract("plain stdout line", PTC_TOOL_CALL_START, PTC_TOOL_CALL_END), None);
    }
}
