//! Drives a single `bash_code_execution` command to completion inside a
//! standalone session's container.
//!
//! Unlike PTC's `execute_code` (which can pause mid-run on a tool call), a
//! standalone command runs to completion in one round trip: send it, then
//! read lines until the result marker appears. Grounded on
//! `original_source/app/services/ptc/standalone_sandbox.py`'s
//! `StandaloneSandboxExecutor.execute_bash`.

use std::time::Duration;

use sandbox::SessionHandle;
use sandbox::protocol::{BashExecutionResult, STANDALONE_RESULT_END, STANDALONE_RESULT_START};
use tokio::time::Instant;

use crate::error::{CodeExecError, Result};

/// Sends `command` to the session's runner and waits for its result, up to
/// `timeout`. `restart` asks the runner to start a fresh shell first (the
/// runner script itself is stateless per command, so this is currently a
/// no-op flag forwarded for API compatibility).
pub async fn run_bash(
    session: &SessionHandle,
    command: &str,
    restart: bool,
    timeout: Duration,
) -> Result<BashExecutionResult> {
    session
        .send_standalone_command("bash_code_execution", serde_json::json!({"command": command, "restart": restart}))
        .await?;

    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CodeExecError::Sandbox(sandbox::SandboxError::Timeout(timeout.as_secs_f64())));
        }

        let Some(line) = session.read_line(remaining.min(Duration::from_millis(500))).await? else {
            continue;
        };

        if let Some(payload) = extract(&line, STANDALONE_RESULT_START, STANDALONE_RESULT_END) {
            return serde_json::from_str::<BashExecutionResult>(&payload)
                .map_err(|e| CodeExecError::Sandbox(sandbox::SandboxError::Ipc(format!("malformed bash result: {e}"))));
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
        let line = format!("{STANDALONE_RESULT_START}{{\"return_code\":0}}{STANDALONE_RESULT_END}");
        assert_eq!(extract(&line, STANDALONE_RESULT_START, STANDALONE_RESULT_END), Some("{\"return_code\":0}".to_string()));
    }
}
