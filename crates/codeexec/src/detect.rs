//! Detects standalone (non-PTC) code-execution requests.
//!
//! Grounded on `original_source/app/services/standalone_code_execution_service.py`'s
//! `StandaloneCodeExecutionService.is_standalone_request`.

use llm::protocol::anthropic::messages::{Request, Tool, ToolKind};

/// Beta header value that opts a request into standalone code execution.
/// Local-only: Bedrock doesn't understand it, so the agent loop never
/// forwards it upstream; it is only ever inspected by [`is_standalone_request`].
pub const STANDALONE_BETA_HEADER: &str = "code-execution-2025-08-25";

/// Whether `request` is a standalone code-execution request: the feature is
/// enabled, the beta header is present, the request declares a
/// `code_execution_20250825` tool, and — the detail that distinguishes this
/// from Programmatic Tool Calling — no tool anywhere declares
/// `allowed_callers`.
pub fn is_standalone_request(request: &Request, beta_header: Option<&str>, enabled: bool) -> bool {
    if !enabled {
        return false;
    }

    if !beta_header.is_some_and(|header| header.contains(STANDALONE_BETA_HEADER)) {
        return false;
    }

    let Some(tools) = &request.tools else {
        return false;
    };

    if !tools.iter().any(is_code_execution_sentinel) {
        return false;
    }

    tools.iter().all(|tool| tool.allowed_callers.is_none())
}

fn is_code_execution_sentinel(tool: &Tool) -> bool {
    matches!(&tool.kind, Some(ToolKind::CodeExecution20250825))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_with_tools(tools: Vec<Tool>) -> Request {
        serde_json::from_value(json!({
            "model": "claude-opus-4-5-20251101",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": tools,
        }))
        .unwrap()
    }

    fn code_execution_tool() -> Tool {
        serde_json::from_value(json!({"name": "code_execution", "type": "code_execution_20250825"})).unwrap()
    }

    fn ptc_callable_tool(name: &str) -> Tool {
        serde_json::from_value(json!({
            "name": name,
            "description": "a tool",
            "input_schema": {"type": "object", "properties": {}},
            "allowed_callers": ["direct", "code_execution_20250825"],
        }))
        .unwrap()
    }

    #[test]
    fn detects_standalone_request() {
        let request = request_with_tools(vec![code_execution_tool()]);
        assert!(is_standalone_request(&request, Some(STANDALONE_BETA_HEADER), true));
        assert!(!is_standalone_request(&request, Some(STANDALONE_BETA_HEADER), false));
        assert!(!is_standalone_request(&request, None, true));
    }

    #[test]
    fn rejects_when_any_tool_has_allowed_callers() {
        let request = request_with_tools(vec![code_execution_tool(), ptc_callable_tool("query")]);
        assert!(!is_standalone_request(&request, Some(STANDALONE_BETA_HEADER), true));
    }

    #[test]
    fn requires_code_execution_tool() {
        let request: Request = serde_json::from_value(json!({
            "model": "claude-opus-4-5-20251101",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .unwrap();
        assert!(!is_standalone_request(&request, Some(STANDALONE_BETA_HEADER), true));
    }
}
