//! Detects Programmatic Tool Calling requests and splits a request's tool
//! list into the `code_execution` sentinel and the tools sandbox code is
//! allowed to call.
//!
//! Grounded on `original_source/app/services/ptc_service.py`'s
//! `PTCService.is_ptc_request`/`get_ptc_tools`.

use llm::protocol::anthropic::messages::{CallerTag, Request, Tool, ToolKind};

/// Beta header value that opts a request into Programmatic Tool Calling.
pub const PTC_BETA_HEADER: &str = "advanced-tool-use-2025-11-20";

/// `caller.type` tag carried by tool_use blocks the sandbox originated, and
/// the value sandbox-callable tools must list in `allowed_callers`.
pub const PTC_ALLOWED_CALLER: &str = "code_execution_20250825";

/// Whether `request` opts into PTC: the feature is enabled, the beta header
/// is present, and the request declares a `code_execution_20250825` tool.
pub fn is_ptc_request(request: &Request, beta_header: Option<&str>, enabled: bool) -> bool {
    if !enabled {
        return false;
    }

    if !beta_header.is_some_and(|header| header.contains(PTC_BETA_HEADER)) {
        return false;
    }

    let Some(tools) = &request.tools else {
        return false;
    };

    tools.iter().any(is_code_execution_sentinel)
}

fn is_code_execution_sentinel(tool: &Tool) -> bool {
    matches!(&tool.kind, Some(kind) if matches!(kind, ToolKind::CodeExecution20250825) || matches!(kind, ToolKind::Unknown(s) if s == PTC_ALLOWED_CALLER))
}

/// Splits `request.tools` into the sandbox-callable tools (those whose
/// `allowed_callers` lists PTC), discarding the `code_execution` sentinel and
/// any tool PTC code isn't allowed to call.
pub fn ptc_callable_tools(request: &Request) -> Vec<Tool> {
    request
        .tools
        .as_ref()
        .map(|tools| {
            tools
                .iter()
                .filter(|tool| !is_code_execution_sentinel(tool))
                .filter(|tool| is_ptc_callable(tool))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn is_ptc_callable(tool: &Tool) -> bool {
    match &tool.allowed_callers {
        Some(callers) => callers.iter().any(CallerTag::is_code_execution),
        // A tool without an explicit `allowed_callers` list defaults to
        // direct-only and is never sandbox-callable.
        None => false,
    }
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
        serde_json::from_value(json!({
            "name": "code_execution",
            "type": "code_execution_20250825",
        }))
        .unwrap()
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
    fn detects_ptc_request() {
        let request = request_with_tools(vec![code_execution_tool(), ptc_callable_tool("query")]);
        assert!(is_ptc_request(&request, Some(PTC_BETA_HEADER), true));
        assert!(!is_ptc_request(&request, Some(PTC_BETA_HEADER), false));
        assert!(!is_ptc_request(&request, None, true));
        assert!(!is_ptc_request(&request, Some("other-beta"), true));
    }

    #[test]
    fn requires_code_execution_tool() {
        let request = request_with_tools(vec![ptc_callable_tool("query")]);
        assert!(!is_ptc_request(&request, Some(PTC_BETA_HEADER), true));
    }

    #[test]
    fn splits_callable_tools() {
        let request = request_with_tools(vec![code_execution_tool(), ptc_callable_tool("query")]);
        let callable = ptc_callable_tools(&request);
        assert_eq!(callable.len(), 1);
        assert_eq!(callable[0].name, "query");
    }
}
