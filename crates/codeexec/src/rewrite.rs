//! Rewrites an inbound standalone request into the request actually sent
//! upstream: the `code_execution` sentinel is replaced by a
//! `bash_code_execution(command, restart?)` tool, and the local-only beta
//! header is never forwarded (Bedrock doesn't know about it).
//!
//! Grounded on `original_source/app/services/standalone_code_execution_service.py`'s
//! `_build_bash_tool`/`prepare_bedrock_request`.

use llm::protocol::anthropic::messages::{Request, Tool, ToolKind};
use serde_json::json;

/// Builds the request forwarded to Bedrock: `bash_code_execution` in place
/// of the `code_execution` sentinel, every other tool carried through
/// unchanged.
pub fn prepare_bedrock_request(request: &Request) -> Request {
    let mut tools = vec![build_bash_tool()];

    for tool in request.tools.iter().flatten() {
        if matches!(&tool.kind, Some(ToolKind::CodeExecution20250825 | ToolKind::BashCodeExecution20250124)) {
            continue;
        }
        tools.push(tool.clone());
    }

    Request { tools: Some(tools), ..request.clone() }
}

/// The tool definition that replaces `code_execution` in the request Claude
/// actually sees. The text-editor counterpart from the same beta is
/// intentionally not offered: it requires a Files API this proxy does not
/// implement.
pub fn build_bash_tool() -> Tool {
    Tool {
        name: "bash_code_execution".to_string(),
        description: Some(
            "Run a bash command in a sandboxed workspace and return its stdout, stderr, and exit code. \
             Pass restart=true to start the command in a fresh shell."
                .to_string(),
        ),
        kind: None,
        input_schema: Box::new(json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute inside the sandbox workspace"
                },
                "restart": {
                    "type": "boolean",
                    "description": "Start a fresh shell before running the command"
                }
            },
            "required": ["command"]
        })),
        allowed_callers: None,
        cache_control: None,
        unknown_fields: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn code_execution_tool() -> Tool {
        serde_json::from_value(json!({"name": "code_execution", "type": "code_execution_20250825"})).unwrap()
    }

    #[test]
    fn replaces_sentinel_with_bash_tool() {
        let request: Request = serde_json::from_value(json!({
            "model": "claude-opus-4-5-20251101",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [code_execution_tool()],
        }))
        .unwrap();

        let rewritten = prepare_bedrock_request(&request);
        let tools = rewritten.tools.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "bash_code_execution");
    }

    #[test]
    fn keeps_unrelated_tools() {
        let request: Request = serde_json::from_value(json!({
            "model": "claude-opus-4-5-20251101",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [code_execution_tool(), {
                "name": "lookup",
                "description": "looks things up",
                "input_schema": {"type": "object", "properties": {}},
            }],
        }))
        .unwrap();

        let rewritten = prepare_bedrock_request(&request);
        let tools = rewritten.tools.unwrap();
        assert!(tools.iter().any(|t| t.name == "lookup"));
    }
}
