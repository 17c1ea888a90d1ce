//! Rewrites an inbound PTC request into the request actually sent upstream:
//! the `code_execution` sentinel is replaced by a regular `execute_code` tool
//! Claude can call like any other, direct-callable tools are forwarded with
//! their `allowed_callers` hint stripped (Bedrock doesn't understand it), and
//! a system-prompt fragment documenting the sandbox and the callable tools
//! is appended.
//!
//! Grounded on `original_source/app/services/ptc_service.py`'s
//! `_build_execute_code_tool`/`prepare_bedrock_request`/`_build_ptc_system_prompt`.

use llm::protocol::anthropic::messages::{CallerTag, Request, RequestTextBlock, SystemInputMessage, SystemPrompt, Tool, ToolKind};
use serde_json::{Value, json};

use crate::detect;

/// Builds the request forwarded to Bedrock: `execute_code` in place of the
/// `code_execution` sentinel, direct tools with `allowed_callers` stripped,
/// everything else carried through unchanged.
pub fn prepare_bedrock_request(request: &Request, ptc_callable_tools: &[Tool]) -> Request {
    let mut tools = vec![build_execute_code_tool(ptc_callable_tools)];

    for tool in request.tools.iter().flatten() {
        if matches!(&tool.kind, Some(ToolKind::CodeExecution20250825)) {
            continue;
        }

        let is_direct_callable = match &tool.allowed_callers {
            Some(callers) => callers.iter().any(|caller| matches!(caller, CallerTag::Direct)),
            None => true,
        };

        if !is_direct_callable {
            continue;
        }

        tools.push(Tool { allowed_callers: None, ..tool.clone() });
    }

    let system = append_ptc_system_prompt(request.system.clone(), &build_ptc_system_prompt(ptc_callable_tools));

    Request { tools: Some(tools), system, ..request.clone() }
}

fn append_ptc_system_prompt(existing: Option<SystemPrompt>, ptc_prompt: &str) -> Option<SystemPrompt> {
    Some(match existing {
        None => SystemPrompt::Text(ptc_prompt.to_string()),
        Some(SystemPrompt::Text(text)) => SystemPrompt::Text(format!("{text}\n\n{ptc_prompt}")),
        Some(SystemPrompt::Blocks(mut blocks)) => {
            blocks.push(SystemInputMessage::Text(RequestTextBlock {
                text: ptc_prompt.to_string(),
                cache_control: None,
                citations: None,
                unknown_fields: Default::default(),
            }));
            SystemPrompt::Blocks(blocks)
        }
    })
}

/// The tool definition that replaces `code_execution` in the request Claude
/// actually sees: a single `execute_code(code: string)` tool, documented with
/// whichever sandbox-callable tools are available this turn.
pub fn build_execute_code_tool(ptc_callable_tools: &[Tool]) -> Tool {
    let tools_doc = tool_docs(ptc_callable_tools, |tool| {
        format!("- {}: {}\n  Parameters: {}", tool.name, tool.description.as_deref().unwrap_or(""), tool.input_schema)
    });

    let description = format!(
        r#"Execute Python code in a sandboxed environment.

The code can call the following async tool functions:
{tools_doc}

Important:
- All tool calls must use `await`, e.g., `result = await query_database(sql="SELECT * FROM users")`
- Use `print()` to output results you want to see
- Code runs in an isolated environment without network access
- Only the print output will be returned

Performance optimization - PARALLEL EXECUTION:
When you need to call the same tool multiple times with different parameters (e.g., fetching data for multiple items), ALWAYS use asyncio.gather for parallel execution instead of sequential loops:

BAD (slow, sequential):
```python
results = []
for item_id in item_ids:
    result = await get_item(id=item_id)
    results.append(result)
```

GOOD (fast, parallel):
```python
import asyncio
tasks = [get_item(id=item_id) for item_id in item_ids]
results = await asyncio.gather(*tasks)
```

This significantly improves performance by executing multiple tool calls concurrently."#
    );

    Tool {
        name: "execute_code".to_string(),
        description: Some(description),
        kind: None,
        input_schema: Box::new(json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python code to execute. Use await for tool calls. Use asyncio.gather for parallel tool calls."
                }
            },
            "required": ["code"]
        })),
        allowed_callers: None,
        cache_control: None,
        unknown_fields: Default::default(),
    }
}

/// System-prompt addition teaching Claude the stateless, single-block-preferred
/// execution model and documenting the tools callable from sandbox code.
pub fn build_ptc_system_prompt(ptc_callable_tools: &[Tool]) -> String {
    let tools_doc = tool_docs(ptc_callable_tools, |tool| {
        let params = schema_param_summary(&tool.input_schema);
        format!("- `{}({params})`: {}", tool.name, tool.description.as_deref().unwrap_or(""))
    });

    format!(
        r#"## Code Execution Environment

You have access to the `execute_code` tool which runs Python code in a sandboxed environment. Within your code, you can call the following async tool functions:

{tools_doc}

## Usage

When you need to execute multi-step tasks, use the `execute_code` tool to write Python code.

### Key Rules:
1. All tool calls must use `await`, for example: `result = await query_sales(region="East")`
2. Use `print()` to output results - this is the only way for you to get execution results
3. You can perform data processing, filtering, aggregation, and conditional logic in your code
4. After code execution completes, you will see the content output by print

## CRITICAL: Stateless Execution Environment

**IMPORTANT: Each `execute_code` call runs in a FRESH, ISOLATED environment.**

- Variables, data, and state from previous code executions DO NOT persist
- Each code block starts with a completely clean slate
- You CANNOT reference variables defined in previous `execute_code` calls

## Best Practices

- Complete as much of the task as possible in a single code block — re-fetch
  data rather than assume it survived from a previous call
- Use `asyncio.gather` for parallel tool calls instead of sequential loops
- Use `json.loads()` to parse tool return values
- Use `print()` to output everything you need to see

## Docker Sandbox Features
- Secure, isolated execution environment
- Each execution starts fresh with no state from previous executions
- Network disabled for security
- Resource limits enforced (memory, CPU)
- Timeout protection"#
    )
}

fn tool_docs(tools: &[Tool], format_one: impl Fn(&Tool) -> String) -> String {
    if tools.is_empty() {
        return "No tools available".to_string();
    }

    tools.iter().map(format_one).collect::<Vec<_>>().join("\n")
}

fn schema_param_summary(schema: &Value) -> String {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return String::new();
    };

    properties
        .iter()
        .map(|(name, value)| format!("{name}: {}", value.get("type").and_then(Value::as_str).unwrap_or("any")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Re-exported for callers that only need the detection predicate alongside
/// the rewrite helpers.
pub use detect::{PTC_ALLOWED_CALLER, PTC_BETA_HEADER, is_ptc_request, ptc_callable_tools};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, allowed_callers: Option<Vec<&str>>) -> Tool {
        let mut value = json!({
            "name": name,
            "description": "does things",
            "input_schema": {"type": "object", "properties": {"x": {"type": "integer"}}},
        });
        if let Some(callers) = allowed_callers {
            value["allowed_callers"] = json!(callers);
        }
        serde_json::from_value(value).unwrap()
    }

    fn code_execution_tool() -> Tool {
        serde_json::from_value(json!({"name": "code_execution", "type": "code_execution_20250825"})).unwrap()
    }

    #[test]
    fn replaces_sentinel_with_execute_code() {
        let request: Request = serde_json::from_value(json!({
            "model": "claude-opus-4-5-20251101",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [code_execution_tool(), tool("lookup", Some(vec!["direct", "code_execution_20250825"]))],
        }))
        .unwrap();

        let callable = ptc_callable_tools(&request);
        let rewritten = prepare_bedrock_request(&request, &callable);

        let tools = rewritten.tools.unwrap();
        assert_eq!(tools[0].name, "execute_code");
        assert!(tools[0].description.as_ref().unwrap().contains("asyncio.gather"));
        assert!(tools.iter().any(|t| t.name == "lookup" && t.allowed_callers.is_none()));
    }

    #[test]
    fn drops_sandbox_only_tools_from_bedrock_request() {
        let request: Request = serde_json::from_value(json!({
            "model": "claude-opus-4-5-20251101",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [code_execution_tool(), tool("sandbox_only", Some(vec!["code_execution_20250825"]))],
        }))
        .unwrap();

        let callable = ptc_callable_tools(&request);
        let rewritten = prepare_bedrock_request(&request, &callable);

        assert!(!rewritten.tools.unwrap().iter().any(|t| t.name == "sandbox_only"));
    }

    #[test]
    fn appends_system_prompt_to_string_system() {
        let request: Request = serde_json::from_value(json!({
            "model": "claude-opus-4-5-20251101",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "hi"}],
            "system": "Be nice.",
        }))
        .unwrap();

        let rewritten = prepare_bedrock_request(&request, &[]);
        match rewritten.system {
            Some(SystemPrompt::Text(text)) => {
                assert!(text.starts_with("Be nice."));
                assert!(text.contains("Code Execution Environment"));
            }
            other => panic!("expected text system prompt, got {other:?}"),
        }
    }
}
