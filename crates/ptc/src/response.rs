//! Builds the `MessageResponse`s the proxy hands back to the client at each
//! pause point of a PTC round trip: a `tool_use` block (plus, on the very
//! first pause, the `server_tool_use` that stands in for the whole
//! `execute_code` call) when sandbox code needs something only the client can
//! provide, or the model's own response once execution is done.
//!
//! Grounded on `original_source/app/services/ptc_service.py`'s
//! `_build_tool_use_response[_minimal]`, `_build_batch_tool_use_response[_minimal]`,
//! and `_add_direct_caller_to_tool_use`.

use llm::protocol::anthropic::messages::{CallerDescriptor, MessageResponse, ResponseContent, ResponseServerToolUseBlock, ResponseToolUseBlock, StopReason, Usage};
use sandbox::protocol::{BatchToolCallRequest, ToolCallRequest};
use serde_json::json;

use crate::detect::PTC_ALLOWED_CALLER;
use crate::ids;

/// `server_tool_use` block standing in for the whole `execute_code` call,
/// included the first time a round of code execution pauses on a tool call.
fn server_tool_use_block(code_execution_tool_id: &str, code: &str) -> ResponseContent {
    ResponseContent::ServerToolUse(ResponseServerToolUseBlock {
        id: code_execution_tool_id.to_string(),
        input: json!({ "code": code }),
        name: "code_execution".to_string(),
        unknown_fields: Default::default(),
    })
}

fn tool_use_block(call: &ToolCallRequest, code_execution_tool_id: &str) -> ResponseContent {
    ResponseContent::ToolUse(ResponseToolUseBlock {
        id: ids::tool_use_id_for_call(&call.call_id),
        input: call.arguments.clone(),
        name: call.tool_name.clone(),
        caller: Some(CallerDescriptor::CodeExecution {
            r#type: PTC_ALLOWED_CALLER.to_string(),
            tool_id: code_execution_tool_id.to_string(),
        }),
        unknown_fields: Default::default(),
    })
}

fn leading_text_blocks(original_response: &MessageResponse) -> Vec<ResponseContent> {
    original_response.content.iter().filter(|block| matches!(block, ResponseContent::Text(_))).cloned().collect()
}

/// Response for the first pause of a round of code execution: the model's
/// own leading text, the `server_tool_use` covering the whole `execute_code`
/// call, and the pending tool call.
pub fn build_tool_use_response(call: &ToolCallRequest, code_execution_tool_id: &str, original_response: &MessageResponse, code: &str) -> MessageResponse {
    let mut content = leading_text_blocks(original_response);
    content.push(server_tool_use_block(code_execution_tool_id, code));
    content.push(tool_use_block(call, code_execution_tool_id));

    MessageResponse {
        content,
        stop_reason: Some(StopReason::ToolUse),
        stop_sequence: None,
        container: None,
        ..original_response.clone()
    }
}

/// Response for the first pause of a round of code execution that issued
/// several tool calls concurrently (`asyncio.gather`).
pub fn build_batch_tool_use_response(batch: &BatchToolCallRequest, code_execution_tool_id: &str, original_response: &MessageResponse, code: &str) -> MessageResponse {
    let mut content = leading_text_blocks(original_response);
    content.push(server_tool_use_block(code_execution_tool_id, code));
    content.extend(batch.requests.iter().map(|call| tool_use_block(call, code_execution_tool_id)));

    MessageResponse {
        content,
        stop_reason: Some(StopReason::ToolUse),
        stop_sequence: None,
        container: None,
        ..original_response.clone()
    }
}

/// Response for a later pause within the same round of code execution.
/// `server_tool_use` was already sent on the first pause, so a continuation
/// only carries the new `tool_use` block(s).
pub fn build_tool_use_response_minimal(call: &ToolCallRequest, code_execution_tool_id: &str, model: &str) -> MessageResponse {
    let content = vec![tool_use_block(call, code_execution_tool_id)];
    minimal_response(content, model)
}

/// Batch counterpart of [`build_tool_use_response_minimal`].
pub fn build_batch_tool_use_response_minimal(batch: &BatchToolCallRequest, code_execution_tool_id: &str, model: &str) -> MessageResponse {
    let content = batch.requests.iter().map(|call| tool_use_block(call, code_execution_tool_id)).collect();
    minimal_response(content, model)
}

fn minimal_response(content: Vec<ResponseContent>, model: &str) -> MessageResponse {
    let mut response = MessageResponse::new(ids::new_message_id(), model.to_string(), content, Usage::new(0, 0));
    response.stop_reason = Some(StopReason::ToolUse);
    response
}

/// Stamps `caller: {"type": "direct"}` onto any `tool_use` block the model
/// produced itself, so every `tool_use` block in a PTC-enabled response
/// carries a caller once PTC is active — sandbox-originated blocks already
/// carry one from [`tool_use_block`].
pub fn add_direct_caller_to_tool_use(mut response: MessageResponse) -> MessageResponse {
    for block in &mut response.content {
        if let ResponseContent::ToolUse(tool_use) = block {
            if tool_use.caller.is_none() {
                tool_use.caller = Some(CallerDescriptor::direct());
            }
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::protocol::anthropic::messages::{ResponseTextBlock, Role};
    use serde_json::json;

    fn base_response() -> MessageResponse {
        let mut response =
            MessageResponse::new("msg_1".to_string(), "claude-opus-4-5-20251101".to_string(), vec![], Usage::new(10, 5));
        response.role = Role::Assistant;
        response
    }

    #[test]
    fn tool_use_response_carries_leading_text_and_server_tool_use() {
        let mut original = base_response();
        original.content =
            vec![ResponseContent::Text(ResponseTextBlock { text: "thinking...".to_string(), citations: None, unknown_fields: Default::default() })];

        let call = ToolCallRequest { call_id: "call_abc123def456".to_string(), tool_name: "query".to_string(), arguments: json!({"region": "east"}) };

        let response = build_tool_use_response(&call, "srvtoolu_xyz", &original, "print(1)");

        assert_eq!(response.content.len(), 3);
        assert!(matches!(response.content[0], ResponseContent::Text(_)));
        assert!(matches!(response.content[1], ResponseContent::ServerToolUse(_)));
        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(response.usage.input_tokens, 10);
    }

    #[test]
    fn minimal_batch_response_has_no_server_tool_use() {
        let batch = BatchToolCallRequest {
            requests: vec![
                ToolCallRequest { call_id: "c1".to_string(), tool_name: "a".to_string(), arguments: json!({}) },
                ToolCallRequest { call_id: "c2".to_string(), tool_name: "b".to_string(), arguments: json!({}) },
            ],
        };

        let response = build_batch_tool_use_response_minimal(&batch, "srvtoolu_xyz", "claude-opus-4-5-20251101");

        assert_eq!(response.content.len(), 2);
        assert!(response.content.iter().all(|b| matches!(b, ResponseContent::ToolUse(_))));
    }

    #[test]
    fn direct_caller_added_only_when_missing() {
        let mut response = base_response();
        response.content = vec![ResponseContent::ToolUse(ResponseToolUseBlock {
            id: "toolu_1".to_string(),
            input: json!({}),
            name: "lookup".to_string(),
            caller: None,
            unknown_fields: Default::default(),
        })];

        let response = add_direct_caller_to_tool_use(response);
        let ResponseContent::ToolUse(tool_use) = &response.content[0] else { unreachable!() };
        assert!(tool_use.caller.as_ref().unwrap().is_direct());
    }
}
