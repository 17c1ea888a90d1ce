//! Strips sandbox-originated tool calls out of conversation history before
//! it is replayed to Claude.
//!
//! PTC's `execute_code` tool and the `server_tool_use`/`tool_use`/`tool_result`
//! triples it produces are a local implementation detail: Claude only ever
//! sees `execute_code`'s final stdout, never the individual calls sandbox
//! code made on its behalf. Once a conversation has gone through a PTC round
//! trip, those blocks show up in `messages` history (reconstructed from the
//! client's own transcript) and must be dropped again on every subsequent
//! turn, or Claude would see unexplained tool calls it never made directly.
//!
//! Grounded on `original_source/app/services/ptc_service.py`'s
//! `_filter_non_direct_tool_calls`.

use std::collections::HashSet;

use llm::protocol::anthropic::messages::{InputMessage, InputMessageContent, InputMessageStructuredContent, Role};

/// Removes `server_tool_use` blocks and any `tool_use`/`tool_result` pair
/// whose caller is not `direct`, dropping messages that end up empty.
pub fn filter_non_direct_tool_calls(messages: Vec<InputMessage>) -> Vec<InputMessage> {
    let non_direct_ids = collect_non_direct_ids(&messages);

    if non_direct_ids.is_empty() {
        return messages;
    }

    messages
        .into_iter()
        .filter_map(|message| retain_message(message, &non_direct_ids))
        .collect()
}

fn collect_non_direct_ids(messages: &[InputMessage]) -> HashSet<String> {
    let mut ids = HashSet::new();

    for message in messages {
        if message.role != Role::Assistant {
            continue;
        }

        let InputMessageContent::Items(blocks) = &message.content else {
            continue;
        };

        for block in blocks {
            match block {
                InputMessageStructuredContent::ServerToolUse(block) => {
                    ids.insert(block.id.clone());
                }
                InputMessageStructuredContent::ToolUse(block) => {
                    let is_non_direct = block.caller.as_ref().is_some_and(|caller| !caller.is_direct());
                    if is_non_direct {
                        ids.insert(block.id.clone());
                    }
                }
                _ => {}
            }
        }
    }

    ids
}

fn retain_message(message: InputMessage, non_direct_ids: &HashSet<String>) -> Option<InputMessage> {
    let InputMessageContent::Items(blocks) = message.content else {
        // Plain-text content never carries tool blocks; keep as-is.
        return Some(message);
    };

    let filtered: Vec<_> = blocks
        .into_iter()
        .filter(|block| match block {
            InputMessageStructuredContent::ServerToolUse(_) => false,
            InputMessageStructuredContent::ToolUse(block) => !non_direct_ids.contains(&block.id),
            InputMessageStructuredContent::ToolResult(block) => !non_direct_ids.contains(&block.tool_use_id),
            _ => true,
        })
        .collect();

    if filtered.is_empty() {
        return None;
    }

    Some(InputMessage { content: InputMessageContent::Items(filtered), ..message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn messages_from(value: serde_json::Value) -> Vec<InputMessage> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn drops_server_tool_use_and_its_tool_result() {
        let messages = messages_from(json!([
            {
                "role": "assistant",
                "content": [
                    {"type": "server_tool_use", "id": "srvtoolu_1", "name": "code_execution", "input": {"code": "x"}},
                    {"type": "tool_use", "id": "toolu_1", "name": "query", "input": {}, "caller": {"type": "code_execution_20250825", "tool_id": "srvtoolu_1"}}
                ]
            },
            {
                "role": "user",
                "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "42"}
                ]
            }
        ]));

        let filtered = filter_non_direct_tool_calls(messages);
        assert!(filtered.is_empty());
    }

    #[test]
    fn keeps_direct_tool_calls() {
        let messages = messages_from(json!([
            {
                "role": "assistant",
                "content": [
                    {"type": "tool_use", "id": "toolu_2", "name": "lookup", "input": {}, "caller": {"type": "direct"}}
                ]
            },
            {
                "role": "user",
                "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_2", "content": "ok"}
                ]
            }
        ]));

        let filtered = filter_non_direct_tool_calls(messages);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn keeps_plain_text_messages_untouched() {
        let messages = messages_from(json!([{"role": "user", "content": "hello"}]));
        let filtered = filter_non_direct_tool_calls(messages);
        assert_eq!(filtered.len(), 1);
    }
}
