//! Translates a Bedrock `ConverseStream` event receiver into the Anthropic
//! Messages SSE vocabulary, including the synthetic `content_block_start`
//! injection the wire format requires but Converse never emits itself.
//!
//! Grounded on `original_source/app/services/bedrock_service.py`'s
//! `invoke_model_stream`, specifically its `seen_indices` bookkeeping and its
//! rule for picking `thinking` vs `text` as the synthesized block's kind.

use std::collections::HashSet;

use aws_sdk_bedrockruntime::types::{
    ContentBlockDelta, ContentBlockStart, ConverseStreamOutput as Event, ReasoningContentBlockDelta,
};
use futures::Stream;
use futures_util::stream;

use crate::{
    error::{LlmError, Result},
    protocol::anthropic::messages::{
        Delta, MessageDelta, ResponseContent, ResponseTextBlock, ResponseThinkingBlock, ResponseToolUseBlock,
        Role, StreamEvent, StreamMessageStart, StreamUsage,
    },
};

use super::translate::stop_reason_from_bedrock;

/// Per-stream state carried across events: which content block indices have
/// already had their opening event emitted, synthesized events awaiting
/// delivery, and whether the terminal `message_stop` has been queued.
#[derive(Default)]
struct StreamState {
    seen_indices: HashSet<u32>,
    pending: std::collections::VecDeque<StreamEvent>,
    done: bool,
}

/// Translates a raw Converse event receiver into Anthropic SSE events for a
/// message with the given id/model, framing `message_start` and
/// `message_stop` around whatever the receiver yields.
pub fn translate_stream(
    receiver: aws_sdk_bedrockruntime::event_receiver::EventReceiver<
        Event,
        aws_sdk_bedrockruntime::types::error::ConverseStreamOutputError,
    >,
    message_id: String,
    model_id: String,
) -> impl Stream<Item = Result<StreamEvent>> {
    let mut state = StreamState::default();
    state.pending.push_back(StreamEvent::MessageStart(Box::new(StreamMessageStart {
        id: message_id,
        role: Role::Assistant,
        content: Vec::new(),
        model: model_id,
        usage: StreamUsage {
            input_tokens: None,
            output_tokens: None,
            cache_creation: None,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
            server_tool_use: None,
            service_tier: None,
            unknown_fields: Default::default(),
        },
        stop_reason: None,
        stop_sequence: None,
        context_management: None,
        container: None,
        unknown_fields: Default::default(),
    })));

    stream::unfold((receiver, state), move |(mut receiver, mut state)| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), (receiver, state)));
            }

            if state.done {
                return None;
            }

            match receiver.recv().await {
                Ok(Some(event)) => translate_event(event, &mut state),
                Ok(None) => {
                    state.pending.push_back(StreamEvent::MessageStop);
                    state.done = true;
                }
                Err(error) => {
                    log::warn!(target: "llm::bedrock", "stream error: {error}");
                    state.done = true;
                    return Some((Err(LlmError::Api(error.to_string())), (receiver, state)));
                }
            }
        }
    })
}

fn translate_event(event: Event, state: &mut StreamState) {
    match event {
        Event::ContentBlockStart(start) => {
            let index = start.content_block_index() as u32;

            if let Some(ContentBlockStart::ToolUse(tool_use)) = start.start() {
                state.pending.push_back(StreamEvent::ContentBlockStart {
                    index,
                    content_block: ResponseContent::ToolUse(ResponseToolUseBlock {
                        id: tool_use.tool_use_id().to_string(),
                        name: tool_use.name().to_string(),
                        input: serde_json::json!({}),
                        caller: Some(crate::protocol::anthropic::messages::CallerDescriptor::direct()),
                        unknown_fields: Default::default(),
                    }),
                });
                state.seen_indices.insert(index);
            }
        }
        Event::ContentBlockDelta(delta_event) => {
            let index = delta_event.content_block_index() as u32;
            let is_reasoning = matches!(delta_event.delta(), Some(ContentBlockDelta::ReasoningContent(_)));

            if state.seen_indices.insert(index) {
                let synthetic_block = if is_reasoning {
                    ResponseContent::Thinking(ResponseThinkingBlock { thinking: String::new(), signature: String::new(), unknown_fields: Default::default() })
                } else {
                    ResponseContent::Text(ResponseTextBlock { text: String::new(), citations: None, unknown_fields: Default::default() })
                };
                state.pending.push_back(StreamEvent::ContentBlockStart { index, content_block: synthetic_block });
            }

            let delta_value = match delta_event.delta() {
                Some(ContentBlockDelta::Text(text)) => serde_json::json!({"type": "text_delta", "text": text}),
                Some(ContentBlockDelta::ToolUse(tool_use_delta)) => {
                    serde_json::json!({"type": "input_json_delta", "partial_json": tool_use_delta.input()})
                }
                Some(ContentBlockDelta::ReasoningContent(ReasoningContentBlockDelta::Text(text))) => {
                    serde_json::json!({"type": "thinking_delta", "thinking": text})
                }
                Some(ContentBlockDelta::ReasoningContent(ReasoningContentBlockDelta::Signature(sig))) => {
                    serde_json::json!({"type": "signature_delta", "signature": sig})
                }
                _ => serde_json::json!({}),
            };

            state.pending.push_back(StreamEvent::ContentBlockDelta { index, delta: delta_value });
        }
        Event::ContentBlockStop(stop) => {
            state.pending.push_back(StreamEvent::ContentBlockStop { index: stop.content_block_index() as u32 });
        }
        Event::MessageStop(stop) => {
            state.pending.push_back(StreamEvent::MessageDelta(Box::new(MessageDelta {
                delta: Delta { stop_reason: Some(stop_reason_from_bedrock(stop.stop_reason())), stop_sequence: None, unknown_fields: Default::default() },
                usage: None,
                unknown_fields: Default::default(),
            })));
        }
        Event::Metadata(metadata) => {
            let usage = metadata.usage().map(|usage| StreamUsage {
                input_tokens: Some(usage.input_tokens as u32),
                output_tokens: Some(usage.output_tokens as u32),
                cache_creation: None,
                cache_creation_input_tokens: usage.cache_write_input_tokens.map(|n| n as u32),
                cache_read_input_tokens: usage.cache_read_input_tokens.map(|n| n as u32),
                server_tool_use: None,
                service_tier: None,
                unknown_fields: Default::default(),
            });

            state.pending.push_back(StreamEvent::MessageDelta(Box::new(MessageDelta {
                delta: Delta { stop_reason: None, stop_sequence: None, unknown_fields: Default::default() },
                usage,
                unknown_fields: Default::default(),
            })));
        }
        Event::MessageStart(_) => {}
        other => {
            log::debug!(target: "llm::bedrock", "unhandled stream event: {other:?}");
        }
    }
}

/// Frames a single event as an SSE wire frame: `event: <type>\ndata:
/// <json>\n\n`. Callers must flush after every frame — nothing here batches.
pub fn encode_sse_frame(event: &StreamEvent) -> Result<String> {
    let json = serde_json::to_value(event).map_err(|e| LlmError::Internal(format!("failed to encode stream event: {e}")))?;

    let event_type = json
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("message_stop")
        .to_string();

    let data = serde_json::to_string(&json).map_err(|e| LlmError::Internal(format!("failed to encode stream event: {e}")))?;

    Ok(format!("event: {event_type}\ndata: {data}\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// §8 "Start-before-delta": a synthetic `content_block_start` must be
    /// queued before the first delta for any index the receiver never
    /// explicitly announced, picking `thinking` when the delta that
    /// triggered it carried reasoning content and `text` otherwise.
    #[test]
    fn synthesizes_thinking_start_before_first_reasoning_delta() {
        let mut state = StreamState::default();

        let delta = ContentBlockDelta::ReasoningContent(ReasoningContentBlockDelta::Text("Let me ".to_string()));
        let event = Event::ContentBlockDelta(
            aws_sdk_bedrockruntime::types::ContentBlockDeltaEvent::builder()
                .content_block_index(0)
                .delta(delta)
                .build()
                .unwrap(),
        );

        translate_event(event, &mut state);

        assert_eq!(state.pending.len(), 2);
        match &state.pending[0] {
            StreamEvent::ContentBlockStart { index: 0, content_block: ResponseContent::Thinking(block) } => {
                assert_eq!(block.thinking, "");
            }
            other => panic!("expected synthesized thinking content_block_start, got {other:?}"),
        }
        assert!(matches!(&state.pending[1], StreamEvent::ContentBlockDelta { index: 0, .. }));
    }

    #[test]
    fn synthesizes_text_start_before_first_text_delta() {
        let mut state = StreamState::default();

        let delta = ContentBlockDelta::Text("hi".to_string());
        let event = Event::ContentBlockDelta(
            aws_sdk_bedrockruntime::types::ContentBlockDeltaEvent::builder()
                .content_block_index(0)
                .delta(delta)
                .build()
                .unwrap(),
        );

        translate_event(event, &mut state);

        assert!(matches!(&state.pending[0], StreamEvent::ContentBlockStart { index: 0, content_block: ResponseContent::Text(_) }));
    }

    #[test]
    fn does_not_resynthesize_start_for_an_already_seen_index() {
        let mut state = StreamState::default();
        state.seen_indices.insert(0);

        let delta = ContentBlockDelta::Text("more".to_string());
        let event = Event::ContentBlockDelta(
            aws_sdk_bedrockruntime::types::ContentBlockDeltaEvent::builder()
                .content_block_index(0)
                .delta(delta)
                .build()
                .unwrap(),
        );

        translate_event(event, &mut state);

        assert_eq!(state.pending.len(), 1);
        assert!(matches!(&state.pending[0], StreamEvent::ContentBlockDelta { index: 0, .. }));
    }

    #[test]
    fn sse_frame_is_framed_with_event_name_and_json_data() {
        let frame = encode_sse_frame(&StreamEvent::MessageStop).unwrap();
        assert_eq!(frame, "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
    }
}
