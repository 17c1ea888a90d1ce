use serde_json::Value;

use super::{InputMessageStructuredContent, ResponseContent};

/// Converts a response content block into the structurally-identical
/// request content block, so it can be replayed as conversation history in
/// a later request. Both enums share the same `type`-tagged wire shape;
/// fields present on one side and absent on the other (e.g. `cache_control`
/// on tool uses) default to `None` on the way back in.
pub fn response_content_to_input_content(content: &ResponseContent) -> InputMessageStructuredContent {
    let value = serde_json::to_value(content).unwrap_or(Value::Null);
    serde_json::from_value(value).unwrap_or(InputMessageStructuredContent::Unknown(Value::Null))
}

/// Converts an entire response content array into request-side blocks,
/// dropping nothing and preserving order.
pub fn response_content_vec_to_input_content(content: &[ResponseContent]) -> Vec<InputMessageStructuredContent> {
    content.iter().map(response_content_to_input_content).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::anthropic::messages::ResponseTextBlock;

    #[test]
    fn round_trips_text_block() {
        let block = ResponseContent::Text(ResponseTextBlock {
            text: "hello".to_string(),
            citations: None,
            unknown_fields: Default::default(),
        });

        match response_content_to_input_content(&block) {
            InputMessageStructuredContent::Text(text) => assert_eq!(text.text, "hello"),
            other => panic!("unexpected conversion: {other:?}"),
        }
    }
}
