//! Bidirectional translation between the Anthropic Messages wire schema and
//! AWS Bedrock's Converse API types.
//!
//! Grounded on the teacher's direct Bedrock provider (`provider/bedrock/{input,output}.rs`)
//! but rebuilt against the Anthropic schema directly instead of bridging through
//! an OpenAI-shaped intermediate.

use std::collections::HashMap;

use aws_sdk_bedrockruntime::types::{
    self, CachePointBlock, CachePointType, ContentBlock, ConversationRole, DocumentBlock, DocumentFormat,
    DocumentSource, ImageBlock, ImageFormat, ImageSource, InferenceConfiguration, Message as BedrockMessage,
    ReasoningContentBlock, ReasoningTextBlock, SpecificToolChoice, SystemContentBlock, Tool as BedrockTool,
    ToolChoice as BedrockToolChoice, ToolConfiguration, ToolInputSchema, ToolResultBlock, ToolResultContentBlock,
    ToolResultStatus, ToolSpecification, ToolUseBlock,
};
use aws_smithy_types::{Document, Number as SmithyNumber};
use base64::Engine as _;
use serde_json::Value as JsonValue;

use crate::{
    error::{LlmError, Result},
    protocol::anthropic::messages::{
        self as schema, CallerDescriptor, CallerTag, InputMessage, InputMessageContent, InputMessageStructuredContent,
        Request, ResponseContent, Role, ServiceTier, StopReason as SchemaStopReason, SystemInputMessage,
        SystemPrompt, ThinkingConfig, Tool as SchemaTool, ToolChoice as SchemaToolChoice, ToolKind,
    },
};

/// The pieces of a Bedrock `Converse`/`ConverseStream` call, assembled from a
/// translated Anthropic request. Kept separate from the SDK's fluent builders
/// so the same components feed both the blocking and streaming operations.
pub struct ConverseComponents {
    pub model_id: String,
    pub messages: Vec<BedrockMessage>,
    pub system: Option<Vec<SystemContentBlock>>,
    pub inference_config: Option<InferenceConfiguration>,
    pub tool_config: Option<ToolConfiguration>,
    pub additional_model_request_fields: Option<Document>,
}

pub fn build_converse_components(
    request: &Request,
    resolved_model_id: &str,
    config: &config::LlmConfig,
) -> Result<ConverseComponents> {
    let system = translate_system(request.system.as_ref(), config)?;
    let messages = translate_messages(&request.messages, config)?;
    let inference_config = build_inference_config(request);
    let tool_config = request
        .tools
        .as_ref()
        .filter(|tools| !tools.is_empty() && config.enable_tool_use)
        .map(|tools| build_tool_config(tools, request.tool_choice.as_ref(), resolved_model_id))
        .transpose()?;
    let additional_model_request_fields = build_additional_fields(request, config, resolved_model_id);

    Ok(ConverseComponents {
        model_id: resolved_model_id.to_string(),
        messages,
        system,
        inference_config,
        tool_config,
        additional_model_request_fields,
    })
}

fn build_inference_config(request: &Request) -> Option<InferenceConfiguration> {
    let mut builder = InferenceConfiguration::builder();
    let mut has_any = false;

    builder = builder.max_tokens(request.max_tokens as i32);
    has_any = true;

    if let Some(temperature) = request.temperature {
        builder = builder.temperature(temperature);
        has_any = true;
    }
    if let Some(top_p) = request.top_p {
        builder = builder.top_p(top_p);
        has_any = true;
    }
    if let Some(stop) = &request.stop_sequences {
        builder = builder.set_stop_sequences(Some(stop.clone()));
        has_any = true;
    }

    has_any.then(|| builder.build())
}

/// Beta strings gated by server-side config rather than the client's own
/// `anthropic-beta` header, matching `anthropic_to_bedrock.py`'s
/// `AnthropicToBedrockConverter.convert_request`.
const FINE_GRAINED_TOOL_STREAMING_BETA: &str = "fine-grained-tool-streaming-2025-05-14";
const INTERLEAVED_THINKING_BETA: &str = "interleaved-thinking-2025-05-14";

fn build_additional_fields(request: &Request, config: &config::LlmConfig, resolved_model_id: &str) -> Option<Document> {
    let mut fields = HashMap::new();

    if let Some(top_k) = request.top_k {
        fields.insert("top_k".to_string(), Document::Number(SmithyNumber::PosInt(top_k as u64)));
    }

    if config.enable_extended_thinking
        && let Some(ThinkingConfig::Enabled { budget_tokens, .. }) = &request.thinking
    {
        fields.insert(
            "thinking".to_string(),
            Document::Object(HashMap::from([
                ("type".to_string(), Document::String("enabled".to_string())),
                (
                    "budget_tokens".to_string(),
                    Document::Number(SmithyNumber::PosInt(*budget_tokens as u64)),
                ),
            ])),
        );
    }

    if config::ModelMappingConfig::is_claude_family(resolved_model_id) {
        let mut anthropic_beta = Vec::new();

        if config.fine_grained_tool_streaming_enabled {
            anthropic_beta.push(Document::String(FINE_GRAINED_TOOL_STREAMING_BETA.to_string()));
        }
        if config.interleaved_thinking_enabled {
            anthropic_beta.push(Document::String(INTERLEAVED_THINKING_BETA.to_string()));
        }

        if !anthropic_beta.is_empty() {
            fields.insert("anthropic_beta".to_string(), Document::Array(anthropic_beta));
        }
    }

    (!fields.is_empty()).then(|| Document::Object(fields))
}

fn translate_system(system: Option<&SystemPrompt>, config: &config::LlmConfig) -> Result<Option<Vec<SystemContentBlock>>> {
    let Some(system) = system else { return Ok(None) };

    let blocks = match system {
        SystemPrompt::Text(text) => vec![SystemContentBlock::Text(text.clone())],
        SystemPrompt::Blocks(blocks) => {
            let mut out = Vec::with_capacity(blocks.len());

            for block in blocks {
                let SystemInputMessage::Text(text_block) = block else {
                    continue;
                };

                out.push(SystemContentBlock::Text(text_block.text.clone()));

                if config.prompt_caching_enabled && text_block.cache_control.is_some() {
                    out.push(SystemContentBlock::CachePoint(default_cache_point()));
                }
            }

            out
        }
    };

    Ok(Some(blocks))
}

fn default_cache_point() -> CachePointBlock {
    CachePointBlock::builder()
        .r#type(CachePointType::Default)
        .build()
        .expect("CachePointBlock always builds")
}

/// Convert Anthropic input messages into Bedrock messages, coalescing
/// consecutive same-role turns into a single message (Converse rejects
/// adjacent same-role messages).
fn translate_messages(messages: &[InputMessage], config: &config::LlmConfig) -> Result<Vec<BedrockMessage>> {
    let mut out: Vec<BedrockMessage> = Vec::with_capacity(messages.len());
    let mut current_role: Option<ConversationRole> = None;
    let mut current_blocks: Vec<ContentBlock> = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::User | Role::Unknown(_) => ConversationRole::User,
            Role::Assistant => ConversationRole::Assistant,
        };

        let blocks = translate_content(&message.content, config)?;

        if current_role.is_some_and(|prev| prev != role) && !current_blocks.is_empty() {
            flush(&mut out, current_role.take(), std::mem::take(&mut current_blocks));
        }

        current_blocks.extend(blocks);
        current_role = Some(role);
    }

    flush(&mut out, current_role, current_blocks);

    Ok(out)
}

fn flush(out: &mut Vec<BedrockMessage>, role: Option<ConversationRole>, blocks: Vec<ContentBlock>) {
    let Some(role) = role else { return };
    if blocks.is_empty() {
        return;
    }

    if let Ok(message) = BedrockMessage::builder().role(role).set_content(Some(blocks)).build() {
        out.push(message);
    }
}

fn translate_content(content: &InputMessageContent, config: &config::LlmConfig) -> Result<Vec<ContentBlock>> {
    let items: Vec<InputMessageStructuredContent> = match content {
        InputMessageContent::Text(text) if text.is_empty() => return Ok(Vec::new()),
        InputMessageContent::Text(text) => {
            return Ok(vec![ContentBlock::Text(text.clone())]);
        }
        InputMessageContent::Items(items) => items.clone(),
    };

    let mut blocks = Vec::with_capacity(items.len());

    for item in items {
        let (block, cache_control) = match item {
            InputMessageStructuredContent::Text(text) => {
                if text.text.is_empty() {
                    continue;
                }
                (Some(ContentBlock::Text(text.text.clone())), text.cache_control.clone())
            }
            InputMessageStructuredContent::Image(image) => (translate_image(&image.source), image.cache_control.clone()),
            InputMessageStructuredContent::Document(doc) if config.enable_document_support => {
                (translate_document(&doc.source), doc.cache_control.clone())
            }
            InputMessageStructuredContent::Thinking(thinking) if config.enable_extended_thinking => (
                Some(ContentBlock::ReasoningContent(ReasoningContentBlock::ReasoningText(
                    ReasoningTextBlock::builder()
                        .text(thinking.thinking.clone())
                        .signature(thinking.signature.clone())
                        .build()
                        .expect("reasoning text block always builds"),
                ))),
                None,
            ),
            InputMessageStructuredContent::ToolUse(tool_use) => {
                (translate_tool_use(&tool_use.id, &tool_use.name, &tool_use.input), tool_use.cache_control.clone())
            }
            InputMessageStructuredContent::ToolResult(result) => (
                translate_tool_result(&result.tool_use_id, result.content.as_ref(), result.is_error),
                result.cache_control.clone(),
            ),
            other => {
                log::debug!("dropping content block with no Bedrock Converse equivalent: {other:?}");
                (None, None)
            }
        };

        if let Some(block) = block {
            blocks.push(block);
        }

        if config.prompt_caching_enabled && cache_control.is_some() {
            blocks.push(ContentBlock::CachePoint(default_cache_point()));
        }
    }

    Ok(blocks)
}

fn translate_tool_use(id: &str, name: &str, input: &JsonValue) -> Option<ContentBlock> {
    ToolUseBlock::builder()
        .tool_use_id(id)
        .name(name)
        .input(json_to_document(input))
        .build()
        .map(ContentBlock::ToolUse)
        .ok()
}

fn translate_tool_result(tool_use_id: &str, content: Option<&JsonValue>, is_error: Option<bool>) -> Option<ContentBlock> {
    let content_blocks = match content {
        None => vec![ToolResultContentBlock::Text(String::new())],
        Some(JsonValue::String(text)) => vec![ToolResultContentBlock::Text(text.clone())],
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| match item.get("type").and_then(|t| t.as_str()) {
                Some("text") => item
                    .get("text")
                    .and_then(|t| t.as_str())
                    .map(|t| ToolResultContentBlock::Text(t.to_string())),
                _ => Some(ToolResultContentBlock::Json(json_to_document(item))),
            })
            .collect(),
        Some(other) => vec![ToolResultContentBlock::Json(json_to_document(other))],
    };

    let status = match is_error {
        Some(true) => ToolResultStatus::Error,
        _ => ToolResultStatus::Success,
    };

    ToolResultBlock::builder()
        .tool_use_id(tool_use_id)
        .set_content(Some(content_blocks))
        .status(status)
        .build()
        .map(ContentBlock::ToolResult)
        .ok()
}

fn translate_image(source: &JsonValue) -> Option<ContentBlock> {
    let media_type = source.get("media_type").and_then(|v| v.as_str())?;
    let data = source.get("data").and_then(|v| v.as_str())?;
    let format = image_format(media_type)?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(data).ok()?;

    ImageBlock::builder()
        .format(format)
        .source(ImageSource::Bytes(bytes.into()))
        .build()
        .map(ContentBlock::Image)
        .ok()
}

fn image_format(media_type: &str) -> Option<ImageFormat> {
    match media_type {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::Webp),
        other => {
            log::debug!("unsupported image media type for Bedrock Converse: {other}");
            None
        }
    }
}

fn translate_document(source: &JsonValue) -> Option<ContentBlock> {
    let media_type = source.get("media_type").and_then(|v| v.as_str())?;
    let data = source.get("data").and_then(|v| v.as_str())?;
    let format = document_format(media_type)?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(data).ok()?;

    DocumentBlock::builder()
        .format(format)
        .name("document")
        .source(DocumentSource::Bytes(bytes.into()))
        .build()
        .map(ContentBlock::Document)
        .ok()
}

fn document_format(media_type: &str) -> Option<DocumentFormat> {
    match media_type {
        "application/pdf" => Some(DocumentFormat::Pdf),
        "text/plain" => Some(DocumentFormat::Txt),
        "text/csv" => Some(DocumentFormat::Csv),
        "text/html" => Some(DocumentFormat::Html),
        "text/markdown" => Some(DocumentFormat::Md),
        other => {
            log::debug!("unsupported document media type for Bedrock Converse: {other}");
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ModelFamily {
    Anthropic,
    Other,
}

impl ModelFamily {
    fn from_model_id(model_id: &str) -> Self {
        if config::ModelMappingConfig::is_claude_family(model_id) {
            Self::Anthropic
        } else {
            Self::Other
        }
    }

    fn supports_tool_choice_any(self) -> bool {
        matches!(self, Self::Anthropic)
    }
}

fn build_tool_config(
    tools: &[SchemaTool],
    tool_choice: Option<&SchemaToolChoice>,
    resolved_model_id: &str,
) -> Result<ToolConfiguration> {
    let mut bedrock_tools = Vec::with_capacity(tools.len());

    for tool in tools {
        if matches!(&tool.kind, Some(kind) if kind.is_code_execution_sentinel()) {
            // The sentinel tool is consumed by the PTC/standalone layer before
            // the request reaches translation; seeing one here means it leaked.
            return Err(LlmError::InvalidRequest(format!(
                "code-execution sentinel tool '{}' must be rewritten before calling Bedrock",
                tool.name
            )));
        }

        let spec = ToolSpecification::builder()
            .name(tool.name.clone())
            .set_description(tool.description.clone())
            .input_schema(ToolInputSchema::Json(json_to_document(&tool.input_schema)))
            .build()
            .map_err(|e| LlmError::InvalidRequest(format!("invalid tool definition '{}': {e}", tool.name)))?;

        bedrock_tools.push(BedrockTool::ToolSpec(spec));

        if tool.cache_control.is_some() {
            bedrock_tools.push(BedrockTool::CachePoint(default_cache_point()));
        }
    }

    let mut builder = ToolConfiguration::builder().set_tools(Some(bedrock_tools));

    if let Some(choice) = translate_tool_choice(tool_choice, ModelFamily::from_model_id(resolved_model_id)) {
        builder = builder.tool_choice(choice);
    }

    builder
        .build()
        .map_err(|e| LlmError::InvalidRequest(format!("invalid tool configuration: {e}")))
}

fn translate_tool_choice(choice: Option<&SchemaToolChoice>, family: ModelFamily) -> Option<BedrockToolChoice> {
    match choice? {
        SchemaToolChoice::Auto { .. } => Some(BedrockToolChoice::Auto(types::AutoToolChoice::builder().build())),
        SchemaToolChoice::Any { .. } => {
            if family.supports_tool_choice_any() {
                Some(BedrockToolChoice::Any(types::AnyToolChoice::builder().build()))
            } else {
                Some(BedrockToolChoice::Auto(types::AutoToolChoice::builder().build()))
            }
        }
        SchemaToolChoice::Tool { name, .. } => SpecificToolChoice::builder()
            .name(name.clone())
            .build()
            .ok()
            .map(BedrockToolChoice::Tool),
        SchemaToolChoice::None { .. } | SchemaToolChoice::Unknown(_) => None,
    }
}

/// Convert an arbitrary `serde_json::Value` into a Bedrock `Document`.
pub fn json_to_document(value: &JsonValue) -> Document {
    match value {
        JsonValue::Null => Document::Null,
        JsonValue::Bool(b) => Document::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Document::Number(SmithyNumber::NegInt(i))
            } else if let Some(u) = n.as_u64() {
                Document::Number(SmithyNumber::PosInt(u))
            } else {
                Document::Number(SmithyNumber::Float(n.as_f64().unwrap_or_default()))
            }
        }
        JsonValue::String(s) => Document::String(s.clone()),
        JsonValue::Array(items) => Document::Array(items.iter().map(json_to_document).collect()),
        JsonValue::Object(map) => {
            Document::Object(map.iter().map(|(k, v)| (k.clone(), json_to_document(v))).collect())
        }
    }
}

/// Convert a Bedrock `Document` back into a `serde_json::Value`.
pub fn document_to_json(doc: &Document) -> JsonValue {
    match doc {
        Document::Null => JsonValue::Null,
        Document::Bool(b) => JsonValue::Bool(*b),
        Document::Number(n) => match n {
            SmithyNumber::PosInt(u) => JsonValue::from(*u),
            SmithyNumber::NegInt(i) => JsonValue::from(*i),
            SmithyNumber::Float(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        },
        Document::String(s) => JsonValue::String(s.clone()),
        Document::Array(items) => JsonValue::Array(items.iter().map(document_to_json).collect()),
        Document::Object(obj) => JsonValue::Object(obj.iter().map(|(k, v)| (k.clone(), document_to_json(v))).collect()),
    }
}

pub fn stop_reason_from_bedrock(reason: &types::StopReason) -> SchemaStopReason {
    match reason {
        types::StopReason::EndTurn => SchemaStopReason::EndTurn,
        types::StopReason::MaxTokens => SchemaStopReason::MaxTokens,
        types::StopReason::StopSequence => SchemaStopReason::StopSequence,
        types::StopReason::ToolUse => SchemaStopReason::ToolUse,
        // `content_filtered`/`complete` and any future reason the SDK adds all
        // collapse to `end_turn` rather than leaking an `Unknown` the client
        // has no contract for.
        _ => SchemaStopReason::EndTurn,
    }
}

/// Convert a completed Converse output into an Anthropic message response.
pub fn translate_message_response(
    output: aws_sdk_bedrockruntime::operation::converse::ConverseOutput,
    caller_model_id: &str,
) -> Result<schema::MessageResponse> {
    let message = match output.output {
        Some(types::ConverseOutput::Message(message)) => message,
        _ => types::Message::builder()
            .role(ConversationRole::Assistant)
            .build()
            .expect("empty message always builds"),
    };

    let mut content = Vec::with_capacity(message.content().len());

    for block in message.content() {
        match block {
            // Upstream occasionally pairs an empty text block with the
            // `toolUse` that follows it; forwarding it would add a spurious
            // blank block the client never asked for.
            ContentBlock::Text(text) if text.is_empty() => {}
            ContentBlock::Text(text) => content.push(ResponseContent::Text(schema::ResponseTextBlock {
                text: text.clone(),
                citations: None,
                unknown_fields: Default::default(),
            })),
            ContentBlock::ToolUse(tool_use) => content.push(ResponseContent::ToolUse(schema::ResponseToolUseBlock {
                id: tool_use.tool_use_id.clone(),
                name: tool_use.name.clone(),
                input: document_to_json(&tool_use.input),
                caller: Some(CallerDescriptor::direct()),
                unknown_fields: Default::default(),
            })),
            ContentBlock::ReasoningContent(ReasoningContentBlock::ReasoningText(reasoning)) => {
                content.push(ResponseContent::Thinking(schema::ResponseThinkingBlock {
                    thinking: reasoning.text().unwrap_or_default().to_string(),
                    signature: reasoning.signature().unwrap_or_default().to_string(),
                    unknown_fields: Default::default(),
                }));
            }
            other => log::debug!("unhandled Bedrock content block on the way out: {other:?}"),
        }
    }

    let usage = output
        .usage
        .map(|usage| schema::Usage::new(usage.input_tokens as u32, usage.output_tokens as u32))
        .unwrap_or_else(|| schema::Usage::new(0, 0));

    let mut response = schema::MessageResponse::new(
        format!("msg_{}", uuid::Uuid::new_v4().simple()),
        caller_model_id.to_string(),
        content,
        usage,
    );

    response.stop_reason = Some(stop_reason_from_bedrock(&output.stop_reason));

    Ok(response)
}

pub(super) fn tool_use_allows_caller(tool: &SchemaTool, caller: &str) -> bool {
    tool.allowed_callers
        .as_ref()
        .is_some_and(|callers| callers.iter().any(|c| matches!(c, CallerTag::CodeExecution(tag) if tag == caller)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_reason_map_covers_every_upstream_variant() {
        assert_eq!(stop_reason_from_bedrock(&types::StopReason::EndTurn), SchemaStopReason::EndTurn);
        assert_eq!(stop_reason_from_bedrock(&types::StopReason::MaxTokens), SchemaStopReason::MaxTokens);
        assert_eq!(stop_reason_from_bedrock(&types::StopReason::StopSequence), SchemaStopReason::StopSequence);
        assert_eq!(stop_reason_from_bedrock(&types::StopReason::ToolUse), SchemaStopReason::ToolUse);
        assert_eq!(stop_reason_from_bedrock(&types::StopReason::ContentFiltered), SchemaStopReason::EndTurn);
    }

    #[test]
    fn unknown_stop_reason_collapses_to_end_turn() {
        let unknown = types::StopReason::from("some-future-reason");
        assert_eq!(stop_reason_from_bedrock(&unknown), SchemaStopReason::EndTurn);
    }

    #[test]
    fn json_document_round_trip_preserves_nested_shape() {
        let original = serde_json::json!({
            "city": "Paris",
            "count": 3,
            "ratio": 1.5,
            "tags": ["a", "b"],
            "nested": {"ok": true, "missing": null},
        });

        let document = json_to_document(&original);
        let round_tripped = document_to_json(&document);

        assert_eq!(original, round_tripped);
    }

    #[test]
    fn negative_integers_round_trip_through_document() {
        let original = serde_json::json!(-42);
        assert_eq!(document_to_json(&json_to_document(&original)), original);
    }

    #[test]
    fn tool_use_allows_caller_requires_matching_tag() {
        let mut tool = SchemaTool {
            name: "get_weather".to_string(),
            description: None,
            input_schema: Box::new(serde_json::json!({})),
            cache_control: None,
            allowed_callers: Some(vec![CallerTag::CodeExecution("code_execution_20250825".to_string())]),
            kind: None,
            unknown_fields: Default::default(),
        };

        assert!(tool_use_allows_caller(&tool, "code_execution_20250825"));
        assert!(!tool_use_allows_caller(&tool, "code_execution_other"));

        tool.allowed_callers = None;
        assert!(!tool_use_allows_caller(&tool, "code_execution_20250825"));
    }
}
