use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::{anthropic::error::ErrorResponse, unknown_fields::UnknownFields};

use super::{Role, response_content::ResponseContent};

/// Reason Claude stopped generating. `Unknown` absorbs future reasons so
/// callers degrade gracefully instead of failing to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    PauseTurn,
    Refusal,
    #[serde(untagged)]
    Unknown,
}

/// Sandbox session handle surfaced on PTC/standalone code-execution
/// responses so the client can reuse the container on the next request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub expires_at: String,
}

/// Breakdown of cache-write tokens by TTL tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheCreation {
    #[serde(default)]
    pub ephemeral_5m_input_tokens: u32,
    #[serde(default)]
    pub ephemeral_1h_input_tokens: u32,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Usage incurred by Anthropic-managed server tools (web search, etc.).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerToolUsage {
    #[serde(default)]
    pub web_search_requests: u32,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Service tier that actually served the request, as reported in usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageServiceTier {
    Standard,
    Priority,
    Batch,
    #[serde(untagged)]
    Unknown(String),
}

/// Token accounting for a completed (non-streaming) message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,

    /// Present only when prompt caching wrote new cache entries this call;
    /// absence is distinct from zero (no cache-control markers were sent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation: Option<CacheCreation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_tool_use: Option<ServerToolUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<UsageServiceTier>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
            cache_creation: None,
            server_tool_use: None,
            service_tier: None,
            unknown_fields: UnknownFields::default(),
        }
    }

    /// Fold a continuation call's usage into the running total for a PTC
    /// round trip. Token counters accumulate; the rest reflect the last call.
    pub fn accumulate(&mut self, next: &Usage) {
        self.input_tokens += next.input_tokens;
        self.output_tokens += next.output_tokens;

        if let Some(n) = next.cache_creation_input_tokens {
            *self.cache_creation_input_tokens.get_or_insert(0) += n;
        }
        if let Some(n) = next.cache_read_input_tokens {
            *self.cache_read_input_tokens.get_or_insert(0) += n;
        }
        if next.server_tool_use.is_some() {
            self.server_tool_use = next.server_tool_use.clone();
        }
        if next.service_tier.is_some() {
            self.service_tier = next.service_tier.clone();
        }
    }
}

/// A completed Anthropic Messages API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,

    #[serde(rename = "type", default = "message_type")]
    pub message_type: String,

    pub role: Role,
    pub content: Vec<ResponseContent>,
    pub model: String,

    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub stop_sequence: Option<String>,

    pub usage: Usage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_management: Option<super::context_management::ResponseContextManagement>,

    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

fn message_type() -> String {
    "message".to_string()
}

impl MessageResponse {
    pub fn new(id: String, model: String, content: Vec<ResponseContent>, usage: Usage) -> Self {
        Self {
            id,
            message_type: message_type(),
            role: Role::Assistant,
            content,
            model,
            stop_reason: None,
            stop_sequence: None,
            usage,
            container: None,
            context_management: None,
            unknown_fields: UnknownFields::default(),
        }
    }
}

/// Top-level response body for `/v1/messages` (non-streaming).
///
/// Untagged because a successful response and an error response have
/// disjoint shapes (`type: "message"` vs `type: "error"`) and Anthropic
/// returns the error directly as the body, not wrapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Message(Box<MessageResponse>),
    Error(ErrorResponse),
    Unknown(Value),
}

impl Response {
    pub fn as_message(&self) -> Option<&MessageResponse> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn message(message: MessageResponse) -> Self {
        Self::Message(Box::new(message))
    }
}
