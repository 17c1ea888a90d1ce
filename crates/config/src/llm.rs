/// Bedrock Converse call tuning and Anthropic-capability feature flags.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Timeout, in seconds, for a single non-streaming Converse call.
    pub bedrock_timeout_seconds: u64,

    /// Timeout, in seconds, for a single streaming ConverseStream call.
    pub streaming_timeout_seconds: u64,

    /// Whether prompt-cache markers (`cachePoint`) are emitted for
    /// cache-eligible blocks on Claude-family models.
    pub prompt_caching_enabled: bool,

    /// Whether client-supplied tool definitions are translated and forwarded.
    pub enable_tool_use: bool,

    /// Whether `thinking` blocks are translated (gated since not every
    /// upstream model accepts the `additionalModelRequestFields` shape).
    pub enable_extended_thinking: bool,

    /// Whether `document` content blocks are translated.
    pub enable_document_support: bool,

    /// Whether the `fine-grained-tool-streaming-2025-05-14` beta header is
    /// allowed to pass through to `additionalModelRequestFields.anthropic_beta`.
    pub fine_grained_tool_streaming_enabled: bool,

    /// Whether the `interleaved-thinking-2025-05-14` beta header is allowed
    /// to pass through.
    pub interleaved_thinking_enabled: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            bedrock_timeout_seconds: 1800,
            streaming_timeout_seconds: 1800,
            prompt_caching_enabled: true,
            enable_tool_use: true,
            enable_extended_thinking: true,
            enable_document_support: true,
            fine_grained_tool_streaming_enabled: true,
            interleaved_thinking_enabled: true,
        }
    }
}

impl LlmConfig {
    pub(crate) fn validate(&self) -> Result<(), crate::Error> {
        if self.bedrock_timeout_seconds == 0 {
            return Err(crate::Error::Invalid {
                key: "llm.bedrock_timeout_seconds".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.streaming_timeout_seconds == 0 {
            return Err(crate::Error::Invalid {
                key: "llm.streaming_timeout_seconds".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
