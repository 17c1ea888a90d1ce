//! Thin adapter over the Bedrock Converse/ConverseStream/CountTokens/
//! ListFoundationModels operations, grounded on the teacher's
//! `provider/bedrock.rs` client-construction shape and
//! `original_source/app/services/bedrock_service.py`'s call sequencing.

use std::time::Duration;

use aws_sdk_bedrockruntime::operation::converse::ConverseOutput;

use crate::{
    bedrock::translate::{self, ConverseComponents},
    error::{LlmError, Result},
    protocol::anthropic::messages::{MessageResponse, Request},
};

/// A model summary as surfaced by `GET /v1/models`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub display_name: String,
    pub created_at: Option<String>,
}

/// Whether a token count came back from Bedrock's own `count_tokens`
/// operation or was produced by the CJK-weighted estimator fallback. Per the
/// non-Claude-estimator open question, callers must not treat `Estimated` as
/// contract-grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCountKind {
    Exact,
    Estimated,
}

#[derive(Debug, Clone)]
pub struct TokenCount {
    pub input_tokens: u32,
    pub kind: TokenCountKind,
}

/// Upstream adapter: `invoke`, `invoke_stream`, `count_tokens`, `list_models`.
///
/// Every method wraps SDK-specific error types into [`LlmError`] at this
/// boundary — no `aws_sdk_bedrockruntime`/`aws_sdk_bedrock` error type is
/// ever allowed to escape this module.
pub struct BedrockClient {
    runtime: aws_sdk_bedrockruntime::Client,
    control: aws_sdk_bedrock::Client,
    llm_config: config::LlmConfig,
}

impl BedrockClient {
    pub async fn new(aws: &config::AwsConfig, llm_config: config::LlmConfig) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_config::Region::new(
            aws.region.clone(),
        ));

        if let (Some(access_key), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            use secrecy::ExposeSecret;
            let credentials = aws_credential_types::Credentials::new(
                access_key.clone(),
                secret.expose_secret().to_string(),
                aws.session_token.as_ref().map(|t| t.expose_secret().to_string()),
                None,
                "bedrock-proxy-static",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        let mut runtime_builder = aws_sdk_bedrockruntime::config::Builder::from(&sdk_config)
            .timeout_config(
                aws_smithy_types::timeout::TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(llm_config.bedrock_timeout_seconds))
                    .build(),
            );
        let mut control_builder = aws_sdk_bedrock::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &aws.bedrock_endpoint_url {
            runtime_builder = runtime_builder.endpoint_url(endpoint);
            control_builder = control_builder.endpoint_url(endpoint);
        }

        Ok(Self {
            runtime: aws_sdk_bedrockruntime::Client::from_conf(runtime_builder.build()),
            control: aws_sdk_bedrock::Client::from_conf(control_builder.build()),
            llm_config,
        })
    }

    fn components(&self, request: &Request, resolved_model_id: &str) -> Result<ConverseComponents> {
        translate::build_converse_components(request, resolved_model_id, &self.llm_config)
    }

    /// Non-streaming `Converse` call.
    pub async fn invoke(&self, request: &Request, resolved_model_id: &str) -> Result<MessageResponse> {
        let components = self.components(request, resolved_model_id)?;

        log::debug!(
            target: "llm::bedrock",
            "invoking Converse, model={} messages={}",
            components.model_id,
            components.messages.len()
        );

        let mut call = self
            .runtime
            .converse()
            .model_id(&components.model_id)
            .set_messages(Some(components.messages))
            .set_system(components.system)
            .set_tool_config(components.tool_config)
            .set_inference_config(components.inference_config);

        if let Some(fields) = components.additional_model_request_fields {
            call = call.additional_model_request_fields(fields);
        }

        let output: ConverseOutput = call.send().await.map_err(map_converse_error)?;

        translate::translate_message_response(output, &request.model)
    }

    /// Streaming `ConverseStream` call. Returns an already-framed Anthropic
    /// SSE event stream; the HTTP layer only needs to write each frame out
    /// and flush.
    pub async fn invoke_stream(
        &self,
        request: &Request,
        resolved_model_id: &str,
    ) -> Result<impl futures::Stream<Item = Result<crate::protocol::anthropic::messages::StreamEvent>>> {
        let components = self.components(request, resolved_model_id)?;

        log::debug!(
            target: "llm::bedrock",
            "invoking ConverseStream, model={} messages={}",
            components.model_id,
            components.messages.len()
        );

        let mut call = self
            .runtime
            .converse_stream()
            .model_id(&components.model_id)
            .set_messages(Some(components.messages))
            .set_system(components.system)
            .set_tool_config(components.tool_config)
            .set_inference_config(components.inference_config);

        if let Some(fields) = components.additional_model_request_fields {
            call = call.additional_model_request_fields(fields);
        }

        let output = call.send().await.map_err(map_converse_error)?;

        Ok(crate::bedrock::streaming::translate_stream(
            output.stream,
            format!("msg_{}", uuid::Uuid::new_v4().simple()),
            request.model.clone(),
        ))
    }

    /// `CountTokens` for Claude-family models, falling back to the
    /// CJK-weighted estimator for every other model or whenever the call
    /// itself fails.
    pub async fn count_tokens(&self, request: &Request, resolved_model_id: &str) -> Result<TokenCount> {
        if config::ModelMappingConfig::is_claude_family(resolved_model_id) {
            match self.count_tokens_exact(request, resolved_model_id).await {
                Ok(count) if count > 0 => {
                    return Ok(TokenCount { input_tokens: count, kind: TokenCountKind::Exact });
                }
                Ok(_) => {}
                Err(error) => {
                    log::debug!(target: "llm::bedrock", "count_tokens call failed, falling back to estimator: {error}");
                }
            }
        }

        Ok(TokenCount { input_tokens: estimate_token_count(request, resolved_model_id, &self.llm_config)?, kind: TokenCountKind::Estimated })
    }

    async fn count_tokens_exact(&self, request: &Request, resolved_model_id: &str) -> Result<u32> {
        let components = self.components(request, resolved_model_id)?;

        let converse_input = aws_sdk_bedrockruntime::types::CountTokensInput::Converse(
            aws_sdk_bedrockruntime::types::ConverseTokensRequest::builder()
                .set_messages(Some(components.messages))
                .set_system(components.system)
                .set_tool_config(components.tool_config)
                .build()
                .map_err(|e| LlmError::Internal(format!("invalid count_tokens payload: {e}")))?,
        );

        let output = self
            .runtime
            .count_tokens()
            .model_id(&components.model_id)
            .input(converse_input)
            .send()
            .await
            .map_err(map_converse_error)?;

        Ok(output.input_tokens() as u32)
    }

    /// Filtered to models whose output modality set includes text.
    pub async fn list_models(&self) -> Result<Vec<ModelSummary>> {
        let output = self
            .control
            .list_foundation_models()
            .send()
            .await
            .map_err(|e| LlmError::Api(format!("failed to list Bedrock foundation models: {e}")))?;

        let models = output
            .model_summaries()
            .iter()
            .filter(|model| model.output_modalities().iter().any(|m| matches!(m, aws_sdk_bedrock::types::ModelModality::Text)))
            .map(|model| ModelSummary {
                id: model.model_id().to_string(),
                display_name: model.model_name().unwrap_or_default().to_string(),
                created_at: None,
            })
            .collect();

        Ok(models)
    }
}

fn map_converse_error<E, R>(error: aws_smithy_runtime_api::client::result::SdkError<E, R>) -> LlmError
where
    E: std::error::Error + aws_smithy_runtime_api::client::result::ProvideErrorMetadata + 'static,
{
    use aws_smithy_runtime_api::client::result::SdkError;

    let (code, message) = match &error {
        SdkError::ServiceError(service_error) => {
            let err = service_error.err();
            (err.code().unwrap_or("Unknown").to_string(), err.message().unwrap_or_default().to_string())
        }
        other => ("Unknown".to_string(), other.to_string()),
    };

    log::warn!(target: "llm::bedrock", "upstream error [{code}]: {message}");

    match code.as_str() {
        "ThrottlingException" | "TooManyRequestsException" | "ServiceQuotaExceededException" => {
            LlmError::RateLimited(message)
        }
        "AccessDeniedException" => LlmError::Permission(message),
        "ResourceNotFoundException" | "ValidationException" if message.to_lowercase().contains("model") => {
            LlmError::NotFound(message)
        }
        "ValidationException" => LlmError::InvalidRequest(message),
        "ServiceUnavailableException" | "ModelNotReadyException" | "ModelTimeoutException" => {
            LlmError::Overloaded(message)
        }
        _ => LlmError::Api(message),
    }
}

/// CJK-weighted token-count estimator used when Bedrock's own `count_tokens`
/// is unavailable (non-Claude models, or the exact call failing).
fn estimate_token_count(request: &Request, resolved_model_id: &str, llm_config: &config::LlmConfig) -> Result<u32> {
    let components = translate::build_converse_components(request, resolved_model_id, llm_config)?;

    let mut text_segments: Vec<String> = Vec::new();
    let mut image_count = 0u32;
    let mut document_count = 0u32;

    if let Some(system) = &components.system {
        for block in system {
            if let aws_sdk_bedrockruntime::types::SystemContentBlock::Text(text) = block {
                text_segments.push(text.clone());
            }
        }
    }

    for message in &components.messages {
        for block in message.content() {
            match block {
                aws_sdk_bedrockruntime::types::ContentBlock::Text(text) => text_segments.push(text.clone()),
                aws_sdk_bedrockruntime::types::ContentBlock::Image(_) => image_count += 1,
                aws_sdk_bedrockruntime::types::ContentBlock::Document(_) => document_count += 1,
                _ => {}
            }
        }
    }

    if let Some(tool_config) = &components.tool_config {
        for tool in tool_config.tools() {
            if let aws_sdk_bedrockruntime::types::Tool::ToolSpec(spec) = tool {
                text_segments.push(spec.name().to_string());
                if let Some(description) = spec.description() {
                    text_segments.push(description.to_string());
                }
                if let aws_sdk_bedrockruntime::types::ToolInputSchema::Json(schema) = spec.input_schema().unwrap() {
                    text_segments.push(serde_json::to_string(&translate::document_to_json(schema)).unwrap_or_default());
                }
            }
        }
    }

    let mut total = 0u64;
    for text in &text_segments {
        let cjk_chars = text.chars().filter(|c| is_cjk_char(*c)).count() as u64;
        let non_cjk_chars = text.chars().count() as u64 - cjk_chars;
        total += cjk_chars + non_cjk_chars / 4;
    }

    total += image_count as u64 * 85;
    total += document_count as u64 * 250;

    let total = ((total as f64) * 1.05).floor() as u64;

    Ok(total.max(1) as u32)
}

fn is_cjk_char(c: char) -> bool {
    let code = c as u32;
    matches!(code,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF | 0x2A700..=0x2B73F
        | 0x2B740..=0x2B81F | 0x2B820..=0x2CEAF | 0xF900..=0xFAFF | 0x2F800..=0x2FA1F
        | 0x3040..=0x309F | 0x30A0..=0x30FF | 0xAC00..=0xD7AF
    )
}

/// Passed through by the HTTP surface when rendering `GET /v1/models/{id}`.
pub fn model_not_found(model_id: &str) -> LlmError {
    LlmError::NotFound(format!("model '{model_id}' is not known to this deployment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cjk_chars_are_identified() {
        assert!(is_cjk_char('日'));
        assert!(is_cjk_char('한'));
        assert!(!is_cjk_char('a'));
    }
}
