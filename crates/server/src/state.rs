//! Shared application state handed to every route handler.

use std::sync::Arc;

use codeexec::CodeExecService;
use llm::BedrockClient;
use ptc::PtcService;

/// Everything a `/v1/messages` (or sibling) handler needs to fulfill a
/// request: the upstream client, the model-id resolver, and the two
/// sandboxed-execution orchestrators (each `None` when disabled).
#[derive(Clone)]
pub struct AppState {
    pub bedrock: Arc<BedrockClient>,
    pub model_mapping: Arc<config::ModelMappingConfig>,
    pub ptc: Option<Arc<PtcService>>,
    pub codeexec: Option<Arc<CodeExecService>>,
}

impl AppState {
    pub fn new(
        bedrock: Arc<BedrockClient>,
        model_mapping: Arc<config::ModelMappingConfig>,
        ptc: Option<Arc<PtcService>>,
        codeexec: Option<Arc<CodeExecService>>,
    ) -> Self {
        Self { bedrock, model_mapping, ptc, codeexec }
    }
}
