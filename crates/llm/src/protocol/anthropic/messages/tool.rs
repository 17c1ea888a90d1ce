use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::unknown_fields::UnknownFields;

use super::cache_control::CacheControl;

/// Anthropic tool definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    /// Unique tool name surfaced to the model and in tool_use blocks.
    pub name: String,

    /// Optional natural-language description of the tool's purpose.
    #[serde(default)]
    pub description: Option<String>,

    /// Tool category reported to Anthropic. Absent for ordinary custom tools;
    /// set to a `code_execution_*`/`bash_code_execution_*` sentinel type for
    /// the server-provided code-execution tool definition.
    #[serde(rename = "type", default)]
    pub kind: Option<ToolKind>,

    /// JSON Schema describing the tool's expected input payload. Kept as a
    /// raw value rather than a typed schema: the proxy never validates
    /// against it, only forwards it to Bedrock.
    #[serde(default)]
    pub input_schema: Box<Value>,

    /// Which callers may invoke this tool: the model directly, sandboxed
    /// code executing under Programmatic Tool Calling, or both. Absent means
    /// the tool is only ever called directly.
    #[serde(default)]
    pub allowed_callers: Option<Vec<CallerTag>>,

    /// Cache-control hints describing how Anthropic may reuse tool inputs.
    #[serde(default)]
    pub cache_control: Option<CacheControl>,

    /// Additional tool fields forwarded to Anthropic unchanged.
    #[serde(flatten)]
    pub unknown_fields: UnknownFields,
}

/// Tool kinds supported by Anthropic.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Custom,
    /// Programmatic Tool Calling's `execute_code` sentinel definition.
    #[serde(rename = "code_execution_20250825")]
    CodeExecution20250825,
    /// Standalone code execution's bash/text-editor sentinel definition.
    #[serde(rename = "bash_code_execution_20250124")]
    BashCodeExecution20250124,
    #[serde(untagged)]
    Unknown(String),
}

impl ToolKind {
    /// Whether this is one of the server-provided code-execution sentinels
    /// rather than an ordinary custom tool definition.
    pub fn is_code_execution_sentinel(&self) -> bool {
        matches!(self, Self::CodeExecution20250825 | Self::BashCodeExecution20250124)
            || matches!(self, Self::Unknown(s) if s.starts_with("code_execution_") || s.starts_with("bash_code_execution_"))
    }
}

/// Caller tag used in a tool's `allowed_callers` list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallerTag {
    Direct,
    #[serde(untagged)]
    CodeExecution(String),
}

impl CallerTag {
    pub fn is_code_execution(&self) -> bool {
        matches!(self, Self::CodeExecution(_))
    }
}

/// Who originated a `tool_use` block: the model itself, or sandboxed code
/// running under a `server_tool_use` invocation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum CallerDescriptor {
    #[serde(rename = "direct")]
    Direct,
    #[serde(untagged)]
    CodeExecution {
        #[serde(rename = "type")]
        r#type: String,
        /// Id of the `server_tool_use` block that spawned this call.
        tool_id: String,
    },
}

impl CallerDescriptor {
    pub fn direct() -> Self {
        Self::Direct
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }
}

/// Controls how the model may interact with tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto {
        /// When true, limit the model to at most one tool use.
        #[serde(default)]
        disable_parallel_tool_use: Option<bool>,
        /// Extra tool-choice fields preserved from the request.
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    Any {
        /// When true, limit the model to a single tool use.
        #[serde(default)]
        disable_parallel_tool_use: Option<bool>,
        /// Additional any-choice fields carried through untouched.
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    Tool {
        /// Name of the required tool.
        name: String,
        /// When true, force the model to emit exactly one tool use.
        #[serde(default)]
        disable_parallel_tool_use: Option<bool>,
        /// Additional specific-choice settings.
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    None {
        /// Unknown none-mode attributes left intact.
        #[serde(flatten)]
        unknown_fields: UnknownFields,
    },
    #[serde(untagged)]
    Unknown(Value),
}
