//! Programmatic Tool Calling (C8): detects PTC requests, rewrites them for
//! Bedrock, drives `execute_code` rounds through the sandbox, and replays
//! completed rounds back into conversation history.

pub mod detect;
pub mod error;
pub mod executor;
pub mod history_filter;
pub mod ids;
pub mod response;
pub mod rewrite;
pub mod service;

pub use error::{PtcError, Result};
pub use service::{PtcOutcome, PtcService, ToolResultAnswer, extract_tool_result_answers};
