//! Bedrock Converse integration: the Anthropic-to-Converse format
//! translator (C3), the upstream client (C4), and the streaming-event
//! engine (C5).

pub mod client;
pub mod streaming;
pub mod translate;

pub use client::{BedrockClient, ModelSummary, TokenCount, TokenCountKind, model_not_found};
