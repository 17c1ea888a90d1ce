//! Standalone server-side code execution (C9): detects requests that opt
//! into the `code-execution-2025-08-25` beta without any PTC-style
//! `allowed_callers`, rewrites them onto a `bash_code_execution` tool, and
//! drives the agentic bash loop to completion within a single sandbox
//! session.

pub mod bash;
pub mod detect;
pub mod error;
pub mod rewrite;
pub mod service;

pub use error::{CodeExecError, Result};
pub use service::{CodeExecOutcome, CodeExecService};
