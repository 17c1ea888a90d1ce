//! Id schemes used across a PTC round trip.
//!
//! Grounded on `original_source/app/services/ptc_service.py`'s use of
//! `uuid4().hex[:12]` for server tool ids and `call_id[:12]`-derived tool_use
//! ids for batch continuations. Unlike the reference implementation — which
//! mints a *fresh* random id for a single continuation's `tool_use` block but
//! a *derived* one for a batch — every exposed `tool_use` id here is
//! deterministically derived from the sandbox's own `call_id`. That lets the
//! next incoming `tool_result` be matched back to its sandbox call without a
//! separate id-mapping table; see `DESIGN.md`.

use uuid::Uuid;

/// A fresh `srvtoolu_` id for the `server_tool_use` block standing in for a
/// round of `execute_code`.
pub fn new_code_execution_tool_id() -> String {
    format!("srvtoolu_{}", short_hex())
}

/// The `tool_use` id exposed to the client for a sandbox-originated call.
/// Deterministic in `call_id` so a later `tool_result` can be matched back to
/// the pending sandbox call that produced it.
pub fn tool_use_id_for_call(call_id: &str) -> String {
    format!("toolu_{}", call_id.chars().take(12).collect::<String>())
}

/// The `tool_use` id used for the synthetic `execute_code` call replayed into
/// conversation history once a round of code execution completes.
pub fn execute_code_tool_use_id(code_execution_tool_id: &str) -> String {
    let tail: String = code_execution_tool_id.chars().rev().take(12).collect::<Vec<_>>().into_iter().rev().collect();
    format!("toolu_{tail}")
}

/// A fresh assistant message id (`msg_...`).
pub fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_use_id_is_deterministic() {
        assert_eq!(tool_use_id_for_call("abc123call"), tool_use_id_for_call("abc123call"));
        assert_eq!(tool_use_id_for_call("abcdefabcdefextra"), "toolu_abcdefabcdef");
    }

    #[test]
    fn execute_code_id_uses_tail() {
        assert_eq!(execute_code_tool_use_id("srvtoolu_0123456789ab"), "toolu_0123456789ab");
    }
}
