//! Wire-format schema for the Anthropic Messages API surface this proxy
//! exposes, independent of how requests are actually fulfilled.

pub mod anthropic;
pub mod unknown_fields;
