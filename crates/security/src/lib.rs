//! Security module for Cogni — tool policies and output redaction.
//!
//! Provides:
//! - **Policies**: deny-by-default and allowlist decisions for tool calls
//! - **Redaction**: top-level allowlist filtering of tool outputs

pub mod policy;
pub mod redaction;

pub use policy::{AllowlistPolicy, DENY_ALL_POLICY, DenyAllPolicy};
pub use redaction::{RedactionError, redact_top_level};
