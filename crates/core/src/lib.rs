//! # Cogni Core
//!
//! Domain types, ports, and error definitions for the Cogni tool runtime.
//! This crate has **no framework dependencies**. It defines the contracts
//! that the policy, tool, runner, and billing crates implement against.
//!
//! ## Layout
//!
//! - [`error`] / [`normalize`] — closed error taxonomies and the classifier
//!   that maps any failure onto them
//! - [`tool`] — tool specs, bound-tool and tool-source ports, policy trait
//! - [`capability`] — the opaque capability bag handed to tools
//! - [`event`] — the AI event protocol and the emit sink
//! - [`usage`] — usage facts and idempotency keys
//! - [`span`] — the optional span port

pub mod capability;
pub mod error;
pub mod event;
pub mod normalize;
pub mod span;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use capability::{AuthCapability, Capabilities, ClockCapability, SystemClock};
pub use error::{
    AbortError, AiExecutionErrorCode, ExecutionError, LlmError, LlmErrorKind, ToolError,
    ToolErrorCode,
};
pub use event::{AiEvent, CollectingEmitter, EmitAiEvent, NoopEmitter, StatusPhase};
pub use normalize::{classify_llm_error_from_status, normalize_error_to_execution_code};
pub use span::{ActiveSpan, ScrubFn, SpanEnd, SpanLevel, SpanPort, SpanStart};
pub use tool::{
    BoundToolRuntime, RedactionConfig, ToolBudgets, ToolEffect, ToolInvocationContext,
    ToolPolicy, ToolPolicyContext, ToolPolicyDecision, ToolResult, ToolSourcePort, ToolSpec,
};
pub use usage::{ExecutorType, UsageFact, UsageFactError, UsageIdempotencyKey};
