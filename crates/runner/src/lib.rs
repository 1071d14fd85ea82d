//! # Cogni Runner
//!
//! Executes tool calls and shapes the event stream of a run.
//!
//! - [`ToolRunner`] — the policy-checked, validated, redacted tool pipeline
//! - [`RunEmitter`] — terminal-event ordering for one run
//! - [`EventFanout`] — role-filtered delivery to UI, billing, and
//!   persistence subscribers

pub mod call_id;
pub mod fanout;
pub mod run_stream;
pub mod tool_runner;

pub use call_id::{generate_tool_call_id, resolve_tool_call_id};
pub use fanout::{ChannelSink, EventFanout, SubscriberRole};
pub use run_stream::RunEmitter;
pub use tool_runner::{REDACTION_FAILED_MESSAGE, ToolRunOptions, ToolRunner};
