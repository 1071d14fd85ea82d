//! Tool binding and the built-in tool catalog for Cogni.
//!
//! - [`contract`] — typed tool contracts bound to implementations
//! - [`source`] — the immutable tool registry handed to the runner
//! - [`get_time`] — the built-in `core__get_time` tool

pub mod contract;
pub mod get_time;
pub mod source;

pub use contract::{BoundTool, RedactFn, ToolContract};
pub use source::{StaticToolSource, ToolSourceError};

/// Create a tool source with all built-in tools.
pub fn default_source() -> Result<StaticToolSource, ToolSourceError> {
    StaticToolSource::new([get_time::get_time_tool().into_runtime()])
}
