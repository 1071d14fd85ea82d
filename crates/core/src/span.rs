//! Span port — optional observability side channel.
//!
//! Spans never influence orchestration: a missing port, or a port that
//! records nothing, leaves every tool outcome unchanged.

use serde::{Deserialize, Serialize};

/// Parameters for opening a span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanStart {
    pub trace_id: String,
    pub name: String,
    /// Scrubbed input, only when the caller opted in.
    pub input: Option<serde_json::Value>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Severity of a finished span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanLevel {
    Default,
    Warning,
    Error,
}

impl SpanLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Parameters for closing a span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanEnd {
    /// Scrubbed output, only when the caller opted in.
    pub output: Option<serde_json::Value>,
    pub level: SpanLevel,
    pub status_message: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// An open span.
pub trait ActiveSpan: Send {
    fn span_id(&self) -> &str;

    fn end(self: Box<Self>, end: SpanEnd);
}

/// Factory for spans.
pub trait SpanPort: Send + Sync {
    fn start_span(&self, start: SpanStart) -> Box<dyn ActiveSpan>;
}

/// Caller-supplied hook that reduces a payload before it reaches a span.
/// An `Err` means "record nothing"; the pipeline carries on.
pub type ScrubFn =
    dyn Fn(&serde_json::Value) -> Result<serde_json::Value, String> + Send + Sync;
