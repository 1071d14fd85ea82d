//! AI event protocol — the single channel observed by UI, billing, and
//! persistence subscribers.
//!
//! Wire shape (JSON, `type` discriminator, camelCase fields):
//! - `text_delta`       — incremental assistant content
//! - `tool_call_start`  — validated arguments of a tool call
//! - `tool_call_result` — redacted result (or error payload) of the same call
//! - `usage_report`     — billing fact; internal, never shown to UI
//! - `assistant_final`  — complete response content, once per run
//! - `status`           — ephemeral phase indicator
//! - `done`             — terminal, always last
//! - `error`            — terminal code, always followed by `done`

use serde::{Deserialize, Serialize};

use crate::error::AiExecutionErrorCode;
use crate::usage::UsageFact;

/// Ephemeral phase shown while a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPhase {
    Thinking,
    ToolUse,
    Compacting,
}

/// Events emitted during one graph/LLM run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AiEvent {
    TextDelta {
        delta: String,
    },

    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
        /// Validated arguments. Raw model arguments never appear here.
        args: serde_json::Value,
    },

    ToolCallResult {
        tool_call_id: String,
        tool_name: String,
        /// Redacted output, or `{"error", "errorCode"}` on failure.
        result: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    UsageReport {
        fact: UsageFact,
    },

    AssistantFinal {
        content: String,
    },

    Status {
        phase: StatusPhase,
        /// At most a tool name. Never arguments or results.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },

    Done,

    Error {
        error: AiExecutionErrorCode,
    },
}

impl AiEvent {
    /// Wire name of this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallResult { .. } => "tool_call_result",
            Self::UsageReport { .. } => "usage_report",
            Self::AssistantFinal { .. } => "assistant_final",
            Self::Status { .. } => "status",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// `done` and `error` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// The tool-call ID, for events that belong to a tool call.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::ToolCallStart { tool_call_id, .. } | Self::ToolCallResult { tool_call_id, .. } => {
                Some(tool_call_id)
            }
            _ => None,
        }
    }
}

/// Synchronous event sink supplied by the caller.
///
/// The runner calls it the instant an event is produced; nothing is
/// buffered or batched on the way.
pub trait EmitAiEvent: Send + Sync {
    fn emit(&self, event: AiEvent);
}

impl<F> EmitAiEvent for F
where
    F: Fn(AiEvent) + Send + Sync,
{
    fn emit(&self, event: AiEvent) {
        self(event)
    }
}

/// A sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmitter;

impl EmitAiEvent for NoopEmitter {
    fn emit(&self, _event: AiEvent) {}
}

/// Records every event in memory. Useful for tests and replay.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    events: std::sync::Mutex<Vec<AiEvent>>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events in emission order.
    pub fn events(&self) -> Vec<AiEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmitAiEvent for CollectingEmitter {
    fn emit(&self, event: AiEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
