//! Span port backed by `tracing` events.
//!
//! No payloads are logged, only identifiers, level, duration and the
//! metadata keys the runner sets.

use chrono::Utc;
use cogni_core::span::{ActiveSpan, SpanEnd, SpanLevel, SpanPort, SpanStart};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSpanPort;

impl TracingSpanPort {
    pub fn new() -> Self {
        Self
    }
}

impl SpanPort for TracingSpanPort {
    fn start_span(&self, start: SpanStart) -> Box<dyn ActiveSpan> {
        let span = TracingSpan {
            id: Uuid::new_v4().to_string(),
            trace_id: start.trace_id,
            name: start.name,
            started_at: Utc::now(),
        };
        debug!(
            span_id = %span.id,
            trace_id = %span.trace_id,
            name = %span.name,
            "Span started"
        );
        Box::new(span)
    }
}

struct TracingSpan {
    id: String,
    trace_id: String,
    name: String,
    started_at: chrono::DateTime<Utc>,
}

impl ActiveSpan for TracingSpan {
    fn span_id(&self) -> &str {
        &self.id
    }

    fn end(self: Box<Self>, end: SpanEnd) {
        let duration_ms = Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0);
        let status = end.status_message.as_deref().unwrap_or("");
        let metadata = serde_json::Value::Object(end.metadata);

        match end.level {
            SpanLevel::Default => info!(
                span_id = %self.id,
                trace_id = %self.trace_id,
                name = %self.name,
                duration_ms,
                %metadata,
                "Span ended"
            ),
            level => warn!(
                span_id = %self.id,
                trace_id = %self.trace_id,
                name = %self.name,
                level = level.as_str(),
                duration_ms,
                status,
                %metadata,
                "Span ended with problems"
            ),
        }
    }
}
