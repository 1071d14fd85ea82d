//! Data model for recorded spans.

use chrono::{DateTime, Utc};
use cogni_core::span::{SpanEnd, SpanLevel, SpanStart};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single traced unit of work, open or finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Unique identifier.
    pub id: String,
    /// Trace this span belongs to (the run ID for tool spans).
    pub trace_id: String,
    /// Human-readable label (e.g. `tool:core__get_time`).
    pub name: String,
    /// When the span started.
    pub started_at: DateTime<Utc>,
    /// When the span ended (None if still running).
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds (computed on end).
    pub duration_ms: Option<u64>,
    /// Scrubbed input, if recorded.
    pub input: Option<serde_json::Value>,
    /// Scrubbed output, if recorded.
    pub output: Option<serde_json::Value>,
    /// Severity (set on end).
    pub level: Option<SpanLevel>,
    pub status_message: Option<String>,
    /// Start metadata merged with end metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SpanRecord {
    /// Open a record from start parameters.
    pub fn open(start: SpanStart) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trace_id: start.trace_id,
            name: start.name,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input: start.input,
            output: None,
            level: None,
            status_message: None,
            metadata: start.metadata,
        }
    }

    /// Close the record. End metadata overrides start metadata on key clash.
    pub fn finish(&mut self, end: SpanEnd) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.output = end.output;
        self.level = Some(end.level);
        self.status_message = end.status_message;
        self.metadata.extend(end.metadata);
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Look up a boolean metadata flag; absent counts as false.
    pub fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn start() -> SpanStart {
        let mut metadata = Map::new();
        metadata.insert("toolId".into(), json!("core__get_time"));
        SpanStart {
            trace_id: "run-1".into(),
            name: "tool:core__get_time".into(),
            input: None,
            metadata,
        }
    }

    #[test]
    fn open_then_finish() {
        let mut record = SpanRecord::open(start());
        assert!(record.is_open());
        assert!(!record.id.is_empty());

        let mut metadata = Map::new();
        metadata.insert("outputScrubFailed".into(), json!(true));
        record.finish(SpanEnd {
            output: Some(json!({"ok": true})),
            level: SpanLevel::Default,
            status_message: None,
            metadata,
        });

        assert!(!record.is_open());
        assert!(record.duration_ms.is_some());
        assert_eq!(record.level, Some(SpanLevel::Default));
        assert_eq!(record.metadata["toolId"], "core__get_time");
        assert!(record.flag("outputScrubFailed"));
        assert!(!record.flag("inputScrubFailed"));
    }

    #[test]
    fn serializes_level_in_snake_case() {
        let mut record = SpanRecord::open(start());
        record.finish(SpanEnd {
            output: None,
            level: SpanLevel::Warning,
            status_message: Some("denied".into()),
            metadata: Map::new(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["status_message"], "denied");
    }
}
