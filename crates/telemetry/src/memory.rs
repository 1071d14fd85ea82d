//! In-memory span port. Keeps every span so tests and the CLI can
//! inspect what a run recorded.

use crate::model::SpanRecord;
use cogni_core::span::{ActiveSpan, SpanEnd, SpanPort, SpanStart};
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe span store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpanPort {
    records: Arc<RwLock<Vec<SpanRecord>>>,
}

impl InMemorySpanPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all spans, open and finished, in start order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Spans belonging to one trace.
    pub fn spans_for_trace(&self, trace_id: &str) -> Vec<SpanRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.trace_id == trace_id)
            .cloned()
            .collect()
    }

    /// Number of spans not yet ended.
    pub fn open_count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.is_open())
            .count()
    }

    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl SpanPort for InMemorySpanPort {
    fn start_span(&self, start: SpanStart) -> Box<dyn ActiveSpan> {
        let record = SpanRecord::open(start);
        let id = record.id.clone();
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Box::new(InMemorySpan {
            id,
            records: Arc::clone(&self.records),
        })
    }
}

struct InMemorySpan {
    id: String,
    records: Arc<RwLock<Vec<SpanRecord>>>,
}

impl ActiveSpan for InMemorySpan {
    fn span_id(&self) -> &str {
        &self.id
    }

    fn end(self: Box<Self>, end: SpanEnd) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = records.iter_mut().find(|r| r.id == self.id) {
            record.finish(end);
        }
    }
}
