//! Span port implementations for Cogni.
//!
//! - [`InMemorySpanPort`] keeps [`SpanRecord`]s for inspection
//! - [`TracingSpanPort`] turns span boundaries into `tracing` events

pub mod memory;
pub mod model;
pub mod tracing_port;

pub use memory::InMemorySpanPort;
pub use model::SpanRecord;
pub use tracing_port::TracingSpanPort;
