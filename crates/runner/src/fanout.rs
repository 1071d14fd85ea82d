//! Event fan-out with role-based filtering at the subscription boundary.
//!
//! Emitters publish every event; each subscriber only sees what its role
//! admits. In particular a UI subscriber can never observe `usage_report`,
//! whatever the emitter does.

use cogni_core::event::{AiEvent, EmitAiEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// What a subscriber is for, and therefore what it may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriberRole {
    /// User-facing stream. Everything except `usage_report`.
    Ui,
    /// Usage accounting. Only `usage_report`.
    Billing,
    /// History storage. Everything except `status` and `text_delta`.
    Persistence,
    /// Unfiltered.
    Observer,
}

impl SubscriberRole {
    pub fn accepts(&self, event: &AiEvent) -> bool {
        match self {
            Self::Ui => !matches!(event, AiEvent::UsageReport { .. }),
            Self::Billing => matches!(event, AiEvent::UsageReport { .. }),
            Self::Persistence => {
                !matches!(event, AiEvent::Status { .. } | AiEvent::TextDelta { .. })
            }
            Self::Observer => true,
        }
    }
}

/// Dispatches each event synchronously to every accepting subscriber, in
/// registration order.
#[derive(Default)]
pub struct EventFanout {
    subscribers: Vec<(SubscriberRole, Arc<dyn EmitAiEvent>)>,
}

impl EventFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(mut self, role: SubscriberRole, sink: Arc<dyn EmitAiEvent>) -> Self {
        self.subscribers.push((role, sink));
        self
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl EmitAiEvent for EventFanout {
    fn emit(&self, event: AiEvent) {
        for (role, sink) in &self.subscribers {
            if role.accepts(&event) {
                sink.emit(event.clone());
            }
        }
    }
}

impl std::fmt::Debug for EventFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let roles: Vec<_> = self.subscribers.iter().map(|(role, _)| role).collect();
        f.debug_struct("EventFanout").field("roles", &roles).finish()
    }
}

/// Sink that forwards events into a tokio channel for async consumers.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<AiEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AiEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EmitAiEvent for ChannelSink {
    fn emit(&self, event: AiEvent) {
        // A dropped receiver means nobody is listening any more.
        if self.sender.send(event).is_err() {
            debug!("Event receiver closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogni_core::event::{CollectingEmitter, StatusPhase};
    use cogni_core::usage::{ExecutorType, UsageFact};
    use serde_json::json;

    fn usage_event() -> AiEvent {
        AiEvent::UsageReport {
            fact: UsageFact {
                run_id: "run-1".into(),
                attempt: 0,
                usage_unit_id: Some("gen-1".into()),
                source: "cogni".into(),
                executor_type: ExecutorType::Inproc,
                billing_account_id: "acct-1".into(),
                virtual_key_id: "vk-1".into(),
                graph_id: "langgraph:poet".into(),
                provider: None,
                model: None,
                input_tokens: Some(10),
                output_tokens: Some(5),
                cache_read_tokens: None,
                cache_write_tokens: None,
                cost_usd: Some(0.001),
                usage_raw: None,
            },
        }
    }

    fn sample_stream() -> Vec<AiEvent> {
        vec![
            AiEvent::Status {
                phase: StatusPhase::ToolUse,
                label: Some("core__get_time".into()),
            },
            AiEvent::TextDelta { delta: "hi".into() },
            AiEvent::ToolCallStart {
                tool_call_id: "abc".into(),
                tool_name: "core__get_time".into(),
                args: json!({}),
            },
            usage_event(),
            AiEvent::AssistantFinal {
                content: "hi".into(),
            },
            AiEvent::Done,
        ]
    }

    #[test]
    fn roles_filter_at_the_boundary() {
        let ui = Arc::new(CollectingEmitter::new());
        let billing = Arc::new(CollectingEmitter::new());
        let persistence = Arc::new(CollectingEmitter::new());
        let observer = Arc::new(CollectingEmitter::new());

        let fanout = EventFanout::new()
            .subscribe(SubscriberRole::Ui, ui.clone())
            .subscribe(SubscriberRole::Billing, billing.clone())
            .subscribe(SubscriberRole::Persistence, persistence.clone())
            .subscribe(SubscriberRole::Observer, observer.clone());
        assert_eq!(fanout.subscriber_count(), 4);

        for event in sample_stream() {
            fanout.emit(event);
        }

        assert!(
            ui.events()
                .iter()
                .all(|e| !matches!(e, AiEvent::UsageReport { .. }))
        );
        assert_eq!(ui.len(), 5);

        assert_eq!(billing.len(), 1);
        assert_eq!(billing.events()[0].event_type(), "usage_report");

        let persisted: Vec<_> = persistence.events().iter().map(AiEvent::event_type).collect();
        assert_eq!(
            persisted,
            vec!["tool_call_start", "usage_report", "assistant_final", "done"]
        );

        assert_eq!(observer.len(), 6);
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.emit(AiEvent::TextDelta { delta: "a".into() });
        sink.emit(AiEvent::Done);
        assert_eq!(rx.recv().await, Some(AiEvent::TextDelta { delta: "a".into() }));
        assert_eq!(rx.recv().await, Some(AiEvent::Done));
    }

    #[test]
    fn channel_sink_tolerates_closed_receiver() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.emit(AiEvent::Done);
    }
}
