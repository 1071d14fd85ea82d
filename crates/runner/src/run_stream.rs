//! Run-level event ordering.
//!
//! A [`RunEmitter`] sits between the producers of one run (tool runner,
//! LLM adapter, executor) and the caller's sink, and enforces the stream
//! shape:
//!
//! ```text
//! (text_delta | tool_call_start | tool_call_result | status | usage_report)*
//!     → assistant_final → (done | error → done)
//! ```
//!
//! The rules hold no matter how a producer reaches the emitter. A raw
//! `error` is followed by `done` at once, a raw `done` is preceded by the
//! pending `assistant_final`, and events arriving after `done` are dropped
//! with a warning.
//!
//! Admitted events are queued under the state lock and handed to the sink
//! outside it, in admission order. A sink may therefore emit back into the
//! same emitter; its events are delivered after the one being handled.

use cogni_core::error::AiExecutionErrorCode;
use cogni_core::event::{AiEvent, EmitAiEvent, StatusPhase};
use cogni_core::normalize::normalize_error_to_execution_code;
use cogni_core::tool::is_valid_tool_id;
use cogni_core::usage::UsageFact;
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct RunState {
    /// Concatenated text deltas, used for `assistant_final`.
    text: String,
    final_emitted: bool,
    failed: bool,
    done: bool,
    /// Admitted events not yet handed to the sink.
    pending: VecDeque<AiEvent>,
    draining: bool,
}

impl RunState {
    fn admit(&mut self, run_id: &str, event: AiEvent) {
        if self.done {
            warn!(run_id = %run_id, event = event.event_type(), "Dropping event after done");
            return;
        }

        match event {
            AiEvent::TextDelta { delta } => {
                self.text.push_str(&delta);
                self.pending.push_back(AiEvent::TextDelta { delta });
            }
            AiEvent::AssistantFinal { content } => {
                if self.final_emitted {
                    warn!(run_id = %run_id, "Dropping duplicate assistant_final");
                    return;
                }
                self.final_emitted = true;
                self.pending.push_back(AiEvent::AssistantFinal { content });
            }
            AiEvent::Status { phase, label } => {
                let label = label.filter(|label| {
                    let ok = is_valid_tool_id(label);
                    if !ok {
                        debug!(run_id = %run_id, "Stripping status label that is not a tool ID");
                    }
                    ok
                });
                self.pending.push_back(AiEvent::Status { phase, label });
            }
            AiEvent::Error { error } => {
                self.push_pending_final();
                self.failed = true;
                self.done = true;
                self.pending.push_back(AiEvent::Error { error });
                self.pending.push_back(AiEvent::Done);
            }
            AiEvent::Done => {
                self.push_pending_final();
                self.done = true;
                self.pending.push_back(AiEvent::Done);
            }
            other => self.pending.push_back(other),
        }
    }

    fn push_pending_final(&mut self) {
        if !self.final_emitted {
            self.final_emitted = true;
            let content = std::mem::take(&mut self.text);
            self.pending.push_back(AiEvent::AssistantFinal { content });
        }
    }
}

/// Ordering guard for the events of one run.
pub struct RunEmitter {
    run_id: String,
    sink: Arc<dyn EmitAiEvent>,
    state: Mutex<RunState>,
}

impl RunEmitter {
    pub fn new(run_id: impl Into<String>, sink: Arc<dyn EmitAiEvent>) -> Self {
        Self {
            run_id: run_id.into(),
            sink,
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn text_delta(&self, delta: impl Into<String>) {
        self.emit(AiEvent::TextDelta {
            delta: delta.into(),
        });
    }

    /// `label` must be a namespaced tool ID; anything else is stripped.
    pub fn status(&self, phase: StatusPhase, label: Option<&str>) {
        self.emit(AiEvent::Status {
            phase,
            label: label.map(str::to_string),
        });
    }

    pub fn usage(&self, fact: UsageFact) {
        self.emit(AiEvent::UsageReport { fact });
    }

    /// Emit the final response content. Only the first call has effect.
    pub fn assistant_final(&self, content: impl Into<String>) {
        self.emit(AiEvent::AssistantFinal {
            content: content.into(),
        });
    }

    /// End the run with an error code: pending `assistant_final`, `error`,
    /// `done`.
    pub fn fail(&self, code: AiExecutionErrorCode) {
        self.emit(AiEvent::Error { error: code });
    }

    /// Normalize `err` and end the run with the resulting code.
    pub fn fail_with(&self, err: &(dyn StdError + 'static)) {
        let code = normalize_error_to_execution_code(err);
        debug!(run_id = %self.run_id, error = %err, code = %code, "Run failed");
        self.fail(code);
    }

    /// End the run successfully: `assistant_final` (unless already sent)
    /// then `done`.
    pub fn complete(&self) {
        self.emit(AiEvent::Done);
    }

    /// Whether the terminal `done` has been admitted.
    pub fn is_finished(&self) -> bool {
        self.lock().done
    }

    /// Whether the run ended with an `error` event.
    pub fn has_failed(&self) -> bool {
        self.lock().failed
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EmitAiEvent for RunEmitter {
    fn emit(&self, event: AiEvent) {
        {
            let mut state = self.lock();
            state.admit(&self.run_id, event);
            // Another call (or an outer frame of this one) is delivering.
            if state.draining {
                return;
            }
            state.draining = true;
        }

        let _reset = DrainReset(self);
        loop {
            let next = {
                let mut state = self.lock();
                let next = state.pending.pop_front();
                if next.is_none() {
                    state.draining = false;
                }
                next
            };
            match next {
                Some(event) => self.sink.emit(event),
                None => return,
            }
        }
    }
}

/// Releases the drain flag if the sink panics mid-delivery.
struct DrainReset<'a>(&'a RunEmitter);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

impl std::fmt::Debug for RunEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEmitter")
            .field("run_id", &self.run_id)
            .field("state", &*self.lock())
            .finish()
    }
}
