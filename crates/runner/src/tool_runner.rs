//! The tool runner: the single pipeline every tool invocation goes through.
//!
//! ```text
//! LOOKUP → POLICY_CHECK → VALIDATE_INPUT → EMIT_START → EXECUTE
//!        → VALIDATE_OUTPUT → REDACT → EMIT_RESULT → RETURN
//! ```
//!
//! Nothing retries. Every failure ends the invocation with exactly one
//! `tool_call_result { isError: true }` event and a [`ToolResult::Err`];
//! errors never escape to the caller.

use crate::call_id::resolve_tool_call_id;
use cogni_core::capability::Capabilities;
use cogni_core::error::{AbortError, AiExecutionErrorCode, ToolError, ToolErrorCode};
use cogni_core::event::{AiEvent, EmitAiEvent};
use cogni_core::normalize::normalize_error_to_execution_code;
use cogni_core::span::{ActiveSpan, ScrubFn, SpanEnd, SpanLevel, SpanPort, SpanStart};
use cogni_core::tool::{
    BoundToolRuntime, ToolEffect, ToolInvocationContext, ToolPolicy, ToolPolicyContext,
    ToolPolicyDecision, ToolResult, ToolSourcePort, ToolSpec,
};
use cogni_security::DENY_ALL_POLICY;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message returned when a redactor fails. Never carries the cause.
pub const REDACTION_FAILED_MESSAGE: &str = "Internal error processing tool result";

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct ToolRunOptions {
    /// Run this call belongs to. A fresh UUID when absent.
    pub run_id: Option<String>,
    /// ID assigned by the model. Reused verbatim when non-empty.
    pub model_tool_call_id: Option<String>,
    /// Connection reference for tools that act on a user's account.
    pub connection_id: Option<String>,
    /// Fired to abandon the call while it executes.
    pub abort: Option<CancellationToken>,
}

impl ToolRunOptions {
    pub fn for_run(run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            ..Default::default()
        }
    }

    pub fn with_tool_call_id(mut self, id: impl Into<String>) -> Self {
        self.model_tool_call_id = Some(id.into());
        self
    }

    pub fn with_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }

    pub fn with_abort(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }
}

/// Executes tool calls against a tool source under a policy.
///
/// Shared by reference across concurrent invocations; holds no mutable
/// state.
pub struct ToolRunner {
    source: Arc<dyn ToolSourcePort>,
    emit: Arc<dyn EmitAiEvent>,
    /// `None` means deny everything.
    policy: Option<Arc<dyn ToolPolicy>>,
    span_port: Option<Arc<dyn SpanPort>>,
    capabilities: Capabilities,
    scrub_input: Option<Arc<ScrubFn>>,
    scrub_output: Option<Arc<ScrubFn>>,
}

impl ToolRunner {
    /// A runner with no policy. Every call is denied until one is set.
    pub fn new(source: Arc<dyn ToolSourcePort>, emit: Arc<dyn EmitAiEvent>) -> Self {
        Self {
            source,
            emit,
            policy: None,
            span_port: None,
            capabilities: Capabilities::new(),
            scrub_input: None,
            scrub_output: None,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ToolPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_span_port(mut self, span_port: Arc<dyn SpanPort>) -> Self {
        self.span_port = Some(span_port);
        self
    }

    /// Capability bag passed through to every tool untouched.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Opt in to recording tool arguments on spans.
    pub fn with_input_scrubber<F>(mut self, scrub: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.scrub_input = Some(Arc::new(scrub));
        self
    }

    /// Opt in to recording redacted results on spans.
    pub fn with_output_scrubber<F>(mut self, scrub: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.scrub_output = Some(Arc::new(scrub));
        self
    }

    fn policy(&self) -> &dyn ToolPolicy {
        match &self.policy {
            Some(policy) => policy.as_ref(),
            None => &DENY_ALL_POLICY,
        }
    }

    /// Every spec the source knows, regardless of policy.
    pub fn tool_specs(&self) -> &[ToolSpec] {
        self.source.list_tool_specs()
    }

    /// Specs the policy would let run outright.
    pub fn permitted_tool_specs(&self, run_id: &str) -> Vec<&ToolSpec> {
        let ctx = ToolPolicyContext {
            run_id: run_id.to_string(),
        };
        self.source
            .list_tool_specs()
            .iter()
            .filter(|spec| {
                self.policy().decide(&ctx, &spec.name, spec.effect) == ToolPolicyDecision::Allow
            })
            .collect()
    }

    /// Run a tool with already-parsed arguments.
    pub async fn exec(&self, tool_name: &str, args: Value, options: ToolRunOptions) -> ToolResult {
        self.run(tool_name, RawArgs::Parsed(args), options).await
    }

    /// Run a tool with arguments as the model produced them (JSON text).
    pub async fn exec_json(
        &self,
        tool_name: &str,
        raw_args: &str,
        options: ToolRunOptions,
    ) -> ToolResult {
        self.run(tool_name, RawArgs::Text(raw_args), options).await
    }

    async fn run(&self, tool_name: &str, args: RawArgs<'_>, options: ToolRunOptions) -> ToolResult {
        let call = CallState {
            run_id: options
                .run_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            tool_call_id: resolve_tool_call_id(options.model_tool_call_id.as_deref()),
            tool_name: tool_name.to_string(),
        };

        let mut notes = SpanNotes::default();
        let span = self.open_span(&call, &args, &mut notes);

        let outcome = self.pipeline(&call, args, &options).await;

        match outcome {
            Ok(redacted) => {
                info!(
                    tool_id = %call.tool_name,
                    tool_call_id = %call.tool_call_id,
                    "Tool call succeeded"
                );
                self.emit.emit(AiEvent::ToolCallResult {
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    result: redacted.clone(),
                    is_error: None,
                });
                let output = self.scrub(self.scrub_output.as_deref(), &redacted, || {
                    notes.output_scrub_failed = true;
                });
                self.close_span(span, output, None, notes);
                ToolResult::Ok { value: redacted }
            }
            Err(failure) => {
                warn!(
                    tool_id = %call.tool_name,
                    tool_call_id = %call.tool_call_id,
                    error_code = %failure.code,
                    cause = failure.cause.map(|c| c.as_str()).unwrap_or("none"),
                    "Tool call failed"
                );
                self.emit.emit(AiEvent::ToolCallResult {
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    result: json!({
                        "error": failure.safe_message,
                        "errorCode": failure.code,
                    }),
                    is_error: Some(true),
                });
                self.close_span(span, None, Some(&failure), notes);
                ToolResult::err(failure.code, failure.safe_message)
            }
        }
    }

    async fn pipeline(
        &self,
        call: &CallState,
        args: RawArgs<'_>,
        options: &ToolRunOptions,
    ) -> Result<Value, Failure> {
        let policy = self.policy();
        let policy_ctx = ToolPolicyContext {
            run_id: call.run_id.clone(),
        };

        // LOOKUP + POLICY_CHECK
        let Some(tool) = self.source.get_bound_tool(&call.tool_name) else {
            // Unknown tools are checked with the most restrictive effect so
            // that an unlisted name reads as denied, not missing.
            let decision =
                policy.decide(&policy_ctx, &call.tool_name, ToolEffect::ExternalSideEffect);
            return Err(match decision {
                ToolPolicyDecision::Deny => Failure::denied(&call.tool_name),
                ToolPolicyDecision::Allow | ToolPolicyDecision::RequireApproval => Failure::new(
                    ToolErrorCode::Unavailable,
                    format!("Tool '{}' is not available", call.tool_name),
                ),
            });
        };

        match policy.decide(&policy_ctx, tool.id(), tool.effect()) {
            ToolPolicyDecision::Allow => {}
            ToolPolicyDecision::Deny => return Err(Failure::denied(tool.id())),
            // No approval flow exists yet; treat as denied.
            ToolPolicyDecision::RequireApproval => {
                debug!(tool_id = %tool.id(), "Tool requires approval, denying");
                return Err(Failure::new(
                    ToolErrorCode::PolicyDenied,
                    format!("Tool '{}' requires approval", tool.id()),
                ));
            }
        }

        if tool.requires_connection() && options.connection_id.is_none() {
            return Err(Failure::new(
                ToolErrorCode::Unavailable,
                format!("Tool '{}' requires a connection", tool.id()),
            ));
        }

        // VALIDATE_INPUT
        let raw = match args {
            RawArgs::Parsed(value) => value,
            RawArgs::Text(text) => serde_json::from_str::<Value>(text).map_err(|e| {
                debug!(tool_id = %tool.id(), error = %e, "Tool arguments are not valid JSON");
                Failure::new(ToolErrorCode::InvalidJson, "Tool arguments are not valid JSON")
            })?,
        };
        let validated = tool.validate_input(&raw).map_err(|e| {
            Failure::from_tool_error(ToolErrorCode::Validation, "Invalid tool input", &e)
        })?;

        // EMIT_START
        self.emit.emit(AiEvent::ToolCallStart {
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            args: validated.clone(),
        });

        // EXECUTE
        let budgets = policy.budgets();
        let ctx = ToolInvocationContext {
            run_id: call.run_id.clone(),
            tool_call_id: call.tool_call_id.clone(),
            connection_id: options.connection_id.clone(),
        };
        let output = self
            .execute(tool.as_ref(), validated, &ctx, budgets.max_runtime_ms, options.abort.as_ref())
            .await?;

        // VALIDATE_OUTPUT
        let output = tool.validate_output(&output).map_err(|e| {
            Failure::from_tool_error(ToolErrorCode::Validation, "Invalid tool output", &e)
        })?;

        // REDACT
        let redacted = tool.redact(&output).map_err(|e| {
            warn!(tool_id = %tool.id(), error = %e, "Redaction failed");
            Failure::new(ToolErrorCode::RedactionFailed, REDACTION_FAILED_MESSAGE)
                .with_cause(normalize_error_to_execution_code(&e))
        })?;

        if let Some(limit) = budgets.max_result_bytes {
            let size = serde_json::to_vec(&redacted).map(|b| b.len()).unwrap_or(usize::MAX);
            if size > limit {
                debug!(tool_id = %tool.id(), size, limit, "Tool result over size budget");
                return Err(Failure::new(
                    ToolErrorCode::Execution,
                    "Tool result exceeds the size limit",
                ));
            }
        }

        Ok(redacted)
    }

    async fn execute(
        &self,
        tool: &dyn BoundToolRuntime,
        args: Value,
        ctx: &ToolInvocationContext,
        max_runtime_ms: Option<u64>,
        abort: Option<&CancellationToken>,
    ) -> Result<Value, Failure> {
        let exec = tool.exec(args, ctx, &self.capabilities);
        let guarded = async {
            match abort {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ToolError::Aborted(AbortError::new("tool call cancelled"))),
                    out = exec => out,
                },
                None => exec.await,
            }
        };

        let result = match max_runtime_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), guarded).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(Failure::new(
                        ToolErrorCode::Timeout,
                        format!("Tool execution timed out after {ms}ms"),
                    )
                    .with_cause(AiExecutionErrorCode::Timeout));
                }
            },
            None => guarded.await,
        };

        result.map_err(|e| {
            Failure::from_tool_error(ToolErrorCode::Execution, "Tool execution failed", &e)
        })
    }

    fn open_span(
        &self,
        call: &CallState,
        args: &RawArgs<'_>,
        notes: &mut SpanNotes,
    ) -> Option<Box<dyn ActiveSpan>> {
        let port = self.span_port.as_ref()?;

        let input = match (&self.scrub_input, args) {
            (Some(_), RawArgs::Parsed(value)) => self.scrub(self.scrub_input.as_deref(), value, || {
                notes.input_scrub_failed = true;
            }),
            (Some(_), RawArgs::Text(text)) => match serde_json::from_str::<Value>(text) {
                Ok(value) => self.scrub(self.scrub_input.as_deref(), &value, || {
                    notes.input_scrub_failed = true;
                }),
                Err(_) => None,
            },
            (None, _) => None,
        };

        let mut metadata = Map::new();
        metadata.insert("toolId".into(), json!(call.tool_name));
        metadata.insert("toolCallId".into(), json!(call.tool_call_id));

        Some(port.start_span(SpanStart {
            trace_id: call.run_id.clone(),
            name: format!("tool:{}", call.tool_name),
            input,
            metadata,
        }))
    }

    fn close_span(
        &self,
        span: Option<Box<dyn ActiveSpan>>,
        output: Option<Value>,
        failure: Option<&Failure>,
        notes: SpanNotes,
    ) {
        let Some(span) = span else {
            return;
        };

        let mut metadata = Map::new();
        if notes.input_scrub_failed {
            metadata.insert("inputScrubFailed".into(), Value::Bool(true));
        }
        if notes.output_scrub_failed {
            metadata.insert("outputScrubFailed".into(), Value::Bool(true));
        }

        let (level, status_message) = match failure {
            None => (SpanLevel::Default, None),
            Some(failure) => {
                metadata.insert("errorCode".into(), json!(failure.code));
                if let Some(cause) = failure.cause {
                    metadata.insert("executionCode".into(), json!(cause));
                }
                let level = match failure.code {
                    ToolErrorCode::PolicyDenied | ToolErrorCode::Unavailable => SpanLevel::Warning,
                    _ => SpanLevel::Error,
                };
                (level, Some(failure.code.as_str().to_string()))
            }
        };

        span.end(SpanEnd {
            output,
            level,
            status_message,
            metadata,
        });
    }

    /// Run an opt-in scrub hook. A failing hook records nothing.
    fn scrub(
        &self,
        hook: Option<&ScrubFn>,
        value: &Value,
        on_failure: impl FnOnce(),
    ) -> Option<Value> {
        let hook = hook?;
        match hook(value) {
            Ok(scrubbed) => Some(scrubbed),
            Err(e) => {
                debug!(error = %e, "Span scrub hook failed");
                on_failure();
                None
            }
        }
    }
}

impl std::fmt::Debug for ToolRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRunner")
            .field("tools", &self.source.list_tool_specs().len())
            .field("has_policy", &self.policy.is_some())
            .field("has_span_port", &self.span_port.is_some())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

enum RawArgs<'a> {
    Parsed(Value),
    Text(&'a str),
}

struct CallState {
    run_id: String,
    tool_call_id: String,
    tool_name: String,
}

#[derive(Default)]
struct SpanNotes {
    input_scrub_failed: bool,
    output_scrub_failed: bool,
}

/// A terminal pipeline failure.
#[derive(Debug)]
struct Failure {
    code: ToolErrorCode,
    safe_message: String,
    /// Normalized code of the underlying error, for logs and spans.
    cause: Option<AiExecutionErrorCode>,
}

impl Failure {
    fn new(code: ToolErrorCode, safe_message: impl Into<String>) -> Self {
        Self {
            code,
            safe_message: safe_message.into(),
            cause: None,
        }
    }

    fn denied(tool_id: &str) -> Self {
        Self::new(
            ToolErrorCode::PolicyDenied,
            format!("Tool '{tool_id}' is not permitted"),
        )
    }

    /// Messages a tool author wrote are shown as-is. Errors that wrap
    /// provider or cancellation details get `fallback`.
    fn from_tool_error(code: ToolErrorCode, fallback: &str, err: &ToolError) -> Self {
        let safe_message = match err {
            ToolError::Validation(msg) | ToolError::Execution(msg) => msg.clone(),
            ToolError::MissingCapability(_) => err.to_string(),
            ToolError::Redaction(_)
            | ToolError::Aborted(_)
            | ToolError::Llm(_)
            | ToolError::Typed(_) => fallback.to_string(),
        };
        Self::new(code, safe_message).with_cause(normalize_error_to_execution_code(err))
    }

    fn with_cause(mut self, cause: AiExecutionErrorCode) -> Self {
        self.cause = Some(cause);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogni_core::event::CollectingEmitter;
    use cogni_security::AllowlistPolicy;
    use cogni_tools::{StaticToolSource, ToolContract};

    fn echo_source() -> Arc<StaticToolSource> {
        let echo = ToolContract::<Value, Value>::new("core", "echo", "Echo", ToolEffect::ReadOnly)
            .output_allowlist(["msg"])
            .bind(|input, _ctx, _caps| async move { Ok(input) })
            .into_runtime();
        Arc::new(StaticToolSource::new([echo]).unwrap())
    }

    #[test]
    fn options_builder() {
        let opts = ToolRunOptions::for_run("run-1")
            .with_tool_call_id("call_1")
            .with_connection("conn-9");
        assert_eq!(opts.run_id.as_deref(), Some("run-1"));
        assert_eq!(opts.model_tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(opts.connection_id.as_deref(), Some("conn-9"));
        assert!(opts.abort.is_none());
    }

    #[tokio::test]
    async fn default_runner_denies() {
        let events = Arc::new(CollectingEmitter::new());
        let runner = ToolRunner::new(echo_source(), events.clone());
        let result = runner
            .exec("core__echo", json!({"msg": "hi"}), ToolRunOptions::default())
            .await;
        assert_eq!(result.error_code(), Some(ToolErrorCode::PolicyDenied));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn permitted_specs_follow_policy() {
        let runner = ToolRunner::new(echo_source(), Arc::new(CollectingEmitter::new()));
        assert_eq!(runner.tool_specs().len(), 1);
        assert!(runner.permitted_tool_specs("run-1").is_empty());

        let runner = runner.with_policy(Arc::new(AllowlistPolicy::new(["core__echo"])));
        assert_eq!(runner.permitted_tool_specs("run-1").len(), 1);
    }

    #[tokio::test]
    async fn unknown_listed_tool_is_unavailable() {
        let events = Arc::new(CollectingEmitter::new());
        let runner = ToolRunner::new(echo_source(), events.clone())
            .with_policy(Arc::new(AllowlistPolicy::new(["core__ghost"])));
        let result = runner
            .exec("core__ghost", json!({}), ToolRunOptions::default())
            .await;
        assert_eq!(result.error_code(), Some(ToolErrorCode::Unavailable));
        match &events.events()[0] {
            AiEvent::ToolCallResult { result, is_error, .. } => {
                assert_eq!(*is_error, Some(true));
                assert_eq!(result["errorCode"], "unavailable");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
