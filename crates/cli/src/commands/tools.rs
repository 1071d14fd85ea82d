//! `cogni tools` — list and run tools through the tool runner.

use cogni_config::AppConfig;
use cogni_core::capability::{Capabilities, SystemClock};
use cogni_core::event::{AiEvent, EmitAiEvent};
use cogni_core::tool::ToolResult;
use cogni_runner::{EventFanout, RunEmitter, SubscriberRole, ToolRunOptions, ToolRunner};
use cogni_security::AllowlistPolicy;
use cogni_telemetry::TracingSpanPort;
use std::sync::Arc;
use tracing::warn;

/// Arguments of `cogni tools run`.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub tool: String,
    pub args: String,
    pub call_id: Option<String>,
    pub run_id: Option<String>,
    pub connection: Option<String>,
}

/// Assemble a runner from config: built-in tools, allowlist policy,
/// system clock, and log-backed spans when enabled.
pub fn build_runner(
    config: &AppConfig,
    emit: Arc<dyn EmitAiEvent>,
) -> Result<ToolRunner, Box<dyn std::error::Error>> {
    let source = cogni_tools::default_source()?;
    let policy = AllowlistPolicy::from_config(&config.tools);
    let capabilities = Capabilities::new().with_clock(Arc::new(SystemClock));

    let mut runner = ToolRunner::new(Arc::new(source), emit)
        .with_policy(Arc::new(policy))
        .with_capabilities(capabilities);
    if config.telemetry.spans_enabled {
        runner = runner.with_span_port(Arc::new(TracingSpanPort::new()));
    }
    Ok(runner)
}

pub fn list(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runner = build_runner(config, Arc::new(cogni_core::event::NoopEmitter))?;
    let permitted: Vec<String> = runner
        .permitted_tool_specs("cli")
        .iter()
        .map(|spec| spec.name.clone())
        .collect();

    println!("Tools:");
    for spec in runner.tool_specs() {
        let status = if permitted.contains(&spec.name) {
            "allowed"
        } else {
            "denied"
        };
        println!(
            "  {:<24} {:<20} {:<8} {}",
            spec.name,
            spec.effect.to_string(),
            status,
            spec.description
        );
    }

    if permitted.is_empty() {
        println!();
        println!("No tools are allowed. Add IDs to [tools].allowed_tools or set COGNI_ALLOWED_TOOLS.");
    }
    Ok(())
}

pub async fn run(config: &AppConfig, request: RunRequest) -> Result<(), Box<dyn std::error::Error>> {
    let printer = |event: AiEvent| match serde_json::to_string(&event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "Failed to serialize event"),
    };
    let fanout = EventFanout::new().subscribe(SubscriberRole::Ui, Arc::new(printer));

    let run_id = request
        .run_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let stream = Arc::new(RunEmitter::new(run_id.clone(), Arc::new(fanout)));
    let runner = build_runner(config, stream.clone())?;

    let mut options = ToolRunOptions::for_run(run_id);
    options.model_tool_call_id = request.call_id;
    options.connection_id = request.connection;

    let result = runner.exec_json(&request.tool, &request.args, options).await;
    stream.complete();

    match result {
        ToolResult::Ok { .. } => Ok(()),
        ToolResult::Err {
            error_code,
            safe_message,
        } => Err(format!("{error_code}: {safe_message}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogni_core::error::ToolErrorCode;
    use cogni_core::event::CollectingEmitter;
    use serde_json::Value;

    fn config_allowing(tools: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.tools.allowed_tools = tools.iter().map(|t| t.to_string()).collect();
        config.telemetry.spans_enabled = false;
        config
    }

    #[tokio::test]
    async fn configured_runner_executes_allowed_builtin() {
        let events = Arc::new(CollectingEmitter::new());
        let runner = build_runner(&config_allowing(&["core__get_time"]), events.clone()).unwrap();

        let result = runner
            .exec_json("core__get_time", "{}", ToolRunOptions::for_run("run-cli"))
            .await;

        let value = result.value().cloned().unwrap_or(Value::Null);
        assert!(value["currentTime"].as_str().is_some_and(|t| t.ends_with('Z')));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn default_config_denies_builtins() {
        let events = Arc::new(CollectingEmitter::new());
        let runner = build_runner(&AppConfig::default(), events).unwrap();

        let result = runner
            .exec_json("core__get_time", "{}", ToolRunOptions::default())
            .await;
        assert_eq!(result.error_code(), Some(ToolErrorCode::PolicyDenied));
        assert!(runner.permitted_tool_specs("run").is_empty());
    }
}
