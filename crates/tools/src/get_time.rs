//! `core__get_time` — report the current time from the clock capability.
//!
//! The tool never reads the system clock directly, so tests inject a fixed
//! clock through [`Capabilities::with_clock`].

use crate::contract::{BoundTool, ToolContract};
use cogni_core::capability::{self, Capabilities};
use cogni_core::error::ToolError;
use cogni_core::tool::{ToolEffect, ToolInvocationContext};
use serde::{Deserialize, Serialize};

pub const NAMESPACE: &str = "core";
pub const NAME: &str = "get_time";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetTimeInput {}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTimeOutput {
    /// RFC 3339 timestamp in UTC.
    pub current_time: String,
    #[serde(default)]
    pub unix_millis: i64,
}

pub fn get_time_tool() -> BoundTool {
    ToolContract::<GetTimeInput, GetTimeOutput>::new(
        NAMESPACE,
        NAME,
        "Get the current date and time in UTC (ISO 8601).",
        ToolEffect::ReadOnly,
    )
    .input_schema(serde_json::json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    }))
    .output_allowlist(["currentTime"])
    .capability(capability::CLOCK)
    .bind(get_time)
}

async fn get_time(
    _input: GetTimeInput,
    _ctx: ToolInvocationContext,
    caps: Capabilities,
) -> Result<GetTimeOutput, ToolError> {
    let clock = caps
        .clock()
        .ok_or_else(|| ToolError::MissingCapability(capability::CLOCK.into()))?;
    let now = clock.now();
    Ok(GetTimeOutput {
        current_time: now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        unix_millis: now.timestamp_millis(),
    })
}
