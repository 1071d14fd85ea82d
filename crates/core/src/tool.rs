//! Tool contracts — the abstraction the tool runner executes against.
//!
//! A bound tool is a schema-agnostic runtime object: the runner sees only
//! JSON values and four methods. How a tool validates its input, and with
//! which library, is the adapter's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::capability::Capabilities;
use crate::error::{ToolError, ToolErrorCode};

/// Separator between namespace and name in a tool ID (`core__get_time`).
pub const TOOL_ID_SEPARATOR: &str = "__";

/// Build a namespaced tool ID.
pub fn namespaced_tool_id(namespace: &str, name: &str) -> String {
    format!("{namespace}{TOOL_ID_SEPARATOR}{name}")
}

/// Check that an ID has the `namespace__name` shape with lowercase
/// alphanumeric/underscore parts. Provider tool-name limits apply (64 chars).
pub fn is_valid_tool_id(id: &str) -> bool {
    let Some((namespace, name)) = id.split_once(TOOL_ID_SEPARATOR) else {
        return false;
    };
    let part_ok = |s: &str| {
        !s.is_empty()
            && !s.starts_with('_')
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    };
    id.len() <= 64 && part_ok(namespace) && part_ok(name)
}

/// Declared side-effect class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEffect {
    ReadOnly,
    StateChange,
    ExternalSideEffect,
}

impl fmt::Display for ToolEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReadOnly => "read_only",
            Self::StateChange => "state_change",
            Self::ExternalSideEffect => "external_side_effect",
        };
        f.write_str(s)
    }
}

/// Result of a policy evaluation. Computed per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPolicyDecision {
    Allow,
    Deny,
    /// Reserved for a human-in-the-loop approval flow. The runner currently
    /// refuses these calls like `Deny`.
    RequireApproval,
}

/// How a tool's output is reduced before it leaves the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionConfig {
    pub mode: RedactionMode,
    /// Top-level keys that survive redaction.
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    TopLevelOnly,
}

impl RedactionConfig {
    pub fn top_level(allowlist: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode: RedactionMode::TopLevelOnly,
            allowlist: allowlist.into_iter().map(Into::into).collect(),
        }
    }
}

/// The model-facing description of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Namespaced tool ID, also the name the model calls.
    pub name: String,
    pub description: String,
    /// JSON Schema of the input arguments.
    pub input_schema: serde_json::Value,
    pub effect: ToolEffect,
    pub redaction: RedactionConfig,
}

/// References handed to a tool at execution time. Never carries secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationContext {
    pub run_id: String,
    pub tool_call_id: String,
    pub connection_id: Option<String>,
}

/// Terminal output of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult<T = serde_json::Value> {
    Ok {
        value: T,
    },
    Err {
        error_code: ToolErrorCode,
        safe_message: String,
    },
}

impl<T> ToolResult<T> {
    pub fn err(error_code: ToolErrorCode, safe_message: impl Into<String>) -> Self {
        Self::Err {
            error_code,
            safe_message: safe_message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ok { value } => Some(value),
            Self::Err { .. } => None,
        }
    }

    pub fn error_code(&self) -> Option<ToolErrorCode> {
        match self {
            Self::Ok { .. } => None,
            Self::Err { error_code, .. } => Some(*error_code),
        }
    }

    pub fn safe_message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Err { safe_message, .. } => Some(safe_message),
        }
    }
}

/// An executable tool, ready for the runner.
///
/// Implementations are created once at composition time and never mutated.
#[async_trait]
pub trait BoundToolRuntime: Send + Sync {
    /// Namespaced tool ID (e.g. `core__get_time`).
    fn id(&self) -> &str;

    fn spec(&self) -> &ToolSpec;

    fn effect(&self) -> ToolEffect {
        self.spec().effect
    }

    /// Whether the tool needs a connection ID to run.
    fn requires_connection(&self) -> bool {
        false
    }

    /// Names of the capabilities the tool reads from the bag.
    fn capabilities(&self) -> &[String] {
        &[]
    }

    /// Check raw model arguments and return the normalized arguments.
    fn validate_input(&self, raw: &serde_json::Value) -> Result<serde_json::Value, ToolError>;

    async fn exec(
        &self,
        args: serde_json::Value,
        ctx: &ToolInvocationContext,
        capabilities: &Capabilities,
    ) -> Result<serde_json::Value, ToolError>;

    fn validate_output(&self, raw: &serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Reduce a validated output to its shareable subset.
    fn redact(&self, output: &serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// Read-only lookup of bound tools.
pub trait ToolSourcePort: Send + Sync {
    fn get_bound_tool(&self, id: &str) -> Option<Arc<dyn BoundToolRuntime>>;

    fn list_tool_specs(&self) -> &[ToolSpec];

    fn has_tool_id(&self, id: &str) -> bool {
        self.get_bound_tool(id).is_some()
    }
}

/// Per-run context a policy may consult.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPolicyContext {
    pub run_id: String,
}

/// Optional runtime limits a policy imposes on execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolBudgets {
    pub max_runtime_ms: Option<u64>,
    pub max_result_bytes: Option<usize>,
}

/// The single enforcement point deciding whether a tool may run.
pub trait ToolPolicy: Send + Sync {
    fn decide(
        &self,
        ctx: &ToolPolicyContext,
        tool_id: &str,
        effect: ToolEffect,
    ) -> ToolPolicyDecision;

    fn budgets(&self) -> ToolBudgets {
        ToolBudgets::default()
    }

    /// Tool IDs the policy explicitly names; used for listing only.
    fn allowed_tools(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_ids() {
        assert_eq!(namespaced_tool_id("core", "get_time"), "core__get_time");
        assert!(is_valid_tool_id("core__get_time"));
        assert!(is_valid_tool_id("metrics__query_v2"));
        assert!(!is_valid_tool_id("get_time"));
        assert!(!is_valid_tool_id("core__"));
        assert!(!is_valid_tool_id("Core__Time"));
        assert!(!is_valid_tool_id("core__get-time"));
        assert!(!is_valid_tool_id(&format!("core__{}", "x".repeat(70))));
    }

    #[test]
    fn tool_result_accessors() {
        let ok: ToolResult = ToolResult::Ok {
            value: serde_json::json!({"msg": "hi"}),
        };
        assert!(ok.is_ok());
        assert_eq!(ok.value().unwrap()["msg"], "hi");
        assert!(ok.error_code().is_none());

        let err: ToolResult = ToolResult::err(ToolErrorCode::Timeout, "took too long");
        assert!(!err.is_ok());
        assert_eq!(err.error_code(), Some(ToolErrorCode::Timeout));
        assert_eq!(err.safe_message(), Some("took too long"));
    }

    #[test]
    fn spec_serializes_camel_case() {
        let spec = ToolSpec {
            name: "core__get_time".into(),
            description: "Current time".into(),
            input_schema: serde_json::json!({"type": "object"}),
            effect: ToolEffect::ReadOnly,
            redaction: RedactionConfig::top_level(["now"]),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["inputSchema"]["type"], "object");
        assert_eq!(json["effect"], "read_only");
        assert_eq!(json["redaction"]["mode"], "top_level_only");
    }
}
