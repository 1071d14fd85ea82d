//! Configuration loading, validation, and management for Cogni.
//!
//! Loads configuration from `~/.cogni/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use cogni_core::tool::{ToolEffect, is_valid_tool_id};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.cogni/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tool policy and runtime budgets
    #[serde(default)]
    pub tools: ToolPolicyConfig,

    /// Logging and span settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Usage ingestion settings
    #[serde(default)]
    pub billing: BillingConfig,
}

/// Which tools may run, and under which limits.
///
/// An empty `allowed_tools` list denies every tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicyConfig {
    /// Explicit allowlist of namespaced tool IDs
    #[serde(default)]
    pub allowed_tools: Vec<String>,

    /// Effects that need approval (refused until an approval flow exists)
    #[serde(default)]
    pub require_approval_for_effects: Vec<ToolEffect>,

    /// Maximum wall-clock time for one tool execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runtime_ms: Option<u64>,

    /// Maximum serialized size of a redacted tool result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_result_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether tool spans are recorded
    #[serde(default = "default_true")]
    pub spans_enabled: bool,

    /// Log output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_true() -> bool {
    true
}
fn default_log_format() -> String {
    "pretty".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            spans_enabled: true,
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Adapter system identifier stamped on usage facts
    #[serde(default = "default_billing_source")]
    pub source: String,

    /// Require usageUnitId for every executor type, not only
    /// billing-authoritative ones
    #[serde(default)]
    pub strict_usage_validation: bool,

    /// Run attempts whose fallback call indices are remembered; the least
    /// recently used attempt is forgotten first
    #[serde(default = "default_max_tracked_runs")]
    pub max_tracked_runs: usize,
}

fn default_billing_source() -> String {
    "cogni".into()
}

fn default_max_tracked_runs() -> usize {
    4096
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            source: default_billing_source(),
            strict_usage_validation: false,
            max_tracked_runs: default_max_tracked_runs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.cogni/config.toml).
    ///
    /// Environment variables override file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load from `path`, then apply environment overrides and re-validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `COGNI_*` overrides using the given variable lookup.
    ///
    /// - `COGNI_ALLOWED_TOOLS` — comma-separated tool IDs (replaces the list)
    /// - `COGNI_LOG_FORMAT` — "pretty" or "json"
    /// - `COGNI_BILLING_SOURCE` — usage fact source
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(tools) = lookup("COGNI_ALLOWED_TOOLS") {
            self.tools.allowed_tools = tools
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(format) = lookup("COGNI_LOG_FORMAT") {
            self.telemetry.log_format = format;
        }

        if let Some(source) = lookup("COGNI_BILLING_SOURCE") {
            self.billing.source = source;
        }
    }

    /// Get the config directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".cogni")
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bad) = self
            .tools
            .allowed_tools
            .iter()
            .find(|id| !is_valid_tool_id(id))
        {
            return Err(ConfigError::ValidationError(format!(
                "allowed_tools entry '{bad}' is not a namespaced tool ID (namespace__name)"
            )));
        }

        if self.tools.max_runtime_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "tools.max_runtime_ms must be > 0 when set".into(),
            ));
        }

        if self.tools.max_result_bytes == Some(0) {
            return Err(ConfigError::ValidationError(
                "tools.max_result_bytes must be > 0 when set".into(),
            ));
        }

        if !matches!(self.telemetry.log_format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "telemetry.log_format must be 'pretty' or 'json', got '{}'",
                self.telemetry.log_format
            )));
        }

        if self.billing.source.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "billing.source must not be empty".into(),
            ));
        }

        if self.billing.max_tracked_runs == 0 {
            return Err(ConfigError::ValidationError(
                "billing.max_tracked_runs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.tools.allowed_tools.is_empty());
        assert_eq!(config.billing.source, "cogni");
        assert!(config.telemetry.spans_enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let mut config = AppConfig::default();
        config.tools.allowed_tools = vec!["core__get_time".into()];
        config.tools.require_approval_for_effects = vec![ToolEffect::ExternalSideEffect];
        config.tools.max_runtime_ms = Some(5_000);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.tools, config.tools);
    }

    #[test]
    fn parses_tool_section() {
        let toml_str = r#"
[tools]
allowed_tools = ["core__get_time", "core__search"]
require_approval_for_effects = ["state_change", "external_side_effect"]
max_runtime_ms = 10000
max_result_bytes = 65536

[billing]
source = "litellm"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tools.allowed_tools.len(), 2);
        assert_eq!(
            config.tools.require_approval_for_effects,
            vec![ToolEffect::StateChange, ToolEffect::ExternalSideEffect]
        );
        assert_eq!(config.tools.max_runtime_ms, Some(10_000));
        assert_eq!(config.tools.max_result_bytes, Some(65_536));
        assert_eq!(config.billing.source, "litellm");
        assert_eq!(config.billing.max_tracked_runs, 4096);
        assert_eq!(config.telemetry.log_format, "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_tool_id_rejected() {
        let mut config = AppConfig::default();
        config.tools.allowed_tools = vec!["get_time".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("get_time"));
    }

    #[test]
    fn zero_budgets_rejected() {
        let mut config = AppConfig::default();
        config.tools.max_runtime_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tools.max_result_bytes = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.billing.max_tracked_runs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let mut config = AppConfig::default();
        config.telemetry.log_format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert!(result.unwrap().tools.allowed_tools.is_empty());
    }

    #[test]
    fn load_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tools]\nallowed_tools = [\"core__get_time\"]\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.tools.allowed_tools, vec!["core__get_time".to_string()]);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tools\nallowed_tools = 3").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_replace_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("COGNI_ALLOWED_TOOLS", "core__get_time, core__search ,"),
            ("COGNI_LOG_FORMAT", "json"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(
            config.tools.allowed_tools,
            vec!["core__get_time".to_string(), "core__search".to_string()]
        );
        assert_eq!(config.telemetry.log_format, "json");
        assert_eq!(config.billing.source, "cogni");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("[tools]"));
        assert!(toml_str.contains("cogni"));
    }
}
