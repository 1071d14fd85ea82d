//! Error types for the Cogni tool runtime.
//!
//! Uses `thiserror` for ergonomic error definitions. Two closed code sets
//! live here as well: [`ToolErrorCode`] (the outcome vocabulary of a single
//! tool invocation) and [`AiExecutionErrorCode`] (the system-wide failure
//! vocabulary that crosses into the event stream).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// --- Closed code sets ---

/// Outcome codes for a failed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorCode {
    Validation,
    Execution,
    Unavailable,
    RedactionFailed,
    InvalidJson,
    Timeout,
    PolicyDenied,
}

impl ToolErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Execution => "execution",
            Self::Unavailable => "unavailable",
            Self::RedactionFailed => "redaction_failed",
            Self::InvalidJson => "invalid_json",
            Self::Timeout => "timeout",
            Self::PolicyDenied => "policy_denied",
        }
    }
}

impl fmt::Display for ToolErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System-wide execution failure codes.
///
/// Every adapter-level failure is normalized into exactly one of these
/// before it is attached to an `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiExecutionErrorCode {
    InvalidRequest,
    NotFound,
    Timeout,
    Aborted,
    RateLimit,
    Internal,
    InsufficientCredits,
}

impl AiExecutionErrorCode {
    pub const ALL: [AiExecutionErrorCode; 7] = [
        Self::InvalidRequest,
        Self::NotFound,
        Self::Timeout,
        Self::Aborted,
        Self::RateLimit,
        Self::Internal,
        Self::InsufficientCredits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Aborted => "aborted",
            Self::RateLimit => "rate_limit",
            Self::Internal => "internal",
            Self::InsufficientCredits => "insufficient_credits",
        }
    }
}

impl fmt::Display for AiExecutionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiExecutionErrorCode {
    type Err = UnknownCode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownCode(s.to_string()))
    }
}

/// A string that is not part of a closed code set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error code: {0}")]
pub struct UnknownCode(pub String);

// --- Bounded context errors ---

/// Provider-error kinds, derived from HTTP status before any message
/// heuristics are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmErrorKind {
    Timeout,
    RateLimited,
    #[serde(rename = "provider_4xx")]
    Provider4xx,
    #[serde(rename = "provider_5xx")]
    Provider5xx,
    Aborted,
    Unknown,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Provider4xx => "provider_4xx",
            Self::Provider5xx => "provider_5xx",
            Self::Aborted => "aborted",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A typed error raised by an LLM adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "LLM request failed ({}, status {}): {}",
                self.kind, status, self.message
            ),
            None => write!(f, "LLM request failed ({}): {}", self.kind, self.message),
        }
    }
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Build an error from a raw HTTP status. The kind comes from
    /// [`crate::normalize::classify_llm_error_from_status`].
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: crate::normalize::classify_llm_error_from_status(status),
            status: Some(status),
            message: message.into(),
        }
    }
}

/// An error that already carries its system-level code, so it survives
/// propagation through call chains unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ExecutionError {
    pub code: AiExecutionErrorCode,
    pub message: String,
}

impl ExecutionError {
    pub fn new(code: AiExecutionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Raised when a cancellation signal interrupts an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Operation aborted: {reason}")]
pub struct AbortError {
    pub reason: String,
}

impl AbortError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failures raised by the methods of a bound tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Input or output did not match the tool contract.
    #[error("{0}")]
    Validation(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error("Redaction failed: {0}")]
    Redaction(String),

    #[error("Capability unavailable: {0}")]
    MissingCapability(String),

    #[error("{0}")]
    Aborted(#[from] AbortError),

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Typed(#[from] ExecutionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_code_serializes_snake_case() {
        let json = serde_json::to_string(&ToolErrorCode::RedactionFailed).unwrap();
        assert_eq!(json, r#""redaction_failed""#);
        assert_eq!(ToolErrorCode::PolicyDenied.to_string(), "policy_denied");
    }

    #[test]
    fn execution_code_parses_known_values_only() {
        for code in AiExecutionErrorCode::ALL {
            assert_eq!(code.as_str().parse::<AiExecutionErrorCode>().unwrap(), code);
        }
        assert!("teapot".parse::<AiExecutionErrorCode>().is_err());
    }

    #[test]
    fn llm_error_display_includes_status() {
        let err = LlmError::from_status(503, "upstream overloaded");
        let text = err.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("provider_5xx"));
        assert!(text.contains("upstream overloaded"));
    }

    #[test]
    fn llm_kind_serializes_with_digits() {
        let json = serde_json::to_string(&LlmErrorKind::Provider4xx).unwrap();
        assert_eq!(json, r#""provider_4xx""#);
    }

    #[test]
    fn validation_error_displays_bare_message() {
        let err = ToolError::Validation("bad shape".into());
        assert_eq!(err.to_string(), "bad shape");
    }
}
