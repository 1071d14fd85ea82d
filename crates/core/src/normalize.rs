//! Error normalization — classify any failure into the closed
//! [`AiExecutionErrorCode`] set.
//!
//! The classifier inspects the error and then each link of its `source()`
//! chain. For every link the checks run in a fixed priority order and the
//! first match wins:
//!
//! 1. [`AbortError`] → `aborted`
//! 2. [`ExecutionError`] → its `code`, verbatim
//! 3. [`LlmError`] → status 429/408 first, then `kind`
//!
//! If no link matches, the result is `internal`. The function never panics.

use crate::error::{
    AbortError, AiExecutionErrorCode, ExecutionError, LlmError, LlmErrorKind,
};
use std::error::Error as StdError;

/// Map any error to a system-level execution code.
pub fn normalize_error_to_execution_code(
    error: &(dyn StdError + 'static),
) -> AiExecutionErrorCode {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(code) = classify_link(err) {
            return code;
        }
        current = err.source();
    }
    AiExecutionErrorCode::Internal
}

fn classify_link(err: &(dyn StdError + 'static)) -> Option<AiExecutionErrorCode> {
    if err.is::<AbortError>() {
        return Some(AiExecutionErrorCode::Aborted);
    }
    if let Some(typed) = err.downcast_ref::<ExecutionError>() {
        return Some(typed.code);
    }
    if let Some(llm) = err.downcast_ref::<LlmError>() {
        return Some(llm_error_to_execution_code(llm));
    }
    None
}

fn llm_error_to_execution_code(err: &LlmError) -> AiExecutionErrorCode {
    match err.status {
        Some(429) => return AiExecutionErrorCode::RateLimit,
        Some(408) => return AiExecutionErrorCode::Timeout,
        _ => {}
    }
    match err.kind {
        LlmErrorKind::RateLimited => AiExecutionErrorCode::RateLimit,
        LlmErrorKind::Timeout => AiExecutionErrorCode::Timeout,
        LlmErrorKind::Aborted => AiExecutionErrorCode::Aborted,
        LlmErrorKind::Provider4xx | LlmErrorKind::Provider5xx | LlmErrorKind::Unknown => {
            AiExecutionErrorCode::Internal
        }
    }
}

/// Map a raw HTTP status to a provider error kind.
///
/// Adapters call this before constructing an [`LlmError`]; status mapping
/// wins over any message-based guessing.
pub fn classify_llm_error_from_status(status: u16) -> LlmErrorKind {
    match status {
        408 | 504 => LlmErrorKind::Timeout,
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::Provider4xx,
        500..=599 => LlmErrorKind::Provider5xx,
        _ => LlmErrorKind::Unknown,
    }
}
