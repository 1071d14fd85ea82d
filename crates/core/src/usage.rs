//! Usage facts: the billing-ingestion record emitted per usage unit.
//!
//! A fact is produced once per completed LLM call (or costed tool call),
//! carried on a `usage_report` event, and committed by the billing
//! consumer under its [`UsageIdempotencyKey`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which runtime executed the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorType {
    LanggraphServer,
    ClaudeSdk,
    Inproc,
    Sandbox,
}

impl ExecutorType {
    /// In-process and sandboxed executors are the billing authority for
    /// their own usage, so they must supply a stable usage-unit ID.
    pub fn is_billing_authoritative(&self) -> bool {
        matches!(self, Self::Inproc | Self::Sandbox)
    }
}

impl fmt::Display for ExecutorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LanggraphServer => "langgraph_server",
            Self::ClaudeSdk => "claude_sdk",
            Self::Inproc => "inproc",
            Self::Sandbox => "sandbox",
        };
        f.write_str(s)
    }
}

/// One billable unit of consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageFact {
    pub run_id: String,
    /// Retry counter of the run.
    pub attempt: u32,
    /// Adapter-stable ID of this usage unit (e.g. the provider call ID).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_unit_id: Option<String>,
    /// Adapter system identifier.
    pub source: String,
    pub executor_type: ExecutorType,
    pub billing_account_id: String,
    pub virtual_key_id: String,
    /// Namespaced `providerId:graphName`.
    pub graph_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    /// Raw adapter payload for debugging. Never read by billing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_raw: Option<serde_json::Value>,
}

/// Why a usage fact was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageFactError {
    #[error("usage fact field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("usageUnitId is required for executor type {0}")]
    MissingUsageUnitId(ExecutorType),

    #[error("graphId must be namespaced as providerId:graphName, got `{0}`")]
    InvalidGraphId(String),

    #[error("usage fact field `{0}` must be a finite, non-negative number")]
    InvalidCost(&'static str),
}

impl UsageFact {
    /// Strict validation: every required field present, including the
    /// usage-unit ID. Used for billing-authoritative executors.
    pub fn validate_strict(&self) -> Result<(), UsageFactError> {
        self.validate_common()?;
        match self.usage_unit_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(()),
            _ => Err(UsageFactError::MissingUsageUnitId(self.executor_type)),
        }
    }

    /// Hint validation: like strict, but the usage-unit ID may be absent
    /// (the billing consumer assigns a fallback).
    pub fn validate_hints(&self) -> Result<(), UsageFactError> {
        self.validate_common()?;
        if let Some(id) = &self.usage_unit_id {
            if id.trim().is_empty() {
                return Err(UsageFactError::EmptyField("usageUnitId"));
            }
        }
        Ok(())
    }

    /// Validate according to the executor's billing authority.
    pub fn validate(&self) -> Result<(), UsageFactError> {
        if self.executor_type.is_billing_authoritative() {
            self.validate_strict()
        } else {
            self.validate_hints()
        }
    }

    fn validate_common(&self) -> Result<(), UsageFactError> {
        let required = [
            ("runId", &self.run_id),
            ("source", &self.source),
            ("billingAccountId", &self.billing_account_id),
            ("virtualKeyId", &self.virtual_key_id),
            ("graphId", &self.graph_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(UsageFactError::EmptyField(name));
            }
        }
        if !is_namespaced_graph_id(&self.graph_id) {
            return Err(UsageFactError::InvalidGraphId(self.graph_id.clone()));
        }
        if let Some(cost) = self.cost_usd {
            if !cost.is_finite() || cost < 0.0 {
                return Err(UsageFactError::InvalidCost("costUsd"));
            }
        }
        Ok(())
    }

    /// The emitter-side idempotency key, if the fact carries a usage-unit ID.
    pub fn idempotency_key(&self) -> Option<UsageIdempotencyKey> {
        self.usage_unit_id
            .as_ref()
            .map(|unit| UsageIdempotencyKey::new(self, unit.clone()))
    }
}

fn is_namespaced_graph_id(graph_id: &str) -> bool {
    match graph_id.split_once(':') {
        Some((provider, graph)) => {
            !provider.is_empty() && !graph.is_empty() && !graph.contains(':')
        }
        None => false,
    }
}

/// Fallback usage-unit ID for facts that arrived without one.
///
/// Only the billing consumer derives this; emitters leave the field empty.
pub fn missing_usage_unit_id(run_id: &str, call_index: u32) -> String {
    format!("MISSING:{run_id}/{call_index}")
}

/// The tuple that makes redelivery of a usage fact a ledger no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageIdempotencyKey {
    pub source: String,
    pub run_id: String,
    pub attempt: u32,
    pub usage_unit_id: String,
}

impl UsageIdempotencyKey {
    pub fn new(fact: &UsageFact, usage_unit_id: String) -> Self {
        Self {
            source: fact.source.clone(),
            run_id: fact.run_id.clone(),
            attempt: fact.attempt,
            usage_unit_id,
        }
    }
}

impl fmt::Display for UsageIdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}/{}",
            self.source, self.run_id, self.attempt, self.usage_unit_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(executor_type: ExecutorType, usage_unit_id: Option<&str>) -> UsageFact {
        UsageFact {
            run_id: "run-1".into(),
            attempt: 0,
            usage_unit_id: usage_unit_id.map(String::from),
            source: "litellm".into(),
            executor_type,
            billing_account_id: "ba-1".into(),
            virtual_key_id: "vk-1".into(),
            graph_id: "langgraph:poet".into(),
            provider: Some("openai".into()),
            model: Some("gpt-4o-mini".into()),
            input_tokens: Some(120),
            output_tokens: Some(40),
            cache_read_tokens: None,
            cache_write_tokens: None,
            cost_usd: Some(0.0004),
            usage_raw: None,
        }
    }

    #[test]
    fn inproc_without_unit_id_fails_strict() {
        let f = fact(ExecutorType::Inproc, None);
        assert_eq!(
            f.validate_strict(),
            Err(UsageFactError::MissingUsageUnitId(ExecutorType::Inproc))
        );
        assert!(f.validate().is_err());
    }

    #[test]
    fn external_without_unit_id_passes_hints() {
        let f = fact(ExecutorType::LanggraphServer, None);
        assert!(f.validate_hints().is_ok());
        assert!(f.validate().is_ok());
        assert!(f.idempotency_key().is_none());
    }

    #[test]
    fn sandbox_is_authoritative_sdk_is_not() {
        assert!(ExecutorType::Sandbox.is_billing_authoritative());
        assert!(ExecutorType::Inproc.is_billing_authoritative());
        assert!(!ExecutorType::ClaudeSdk.is_billing_authoritative());
        assert!(!ExecutorType::LanggraphServer.is_billing_authoritative());
    }

    #[test]
    fn graph_id_must_be_namespaced() {
        let mut f = fact(ExecutorType::Inproc, Some("call-1"));
        f.graph_id = "poet".into();
        assert!(matches!(
            f.validate(),
            Err(UsageFactError::InvalidGraphId(_))
        ));
        f.graph_id = "langgraph:".into();
        assert!(f.validate().is_err());
    }

    #[test]
    fn empty_required_field_is_named() {
        let mut f = fact(ExecutorType::Inproc, Some("call-1"));
        f.billing_account_id = " ".into();
        assert_eq!(
            f.validate(),
            Err(UsageFactError::EmptyField("billingAccountId"))
        );
    }

    #[test]
    fn negative_cost_rejected() {
        let mut f = fact(ExecutorType::Inproc, Some("call-1"));
        f.cost_usd = Some(-1.0);
        assert_eq!(f.validate(), Err(UsageFactError::InvalidCost("costUsd")));
    }

    #[test]
    fn idempotency_key_tuple() {
        let f = fact(ExecutorType::Inproc, Some("call-7"));
        let key = f.idempotency_key().unwrap();
        assert_eq!(key.source, "litellm");
        assert_eq!(key.run_id, "run-1");
        assert_eq!(key.attempt, 0);
        assert_eq!(key.usage_unit_id, "call-7");
        assert_eq!(key.to_string(), "litellm:run-1/0/call-7");
    }

    #[test]
    fn fallback_unit_id_format() {
        assert_eq!(missing_usage_unit_id("run-9", 3), "MISSING:run-9/3");
    }

    #[test]
    fn serializes_camel_case_and_skips_absent() {
        let f = fact(ExecutorType::ClaudeSdk, None);
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["executorType"], "claude_sdk");
        assert_eq!(json["billingAccountId"], "ba-1");
        assert!(json.get("usageUnitId").is_none());
        assert!(json.get("usageRaw").is_none());
    }
}
