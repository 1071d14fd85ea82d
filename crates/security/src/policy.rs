//! Tool policies — decide whether a tool call may run.
//!
//! Rules:
//! - No policy configured → [`DENY_ALL_POLICY`] (deny everything)
//! - [`AllowlistPolicy`]: tool not listed → deny, before any effect check
//! - Listed tool whose effect needs approval → `require_approval`
//! - Otherwise → allow

use cogni_config::ToolPolicyConfig;
use cogni_core::tool::{
    ToolBudgets, ToolEffect, ToolPolicy, ToolPolicyContext, ToolPolicyDecision,
};
use std::collections::BTreeSet;

/// Denies every call. The system default when no policy is supplied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DenyAllPolicy;

/// Shared, immutable deny-all instance.
pub static DENY_ALL_POLICY: DenyAllPolicy = DenyAllPolicy;

impl ToolPolicy for DenyAllPolicy {
    fn decide(
        &self,
        _ctx: &ToolPolicyContext,
        _tool_id: &str,
        _effect: ToolEffect,
    ) -> ToolPolicyDecision {
        ToolPolicyDecision::Deny
    }
}

/// Explicit allowlist with optional approval gating by effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowlistPolicy {
    allowed_tools: BTreeSet<String>,
    require_approval_for_effects: BTreeSet<ToolEffect>,
    budgets: ToolBudgets,
}

impl AllowlistPolicy {
    /// Create a policy allowing exactly the given tool IDs.
    pub fn new(allowed_tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_tools: allowed_tools.into_iter().map(Into::into).collect(),
            require_approval_for_effects: BTreeSet::new(),
            budgets: ToolBudgets::default(),
        }
    }

    /// Build from the `[tools]` config section.
    pub fn from_config(config: &ToolPolicyConfig) -> Self {
        Self::new(config.allowed_tools.iter().cloned())
            .require_approval_for(config.require_approval_for_effects.iter().copied())
            .with_budgets(ToolBudgets {
                max_runtime_ms: config.max_runtime_ms,
                max_result_bytes: config.max_result_bytes,
            })
    }

    /// Require approval for listed tools with any of these effects.
    pub fn require_approval_for(mut self, effects: impl IntoIterator<Item = ToolEffect>) -> Self {
        self.require_approval_for_effects.extend(effects);
        self
    }

    pub fn with_budgets(mut self, budgets: ToolBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn with_max_runtime_ms(mut self, ms: u64) -> Self {
        self.budgets.max_runtime_ms = Some(ms);
        self
    }

    pub fn with_max_result_bytes(mut self, bytes: usize) -> Self {
        self.budgets.max_result_bytes = Some(bytes);
        self
    }

    pub fn is_listed(&self, tool_id: &str) -> bool {
        self.allowed_tools.contains(tool_id)
    }
}

impl ToolPolicy for AllowlistPolicy {
    fn decide(
        &self,
        _ctx: &ToolPolicyContext,
        tool_id: &str,
        effect: ToolEffect,
    ) -> ToolPolicyDecision {
        if !self.is_listed(tool_id) {
            return ToolPolicyDecision::Deny;
        }
        if self.require_approval_for_effects.contains(&effect) {
            return ToolPolicyDecision::RequireApproval;
        }
        ToolPolicyDecision::Allow
    }

    fn budgets(&self) -> ToolBudgets {
        self.budgets
    }

    fn allowed_tools(&self) -> BTreeSet<String> {
        self.allowed_tools.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolPolicyContext {
        ToolPolicyContext {
            run_id: "run-1".into(),
        }
    }

    #[test]
    fn deny_all_denies_everything() {
        for effect in [
            ToolEffect::ReadOnly,
            ToolEffect::StateChange,
            ToolEffect::ExternalSideEffect,
        ] {
            assert_eq!(
                DENY_ALL_POLICY.decide(&ctx(), "core__get_time", effect),
                ToolPolicyDecision::Deny
            );
        }
        assert!(DENY_ALL_POLICY.allowed_tools().is_empty());
        assert_eq!(DENY_ALL_POLICY.budgets(), ToolBudgets::default());
    }

    #[test]
    fn unlisted_tool_denied() {
        let policy = AllowlistPolicy::new(["core__get_time"]);
        assert_eq!(
            policy.decide(&ctx(), "core__unknown", ToolEffect::ReadOnly),
            ToolPolicyDecision::Deny
        );
    }

    #[test]
    fn listed_tool_allowed() {
        let policy = AllowlistPolicy::new(["core__echo"]);
        assert_eq!(
            policy.decide(&ctx(), "core__echo", ToolEffect::ReadOnly),
            ToolPolicyDecision::Allow
        );
    }

    #[test]
    fn membership_checked_before_effect() {
        let policy = AllowlistPolicy::new(["core__echo"])
            .require_approval_for([ToolEffect::ReadOnly]);
        assert_eq!(
            policy.decide(&ctx(), "core__other", ToolEffect::ReadOnly),
            ToolPolicyDecision::Deny
        );
        assert_eq!(
            policy.decide(&ctx(), "core__echo", ToolEffect::ReadOnly),
            ToolPolicyDecision::RequireApproval
        );
    }

    #[test]
    fn approval_only_for_named_effects() {
        let policy = AllowlistPolicy::new(["core__send_email"])
            .require_approval_for([ToolEffect::ExternalSideEffect]);
        assert_eq!(
            policy.decide(&ctx(), "core__send_email", ToolEffect::ExternalSideEffect),
            ToolPolicyDecision::RequireApproval
        );
        assert_eq!(
            policy.decide(&ctx(), "core__send_email", ToolEffect::StateChange),
            ToolPolicyDecision::Allow
        );
    }

    #[test]
    fn empty_allowlist_behaves_like_deny_all() {
        let policy = AllowlistPolicy::new(Vec::<String>::new());
        assert_eq!(
            policy.decide(&ctx(), "core__get_time", ToolEffect::ReadOnly),
            ToolPolicyDecision::Deny
        );
    }

    #[test]
    fn from_config_carries_budgets() {
        let config = ToolPolicyConfig {
            allowed_tools: vec!["core__get_time".into()],
            require_approval_for_effects: vec![ToolEffect::StateChange],
            max_runtime_ms: Some(2_000),
            max_result_bytes: Some(4_096),
        };
        let policy = AllowlistPolicy::from_config(&config);
        assert!(policy.is_listed("core__get_time"));
        assert_eq!(policy.budgets().max_runtime_ms, Some(2_000));
        assert_eq!(policy.budgets().max_result_bytes, Some(4_096));
        assert_eq!(
            policy.decide(&ctx(), "core__get_time", ToolEffect::StateChange),
            ToolPolicyDecision::RequireApproval
        );
    }
}
