//! Usage ledger — append-only store of billed usage facts keyed by
//! idempotency key.

use crate::BillingError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cogni_core::usage::{UsageFact, UsageIdempotencyKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// What a commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    /// First time this key was seen; the fact is now recorded.
    Recorded,
    /// The key already exists. Nothing changed.
    Duplicate,
}

/// A recorded fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub key: UsageIdempotencyKey,
    pub fact: UsageFact,
    pub recorded_at: DateTime<Utc>,
}

/// Storage port for usage facts. Committing an existing key must be a
/// no-op that reports [`CommitOutcome::Duplicate`].
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn commit(
        &self,
        key: UsageIdempotencyKey,
        fact: UsageFact,
    ) -> Result<CommitOutcome, BillingError>;

    async fn contains(&self, key: &UsageIdempotencyKey) -> Result<bool, BillingError>;
}

/// Ledger held in memory.
#[derive(Debug, Default)]
pub struct InMemoryUsageLedger {
    entries: Mutex<BTreeMap<UsageIdempotencyKey, LedgerEntry>>,
}

impl InMemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries ordered by key.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of `costUsd` over all entries for one billing account.
    pub fn total_cost_usd(&self, billing_account_id: &str) -> f64 {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| e.fact.billing_account_id == billing_account_id)
            .filter_map(|e| e.fact.cost_usd)
            .sum()
    }
}

#[async_trait]
impl UsageLedger for InMemoryUsageLedger {
    async fn commit(
        &self,
        key: UsageIdempotencyKey,
        fact: UsageFact,
    ) -> Result<CommitOutcome, BillingError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return Ok(CommitOutcome::Duplicate);
        }
        entries.insert(
            key.clone(),
            LedgerEntry {
                key,
                fact,
                recorded_at: Utc::now(),
            },
        );
        Ok(CommitOutcome::Recorded)
    }

    async fn contains(&self, key: &UsageIdempotencyKey) -> Result<bool, BillingError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fact;

    #[tokio::test]
    async fn second_commit_of_same_key_is_duplicate() {
        let ledger = InMemoryUsageLedger::new();
        let f = fact(Some("gen-1"));
        let key = f.idempotency_key().unwrap();

        assert_eq!(
            ledger.commit(key.clone(), f.clone()).await.unwrap(),
            CommitOutcome::Recorded
        );
        assert_eq!(
            ledger.commit(key.clone(), f).await.unwrap(),
            CommitOutcome::Duplicate
        );
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn totals_per_account() {
        let ledger = InMemoryUsageLedger::new();
        for unit in ["gen-1", "gen-2"] {
            let f = fact(Some(unit));
            ledger
                .commit(f.idempotency_key().unwrap(), f)
                .await
                .unwrap();
        }
        let total = ledger.total_cost_usd("acct-1");
        assert!((total - 0.004).abs() < 1e-9);
        assert_eq!(ledger.total_cost_usd("acct-2"), 0.0);
    }
}
