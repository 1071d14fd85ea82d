//! Billing subscriber — turns `usage_report` events into ledger entries.
//!
//! Flow per fact:
//! 1. Validate (strict for billing-authoritative executors, hints otherwise)
//! 2. Resolve the usage-unit ID, falling back to `MISSING:{runId}/{callIndex}`
//! 3. Commit under `(source, runId, attempt, usageUnitId)`; a redelivered
//!    fact is a no-op

use crate::BillingError;
use crate::call_index::CallIndexAssigner;
use crate::ledger::{CommitOutcome, UsageLedger};
use cogni_config::BillingConfig;
use cogni_core::event::AiEvent;
use cogni_core::usage::{UsageFact, UsageIdempotencyKey, missing_usage_unit_id};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Counters from a [`BillingSubscriber::consume`] loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillingSummary {
    pub recorded: usize,
    pub duplicates: usize,
    pub rejected: usize,
    /// Non-usage events seen and skipped.
    pub ignored: usize,
}

pub struct BillingSubscriber {
    ledger: Arc<dyn UsageLedger>,
    indices: CallIndexAssigner,
    /// Require a usage-unit ID from every executor.
    strict: bool,
    /// Fallback-keyed facts that matched an existing entry.
    fallback_duplicates: AtomicUsize,
}

impl BillingSubscriber {
    pub fn new(ledger: Arc<dyn UsageLedger>) -> Self {
        Self {
            ledger,
            indices: CallIndexAssigner::new(),
            strict: false,
            fallback_duplicates: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &BillingConfig, ledger: Arc<dyn UsageLedger>) -> Self {
        Self::new(ledger)
            .with_strict_validation(config.strict_usage_validation)
            .with_tracked_runs(config.max_tracked_runs)
    }

    /// Bound the number of run attempts whose fallback indices are kept.
    pub fn with_tracked_runs(mut self, max_runs: usize) -> Self {
        self.indices = CallIndexAssigner::with_capacity(max_runs);
        self
    }

    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Handle one event. Returns `None` for anything but `usage_report`.
    pub async fn handle(&self, event: &AiEvent) -> Option<Result<CommitOutcome, BillingError>> {
        match event {
            AiEvent::UsageReport { fact } => Some(self.ingest(fact.clone()).await),
            _ => None,
        }
    }

    /// Validate, key, and commit one usage fact.
    pub async fn ingest(&self, mut fact: UsageFact) -> Result<CommitOutcome, BillingError> {
        if self.strict {
            fact.validate_strict()?;
        } else {
            fact.validate()?;
        }

        let mut fallback = false;
        let key = match fact.idempotency_key() {
            Some(key) => key,
            None => {
                fallback = true;
                let call_index = self.indices.assign(&fact);
                let unit = missing_usage_unit_id(&fact.run_id, call_index);
                warn!(
                    run_id = %fact.run_id,
                    executor = %fact.executor_type,
                    usage_unit_id = %unit,
                    "Usage fact without usageUnitId, using fallback"
                );
                fact.usage_unit_id = Some(unit.clone());
                UsageIdempotencyKey::new(&fact, unit)
            }
        };

        let outcome = self.ledger.commit(key.clone(), fact).await?;
        match outcome {
            CommitOutcome::Recorded => info!(key = %key, "Usage recorded"),
            // Either a redelivery or a distinct call with identical billing
            // fields; the two cannot be told apart without a usageUnitId.
            CommitOutcome::Duplicate if fallback => {
                self.fallback_duplicates.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = %key,
                    "Usage fact without usageUnitId matched an existing entry; not billed"
                );
            }
            CommitOutcome::Duplicate => debug!(key = %key, "Duplicate usage fact ignored"),
        }
        Ok(outcome)
    }

    /// Facts without a usageUnitId that were dropped as duplicates.
    pub fn fallback_duplicates(&self) -> usize {
        self.fallback_duplicates.load(Ordering::Relaxed)
    }

    /// Drain a channel of events until every sender is dropped.
    pub async fn consume(&self, mut events: mpsc::UnboundedReceiver<AiEvent>) -> BillingSummary {
        let mut summary = BillingSummary::default();
        while let Some(event) = events.recv().await {
            match self.handle(&event).await {
                None => summary.ignored += 1,
                Some(Ok(CommitOutcome::Recorded)) => summary.recorded += 1,
                Some(Ok(CommitOutcome::Duplicate)) => summary.duplicates += 1,
                Some(Err(e)) => {
                    warn!(error = %e, "Rejected usage fact");
                    summary.rejected += 1;
                }
            }
        }
        summary
    }
}

impl std::fmt::Debug for BillingSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingSubscriber")
            .field("strict", &self.strict)
            .field("tracked_runs", &self.indices.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryUsageLedger;
    use crate::test_support::fact;
    use cogni_core::usage::{ExecutorType, UsageFactError};

    fn subscriber() -> (BillingSubscriber, Arc<InMemoryUsageLedger>) {
        let ledger = Arc::new(InMemoryUsageLedger::new());
        (BillingSubscriber::new(ledger.clone()), ledger)
    }

    fn external(unit: Option<&str>) -> UsageFact {
        let mut f = fact(unit);
        f.executor_type = ExecutorType::LanggraphServer;
        f
    }

    #[tokio::test]
    async fn redelivered_fact_is_a_noop() {
        let (sub, ledger) = subscriber();
        assert_eq!(
            sub.ingest(fact(Some("gen-1"))).await.unwrap(),
            CommitOutcome::Recorded
        );
        assert_eq!(
            sub.ingest(fact(Some("gen-1"))).await.unwrap(),
            CommitOutcome::Duplicate
        );
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn authoritative_executor_needs_usage_unit_id() {
        let (sub, ledger) = subscriber();
        let err = sub.ingest(fact(None)).await.unwrap_err();
        assert!(matches!(
            err,
            BillingError::InvalidFact(UsageFactError::MissingUsageUnitId(ExecutorType::Inproc))
        ));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn external_executor_gets_stable_fallback_ids() {
        let (sub, ledger) = subscriber();
        let first = external(None);
        let mut second = external(None);
        second.input_tokens = Some(500);

        sub.ingest(first.clone()).await.unwrap();
        sub.ingest(second.clone()).await.unwrap();
        // Redelivery in reverse order maps to the same keys.
        assert_eq!(sub.ingest(second).await.unwrap(), CommitOutcome::Duplicate);
        assert_eq!(sub.ingest(first).await.unwrap(), CommitOutcome::Duplicate);

        let units: Vec<_> = ledger
            .entries()
            .into_iter()
            .map(|e| e.key.usage_unit_id)
            .collect();
        assert_eq!(units, vec!["MISSING:run-1/0", "MISSING:run-1/1"]);
        assert_eq!(
            ledger.entries()[0].fact.usage_unit_id.as_deref(),
            Some("MISSING:run-1/0")
        );
        assert_eq!(sub.fallback_duplicates(), 2);
    }

    #[tokio::test]
    async fn identical_fallback_facts_are_surfaced_not_silently_merged() {
        let (sub, ledger) = subscriber();
        let unit = external(None);

        assert_eq!(sub.ingest(unit.clone()).await.unwrap(), CommitOutcome::Recorded);
        assert_eq!(sub.ingest(unit).await.unwrap(), CommitOutcome::Duplicate);
        assert_eq!(ledger.len(), 1);
        assert_eq!(sub.fallback_duplicates(), 1);

        // A keyed redelivery is an ordinary duplicate.
        sub.ingest(fact(Some("gen-1"))).await.unwrap();
        sub.ingest(fact(Some("gen-1"))).await.unwrap();
        assert_eq!(sub.fallback_duplicates(), 1);
    }

    #[tokio::test]
    async fn config_bounds_tracked_runs() {
        let ledger = Arc::new(InMemoryUsageLedger::new());
        let config = BillingConfig {
            max_tracked_runs: 3,
            ..BillingConfig::default()
        };
        let sub = BillingSubscriber::from_config(&config, ledger.clone());

        for n in 0..10 {
            let mut f = external(None);
            f.run_id = format!("run-{n}");
            sub.ingest(f).await.unwrap();
        }
        assert_eq!(sub.indices.tracked_runs(), 3);
        assert_eq!(ledger.len(), 10);
    }

    #[tokio::test]
    async fn strict_mode_rejects_external_without_unit() {
        let ledger = Arc::new(InMemoryUsageLedger::new());
        let config = BillingConfig {
            strict_usage_validation: true,
            ..BillingConfig::default()
        };
        let sub = BillingSubscriber::from_config(&config, ledger);
        assert!(sub.ingest(external(None)).await.is_err());
        assert!(sub.ingest(external(Some("gen-9"))).await.is_ok());
    }

    #[tokio::test]
    async fn consume_counts_outcomes() {
        let (sub, ledger) = subscriber();
        let (tx, rx) = mpsc::unbounded_channel();
        for event in [
            AiEvent::TextDelta { delta: "hi".into() },
            AiEvent::UsageReport {
                fact: fact(Some("gen-1")),
            },
            AiEvent::UsageReport {
                fact: fact(Some("gen-1")),
            },
            AiEvent::UsageReport { fact: fact(None) },
            AiEvent::Done,
        ] {
            tx.send(event).unwrap();
        }
        drop(tx);

        let summary = sub.consume(rx).await;
        assert_eq!(
            summary,
            BillingSummary {
                recorded: 1,
                duplicates: 1,
                rejected: 1,
                ignored: 2,
            }
        );
        assert_eq!(ledger.len(), 1);
    }
}
