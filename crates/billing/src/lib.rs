//! Usage billing for Cogni.
//!
//! Consumes `usage_report` events, assigns idempotency keys, and commits
//! facts to a [`UsageLedger`] so that redelivery never double-bills.

pub mod call_index;
pub mod ledger;
pub mod subscriber;

pub use call_index::{CallIndexAssigner, usage_fingerprint};
pub use ledger::{CommitOutcome, InMemoryUsageLedger, LedgerEntry, UsageLedger};
pub use subscriber::{BillingSubscriber, BillingSummary};

use cogni_core::usage::UsageFactError;

/// Errors from the billing subsystem.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("invalid usage fact: {0}")]
    InvalidFact(#[from] UsageFactError),

    #[error("ledger error: {0}")]
    Ledger(String),
}
