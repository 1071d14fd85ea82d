//! Fallback call indices for usage facts without a usage-unit ID.
//!
//! Indices are assigned per `(source, runId, attempt)` in first-arrival
//! order of a content fingerprint. A redelivered fact has the same
//! fingerprint and therefore gets the same index back, so its fallback ID
//! (`MISSING:{runId}/{callIndex}`) and idempotency key are stable.
//!
//! Two distinct calls with identical billing fields share a fingerprint and
//! collapse into one index.

use cogni_core::usage::UsageFact;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

type RunKey = (String, String, u32);

/// Stable fingerprint of the billing-relevant fields of a fact.
pub fn usage_fingerprint(fact: &UsageFact) -> String {
    let fields = serde_json::json!([
        fact.billing_account_id,
        fact.virtual_key_id,
        fact.graph_id,
        fact.executor_type,
        fact.provider,
        fact.model,
        fact.input_tokens,
        fact.output_tokens,
        fact.cache_read_tokens,
        fact.cache_write_tokens,
        fact.cost_usd,
        fact.usage_raw,
    ]);
    let mut hasher = Sha256::new();
    hasher.update(fields.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Run attempts remembered by [`CallIndexAssigner::new`].
pub const DEFAULT_TRACKED_RUNS: usize = 4096;

#[derive(Debug)]
struct TrackedRun {
    fingerprints: Vec<String>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Runs {
    by_key: HashMap<RunKey, TrackedRun>,
    tick: u64,
}

/// Per-attempt fallback index assignment, bounded to `capacity` attempts.
///
/// The least recently used attempt is forgotten once the bound is hit. A
/// fact redelivered after its attempt was evicted starts again at index 0.
#[derive(Debug)]
pub struct CallIndexAssigner {
    runs: Mutex<Runs>,
    capacity: usize,
}

impl Default for CallIndexAssigner {
    fn default() -> Self {
        Self::new()
    }
}

impl CallIndexAssigner {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TRACKED_RUNS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            runs: Mutex::new(Runs::default()),
            capacity: capacity.max(1),
        }
    }

    /// Index of this fact within its run attempt.
    pub fn assign(&self, fact: &UsageFact) -> u32 {
        let fingerprint = usage_fingerprint(fact);
        let key = (fact.source.clone(), fact.run_id.clone(), fact.attempt);

        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        runs.tick += 1;
        let tick = runs.tick;

        if !runs.by_key.contains_key(&key) && runs.by_key.len() >= self.capacity {
            evict_least_recent(&mut runs.by_key);
        }

        let run = runs.by_key.entry(key).or_insert_with(|| TrackedRun {
            fingerprints: Vec::new(),
            last_used: tick,
        });
        run.last_used = tick;

        let index = match run.fingerprints.iter().position(|f| *f == fingerprint) {
            Some(pos) => pos,
            None => {
                run.fingerprints.push(fingerprint);
                run.fingerprints.len() - 1
            }
        };
        u32::try_from(index).unwrap_or(u32::MAX)
    }

    /// Forget a finished run.
    pub fn release_run(&self, source: &str, run_id: &str, attempt: u32) {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .remove(&(source.to_string(), run_id.to_string(), attempt));
    }

    /// Number of run attempts currently remembered.
    pub fn tracked_runs(&self) -> usize {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn evict_least_recent(runs: &mut HashMap<RunKey, TrackedRun>) {
    let oldest = runs
        .iter()
        .min_by_key(|(_, run)| run.last_used)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        debug!(run_id = %key.1, attempt = key.2, "Evicting call indices of idle run");
        runs.remove(&key);
    }
}
