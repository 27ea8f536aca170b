// ── Diagnostics ──
//
// Cycle counters plus a redacted JSON dump of coordinator state, for
// attaching to bug reports.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::model::{CoordinatorStatus, CycleOutcome, CycleState, Snapshot};

/// Placeholder written over sensitive values.
pub const REDACTED: &str = "**REDACTED**";

/// Object keys whose values never leave the process unredacted.
pub const REDACTED_KEYS: &[&str] = &[
    "password",
    "client_secret",
    "token",
    "id_token",
    "access_token",
    "refresh_token",
    "authorization",
    "username",
    "email",
];

/// Durations at or above this many seconds share the last bucket.
const DURATION_BUCKETS: u64 = 10;

/// Running counters over every refresh trigger.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStatistics {
    pub cycles: u64,
    pub success: u64,
    pub partial_failure: u64,
    pub failure: u64,
    pub coalesced: u64,
    /// Triggers skipped inside a `Retry-After` window.
    pub deferred: u64,
    /// Mid-cycle re-authentications after the backend rejected a session.
    pub reauthentications: u64,
    /// Cycle count per whole-second duration bucket.
    pub durations_secs: BTreeMap<u64, u64>,
}

impl CycleStatistics {
    pub(crate) fn record(&mut self, outcome: &CycleOutcome, elapsed: Duration) {
        match outcome {
            CycleOutcome::Coalesced => {
                self.coalesced += 1;
                return;
            }
            CycleOutcome::Deferred { .. } => {
                self.deferred += 1;
                return;
            }
            CycleOutcome::Success => self.success += 1,
            CycleOutcome::PartialFailure { .. } => self.partial_failure += 1,
            CycleOutcome::Failure { .. } => self.failure += 1,
        }
        self.cycles += 1;
        let bucket = elapsed.as_secs().min(DURATION_BUCKETS - 1);
        *self.durations_secs.entry(bucket).or_insert(0) += 1;
    }

    pub(crate) fn record_reauthentication(&mut self) {
        self.reauthentications += 1;
    }

    /// Share of cycles per duration bucket, in percent.
    pub fn duration_percentages(&self) -> BTreeMap<u64, f64> {
        let total = self.durations_secs.values().sum::<u64>().max(1);
        self.durations_secs
            .iter()
            .map(|(&bucket, &count)| (bucket, percent(count, total)))
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(count: u64, total: u64) -> f64 {
    (10_000.0 * count as f64 / total as f64).round() / 100.0
}

/// Non-secret summary of the coordinator's configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub url: String,
    pub username: String,
    pub poll_interval_secs: u64,
    pub removal_debounce: u32,
    pub failure_threshold: u32,
    pub max_concurrent_requests: usize,
}

/// Everything `Coordinator::diagnostics` reports.
#[derive(Debug, Serialize)]
pub struct DiagnosticsReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub config: ConfigSummary,
    pub state: CycleState,
    pub status: &'a CoordinatorStatus,
    pub statistics: &'a CycleStatistics,
    pub duration_percentages: BTreeMap<u64, f64>,
    pub snapshot: &'a Snapshot,
}

impl DiagnosticsReport<'_> {
    /// Serialize and redact.
    pub fn to_redacted_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        redact(&mut value);
        value
    }
}

/// Replace the value of every [`REDACTED_KEYS`] entry, at any depth.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if is_sensitive(key) && !entry.is_null() {
                    *entry = Value::String(REDACTED.to_owned());
                } else {
                    redact(entry);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

fn is_sensitive(key: &str) -> bool {
    REDACTED_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}
