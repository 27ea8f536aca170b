// ── Coordinator status ──
//
// What consumers see next to the snapshot: whether the data is current,
// how many cycles in a row have failed, and why the last one failed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::device::DeviceId;
use super::snapshot::{DeviceChanges, Snapshot};
use crate::error::CycleError;

/// Freshness of the published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    /// No cycle has completed yet.
    Pending,
    /// The latest cycle published.
    Fresh,
    /// Recent cycles failed; the snapshot is the last good one.
    Stale { consecutive_failures: u32 },
    /// Failures crossed the threshold; the data should be shown as unavailable.
    Unavailable { consecutive_failures: u32 },
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Fresh => f.write_str("fresh"),
            Self::Stale {
                consecutive_failures,
            } => write!(f, "stale ({consecutive_failures} failed)"),
            Self::Unavailable {
                consecutive_failures,
            } => write!(f, "unavailable ({consecutive_failures} failed)"),
        }
    }
}

/// Coordinator state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Refreshing,
}

/// Result of one refresh trigger.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Every device refreshed.
    Success,
    /// Some devices failed and kept their previous readings.
    PartialFailure { failed: Vec<DeviceId> },
    /// Nothing was published.
    Failure { error: CycleError },
    /// Another cycle was already running; this trigger was dropped.
    Coalesced,
    /// The backend asked for a pause via `Retry-After`; no request was made.
    Deferred { remaining: Duration },
}

/// Health of the coordinator as of the last completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub availability: Availability,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
}

impl Default for CoordinatorStatus {
    fn default() -> Self {
        Self {
            availability: Availability::Pending,
            consecutive_failures: 0,
            last_error: None,
            last_success: None,
            last_attempt: None,
        }
    }
}

/// The current snapshot together with the status it was published under.
#[derive(Debug, Clone, Default)]
pub struct Published {
    pub snapshot: Arc<Snapshot>,
    pub status: CoordinatorStatus,
    /// Device set changes relative to the previous snapshot.
    pub changes: DeviceChanges,
}
