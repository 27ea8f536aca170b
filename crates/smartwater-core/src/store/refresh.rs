// ── Cycle application logic ──
//
// Builds the next Snapshot from the previous one plus the outcome of one
// refresh cycle. Pure: the coordinator decides whether the result gets
// published.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use smartwater_api::ApiError;
use tracing::{debug, info};

use crate::error::DeviceFailure;
use crate::model::{Device, DeviceChanges, DeviceEntry, DeviceId, Profile, SensorReading, Snapshot};

/// Per-device mapping outcome of one cycle.
pub(crate) type DeviceResults = HashMap<DeviceId, Result<Vec<SensorReading>, DeviceFailure>>;

/// Everything a cycle gathered before snapshot assembly.
pub(crate) struct CycleInput {
    /// Devices from this cycle's discovery, in discovery order.
    pub discovered: Vec<Device>,
    pub results: DeviceResults,
    /// Freshly fetched profile, if the cycle fetched one.
    pub profile: Option<Profile>,
    pub now: DateTime<Utc>,
}

/// The candidate snapshot and how each device fared.
#[derive(Debug)]
pub(crate) struct CycleReport {
    pub snapshot: Snapshot,
    pub changes: DeviceChanges,
    pub succeeded: Vec<DeviceId>,
    pub failed: Vec<(DeviceId, DeviceFailure)>,
    /// Devices dropped because NotFound persisted for the debounce window.
    pub retired: Vec<DeviceId>,
}

/// Consecutive-NotFound counters, kept across cycles whether or not a
/// cycle publishes.
#[derive(Debug, Default)]
pub(crate) struct NotFoundTracker {
    streaks: HashMap<DeviceId, u32>,
}

impl NotFoundTracker {
    fn record_not_found(&mut self, id: &DeviceId) -> u32 {
        let streak = self.streaks.entry(id.clone()).or_insert(0);
        *streak = streak.saturating_add(1);
        *streak
    }

    fn clear(&mut self, id: &DeviceId) {
        self.streaks.remove(id);
    }

    fn retain(&mut self, present: &HashSet<&DeviceId>) {
        self.streaks.retain(|id, _| present.contains(id));
    }

    #[cfg(test)]
    pub fn streak(&self, id: &DeviceId) -> u32 {
        self.streaks.get(id).copied().unwrap_or(0)
    }
}

/// Assemble the next snapshot.
///
/// - Successful devices get fresh readings.
/// - Failed devices keep their previous readings and are marked stale.
/// - A device reported NotFound `removal_debounce` cycles in a row is dropped.
/// - Devices absent from discovery are dropped immediately.
pub(crate) fn build_snapshot(
    previous: &Snapshot,
    mut input: CycleInput,
    tracker: &mut NotFoundTracker,
    removal_debounce: u32,
) -> CycleReport {
    let threshold = removal_debounce.max(1);
    let mut devices = BTreeMap::new();
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    let mut retired = Vec::new();

    let present: HashSet<&DeviceId> = input.discovered.iter().map(|d| &d.id).collect();
    tracker.retain(&present);

    for device in &input.discovered {
        let id = device.id.clone();
        let prior = previous.devices.get(&id);
        let result = input.results.remove(&id).unwrap_or_else(|| {
            Err(DeviceFailure::Api(ApiError::Transient {
                message: "no result returned for device".into(),
            }))
        });

        match result {
            Ok(readings) => {
                tracker.clear(&id);
                devices.insert(
                    id.clone(),
                    DeviceEntry {
                        device: device.clone(),
                        readings: readings.into_iter().map(|r| (r.key.clone(), r)).collect(),
                        last_success: Some(input.now),
                        stale: false,
                        not_found_streak: 0,
                    },
                );
                succeeded.push(id);
            }
            Err(failure) => {
                let streak = if matches!(failure, DeviceFailure::Api(ApiError::NotFound { .. })) {
                    tracker.record_not_found(&id)
                } else {
                    tracker.clear(&id);
                    0
                };

                if streak >= threshold {
                    info!(device = %id, streak, "device no longer found, removing");
                    tracker.clear(&id);
                    retired.push(id);
                    continue;
                }

                debug!(device = %id, error = %failure, "keeping previous readings");
                devices.insert(
                    id.clone(),
                    DeviceEntry {
                        device: device.clone(),
                        readings: prior.map(|p| p.readings.clone()).unwrap_or_default(),
                        last_success: prior.and_then(|p| p.last_success),
                        stale: true,
                        not_found_streak: streak,
                    },
                );
                failed.push((id, failure));
            }
        }
    }

    let changes = DeviceChanges {
        added: devices
            .keys()
            .filter(|id| !previous.devices.contains_key(*id))
            .cloned()
            .collect(),
        removed: previous
            .devices
            .keys()
            .filter(|id| !devices.contains_key(*id))
            .cloned()
            .collect(),
    };

    let snapshot = Snapshot {
        revision: previous.revision + 1,
        published_at: Some(input.now),
        profile: input.profile.or_else(|| previous.profile.clone()),
        devices,
    };

    CycleReport {
        snapshot,
        changes,
        succeeded,
        failed,
        retired,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{DeviceKind, Platform, ReadingValue};

    fn device(id: &str) -> Device {
        Device {
            id: DeviceId::from(id),
            name: id.to_uppercase(),
            kind: DeviceKind::Tank,
            model: Some("tank".into()),
            firmware: None,
            serial: id.into(),
            via_gateway: None,
        }
    }

    fn level(id: &str, value: i64, minute: u32) -> Vec<SensorReading> {
        vec![SensorReading {
            device_id: DeviceId::from(id),
            key: "water_level".into(),
            name: "Water Level".into(),
            value: ReadingValue::Integer(value),
            unit: None,
            platform: Platform::Sensor,
            category: None,
            enabled_by_default: true,
            read_at: at(minute),
        }]
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap()
    }

    fn not_found() -> DeviceFailure {
        DeviceFailure::Api(ApiError::NotFound {
            resource: "devices/x".into(),
        })
    }

    fn input(ids: &[&str], results: Vec<(&str, Result<Vec<SensorReading>, DeviceFailure>)>, minute: u32) -> CycleInput {
        CycleInput {
            discovered: ids.iter().map(|id| device(id)).collect(),
            results: results
                .into_iter()
                .map(|(id, r)| (DeviceId::from(id), r))
                .collect(),
            profile: None,
            now: at(minute),
        }
    }

    #[test]
    fn partial_failure_keeps_previous_readings() {
        let mut tracker = NotFoundTracker::default();
        let first = build_snapshot(
            &Snapshot::default(),
            input(
                &["a", "b", "c"],
                vec![("a", Ok(level("a", 10, 0))), ("b", Ok(level("b", 20, 0))), ("c", Ok(level("c", 30, 0)))],
                0,
            ),
            &mut tracker,
            3,
        );
        assert_eq!(first.changes.added.len(), 3);

        let second = build_snapshot(
            &first.snapshot,
            input(
                &["a", "b", "c"],
                vec![
                    ("a", Ok(level("a", 11, 5))),
                    ("b", Err(DeviceFailure::Api(ApiError::Transient { message: "502".into() }))),
                    ("c", Ok(level("c", 31, 5))),
                ],
                5,
            ),
            &mut tracker,
            3,
        );

        let b = DeviceId::from("b");
        assert_eq!(second.snapshot.devices[&b].readings, first.snapshot.devices[&b].readings);
        assert!(second.snapshot.devices[&b].stale);
        assert_eq!(second.snapshot.devices[&b].last_success, Some(at(0)));
        assert_eq!(
            second.snapshot.reading(&DeviceId::from("a"), "water_level").unwrap().value,
            ReadingValue::Integer(11)
        );
        assert_eq!(second.succeeded.len(), 2);
        assert_eq!(second.failed.len(), 1);
        assert!(second.changes.is_empty());
        assert_eq!(second.snapshot.revision, 2);
    }

    #[test]
    fn not_found_is_debounced() {
        let mut tracker = NotFoundTracker::default();
        let mut snapshot = build_snapshot(
            &Snapshot::default(),
            input(&["a", "b"], vec![("a", Ok(level("a", 1, 0))), ("b", Ok(level("b", 2, 0)))], 0),
            &mut tracker,
            3,
        )
        .snapshot;

        for cycle in 1..3 {
            let report = build_snapshot(
                &snapshot,
                input(&["a", "b"], vec![("a", Ok(level("a", 1, cycle))), ("b", Err(not_found()))], cycle),
                &mut tracker,
                3,
            );
            let entry = &report.snapshot.devices[&DeviceId::from("b")];
            assert!(entry.stale);
            assert_eq!(entry.not_found_streak, cycle);
            assert_eq!(entry.readings.len(), 1);
            snapshot = report.snapshot;
        }

        let report = build_snapshot(
            &snapshot,
            input(&["a", "b"], vec![("a", Ok(level("a", 1, 3))), ("b", Err(not_found()))], 3),
            &mut tracker,
            3,
        );
        assert!(report.snapshot.device(&DeviceId::from("b")).is_none());
        assert_eq!(report.retired, vec![DeviceId::from("b")]);
        assert_eq!(report.changes.removed, vec![DeviceId::from("b")]);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn other_failure_resets_not_found_streak() {
        let mut tracker = NotFoundTracker::default();
        let base = build_snapshot(
            &Snapshot::default(),
            input(&["b"], vec![("b", Ok(level("b", 2, 0)))], 0),
            &mut tracker,
            2,
        )
        .snapshot;

        build_snapshot(&base, input(&["b"], vec![("b", Err(not_found()))], 1), &mut tracker, 2);
        assert_eq!(tracker.streak(&DeviceId::from("b")), 1);

        build_snapshot(
            &base,
            input(&["b"], vec![("b", Err(DeviceFailure::Api(ApiError::Unauthorized)))], 2),
            &mut tracker,
            2,
        );
        assert_eq!(tracker.streak(&DeviceId::from("b")), 0);
    }

    #[test]
    fn absent_from_discovery_is_removed_immediately() {
        let mut tracker = NotFoundTracker::default();
        let first = build_snapshot(
            &Snapshot::default(),
            input(&["a", "b"], vec![("a", Ok(level("a", 1, 0))), ("b", Ok(level("b", 2, 0)))], 0),
            &mut tracker,
            3,
        );
        let second = build_snapshot(&first.snapshot, input(&["a"], vec![("a", Ok(level("a", 1, 1)))], 1), &mut tracker, 3);

        assert_eq!(second.changes.removed, vec![DeviceId::from("b")]);
        assert!(second.snapshot.orphaned_readings().is_empty());
        assert_eq!(second.snapshot.devices.len(), 1);
    }

    #[test]
    fn new_device_failing_first_cycle_has_no_readings() {
        let mut tracker = NotFoundTracker::default();
        let report = build_snapshot(
            &Snapshot::default(),
            input(&["a"], vec![("a", Err(DeviceFailure::Api(ApiError::Transient { message: "timeout".into() })))], 0),
            &mut tracker,
            3,
        );
        let entry = &report.snapshot.devices[&DeviceId::from("a")];
        assert!(entry.readings.is_empty());
        assert!(entry.stale);
        assert!(entry.last_success.is_none());
    }
}
