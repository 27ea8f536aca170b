// ── Published snapshot ──
//
// A Snapshot is immutable once published. Each successful cycle builds a
// fresh one and the coordinator swaps it in as a whole. Maps are ordered
// so two snapshots with the same content serialize identically.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::{Device, DeviceId};
use super::reading::SensorReading;

/// The Smart Water account the coordinator polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub account_type: Option<String>,
}

/// One device and the readings it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub device: Device,
    /// Readings keyed by reading key.
    pub readings: BTreeMap<String, SensorReading>,
    /// Last cycle in which this device was fetched and mapped successfully.
    pub last_success: Option<DateTime<Utc>>,
    /// The readings are carried over from an earlier cycle because this
    /// device failed in the latest one.
    pub stale: bool,
    /// Consecutive cycles in which the backend reported this device as not found.
    pub not_found_streak: u32,
}

impl DeviceEntry {
    pub fn reading(&self, key: &str) -> Option<&SensorReading> {
        self.readings.get(key)
    }
}

/// Immutable view of every known device and its readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Incremented on every publish. Zero for the initial empty snapshot.
    pub revision: u64,
    pub published_at: Option<DateTime<Utc>>,
    pub profile: Option<Profile>,
    pub devices: BTreeMap<DeviceId, DeviceEntry>,
}

impl Snapshot {
    pub fn device(&self, id: &DeviceId) -> Option<&DeviceEntry> {
        self.devices.get(id)
    }

    pub fn reading(&self, id: &DeviceId, key: &str) -> Option<&SensorReading> {
        self.devices.get(id)?.readings.get(key)
    }

    pub fn reading_count(&self) -> usize {
        self.devices.values().map(|e| e.readings.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Readings whose owning device id does not match the entry they sit in.
    /// Always empty for snapshots built by the coordinator.
    pub fn orphaned_readings(&self) -> Vec<(&DeviceId, &SensorReading)> {
        self.devices
            .iter()
            .flat_map(|(id, entry)| {
                entry
                    .readings
                    .values()
                    .filter(move |r| r.device_id != *id || entry.device.id != *id)
                    .map(move |r| (id, r))
            })
            .collect()
    }
}

/// Devices that appeared or disappeared with a publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceChanges {
    pub added: Vec<DeviceId>,
    pub removed: Vec<DeviceId>,
}

impl DeviceChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
