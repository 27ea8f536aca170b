// ── Domain model ──
//
// Canonical types the host platform's entity layer consumes.

pub mod device;
pub mod reading;
pub mod snapshot;
pub mod status;

pub use device::{Device, DeviceId, DeviceKind};
pub use reading::{EntityCategory, Platform, ReadingValue, SensorReading, Unit, slugify};
pub use snapshot::{DeviceChanges, DeviceEntry, Profile, Snapshot};
pub use status::{Availability, CoordinatorStatus, CycleOutcome, CycleState, Published};
