//! Polling coordinator and entity model between `smartwater-api` and a
//! host platform (CLI, home automation bridge).
//!
//! - **[`Coordinator`]**: central facade for one account.
//!   [`setup()`](Coordinator::setup) verifies the credentials,
//!   [`start()`](Coordinator::start) spawns the periodic refresh task, and
//!   [`refresh()`](Coordinator::refresh) runs a cycle on demand. At most one
//!   cycle runs at a time; overlapping triggers are coalesced.
//!
//! - **[`Snapshot`]**: immutable view of every device and its readings,
//!   replaced as a whole on each successful cycle. Failed devices keep their
//!   last good readings and are flagged stale.
//!
//! - **[`SnapshotStream`]**: subscription handle exposing
//!   `current()` / `latest()` / `changed()` over published views.
//!
//! - **[`mapper`]**: turns raw device payloads into typed
//!   [`SensorReading`]s using the [`datapoints`] table. Pure and
//!   deterministic.
//!
//! - **Backend seam** ([`backend`]): the coordinator only talks to the cloud
//!   through [`Authenticator`] and [`DeviceSource`], implemented by the
//!   `smartwater-api` clients.

pub mod backend;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod datapoints;
pub mod diagnostics;
pub mod error;
pub mod mapper;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{Authenticator, DeviceSource};
pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use diagnostics::{CycleStatistics, redact};
pub use error::{CoreError, CycleError, DeviceFailure, MappingError};
pub use store::SnapshotStore;
pub use stream::{PublishedStream, SnapshotStream};

pub use model::{
    Availability, CoordinatorStatus, CycleOutcome, CycleState, Device, DeviceChanges,
    DeviceEntry, DeviceId, DeviceKind, EntityCategory, Platform, Profile, Published,
    ReadingValue, SensorReading, Snapshot, Unit,
};

// Transport types hosts need to build a config or implement a backend.
pub use smartwater_api::{ApiError, AuthError, Credentials, Session};
