// smartwater-api: Async Rust client for the Smart Water Technologies cloud

pub mod auth;
pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{AuthClient, Credentials, Session};
pub use client::SmartWaterClient;
pub use devices::ReadingResults;
pub use error::{ApiError, AuthError};
pub use models::{DeviceFamily, DeviceRef, DiscoveredDevice, Discovery, RawPayload, RawProfile};
pub use transport::TransportConfig;
