// Discovery and reading endpoints
//
// Two-level discovery (gateways for the account, then devices per
// gateway) and per-device reading retrieval with bounded concurrency.

use std::collections::HashMap;

use chrono::Utc;
use futures_util::{StreamExt, stream};
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::Session;
use crate::client::SmartWaterClient;
use crate::error::ApiError;
use crate::models::{
    DeviceFamily, DeviceRef, DiscoveredDevice, Discovery, RawPayload, RawProfile,
};

/// Per-device outcome of a reading batch, keyed by device id.
pub type ReadingResults = HashMap<String, Result<RawPayload, ApiError>>;

impl SmartWaterClient {
    /// Fetch the account profile for the session's user.
    ///
    /// `GET /profiles/{user_id}`
    pub async fn fetch_profile(&self, session: &Session) -> Result<RawProfile, ApiError> {
        debug!(user_id = %session.user_id(), "fetching profile");
        self.get(session, &format!("profiles/{}", session.user_id()))
            .await
    }

    /// List the gateway documents for the account, keyed by gateway id.
    ///
    /// `GET /profiles/{user_id}/gateways`
    pub async fn list_gateways(&self, session: &Session) -> Result<Map<String, Value>, ApiError> {
        let gateways: Option<Map<String, Value>> = self
            .get(session, &format!("profiles/{}/gateways", session.user_id()))
            .await?;
        Ok(gateways.unwrap_or_default())
    }

    /// List the device documents behind one gateway, keyed by device id.
    ///
    /// `GET /gateways/{gateway_id}/devices`
    pub async fn list_devices(
        &self,
        session: &Session,
        gateway_id: &str,
    ) -> Result<Map<String, Value>, ApiError> {
        let devices: Option<Map<String, Value>> = self
            .get(session, &format!("gateways/{gateway_id}/devices"))
            .await?;
        Ok(devices.unwrap_or_default())
    }

    /// Enumerate every gateway and device under the account.
    ///
    /// An account without gateways yields an empty result. A gateway whose
    /// device listing returns NotFound is reported in
    /// [`Discovery::unlisted_gateways`] so the caller can decide what its
    /// previously known children mean.
    pub async fn discover(&self, session: &Session) -> Result<Discovery, ApiError> {
        let gateways = self.list_gateways(session).await?;
        debug!(count = gateways.len(), "discovered gateways");

        let per_gateway: Vec<(String, Result<Map<String, Value>, ApiError>)> =
            stream::iter(gateways.keys().cloned())
                .map(|gateway_id| async move {
                    let devices = self.list_devices(session, &gateway_id).await;
                    (gateway_id, devices)
                })
                .buffered(self.max_concurrent())
                .collect()
                .await;

        let mut discovery = Discovery {
            devices: Vec::with_capacity(gateways.len()),
            unlisted_gateways: Vec::new(),
        };
        for (id, data) in gateways {
            discovery.devices.push(DiscoveredDevice {
                id,
                family: DeviceFamily::Gateway,
                gateway_id: None,
                data,
            });
        }

        for (gateway_id, devices) in per_gateway {
            let devices = match devices {
                Ok(devices) => devices,
                Err(ApiError::NotFound { .. }) => {
                    debug!(gateway = %gateway_id, "gateway device listing not found");
                    discovery.unlisted_gateways.push(gateway_id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for (id, data) in devices {
                discovery.devices.push(DiscoveredDevice {
                    id,
                    family: DeviceFamily::Device,
                    gateway_id: Some(gateway_id.clone()),
                    data,
                });
            }
        }

        Ok(discovery)
    }

    /// Fetch the current reading document of every requested device.
    ///
    /// One request per device, at most `max_concurrent` in flight. Every
    /// requested id appears in the result with either a payload or the
    /// error of its own request.
    ///
    /// `GET /gateways/{id}` or `GET /devices/{id}`
    pub async fn fetch_readings(&self, session: &Session, devices: &[DeviceRef]) -> ReadingResults {
        stream::iter(devices.to_vec())
            .map(|device| async move {
                let path = match device.family {
                    DeviceFamily::Gateway => format!("gateways/{}", device.id),
                    DeviceFamily::Device => format!("devices/{}", device.id),
                };
                let result = self
                    .get::<Value>(session, &path)
                    .await
                    .map(|data| RawPayload::new(data, Utc::now()));
                if let Err(ref e) = result {
                    debug!(device = %device.id, error = %e, "reading fetch failed");
                }
                (device.id, result)
            })
            .buffer_unordered(self.max_concurrent())
            .collect()
            .await
    }
}
