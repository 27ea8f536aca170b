// Smart Water API response types
//
// The cloud returns loosely-typed JSON documents whose field set varies
// by device type and firmware. Identity fields are modeled explicitly;
// reading payloads stay as `serde_json::Value` and are interpreted by
// the mapper in smartwater-core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Login ────────────────────────────────────────────────────────────

/// Body of a successful `POST /auth/login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub id_token: String,
    /// Token lifetime in seconds. Sent as a string by some backends.
    #[serde(deserialize_with = "seconds_from_string_or_number")]
    pub expires_in: u64,
    pub local_id: String,
}

fn seconds_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ── Profile ──────────────────────────────────────────────────────────

/// Account profile from `GET /profiles/{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Discovery ────────────────────────────────────────────────────────

/// Which endpoint family a discovered record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    /// A hub bridging field devices to the cloud.
    Gateway,
    /// A field device (tank monitor, pump controller) behind a gateway.
    Device,
}

/// One record from discovery: identity plus the raw document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub id: String,
    pub family: DeviceFamily,
    /// Owning gateway, for devices. Always `None` for gateways.
    pub gateway_id: Option<String>,
    /// The discovery document as returned by the cloud.
    pub data: serde_json::Value,
}

impl DiscoveredDevice {
    pub fn device_ref(&self) -> DeviceRef {
        DeviceRef {
            id: self.id.clone(),
            family: self.family,
        }
    }

    /// Reads a top-level string field from the discovery document.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Everything one discovery pass found.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub devices: Vec<DiscoveredDevice>,
    /// Gateways listed for the account whose device listing returned
    /// NotFound. Their children are unknown this pass, not absent.
    pub unlisted_gateways: Vec<String>,
}

/// Addresses one device for reading retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRef {
    pub id: String,
    pub family: DeviceFamily,
}

// ── Readings ─────────────────────────────────────────────────────────

/// Current reading document for one device, stamped with the time it
/// was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    pub data: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl RawPayload {
    pub fn new(data: serde_json::Value, fetched_at: DateTime<Utc>) -> Self {
        Self { data, fetched_at }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn login_response_accepts_string_expiry() {
        let resp: LoginResponse = serde_json::from_value(json!({
            "idToken": "tok",
            "refreshToken": "ref",
            "expiresIn": "3600",
            "localId": "user-1"
        }))
        .unwrap();
        assert_eq!(resp.expires_in, 3600);
        assert_eq!(resp.local_id, "user-1");
    }

    #[test]
    fn login_response_accepts_numeric_expiry() {
        let resp: LoginResponse = serde_json::from_value(json!({
            "idToken": "tok",
            "expiresIn": 900,
            "localId": "user-1"
        }))
        .unwrap();
        assert_eq!(resp.expires_in, 900);
    }

    #[test]
    fn profile_keeps_unknown_fields() {
        let profile: RawProfile = serde_json::from_value(json!({
            "id": "user-1",
            "name": "Jane",
            "accountType": "home",
            "timezone": "Australia/Sydney"
        }))
        .unwrap();
        assert_eq!(profile.account_type.as_deref(), Some("home"));
        assert_eq!(profile.extra["timezone"], "Australia/Sydney");
    }
}
