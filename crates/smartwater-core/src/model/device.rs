// ── Device identity ──
//
// Devices are keyed by the vendor-assigned id, which is stable across
// polls. The device kind is decided once at discovery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── DeviceId ────────────────────────────────────────────────────────

/// Vendor-assigned device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── DeviceKind ──────────────────────────────────────────────────────

/// Device category. Type tags the mapper does not know are kept verbatim
/// in `Unrecognized` instead of being forced into a known kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Gateway,
    Tank,
    Pump,
    Unrecognized(String),
}

impl DeviceKind {
    /// Kind of a field device from its `type` tag.
    pub fn from_type_tag(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some(t) if t.eq_ignore_ascii_case("tank") => Self::Tank,
            Some(t) if t.eq_ignore_ascii_case("pump") => Self::Pump,
            Some(t) if !t.is_empty() => Self::Unrecognized(t.to_owned()),
            _ => Self::Unrecognized("unknown".into()),
        }
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gateway => f.write_str("gateway"),
            Self::Tank => f.write_str("tank"),
            Self::Pump => f.write_str("pump"),
            Self::Unrecognized(tag) => write!(f, "unrecognized ({tag})"),
        }
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A gateway, tank, or pump as known to the host platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceKind,
    /// Vendor type tag, shown as the model.
    pub model: Option<String>,
    pub firmware: Option<String>,
    /// Serial number, or the device id when the vendor reports none.
    pub serial: String,
    /// Gateway the device reports through. `None` for gateways.
    pub via_gateway: Option<DeviceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_type_tag() {
        assert_eq!(DeviceKind::from_type_tag(Some("tank")), DeviceKind::Tank);
        assert_eq!(DeviceKind::from_type_tag(Some("Pump")), DeviceKind::Pump);
        assert_eq!(
            DeviceKind::from_type_tag(Some("valve")),
            DeviceKind::Unrecognized("valve".into())
        );
        assert_eq!(
            DeviceKind::from_type_tag(None),
            DeviceKind::Unrecognized("unknown".into())
        );
    }

    #[test]
    fn device_id_round_trips_through_display() {
        let id: DeviceId = "tank-42".parse().unwrap_or_else(|e| match e {});
        assert_eq!(id.to_string(), "tank-42");
        assert_eq!(id, DeviceId::from("tank-42"));
    }
}
