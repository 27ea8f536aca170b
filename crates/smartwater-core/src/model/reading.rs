// ── Sensor readings ──
//
// A reading is one normalized value for one device. Readings are
// immutable: a refresh produces new ones rather than mutating old ones.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use super::device::DeviceId;

/// A normalized reading value.
///
/// `Unavailable` means the payload did not carry the field this cycle;
/// it is a value in its own right, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ReadingValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
    Unavailable,
}

impl ReadingValue {
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(true) => f.write_str("on"),
            Self::Bool(false) => f.write_str("off"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Unit of measurement, serialized as its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
pub enum Unit {
    #[strum(serialize = "%")]
    #[serde(rename = "%")]
    Percent,
    #[strum(serialize = "m")]
    #[serde(rename = "m")]
    Meters,
    #[strum(serialize = "V")]
    #[serde(rename = "V")]
    Volts,
    #[strum(serialize = "d")]
    #[serde(rename = "d")]
    Days,
    #[strum(serialize = "dB")]
    #[serde(rename = "dB")]
    Decibels,
}

/// Entity platform the reading is exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Sensor,
    BinarySensor,
}

/// Entity grouping hint for the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityCategory {
    Diagnostic,
    Config,
}

/// One normalized reading, owned by exactly one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub device_id: DeviceId,
    pub key: String,
    pub name: String,
    pub value: ReadingValue,
    pub unit: Option<Unit>,
    pub platform: Platform,
    pub category: Option<EntityCategory>,
    pub enabled_by_default: bool,
    /// When the payload this value came from was received.
    pub read_at: DateTime<Utc>,
}

impl SensorReading {
    /// Stable entity identifier: `smartwater_{device}_{key}`, restricted
    /// to `[a-z0-9_-]`.
    pub fn unique_id(&self) -> String {
        slugify(&format!("smartwater_{}_{}", self.device_id, self.key))
    }
}

/// Lowercase, spaces to underscores, everything outside `[a-z0-9_-]` dropped.
pub fn slugify(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            'a'..='z' | '0'..='9' | '_' | '-' => Some(c),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_disallowed_characters() {
        assert_eq!(slugify("Rain Tank #2"), "rain_tank_2");
        assert_eq!(slugify("AbC-9_x.y"), "abc-9_xy");
    }

    #[test]
    fn unit_serializes_as_symbol() {
        assert_eq!(serde_json::to_string(&Unit::Percent).ok().as_deref(), Some("\"%\""));
        assert_eq!(Unit::Decibels.to_string(), "dB");
    }

    #[test]
    fn reading_value_display() {
        assert_eq!(ReadingValue::Bool(true).to_string(), "on");
        assert_eq!(ReadingValue::Integer(71).to_string(), "71");
        assert_eq!(ReadingValue::Unavailable.to_string(), "unavailable");
        assert!(!ReadingValue::Unavailable.is_available());
    }
}
