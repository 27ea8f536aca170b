// ── Entity model mapper ──
//
// Pure translation from a raw reading payload to typed SensorReadings.
// No I/O and no clock: `read_at` comes from the payload's receive time,
// so mapping the same payload twice yields identical readings.

use chrono::{DateTime, Utc};
use serde_json::Value;
use smartwater_api::RawPayload;

use crate::datapoints::{self, Datapoint, Format, Source};
use crate::error::MappingError;
use crate::model::{Device, ReadingValue, SensorReading};

/// Epoch values above this are taken to be milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Map one device's payload to its readings, in datapoint table order.
///
/// Missing or null fields become [`ReadingValue::Unavailable`]; fields the
/// table does not describe are ignored. A value that is present but cannot
/// be parsed fails the whole device.
pub fn map(device: &Device, payload: &RawPayload) -> Result<Vec<SensorReading>, MappingError> {
    if !payload.data.is_object() {
        return Err(MappingError::UnexpectedShape {
            device: device.id.to_string(),
            found: json_type(&payload.data),
        });
    }

    datapoints::for_kind(&device.kind)
        .map(|dp| {
            Ok(SensorReading {
                device_id: device.id.clone(),
                key: dp.key.to_owned(),
                name: dp.name.to_owned(),
                value: resolve(device, dp, &payload.data)?,
                unit: dp.unit,
                platform: dp.platform,
                category: dp.category,
                enabled_by_default: dp.enabled_by_default,
                read_at: payload.fetched_at,
            })
        })
        .collect()
}

fn resolve(device: &Device, dp: &Datapoint, doc: &Value) -> Result<ReadingValue, MappingError> {
    match dp.source {
        Source::Field(path) => parse(device, dp, lookup(doc, path)),
        Source::WaterHeight => water_height(device, dp, doc),
    }
}

/// Follow a dotted path through nested objects. Null counts as missing.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

fn parse(device: &Device, dp: &Datapoint, raw: Option<&Value>) -> Result<ReadingValue, MappingError> {
    let Some(raw) = raw else {
        return Ok(ReadingValue::Unavailable);
    };

    let invalid = |expected: &'static str| MappingError::InvalidValue {
        device: device.id.to_string(),
        key: dp.key,
        value: raw.to_string(),
        expected,
    };

    match dp.format {
        Format::Text => Ok(ReadingValue::Text(match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        Format::Bool => parse_bool(raw)
            .map(ReadingValue::Bool)
            .ok_or_else(|| invalid("boolean")),
        Format::Integer => parse_number(raw)
            .and_then(truncate_to_i64)
            .map(ReadingValue::Integer)
            .ok_or_else(|| invalid("integer")),
        Format::Float { precision } => parse_number(raw)
            .map(|v| ReadingValue::Float(round_to(v, precision)))
            .ok_or_else(|| invalid("number")),
        Format::Timestamp => parse_timestamp(raw)
            .map(ReadingValue::Timestamp)
            .ok_or_else(|| invalid("epoch seconds or RFC 3339 timestamp")),
        Format::Enum(options) => {
            let key = match raw {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(invalid("enum value")),
            };
            let label = options
                .iter()
                .find(|(raw_value, _)| *raw_value == key)
                .map_or(key, |(_, label)| (*label).to_owned());
            Ok(ReadingValue::Text(label))
        }
    }
}

/// Usable water height above the tank floor, derived from the fill level
/// and the tank geometry.
fn water_height(device: &Device, dp: &Datapoint, doc: &Value) -> Result<ReadingValue, MappingError> {
    let number = |path: &'static str| -> Result<Option<f64>, MappingError> {
        lookup(doc, path)
            .map(|raw| {
                parse_number(raw).ok_or_else(|| MappingError::InvalidValue {
                    device: device.id.to_string(),
                    key: dp.key,
                    value: format!("{path}={raw}"),
                    expected: "number",
                })
            })
            .transpose()
    };

    let (Some(height), Some(outflow), Some(level)) = (
        number("settings.height")?,
        number("settings.outflowHeight")?,
        number("waterLevel")?,
    ) else {
        return Ok(ReadingValue::Unavailable);
    };

    let precision = match dp.format {
        Format::Float { precision } => precision,
        _ => 1,
    };
    Ok(ReadingValue::Float(round_to(
        (height - outflow) * level / 100.0 + outflow,
        precision,
    )))
}

// ── Scalar parsing ──────────────────────────────────────────────────

fn parse_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A finite number, given either as a JSON number or a numeric string.
fn parse_number(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::as_conversions
)]
fn truncate_to_i64(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    (truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64).then(|| truncated as i64)
}

fn round_to(value: f64, precision: u8) -> f64 {
    let scale = 10f64.powi(i32::from(precision));
    (value * scale).round() / scale
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    if let Value::String(s) = raw {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s.trim()) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    let epoch = parse_number(raw)?;
    if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch.trunc() as i64)
    } else {
        let secs = epoch.floor();
        let nanos = ((epoch - secs) * 1e9).round() as u32;
        DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
