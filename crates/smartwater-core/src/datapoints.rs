// ── Datapoint table ──
//
// Static description of every reading the mapper extracts: where it lives
// in the vendor payload, how to parse it, and how the host should expose
// it. Fields the vendor sends that are not listed here are ignored.

use crate::model::{DeviceKind, EntityCategory, Platform, Unit};

use Format::{Integer, Text, Timestamp};
use Scope::{Device, Gateway, Tank};

/// Device kinds a datapoint applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Gateway,
    /// Every field device, whatever its type.
    Device,
    Tank,
}

impl Scope {
    pub fn applies_to(self, kind: &DeviceKind) -> bool {
        match self {
            Self::Gateway => kind.is_gateway(),
            Self::Device => !kind.is_gateway(),
            Self::Tank => matches!(kind, DeviceKind::Tank),
        }
    }
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Dotted path into the payload, e.g. `alerts.batteryLow`.
    Field(&'static str),
    /// `(settings.height - settings.outflowHeight) * waterLevel / 100 + settings.outflowHeight`
    WaterHeight,
}

/// How a raw value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Bool,
    Integer,
    /// Float rounded to `precision` decimals.
    Float { precision: u8 },
    /// Epoch seconds (or milliseconds), or an RFC 3339 string.
    Timestamp,
    /// Raw value mapped to a label; unknown raw values pass through as text.
    Enum(&'static [(&'static str, &'static str)]),
}

#[derive(Debug, Clone, Copy)]
pub struct Datapoint {
    pub scope: Scope,
    pub key: &'static str,
    pub name: &'static str,
    pub platform: Platform,
    pub source: Source,
    pub format: Format,
    pub unit: Option<Unit>,
    pub enabled_by_default: bool,
    pub category: Option<EntityCategory>,
}

impl Datapoint {
    const fn sensor(scope: Scope, key: &'static str, name: &'static str, source: Source, format: Format) -> Self {
        Self {
            scope,
            key,
            name,
            platform: Platform::Sensor,
            source,
            format,
            unit: None,
            enabled_by_default: true,
            category: None,
        }
    }

    const fn binary(scope: Scope, key: &'static str, name: &'static str, path: &'static str) -> Self {
        Self {
            platform: Platform::BinarySensor,
            ..Self::sensor(scope, key, name, Source::Field(path), Format::Bool)
        }
    }

    const fn unit(self, unit: Unit) -> Self {
        Self {
            unit: Some(unit),
            ..self
        }
    }

    const fn diagnostic(self) -> Self {
        Self {
            category: Some(EntityCategory::Diagnostic),
            ..self
        }
    }

    /// Diagnostic and hidden unless the user enables it.
    const fn hidden(self) -> Self {
        Self {
            enabled_by_default: false,
            ..self.diagnostic()
        }
    }
}

const TREND_LEVEL: &[(&str, &str)] = &[
    ("0", "flat"),
    ("1", "up"),
    ("2", "up"),
    ("3", "up"),
    ("4", "up"),
    ("5", "up"),
    ("-1", "down"),
    ("-2", "down"),
    ("-3", "down"),
    ("-4", "down"),
    ("-5", "down"),
];

const fn field(path: &'static str) -> Source {
    Source::Field(path)
}

const fn float(precision: u8) -> Format {
    Format::Float { precision }
}

pub static DATAPOINTS: &[Datapoint] = &[
    // Gateway
    Datapoint::sensor(Gateway, "status", "Status", field("status"), Text),
    Datapoint::binary(Gateway, "alert_any", "Any Alerts", "anyAlerts"),
    Datapoint::sensor(Gateway, "signal", "Signal", field("signalStrength"), Integer).unit(Unit::Decibels),
    Datapoint::sensor(Gateway, "address", "Location Address", field("location.address"), Text).hidden(),
    Datapoint::sensor(Gateway, "postcode", "Location Postcode", field("location.postcode"), Text).hidden(),
    Datapoint::sensor(Gateway, "suburb", "Location Suburb", field("location.suburb"), Text).hidden(),
    Datapoint::sensor(Gateway, "city", "Location City", field("location.city"), Text).hidden(),
    Datapoint::sensor(Gateway, "country", "Location Country", field("location.country"), Text).hidden(),
    Datapoint::sensor(Gateway, "latitude", "Location Latitude", field("location.lat"), float(4)).hidden(),
    Datapoint::sensor(Gateway, "longitude", "Location Longitude", field("location.lng"), float(4)).hidden(),
    // Any field device
    Datapoint::sensor(Device, "status", "Status", field("status"), Text),
    Datapoint::binary(Device, "alert_any", "Any Alerts", "anyAlerts"),
    // Tank
    Datapoint::sensor(Tank, "water_level", "Water Level", field("waterLevel"), Integer).unit(Unit::Percent),
    Datapoint::sensor(Tank, "water_height", "Water Height", Source::WaterHeight, float(1)).unit(Unit::Meters),
    Datapoint::sensor(Tank, "trend_level", "Trend Level", field("trendLevel"), Format::Enum(TREND_LEVEL)),
    Datapoint::sensor(Tank, "days_remaining", "Days Remaining", field("daysRemaining"), Integer).unit(Unit::Days),
    Datapoint::sensor(Tank, "avg_daily_use", "Avg Daily Use", field("avgDailyUse"), float(2)).unit(Unit::Percent),
    Datapoint::sensor(Tank, "battery_level", "Battery Level", field("batteryLevel"), Integer)
        .unit(Unit::Percent)
        .diagnostic(),
    Datapoint::binary(Tank, "alert_level_low", "Low Level Alert", "alerts.lowLevelAlert").diagnostic(),
    Datapoint::binary(Tank, "alert_level_high", "High Level Alert", "alerts.highLevelAlert").diagnostic(),
    Datapoint::binary(Tank, "alert_days_low", "Days Remaining Alert", "alerts.daysRemainingLow").diagnostic(),
    Datapoint::binary(Tank, "alert_battery_low", "Battery Low Alert", "alerts.batteryLow").diagnostic(),
    Datapoint::binary(Tank, "alert_filter", "Filter Alert", "alerts.filter").diagnostic(),
    Datapoint::binary(Tank, "alert_clean_tank", "Clean Tank Alert", "alerts.cleanTank").diagnostic(),
    Datapoint::binary(Tank, "alert_usage", "Abnormal Usage Alert", "alerts.usageAbnormal").diagnostic(),
    Datapoint::sensor(Tank, "device_number", "Device Number", field("deviceNumber"), Text).hidden(),
    Datapoint::binary(Tank, "aux_power", "Aux Power", "auxPower").hidden(),
    Datapoint::sensor(Tank, "device_voltage", "Device Voltage", field("devVoltage"), float(2))
        .unit(Unit::Volts)
        .hidden(),
    Datapoint::sensor(Tank, "sensor_status", "Sensor Status", field("sensorStatus"), Integer)
        .unit(Unit::Percent)
        .hidden(),
    Datapoint::sensor(Tank, "last_report", "Last Report", field("lastReport"), Timestamp).hidden(),
    Datapoint::sensor(Tank, "last_modified", "Last Modified", field("lastModified"), Timestamp).hidden(),
    Datapoint::binary(Tank, "alert_not_receiving", "Not Receiving Alert", "alerts.notReceiving").hidden(),
    Datapoint::binary(Tank, "alert_not_reporting", "Not Reporting Alert", "alerts.notReporting").hidden(),
    Datapoint::sensor(Tank, "tank_height", "Tank Height", field("settings.height"), float(1))
        .unit(Unit::Meters)
        .hidden(),
    Datapoint::sensor(Tank, "outflow_height", "Outflow Height", field("settings.outflowHeight"), float(1))
        .unit(Unit::Meters)
        .hidden(),
    Datapoint::sensor(Tank, "replace_filter_at", "Replace Filter At", field("settings.replaceFilterAt"), Timestamp)
        .hidden(),
    Datapoint::sensor(Tank, "clean_tank_at", "Clean Tank At", field("settings.cleanTankAt"), Timestamp).hidden(),
];

/// Datapoints that apply to a device of the given kind, in table order.
pub fn for_kind(kind: &DeviceKind) -> impl Iterator<Item = &'static Datapoint> + '_ {
    DATAPOINTS.iter().filter(move |dp| dp.scope.applies_to(kind))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn keys_are_unique_per_kind() {
        for kind in [
            DeviceKind::Gateway,
            DeviceKind::Tank,
            DeviceKind::Pump,
            DeviceKind::Unrecognized("valve".into()),
        ] {
            let mut seen = HashSet::new();
            for dp in for_kind(&kind) {
                assert!(seen.insert(dp.key), "duplicate key {} for {kind}", dp.key);
            }
        }
    }

    #[test]
    fn tank_gets_generic_and_tank_datapoints() {
        let keys: Vec<&str> = for_kind(&DeviceKind::Tank).map(|dp| dp.key).collect();
        assert!(keys.contains(&"status"));
        assert!(keys.contains(&"water_level"));
        assert!(!keys.contains(&"signal"));
    }

    #[test]
    fn pump_gets_only_generic_datapoints() {
        let keys: Vec<&str> = for_kind(&DeviceKind::Pump).map(|dp| dp.key).collect();
        assert_eq!(keys, vec!["status", "alert_any"]);
    }

    #[test]
    fn hidden_implies_diagnostic() {
        for dp in DATAPOINTS.iter().filter(|dp| !dp.enabled_by_default) {
            assert_eq!(dp.category, Some(EntityCategory::Diagnostic), "{}", dp.key);
        }
    }
}
