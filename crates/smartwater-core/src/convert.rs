// ── API-to-domain type conversions ──
//
// Bridges smartwater-api discovery and profile records into canonical
// smartwater-core model types.

use smartwater_api::{DeviceFamily, DiscoveredDevice, RawProfile};

use crate::model::{Device, DeviceId, DeviceKind, Profile};

impl From<&DiscoveredDevice> for Device {
    fn from(raw: &DiscoveredDevice) -> Self {
        let type_tag = non_empty(raw.str_field("type"));

        let kind = match raw.family {
            DeviceFamily::Gateway => DeviceKind::Gateway,
            DeviceFamily::Device => DeviceKind::from_type_tag(type_tag),
        };

        // Display name falls back to the type tag, then to the id.
        let name = non_empty(raw.str_field("name"))
            .or(type_tag)
            .unwrap_or(raw.id.as_str())
            .to_owned();

        let via_gateway = raw
            .gateway_id
            .as_deref()
            .or_else(|| non_empty(raw.str_field("gatewayId")))
            .map(DeviceId::from);

        Device {
            id: DeviceId::from(raw.id.as_str()),
            name,
            kind,
            model: type_tag.map(str::to_owned),
            firmware: non_empty(raw.str_field("version")).map(str::to_owned),
            serial: non_empty(raw.str_field("serialNumber"))
                .unwrap_or(raw.id.as_str())
                .to_owned(),
            via_gateway: match raw.family {
                DeviceFamily::Gateway => None,
                DeviceFamily::Device => via_gateway,
            },
        }
    }
}

impl From<RawProfile> for Profile {
    fn from(raw: RawProfile) -> Self {
        // Older accounts carry the type under `accountConfig.type`.
        let account_type = raw.account_type.or_else(|| {
            raw.extra
                .get("accountConfig")
                .and_then(|c| c.get("type"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        });
        Profile {
            id: raw.id,
            name: raw.name,
            email: raw.email,
            account_type,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn discovered(family: DeviceFamily, id: &str, data: serde_json::Value) -> DiscoveredDevice {
        DiscoveredDevice {
            id: id.into(),
            family,
            gateway_id: (family == DeviceFamily::Device).then(|| "gw1".to_owned()),
            data,
        }
    }

    #[test]
    fn tank_from_discovery() {
        let device = Device::from(&discovered(
            DeviceFamily::Device,
            "t1",
            json!({
                "name": "Rain tank",
                "type": "tank",
                "serialNumber": "SN-77",
                "version": "3.2.1"
            }),
        ));

        assert_eq!(
            device,
            Device {
                id: DeviceId::from("t1"),
                name: "Rain tank".into(),
                kind: DeviceKind::Tank,
                model: Some("tank".into()),
                firmware: Some("3.2.1".into()),
                serial: "SN-77".into(),
                via_gateway: Some(DeviceId::from("gw1")),
            }
        );
    }

    #[test]
    fn name_and_serial_fall_back() {
        let device = Device::from(&discovered(DeviceFamily::Device, "p9", json!({ "type": "pump" })));
        assert_eq!(device.name, "pump");
        assert_eq!(device.serial, "p9");
        assert_eq!(device.kind, DeviceKind::Pump);

        let device = Device::from(&discovered(DeviceFamily::Device, "x1", json!({ "name": " " })));
        assert_eq!(device.name, "x1");
        assert_eq!(device.kind, DeviceKind::Unrecognized("unknown".into()));
    }

    #[test]
    fn gateway_ignores_type_for_kind() {
        let device = Device::from(&discovered(
            DeviceFamily::Gateway,
            "gw1",
            json!({ "name": "Hub", "type": "tank" }),
        ));
        assert_eq!(device.kind, DeviceKind::Gateway);
        assert!(device.via_gateway.is_none());
    }

    #[test]
    fn profile_reads_nested_account_type() {
        let raw: RawProfile = serde_json::from_value(json!({
            "id": "user-1",
            "name": "Jane",
            "accountConfig": { "type": "residential" }
        }))
        .unwrap();
        let profile = Profile::from(raw);
        assert_eq!(profile.account_type.as_deref(), Some("residential"));
    }
}
