// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Projects Gen1 (legacy HTTP) `/shelly` + `/status` + `/settings` payloads
//! into the same raw component JSON shape that [`super::component::ComponentKind::from_raw`]
//! consumes, so the rest of the domain model never needs to know which
//! generation a device belongs to.

use serde_json::{Value, json};

use super::snapshot::DeviceIdentity;

const LEGACY_SWITCH_ACTIONS: [&str; 3] = ["Legacy.Toggle", "Legacy.TurnOn", "Legacy.TurnOff"];
const LEGACY_COVER_ACTIONS: [&str; 3] = ["Legacy.Open", "Legacy.Close", "Legacy.Stop"];
const LEGACY_INPUT_ACTIONS: [&str; 8] = [
    "Legacy.InputMomentary",
    "Legacy.InputToggle",
    "Legacy.InputEdge",
    "Legacy.InputDetached",
    "Legacy.InputActivation",
    "Legacy.InputMomentaryRelease",
    "Legacy.InputReverse",
    "Legacy.InputNormal",
];

fn obj_get<'a>(v: &'a Value, key: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    v.get(key).unwrap_or(&NULL)
}

fn arr_get<'a>(v: &'a Value, key: &str, index: usize) -> &'a Value {
    static NULL: Value = Value::Null;
    v.get(key).and_then(Value::as_array).and_then(|a| a.get(index)).unwrap_or(&NULL)
}

/// Legacy devices report `temperature` under one of several different keys
/// depending on firmware generation; this walks the fallback chain the
/// source uses.
fn format_temperature(relay_status: &Value, status: &Value) -> (Option<f64>, Option<f64>) {
    if let Some(t) = relay_status.get("temperature").and_then(Value::as_f64) {
        return (Some(t), celsius_to_fahrenheit(t));
    }
    let tmp = status.get("tmp");
    if let Some(tc) = tmp.and_then(|t| t.get("tC")).and_then(Value::as_f64) {
        let tf = tmp.and_then(|t| t.get("tF")).and_then(Value::as_f64).or_else(|| celsius_to_fahrenheit(tc));
        return (Some(tc), tf);
    }
    if let Some(t) = status.get("temperature").and_then(Value::as_f64) {
        return (Some(t), celsius_to_fahrenheit(t));
    }
    (None, None)
}

fn celsius_to_fahrenheit(c: f64) -> Option<f64> {
    Some(c * 9.0 / 5.0 + 32.0)
}

/// Translates a Gen1 device's combined `/status` + `/settings` response
/// into the modern component list shape, one entry per recognized legacy
/// section.
pub struct LegacyComponentMapper;

impl LegacyComponentMapper {
    pub fn map_components(status: &Value, settings: &Value) -> Vec<Value> {
        let mut components = Vec::new();

        components.push(Self::build_system(status, settings));
        if let Some(wifi) = Self::build_wifi(status, settings) {
            components.push(wifi);
        }
        if let Some(cloud) = Self::build_cloud(status, settings) {
            components.push(cloud);
        }
        if let Some(mqtt) = Self::build_mqtt(settings) {
            components.push(mqtt);
        }

        let relay_count = status.get("relays").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        for i in 0..relay_count {
            components.push(Self::build_switch(status, settings, i));
        }

        let input_count = status.get("inputs").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        for i in 0..input_count {
            components.push(Self::build_input(status, settings, i));
        }

        let roller_count = status.get("rollers").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        for i in 0..roller_count {
            components.push(Self::build_cover(status, settings, i));
        }

        components
    }

    /// Derives the device-identity fields from a Gen1 device's `/shelly`,
    /// `/status`, and `/settings` payloads, mirroring the device-info block
    /// the legacy discovery path assembles alongside the component list.
    pub fn identity(shelly: &Value, status: &Value, settings: &Value) -> DeviceIdentity {
        let device_name = settings
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .or_else(|| shelly.get("name").and_then(Value::as_str))
            .map(str::to_string);

        let device_type = shelly
            .get("type")
            .and_then(Value::as_str)
            .or_else(|| shelly.get("model").and_then(Value::as_str))
            .map(str::to_string);

        let firmware_version = shelly
            .get("fw_id")
            .and_then(Value::as_str)
            .or_else(|| shelly.get("fw").and_then(Value::as_str))
            .or_else(|| status.get("fw").and_then(Value::as_str))
            .map(str::to_string);

        let mac_address = shelly
            .get("mac")
            .and_then(Value::as_str)
            .or_else(|| status.get("mac").and_then(Value::as_str))
            .map(str::to_string);

        DeviceIdentity {
            device_type: device_type.clone(),
            device_name,
            app_name: device_type,
            firmware_version,
            mac_address,
            config_revision: settings.get("cfg_rev").and_then(Value::as_i64),
        }
    }

    fn build_system(status: &Value, settings: &Value) -> Value {
        json!({
            "key": "sys",
            "status": {
                "mac": status.get("mac"),
                "uptime": status.get("uptime").and_then(Value::as_u64).unwrap_or(0),
                "restart_required": false,
                "ram_size": status.get("ram_total"),
                "ram_free": status.get("ram_free"),
                "fs_size": status.get("fs_size"),
                "fs_free": status.get("fs_free"),
                "available_updates": Self::build_update_info(status),
                "unixtime": status.get("unixtime").and_then(Value::as_u64).unwrap_or(0),
            },
            "config": {
                "device": {
                    "name": settings.get("name"),
                    "fw_id": status.get("fw") ,
                },
                "location": {
                    "tz": settings.get("timezone"),
                },
            },
        })
    }

    /// Legacy firmware reports an update as either a bare `has_update`
    /// boolean under `status.update`, or only as a differing `old_version`
    /// / `new_version` pair. `has_update` wins when both are present. A
    /// non-empty `beta_version` gets its own `beta` entry alongside
    /// `stable`.
    fn build_update_info(status: &Value) -> Value {
        let update = obj_get(status, "update");
        let has_update = update.get("has_update").and_then(Value::as_bool);
        let old_version = update.get("old_version").and_then(Value::as_str);
        let new_version = update.get("new_version").and_then(Value::as_str);

        let diff_flag = matches!((old_version, new_version), (Some(o), Some(n)) if o != n && !n.is_empty());
        let available = has_update.unwrap_or(diff_flag);

        let mut entries = serde_json::Map::new();
        if available && new_version.is_some() {
            entries.insert(
                "stable".to_string(),
                json!({
                    "version": new_version,
                    "build_id": update.get("build_id"),
                }),
            );
        }
        if let Some(beta) = update.get("beta_version").and_then(Value::as_str).filter(|b| !b.is_empty()) {
            entries.insert(
                "beta".to_string(),
                json!({
                    "version": beta,
                    "build_id": update.get("build_id"),
                }),
            );
        }
        Value::Object(entries)
    }

    fn build_wifi(status: &Value, _settings: &Value) -> Option<Value> {
        let wifi_sta = status.get("wifi_sta")?;
        Some(json!({
            "key": "wifi",
            "status": {
                "sta_ip": wifi_sta.get("ip"),
                "status": if wifi_sta.get("connected").and_then(Value::as_bool).unwrap_or(false) {
                    "got_ip"
                } else {
                    "disconnected"
                },
                "ssid": wifi_sta.get("ssid"),
                "rssi": wifi_sta.get("rssi"),
            },
            "config": {},
        }))
    }

    fn build_cloud(status: &Value, settings: &Value) -> Option<Value> {
        let cloud_status = status.get("cloud")?;
        let cloud_settings = obj_get(settings, "cloud");
        Some(json!({
            "key": "cloud",
            "status": {
                "connected": cloud_status.get("connected").and_then(Value::as_bool).unwrap_or(false),
            },
            "config": {
                "enable": cloud_settings.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            },
        }))
    }

    fn build_mqtt(settings: &Value) -> Option<Value> {
        let mqtt = settings.get("mqtt")?;
        Some(json!({
            "key": "mqtt",
            "status": {
                "connected": mqtt.get("connected").and_then(Value::as_bool).unwrap_or(false),
            },
            "config": {
                "enable": mqtt.get("enable").and_then(Value::as_bool).unwrap_or(false),
                "server": mqtt.get("server"),
                "user": mqtt.get("user"),
            },
        }))
    }

    fn build_switch(status: &Value, settings: &Value, index: usize) -> Value {
        let relay_status = arr_get(status, "relays", index);
        let relay_settings = arr_get(settings, "relays", index);
        let meter = arr_get(status, "meters", index);

        let voltage = meter
            .get("voltage")
            .and_then(Value::as_f64)
            .or_else(|| status.get("voltage").and_then(Value::as_f64))
            .unwrap_or(0.0);
        let power = meter.get("power").and_then(Value::as_f64).unwrap_or(0.0);
        let energy_total = meter.get("total").and_then(Value::as_f64).unwrap_or(0.0);
        let (temp_c, temp_f) = format_temperature(relay_status, status);

        json!({
            "key": format!("switch:{index}"),
            "status": {
                "output": relay_status.get("ison").and_then(Value::as_bool).unwrap_or(false),
                "apower": power,
                "voltage": voltage,
                "current": 0.0,
                "freq": 0.0,
                "temperature": {"tC": temp_c, "tF": temp_f},
                "aenergy": {"total": energy_total},
                "pf": 0.0,
                "source": relay_status.get("source").and_then(Value::as_str).unwrap_or("unknown"),
            },
            "config": {
                "name": relay_settings.get("name"),
                "auto_on": relay_settings.get("auto_on").and_then(Value::as_bool).unwrap_or(false),
                "auto_off": relay_settings.get("auto_off").and_then(Value::as_bool).unwrap_or(false),
                "power_limit": relay_settings.get("max_power").and_then(Value::as_f64).unwrap_or(0.0),
            },
            "attrs": {
                "legacy_component": "relay",
                "legacy_id": index,
                "legacy_actions": LEGACY_SWITCH_ACTIONS,
            },
        })
    }

    fn build_input(status: &Value, settings: &Value, index: usize) -> Value {
        let input_status = arr_get(status, "inputs", index);
        let input_settings = arr_get(settings, "inputs", index);
        json!({
            "key": format!("input:{index}"),
            "status": {
                "state": input_status.get("input").and_then(Value::as_i64).map(|v| v != 0).unwrap_or(false),
            },
            "config": {
                "name": input_settings.get("name"),
                "type": input_settings.get("btn_type").and_then(Value::as_str).unwrap_or("switch"),
                "enable": true,
                "invert": input_settings.get("invert").and_then(Value::as_bool).unwrap_or(false),
            },
            "attrs": {
                "legacy_component": "input",
                "legacy_id": index,
                "legacy_actions": LEGACY_INPUT_ACTIONS,
            },
        })
    }

    fn build_cover(status: &Value, settings: &Value, index: usize) -> Value {
        let roller_status = arr_get(status, "rollers", index);
        let roller_settings = arr_get(settings, "rollers", index);
        let meter = arr_get(status, "meters", index);
        let (temp_c, temp_f) = format_temperature(roller_status, status);

        json!({
            "key": format!("cover:{index}"),
            "status": {
                "state": roller_status.get("state").and_then(Value::as_str).unwrap_or("unknown"),
                "current_pos": roller_status.get("current_pos"),
                "apower": meter.get("power").and_then(Value::as_f64).unwrap_or(0.0),
                "voltage": status.get("voltage").and_then(Value::as_f64).unwrap_or(0.0),
                "current": 0.0,
                "temperature": {"tC": temp_c, "tF": temp_f},
                "aenergy": {"total": meter.get("total").and_then(Value::as_f64).unwrap_or(0.0)},
                "last_direction": roller_status.get("last_direction").and_then(Value::as_str).unwrap_or("unknown"),
                "source": roller_status.get("source").and_then(Value::as_str).unwrap_or("unknown"),
            },
            "config": {
                "name": roller_settings.get("name"),
                "maxtime_open": roller_settings.get("maxtime_open").and_then(Value::as_f64).unwrap_or(60.0),
                "maxtime_close": roller_settings.get("maxtime_close").and_then(Value::as_f64).unwrap_or(60.0),
                "power_limit": roller_settings.get("max_power").and_then(Value::as_f64).unwrap_or(0.0),
            },
            "attrs": {
                "legacy_component": "roller",
                "legacy_id": index,
                "legacy_actions": LEGACY_COVER_ACTIONS,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::component::ComponentKind;

    #[test]
    fn maps_single_relay_device() {
        let status = json!({
            "mac": "AABBCCDDEEFF",
            "relays": [{"ison": true, "source": "button"}],
            "meters": [{"power": 42.5, "total": 1000.0, "voltage": 230.0}],
            "fw": "20230913-1",
            "uptime": 1234,
        });
        let settings = json!({
            "name": "Living Room Plug",
            "relays": [{"name": "Lamp", "auto_on": false, "auto_off": true, "max_power": 0.0}],
        });

        let components = LegacyComponentMapper::map_components(&status, &settings);
        let switch_raw = components.iter().find(|c| c["key"] == "switch:0").unwrap();
        let comp = ComponentKind::from_raw(switch_raw);
        match comp {
            ComponentKind::Switch(s) => {
                assert!(s.output);
                assert_eq!(s.power, 42.5);
                assert_eq!(s.voltage, 230.0);
                assert_eq!(s.name.as_deref(), Some("Lamp"));
            },
            _ => panic!("expected switch component"),
        }
    }

    #[test]
    fn update_info_prefers_has_update_flag() {
        let status = json!({"update": {"has_update": false, "old_version": "1", "new_version": "2"}});
        let info = LegacyComponentMapper::build_update_info(&status);
        assert!(info.get("stable").is_none());
    }

    #[test]
    fn update_info_falls_back_to_version_diff() {
        let status = json!({"update": {"old_version": "1.0", "new_version": "1.1"}});
        let info = LegacyComponentMapper::build_update_info(&status);
        assert_eq!(info["stable"]["version"], "1.1");
    }

    #[test]
    fn update_info_includes_beta_entry() {
        let status = json!({"update": {"has_update": true, "new_version": "1.1", "beta_version": "1.2-beta"}});
        let info = LegacyComponentMapper::build_update_info(&status);
        assert_eq!(info["stable"]["version"], "1.1");
        assert_eq!(info["beta"]["version"], "1.2-beta");
    }

    #[test]
    fn temperature_falls_back_through_chain() {
        let relay_status = json!({});
        let status = json!({"tmp": {"tC": 25.0}});
        let (c, f) = format_temperature(&relay_status, &status);
        assert_eq!(c, Some(25.0));
        assert_eq!(f, Some(77.0));
    }

    #[test]
    fn omits_wifi_cloud_mqtt_when_absent() {
        let status = json!({"relays": [{"ison": false}], "meters": [{"power": 0.0}]});
        let settings = json!({"relays": [{"name": "Main"}]});
        let components = LegacyComponentMapper::map_components(&status, &settings);
        assert!(components.iter().all(|c| c["key"] != "wifi" && c["key"] != "cloud" && c["key"] != "mqtt"));
    }

    #[test]
    fn includes_wifi_cloud_mqtt_when_present() {
        let status = json!({
            "relays": [{"ison": false}],
            "meters": [{"power": 0.0}],
            "wifi_sta": {"connected": true, "ip": "10.0.0.2", "ssid": "home"},
            "cloud": {"connected": true},
        });
        let settings = json!({"relays": [{"name": "Main"}], "mqtt": {"enable": true}});
        let components = LegacyComponentMapper::map_components(&status, &settings);
        assert!(components.iter().any(|c| c["key"] == "wifi"));
        assert!(components.iter().any(|c| c["key"] == "cloud"));
        assert!(components.iter().any(|c| c["key"] == "mqtt"));
    }

    #[test]
    fn switch_component_carries_legacy_action_attrs() {
        let status = json!({
            "relays": [{"ison": false, "source": "http"}],
            "meters": [{"power": 0.0}],
        });
        let settings = json!({"relays": [{"name": "Main"}]});
        let components = LegacyComponentMapper::map_components(&status, &settings);
        let switch_raw = components.iter().find(|c| c["key"] == "switch:0").unwrap();
        let actions = switch_raw["attrs"]["legacy_actions"].as_array().unwrap();
        let names: Vec<&str> = actions.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(names, vec!["Legacy.Toggle", "Legacy.TurnOn", "Legacy.TurnOff"]);
        assert_eq!(switch_raw["attrs"]["legacy_id"], 0);
    }
}
