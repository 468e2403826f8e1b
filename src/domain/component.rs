// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Projects raw per-component status/config JSON into typed component
//! variants, and derives each component's `available_actions` from the
//! device's RPC method list.

use serde::Serialize;
use serde_json::Value;

fn obj_get<'a>(v: &'a Value, key: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    v.get(key).unwrap_or(&NULL)
}

fn get_str(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn get_f64(v: &Value, key: &str, default: f64) -> f64 {
    v.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn get_opt_f64(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(Value::as_f64)
}

fn get_bool(v: &Value, key: &str, default: bool) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn get_u64(v: &Value, key: &str, default: u64) -> u64 {
    v.get(key).and_then(Value::as_u64).unwrap_or(default)
}

fn get_str_list(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|e| e.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

/// Fields shared by every component variant.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHeader {
    pub key: String,
    pub component_type: String,
    pub component_id: Option<u32>,
    pub status: Value,
    pub config: Value,
    pub attrs: Value,
    pub available_actions: Vec<String>,
}

impl ComponentHeader {
    pub fn from_raw(component_data: &Value) -> Self {
        let key = get_str(component_data, "key").unwrap_or_default();
        let (component_type, component_id) = match key.split_once(':') {
            Some((t, id)) => (t.to_string(), id.parse::<u32>().ok()),
            None => (key.clone(), None),
        };

        Self {
            key,
            component_type,
            component_id,
            status: obj_get(component_data, "status").clone(),
            config: obj_get(component_data, "config").clone(),
            attrs: obj_get(component_data, "attrs").clone(),
            available_actions: Vec::new(),
        }
    }

    /// Default prefix-matching rule: every method starting with
    /// `<component_type>.` (case-insensitive).
    fn default_actions(&self, all_methods: &[String]) -> Vec<String> {
        let prefix = format!("{}.", self.component_type.to_lowercase());
        all_methods
            .iter()
            .filter(|m| m.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// Checks `available_actions` for a method ending in `.<action>`,
    /// rather than reconstructing a single `<Prefix>.<action>` name —
    /// `available_actions` itself is the source of truth for which
    /// prefixes apply to this component (e.g. a `sys` component's list
    /// legitimately contains both `Sys.*` and `Shelly.*` entries).
    pub fn can_perform_action(&self, action: &str) -> bool {
        let suffix = format!(".{action}");
        self.available_actions.iter().any(|m| m.ends_with(&suffix))
    }
}

fn starts_with_any(method: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| method.starts_with(p))
}

macro_rules! component_variant {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, Serialize)]
        pub struct $name {
            #[serde(flatten)]
            pub header: ComponentHeader,
            $(pub $field: $ty,)*
        }
    };
}

component_variant!(SwitchComponent {
    output: bool,
    power: f64,
    voltage: f64,
    current: f64,
    frequency: f64,
    temperature_celsius: Option<f64>,
    temperature_fahrenheit: Option<f64>,
    energy_total: f64,
    power_factor: f64,
    source: String,
    name: Option<String>,
    auto_on: bool,
    auto_off: bool,
    power_limit: f64,
    current_limit: f64,
});

component_variant!(InputComponent {
    state: Option<bool>,
    input_type: String,
    name: Option<String>,
    enabled: Option<bool>,
    inverted: Option<bool>,
});

component_variant!(CoverComponent {
    state: String,
    position: Option<i64>,
    power: f64,
    voltage: f64,
    current: f64,
    temperature_celsius: Option<f64>,
    temperature_fahrenheit: Option<f64>,
    energy_total: f64,
    last_direction: String,
    source: String,
    name: Option<String>,
    maxtime_open: f64,
    maxtime_close: f64,
    power_limit: f64,
});

component_variant!(SystemComponent {
    device_name: Option<String>,
    mac_address: Option<String>,
    firmware_version: Option<String>,
    uptime: u64,
    restart_required: bool,
    ram_total: u64,
    ram_free: u64,
    fs_total: u64,
    fs_free: u64,
    available_updates: Value,
    unixtime: u64,
    timezone: Option<String>,
});

component_variant!(CloudComponent {
    connected: bool,
    enabled: bool,
    server: Option<String>,
});

component_variant!(WifiComponent {
    sta_ip: Option<String>,
    sta_ip6: Vec<String>,
    wifi_status: String,
    ssid: Option<String>,
    bssid: Option<String>,
    rssi: i64,
});

component_variant!(WebSocketComponent { connected: bool });

component_variant!(EthernetComponent {
    eth_ip: Option<String>,
    eth_ip6: Vec<String>,
    enabled: bool,
    server_mode: bool,
    ipv4_mode: String,
    netmask: Option<String>,
    gateway: Option<String>,
    nameserver: Option<String>,
});

component_variant!(BthomeComponent { errors: Vec<String>, enabled: bool });

component_variant!(BleComponent { enabled: bool, rpc_enabled: bool });

component_variant!(KnxComponent {
    enabled: bool,
    individual_address: Option<String>,
    routing_address: Option<String>,
});

component_variant!(MqttComponent {
    connected: bool,
    enabled: bool,
    server: Option<String>,
    client_id: Option<String>,
    user: Option<String>,
    topic_prefix: Option<String>,
    rpc_notifications: bool,
    status_notifications: bool,
    use_client_cert: bool,
    enable_rpc: bool,
    enable_control: bool,
});

component_variant!(ZigbeeComponent { network_state: String, enabled: bool });

component_variant!(EmComponent {
    a_current: Option<f64>,
    a_voltage: Option<f64>,
    a_act_power: Option<f64>,
    a_aprt_power: Option<f64>,
    a_pf: Option<f64>,
    a_freq: Option<f64>,
    b_current: Option<f64>,
    b_voltage: Option<f64>,
    b_act_power: Option<f64>,
    b_aprt_power: Option<f64>,
    b_pf: Option<f64>,
    b_freq: Option<f64>,
    c_current: Option<f64>,
    c_voltage: Option<f64>,
    c_act_power: Option<f64>,
    c_aprt_power: Option<f64>,
    c_pf: Option<f64>,
    c_freq: Option<f64>,
    n_current: Option<f64>,
    total_current: Option<f64>,
    total_act_power: Option<f64>,
    total_aprt_power: Option<f64>,
    name: Option<String>,
    ct_type: Option<String>,
});

component_variant!(Em1Component {
    current: Option<f64>,
    voltage: Option<f64>,
    act_power: Option<f64>,
    aprt_power: Option<f64>,
    pf: Option<f64>,
    freq: Option<f64>,
    name: Option<String>,
    ct_type: Option<String>,
    reverse: bool,
});

component_variant!(EmDataComponent {
    a_total_act_energy: f64,
    a_total_act_ret_energy: f64,
    b_total_act_energy: f64,
    b_total_act_ret_energy: f64,
    c_total_act_energy: f64,
    c_total_act_ret_energy: f64,
    total_act: f64,
    total_act_ret: f64,
});

component_variant!(Em1DataComponent {
    total_act_energy: f64,
    total_act_ret_energy: f64,
});

component_variant!(GenericComponent {});

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "component_type_tag")]
pub enum ComponentKind {
    Switch(SwitchComponent),
    Input(InputComponent),
    Cover(CoverComponent),
    Sys(SystemComponent),
    Cloud(CloudComponent),
    Wifi(WifiComponent),
    Ws(WebSocketComponent),
    Eth(EthernetComponent),
    Bthome(BthomeComponent),
    Ble(BleComponent),
    Knx(KnxComponent),
    Mqtt(MqttComponent),
    Zigbee(ZigbeeComponent),
    Em(EmComponent),
    Em1(Em1Component),
    EmData(EmDataComponent),
    Em1Data(Em1DataComponent),
    Generic(GenericComponent),
}

impl ComponentKind {
    pub fn header(&self) -> &ComponentHeader {
        match self {
            Self::Switch(c) => &c.header,
            Self::Input(c) => &c.header,
            Self::Cover(c) => &c.header,
            Self::Sys(c) => &c.header,
            Self::Cloud(c) => &c.header,
            Self::Wifi(c) => &c.header,
            Self::Ws(c) => &c.header,
            Self::Eth(c) => &c.header,
            Self::Bthome(c) => &c.header,
            Self::Ble(c) => &c.header,
            Self::Knx(c) => &c.header,
            Self::Mqtt(c) => &c.header,
            Self::Zigbee(c) => &c.header,
            Self::Em(c) => &c.header,
            Self::Em1(c) => &c.header,
            Self::EmData(c) => &c.header,
            Self::Em1Data(c) => &c.header,
            Self::Generic(c) => &c.header,
        }
    }

    fn header_mut(&mut self) -> &mut ComponentHeader {
        match self {
            Self::Switch(c) => &mut c.header,
            Self::Input(c) => &mut c.header,
            Self::Cover(c) => &mut c.header,
            Self::Sys(c) => &mut c.header,
            Self::Cloud(c) => &mut c.header,
            Self::Wifi(c) => &mut c.header,
            Self::Ws(c) => &mut c.header,
            Self::Eth(c) => &mut c.header,
            Self::Bthome(c) => &mut c.header,
            Self::Ble(c) => &mut c.header,
            Self::Knx(c) => &mut c.header,
            Self::Mqtt(c) => &mut c.header,
            Self::Zigbee(c) => &mut c.header,
            Self::Em(c) => &mut c.header,
            Self::Em1(c) => &mut c.header,
            Self::EmData(c) => &mut c.header,
            Self::Em1Data(c) => &mut c.header,
            Self::Generic(c) => &mut c.header,
        }
    }

    pub fn key(&self) -> &str {
        &self.header().key
    }

    pub fn component_type(&self) -> &str {
        &self.header().component_type
    }

    /// Derives `available_actions` from the device's RPC method list and
    /// stores them on the component.
    pub fn resolve_available_actions(&mut self, all_methods: &[String]) {
        let actions = match self {
            Self::Switch(_) => all_methods.iter().filter(|m| m.starts_with("Switch.")).cloned().collect(),
            Self::Cover(_) => all_methods.iter().filter(|m| m.starts_with("Cover.")).cloned().collect(),
            Self::Input(_) => all_methods.iter().filter(|m| m.starts_with("Input.")).cloned().collect(),
            Self::Sys(_) => all_methods
                .iter()
                .filter(|m| starts_with_any(m, &["Sys.", "Shelly."]))
                .cloned()
                .collect(),
            Self::Cloud(_) => all_methods.iter().filter(|m| m.starts_with("Cloud.")).cloned().collect(),
            Self::Wifi(_) => all_methods.iter().filter(|m| m.starts_with("Wifi.")).cloned().collect(),
            Self::Ws(_) => Vec::new(),
            Self::Eth(_) => all_methods.iter().filter(|m| m.starts_with("Eth.")).cloned().collect(),
            Self::Bthome(_) => all_methods.iter().filter(|m| m.starts_with("BTHome.")).cloned().collect(),
            Self::Ble(_) => all_methods.iter().filter(|m| m.starts_with("BLE.")).cloned().collect(),
            Self::Knx(_) => all_methods.iter().filter(|m| m.starts_with("KNX.")).cloned().collect(),
            Self::Mqtt(_) => all_methods
                .iter()
                .filter(|m| m.to_lowercase().starts_with("mqtt."))
                .cloned()
                .collect(),
            Self::Zigbee(_) => all_methods
                .iter()
                .filter(|m| starts_with_any(m, &["Zigbee.", "Shelly.Zigbee"]))
                .cloned()
                .collect(),
            Self::Em(_) => all_methods.iter().filter(|m| m.starts_with("EM.")).cloned().collect(),
            Self::Em1(_) => all_methods.iter().filter(|m| m.starts_with("EM1.")).cloned().collect(),
            Self::EmData(_) => all_methods.iter().filter(|m| m.starts_with("EMData.")).cloned().collect(),
            Self::Em1Data(_) => all_methods.iter().filter(|m| m.starts_with("EM1Data.")).cloned().collect(),
            Self::Generic(c) => c.header.default_actions(all_methods),
        };
        self.header_mut().available_actions = actions;
    }

    pub fn can_perform_action(&self, action: &str) -> bool {
        self.header().can_perform_action(action)
    }

    /// Builds a component from a raw `{key, status, config, attrs}` object,
    /// dispatching on the component-type prefix of `key`.
    pub fn from_raw(component_data: &Value) -> Self {
        let header = ComponentHeader::from_raw(component_data);
        let status = &header.status;
        let config = &header.config;

        match header.component_type.as_str() {
            "switch" => {
                let temp = status.get("temperature");
                let temp_c = temp.and_then(|t| t.get("tC")).and_then(Value::as_f64);
                let temp_f = temp.and_then(|t| t.get("tF")).and_then(Value::as_f64);
                let energy_total = status
                    .get("aenergy")
                    .and_then(|e| e.get("total"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                Self::Switch(SwitchComponent {
                    output: get_bool(status, "output", false),
                    power: get_f64(status, "apower", 0.0),
                    voltage: get_f64(status, "voltage", 0.0),
                    current: get_f64(status, "current", 0.0),
                    frequency: get_f64(status, "freq", 0.0),
                    temperature_celsius: temp_c,
                    temperature_fahrenheit: temp_f,
                    energy_total,
                    power_factor: get_f64(status, "pf", 0.0),
                    source: get_str(status, "source").unwrap_or_else(|| "unknown".to_string()),
                    name: get_str(config, "name"),
                    auto_on: get_bool(config, "auto_on", false),
                    auto_off: get_bool(config, "auto_off", false),
                    power_limit: get_f64(config, "power_limit", 0.0),
                    current_limit: get_f64(config, "current_limit", 0.0),
                    header,
                })
            },
            "input" => Self::Input(InputComponent {
                state: Some(get_bool(status, "state", false)),
                input_type: get_str(config, "type").unwrap_or_else(|| "switch".to_string()),
                name: get_str(config, "name"),
                enabled: Some(get_bool(config, "enable", false)),
                inverted: Some(get_bool(config, "invert", false)),
                header,
            }),
            "cover" => {
                let temp = status.get("temperature");
                let temp_c = temp.and_then(|t| t.get("tC")).and_then(Value::as_f64);
                let temp_f = temp.and_then(|t| t.get("tF")).and_then(Value::as_f64);
                let energy_total = status
                    .get("aenergy")
                    .and_then(|e| e.get("total"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                Self::Cover(CoverComponent {
                    state: get_str(status, "state").unwrap_or_else(|| "unknown".to_string()),
                    position: status.get("current_pos").and_then(Value::as_i64),
                    power: get_f64(status, "apower", 0.0),
                    voltage: get_f64(status, "voltage", 0.0),
                    current: get_f64(status, "current", 0.0),
                    temperature_celsius: temp_c,
                    temperature_fahrenheit: temp_f,
                    energy_total,
                    last_direction: get_str(status, "last_direction").unwrap_or_else(|| "unknown".to_string()),
                    source: get_str(status, "source").unwrap_or_else(|| "unknown".to_string()),
                    name: get_str(config, "name"),
                    maxtime_open: get_f64(config, "maxtime_open", 60.0),
                    maxtime_close: get_f64(config, "maxtime_close", 60.0),
                    power_limit: get_f64(config, "power_limit", 0.0),
                    header,
                })
            },
            "sys" => {
                let device_config = obj_get(config, "device");
                let location_config = obj_get(config, "location");
                Self::Sys(SystemComponent {
                    device_name: get_str(device_config, "name"),
                    mac_address: get_str(status, "mac"),
                    firmware_version: get_str(device_config, "fw_id"),
                    uptime: get_u64(status, "uptime", 0),
                    restart_required: get_bool(status, "restart_required", false),
                    ram_total: get_u64(status, "ram_size", 0),
                    ram_free: get_u64(status, "ram_free", 0),
                    fs_total: get_u64(status, "fs_size", 0),
                    fs_free: get_u64(status, "fs_free", 0),
                    available_updates: obj_get(status, "available_updates").clone(),
                    unixtime: get_u64(status, "unixtime", 0),
                    timezone: get_str(location_config, "tz"),
                    header,
                })
            },
            "cloud" => Self::Cloud(CloudComponent {
                connected: get_bool(status, "connected", false),
                enabled: get_bool(config, "enable", false),
                server: get_str(config, "server"),
                header,
            }),
            "wifi" => Self::Wifi(WifiComponent {
                sta_ip: get_str(status, "sta_ip"),
                sta_ip6: get_str_list(status, "sta_ip6"),
                wifi_status: get_str(status, "status").unwrap_or_else(|| "unknown".to_string()),
                ssid: get_str(status, "ssid"),
                bssid: get_str(status, "bssid"),
                rssi: status.get("rssi").and_then(Value::as_i64).unwrap_or(0),
                header,
            }),
            "ws" => Self::Ws(WebSocketComponent {
                connected: get_bool(status, "connected", false),
                header,
            }),
            "eth" => Self::Eth(EthernetComponent {
                eth_ip: get_str(status, "ip"),
                eth_ip6: get_str_list(status, "ip6"),
                enabled: get_bool(config, "enable", true),
                server_mode: get_bool(config, "server_mode", false),
                ipv4_mode: get_str(config, "ipv4mode").unwrap_or_else(|| "dhcp".to_string()),
                netmask: get_str(config, "netmask"),
                gateway: get_str(config, "gw"),
                nameserver: get_str(config, "nameserver"),
                header,
            }),
            "bthome" => Self::Bthome(BthomeComponent {
                errors: get_str_list(status, "errors"),
                enabled: get_bool(config, "enable", false),
                header,
            }),
            "ble" => {
                let rpc_config = obj_get(config, "rpc");
                Self::Ble(BleComponent {
                    enabled: get_bool(config, "enable", false),
                    rpc_enabled: get_bool(rpc_config, "enable", false),
                    header,
                })
            },
            "knx" => {
                let routing_config = obj_get(config, "routing");
                Self::Knx(KnxComponent {
                    enabled: get_bool(config, "enable", false),
                    individual_address: get_str(config, "ia"),
                    routing_address: get_str(routing_config, "addr"),
                    header,
                })
            },
            "mqtt" => Self::Mqtt(MqttComponent {
                connected: get_bool(status, "connected", false),
                enabled: get_bool(config, "enable", false),
                server: get_str(config, "server"),
                client_id: get_str(config, "client_id"),
                user: get_str(config, "user"),
                topic_prefix: get_str(config, "topic_prefix"),
                rpc_notifications: get_bool(config, "rpc_ntf", true),
                status_notifications: get_bool(config, "status_ntf", false),
                use_client_cert: get_bool(config, "use_client_cert", false),
                enable_rpc: get_bool(config, "enable_rpc", true),
                enable_control: get_bool(config, "enable_control", true),
                header,
            }),
            "zigbee" => Self::Zigbee(ZigbeeComponent {
                network_state: get_str(status, "network_state").unwrap_or_else(|| "unknown".to_string()),
                enabled: get_bool(config, "enable", false),
                header,
            }),
            "em" => Self::Em(EmComponent {
                a_current: get_opt_f64(status, "a_current"),
                a_voltage: get_opt_f64(status, "a_voltage"),
                a_act_power: get_opt_f64(status, "a_act_power"),
                a_aprt_power: get_opt_f64(status, "a_aprt_power"),
                a_pf: get_opt_f64(status, "a_pf"),
                a_freq: get_opt_f64(status, "a_freq"),
                b_current: get_opt_f64(status, "b_current"),
                b_voltage: get_opt_f64(status, "b_voltage"),
                b_act_power: get_opt_f64(status, "b_act_power"),
                b_aprt_power: get_opt_f64(status, "b_aprt_power"),
                b_pf: get_opt_f64(status, "b_pf"),
                b_freq: get_opt_f64(status, "b_freq"),
                c_current: get_opt_f64(status, "c_current"),
                c_voltage: get_opt_f64(status, "c_voltage"),
                c_act_power: get_opt_f64(status, "c_act_power"),
                c_aprt_power: get_opt_f64(status, "c_aprt_power"),
                c_pf: get_opt_f64(status, "c_pf"),
                c_freq: get_opt_f64(status, "c_freq"),
                n_current: get_opt_f64(status, "n_current"),
                total_current: get_opt_f64(status, "total_current"),
                total_act_power: get_opt_f64(status, "total_act_power"),
                total_aprt_power: get_opt_f64(status, "total_aprt_power"),
                name: get_str(config, "name"),
                ct_type: get_str(config, "ct_type"),
                header,
            }),
            "em1" => Self::Em1(Em1Component {
                current: get_opt_f64(status, "current"),
                voltage: get_opt_f64(status, "voltage"),
                act_power: get_opt_f64(status, "act_power"),
                aprt_power: get_opt_f64(status, "aprt_power"),
                pf: get_opt_f64(status, "pf"),
                freq: get_opt_f64(status, "freq"),
                name: get_str(config, "name"),
                ct_type: get_str(config, "ct_type"),
                reverse: get_bool(config, "reverse", false),
                header,
            }),
            "emdata" => Self::EmData(EmDataComponent {
                a_total_act_energy: get_f64(status, "a_total_act_energy", 0.0),
                a_total_act_ret_energy: get_f64(status, "a_total_act_ret_energy", 0.0),
                b_total_act_energy: get_f64(status, "b_total_act_energy", 0.0),
                b_total_act_ret_energy: get_f64(status, "b_total_act_ret_energy", 0.0),
                c_total_act_energy: get_f64(status, "c_total_act_energy", 0.0),
                c_total_act_ret_energy: get_f64(status, "c_total_act_ret_energy", 0.0),
                total_act: get_f64(status, "total_act", 0.0),
                total_act_ret: get_f64(status, "total_act_ret", 0.0),
                header,
            }),
            "em1data" => Self::Em1Data(Em1DataComponent {
                total_act_energy: get_f64(status, "total_act_energy", 0.0),
                total_act_ret_energy: get_f64(status, "total_act_ret_energy", 0.0),
                header,
            }),
            _ => Self::Generic(GenericComponent { header }),
        }
    }

    /// Builds a component straight from status data only (no config), used
    /// for the synthesized zigbee component when a device reports zigbee
    /// status out of band from its component list.
    pub fn from_status_only(key: &str, status_data: Value) -> Self {
        let component_data = serde_json::json!({
            "key": key,
            "status": status_data,
            "config": {},
            "attrs": {},
        });
        Self::from_raw(&component_data)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn dispatches_switch_component() {
        let raw = json!({
            "key": "switch:0",
            "status": {"output": true, "apower": 12.5, "voltage": 230.0},
            "config": {"name": "Kitchen"},
        });
        let comp = ComponentKind::from_raw(&raw);
        match &comp {
            ComponentKind::Switch(s) => {
                assert!(s.output);
                assert_eq!(s.power, 12.5);
                assert_eq!(s.name.as_deref(), Some("Kitchen"));
            },
            _ => panic!("expected switch component"),
        }
        assert_eq!(comp.key(), "switch:0");
        assert_eq!(comp.header().component_id, Some(0));
    }

    #[test]
    fn unknown_type_falls_back_to_generic() {
        let raw = json!({"key": "somethingnew", "status": {}, "config": {}});
        let comp = ComponentKind::from_raw(&raw);
        assert!(matches!(comp, ComponentKind::Generic(_)));
    }

    #[test]
    fn resolves_switch_actions_by_prefix() {
        let raw = json!({"key": "switch:0", "status": {}, "config": {}});
        let mut comp = ComponentKind::from_raw(&raw);
        let methods = vec![
            "Switch.Toggle".to_string(),
            "Switch.Set".to_string(),
            "Sys.Reboot".to_string(),
        ];
        comp.resolve_available_actions(&methods);
        assert_eq!(comp.header().available_actions.len(), 2);
        assert!(comp.can_perform_action("Toggle"));
        assert!(!comp.can_perform_action("Reboot"));
    }

    #[test]
    fn system_accepts_sys_and_shelly_prefixes() {
        let raw = json!({"key": "sys", "status": {}, "config": {}});
        let mut comp = ComponentKind::from_raw(&raw);
        let methods = vec!["Sys.GetConfig".to_string(), "Shelly.Reboot".to_string(), "Switch.Toggle".to_string()];
        comp.resolve_available_actions(&methods);
        assert_eq!(comp.header().available_actions.len(), 2);
        assert!(comp.can_perform_action("GetConfig"));
        assert!(comp.can_perform_action("Reboot"));
        assert!(!comp.can_perform_action("Toggle"));
    }

    #[test]
    fn websocket_never_exposes_actions() {
        let raw = json!({"key": "ws", "status": {"connected": true}, "config": {}});
        let mut comp = ComponentKind::from_raw(&raw);
        comp.resolve_available_actions(&["Ws.GetStatus".to_string()]);
        assert!(comp.header().available_actions.is_empty());
    }
}
