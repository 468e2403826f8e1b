// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The dual-protocol device gateway: one operation per verb (Discover,
//! GetFullStatus, ExecuteComponentAction, GetConfig, SetConfig,
//! execute_bulk_action), each trying the modern JSON-RPC dialect first and
//! falling back to the legacy Gen1 HTTP/GET dialect transparently.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use serde_json::{Value, json};

use crate::{
    auth::AuthStateCache,
    domain::{
        ActionResult, DeviceIdentity, DeviceSnapshot, DiscoveryResult, legacy_mapper::LegacyComponentMapper,
    },
    error::{CoreError, CoreResult},
    transport::{LegacyHttpTransport, RpcTransport},
};

/// Canonical lowercase-component-type → RPC method prefix table. Unknown
/// types fall back to a simple title-cased prefix.
fn canonical_prefix(component_type: &str) -> String {
    let known = match component_type {
        "switch" => "Switch",
        "input" => "Input",
        "cover" => "Cover",
        "sys" => "Sys",
        "cloud" => "Cloud",
        "shelly" => "Shelly",
        "schedule" => "Schedule",
        "webhook" => "Webhook",
        "kvs" => "KVS",
        "script" => "Script",
        "wifi" => "Wifi",
        "ws" => "WS",
        "eth" => "Eth",
        "http" => "HTTP",
        "ble" => "BLE",
        "bthome" => "BTHome",
        "mqtt" => "Mqtt",
        "knx" => "KNX",
        "zigbee" => "Zigbee",
        "matter" => "Matter",
        "modbus" => "Modbus",
        "dali" => "DALI",
        "em" => "EM",
        "em1" => "EM1",
        "pm1" => "PM1",
        "devicepower" => "DevicePower",
        "ui" => "UI",
        "temperature" => "Temperature",
        "humidity" => "Humidity",
        "voltmeter" => "Voltmeter",
        "smoke" => "Smoke",
        "light" => "Light",
        "rgb" => "RGB",
        "rgbw" => "RGBW",
        "cct" => "CCT",
        other => return title_case(other),
    };
    known.to_string()
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn build_rpc_method_name(component_type: &str, action: &str) -> String {
    format!("{}.{action}", canonical_prefix(component_type))
}

/// Splits `switch:0` into `("switch", "0")`; a keyless component like
/// `sys` yields an empty id half.
fn parse_component_key(key: &str) -> (&str, &str) {
    key.split_once(':').unwrap_or((key, ""))
}

/// Builds the `{"id": <int>}` params seed for a component action, or an
/// empty object for keyless components.
fn component_id_params(key: &str) -> Value {
    match parse_component_key(key) {
        (_, "") => json!({}),
        (_, id) => match id.parse::<u32>() {
            Ok(id) => json!({"id": id}),
            Err(_) => json!({}),
        },
    }
}

/// Shallow-merges `extra`'s keys into `base`, caller-supplied values
/// winning over the seeded `id`.
fn merge_params(mut base: Value, extra: Value) -> Value {
    if let (Some(base_obj), Value::Object(extra_obj)) = (base.as_object_mut(), extra) {
        for (k, v) in extra_obj {
            base_obj.insert(k, v);
        }
    }
    base
}

fn non_empty_params(params: Value) -> Option<Value> {
    match &params {
        Value::Object(o) if o.is_empty() => None,
        _ => Some(params),
    }
}

fn extract_methods(value: &Value) -> Vec<String> {
    value
        .get("methods")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|m| m.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Builds a [`DeviceIdentity`] from a modern `Shelly.GetDeviceInfo`
/// response.
fn modern_identity(device_info: &Value) -> DeviceIdentity {
    DeviceIdentity {
        device_type: device_info.get("model").and_then(Value::as_str).map(str::to_string),
        device_name: device_info.get("name").and_then(Value::as_str).map(str::to_string),
        app_name: device_info.get("app").and_then(Value::as_str).map(str::to_string),
        firmware_version: device_info
            .get("fw_id")
            .and_then(Value::as_str)
            .or_else(|| device_info.get("ver").and_then(Value::as_str))
            .map(str::to_string),
        mac_address: device_info.get("mac").and_then(Value::as_str).map(str::to_string),
        config_revision: device_info.get("cfg_rev").and_then(Value::as_i64),
    }
}

/// Legacy firmware reports a pending update as either a bare `has_update`
/// boolean, or only as a differing `old_version`/`new_version` pair.
fn parse_legacy_update_flag(status: &Value) -> bool {
    let update = status.get("update");
    if let Some(has_update) = update.and_then(|u| u.get("has_update")).and_then(Value::as_bool) {
        return has_update;
    }
    let old = update.and_then(|u| u.get("old_version")).and_then(Value::as_str);
    let new = update.and_then(|u| u.get("new_version")).and_then(Value::as_str);
    matches!((old, new), (Some(o), Some(n)) if o != n && !n.is_empty())
}

/// A 404 on the modern or legacy path means the address answers HTTP but
/// isn't one of these devices at all, distinct from an unreachable host.
fn is_not_a_device(err: &CoreError) -> bool {
    matches!(err, CoreError::Communication { message, .. } if message.contains("404"))
}

/// Speaks both the modern JSON-RPC dialect and the legacy Gen1 HTTP/GET
/// dialect to a device, falling back to the legacy path whenever the
/// modern one is unreachable or doesn't resolve to a device.
pub struct DeviceGateway {
    rpc: RpcTransport,
    legacy: LegacyHttpTransport,
    auth_state: Arc<AuthStateCache>,
    /// Caches each device's `Shelly.ListMethods` result by address so
    /// repeated gated actions don't re-fetch it.
    method_cache: DashMap<String, Vec<String>>,
    discovery_timeout: Duration,
    status_timeout: Duration,
    action_timeout: Duration,
}

impl DeviceGateway {
    pub fn new(
        rpc: RpcTransport,
        legacy: LegacyHttpTransport,
        auth_state: Arc<AuthStateCache>,
        discovery_timeout: Duration,
        status_timeout: Duration,
        action_timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            legacy,
            auth_state,
            method_cache: DashMap::new(),
            discovery_timeout,
            status_timeout,
            action_timeout,
        }
    }

    /// Tries the modern path, falls back to legacy discovery, and
    /// classifies the result into one of the outcomes `DiscoveryResult`
    /// supports.
    pub async fn discover_device(&self, address: &str) -> DiscoveryResult {
        match self.discover_modern(address).await {
            Ok(result) => result,
            Err(CoreError::AuthRequired { .. }) => DiscoveryResult::auth_required(address),
            Err(modern_err) => {
                if is_not_a_device(&modern_err) {
                    return DiscoveryResult::not_a_device(address, modern_err.to_string());
                }
                match self.discover_legacy(address).await {
                    Ok(result) => result,
                    Err(legacy_err) => {
                        if is_not_a_device(&legacy_err) {
                            DiscoveryResult::not_a_device(address, legacy_err.to_string())
                        } else {
                            DiscoveryResult::unreachable(address, format!("modern: {modern_err}; legacy: {legacy_err}"))
                        }
                    },
                }
            },
        }
    }

    async fn discover_modern(&self, address: &str) -> CoreResult<DiscoveryResult> {
        let (info, _) = self.rpc.call(address, "Shelly.GetDeviceInfo", None, self.discovery_timeout).await?;
        let identity = modern_identity(&info);

        let mut snapshot = DeviceSnapshot::from_raw_response(address, identity, &[], None, &[]);
        snapshot.auth_required = self.auth_state.requires_auth(address);

        let has_update = self.check_for_update(address).await;
        Ok(DiscoveryResult::detected(snapshot, has_update))
    }

    async fn discover_legacy(&self, address: &str) -> CoreResult<DiscoveryResult> {
        let (shelly, status, settings) = self.fetch_legacy_payloads(address).await?;
        let snapshot = Self::build_legacy_snapshot(address, &shelly, &status, &settings);
        let has_update = parse_legacy_update_flag(&status);
        Ok(DiscoveryResult::detected(snapshot, Some(has_update)))
    }

    /// `Shelly.CheckForUpdate` is best-effort: any failure here falls back
    /// to a plain `Detected` outcome rather than failing discovery.
    async fn check_for_update(&self, address: &str) -> Option<bool> {
        let (value, _) = self.rpc.call(address, "Shelly.CheckForUpdate", None, self.status_timeout).await.ok()?;
        Some(value.get("stable").is_some() || value.get("beta").is_some())
    }

    /// Fetches the `shelly` payload (required) plus best-effort `status`
    /// and `settings` payloads from a Gen1 device.
    async fn fetch_legacy_payloads(&self, address: &str) -> CoreResult<(Value, Value, Value)> {
        let shelly = self.legacy.get(address, "shelly", &[], self.discovery_timeout).await?;
        let status = self.legacy.get(address, "status", &[], self.discovery_timeout).await.unwrap_or_else(|_| json!({}));
        let settings = self.legacy.get(address, "settings", &[], self.discovery_timeout).await.unwrap_or_else(|_| json!({}));
        Ok((shelly, status, settings))
    }

    fn build_legacy_snapshot(address: &str, shelly: &Value, status: &Value, settings: &Value) -> DeviceSnapshot {
        let identity = LegacyComponentMapper::identity(shelly, status, settings);
        let raw_components = LegacyComponentMapper::map_components(status, settings);
        let mut snapshot = DeviceSnapshot::from_raw_response(address, identity, &raw_components, None, &[]);
        snapshot.auth_required = false;
        snapshot
    }

    /// Modern path: `Shelly.GetDeviceInfo`, `Shelly.GetComponents`,
    /// `Shelly.GetStatus`, and `Shelly.ListMethods` as four sequential
    /// awaits. If any of the first three succeeds the snapshot is built;
    /// if all three fail, falls back to the legacy mapping path.
    pub async fn get_full_status(&self, address: &str) -> CoreResult<DeviceSnapshot> {
        if let Some(snapshot) = self.get_full_status_modern(address).await {
            return Ok(snapshot);
        }
        self.get_full_status_legacy(address).await
    }

    async fn get_full_status_modern(&self, address: &str) -> Option<DeviceSnapshot> {
        let device_info = self.rpc.call(address, "Shelly.GetDeviceInfo", None, self.status_timeout).await;
        let components_resp = self.rpc.call(address, "Shelly.GetComponents", Some(json!({"offset": 0})), self.status_timeout).await;
        let status_resp = self.rpc.call(address, "Shelly.GetStatus", None, self.status_timeout).await;
        let methods_resp = self.rpc.call(address, "Shelly.ListMethods", None, self.status_timeout).await;

        if device_info.is_err() && components_resp.is_err() && status_resp.is_err() {
            return None;
        }

        let identity = device_info.as_ref().ok().map(|(v, _)| modern_identity(v)).unwrap_or_default();

        let raw_components: Vec<Value> = components_resp
            .as_ref()
            .ok()
            .and_then(|(v, _)| v.get("components").and_then(Value::as_array).cloned())
            .unwrap_or_default();

        let zigbee_status = status_resp.as_ref().ok().and_then(|(v, _)| v.get("zigbee").cloned());

        let methods = match methods_resp {
            Ok((value, _)) => {
                let methods = extract_methods(&value);
                self.method_cache.insert(address.to_string(), methods.clone());
                methods
            },
            Err(_) => self.method_cache.get(address).map(|m| m.clone()).unwrap_or_default(),
        };

        let mut snapshot = DeviceSnapshot::from_raw_response(address, identity, &raw_components, zigbee_status, &methods);
        snapshot.auth_required = self.auth_state.requires_auth(address);
        Some(snapshot)
    }

    async fn get_full_status_legacy(&self, address: &str) -> CoreResult<DeviceSnapshot> {
        let (shelly, status, settings) = self.fetch_legacy_payloads(address).await?;
        Ok(Self::build_legacy_snapshot(address, &shelly, &status, &settings))
    }

    /// Returns a device's RPC method list, serving it from the per-address
    /// cache after the first successful fetch.
    pub async fn get_available_methods(&self, address: &str) -> CoreResult<Vec<String>> {
        if let Some(cached) = self.method_cache.get(address) {
            return Ok(cached.clone());
        }
        let (value, _) = self.rpc.call(address, "Shelly.ListMethods", None, self.status_timeout).await?;
        let methods = extract_methods(&value);
        self.method_cache.insert(address.to_string(), methods.clone());
        Ok(methods)
    }

    /// Dispatches one component action. `Legacy.`-prefixed actions route
    /// to the fixed legacy endpoint mapping and never consult the method
    /// list; everything else builds and gates a modern RPC call.
    pub async fn execute_component_action(&self, address: &str, component_key: &str, action: &str, params: Option<Value>) -> ActionResult {
        match action.strip_prefix("Legacy.") {
            Some(legacy_action) => self.execute_legacy_action(address, component_key, legacy_action).await,
            None => self.execute_modern_action(address, component_key, action, params).await,
        }
    }

    async fn execute_modern_action(&self, address: &str, component_key: &str, action: &str, params: Option<Value>) -> ActionResult {
        let (component_type, _) = parse_component_key(component_key);
        let method_name = build_rpc_method_name(component_type, action);
        let component_key = Some(component_key.to_string());

        if let Ok(methods) = self.get_available_methods(address).await
            && !methods.is_empty()
            && !methods.iter().any(|m| m == &method_name)
        {
            return ActionResult::failed(
                address,
                action,
                component_key,
                format!("method '{method_name}' is not in the device's method list"),
                Duration::ZERO,
            );
        }

        let call_params = non_empty_params(merge_params(component_id_params(component_key.as_deref().unwrap_or_default()), params.unwrap_or_else(|| json!({}))));

        match self.rpc.call(address, &method_name, call_params, self.action_timeout).await {
            Ok((data, elapsed)) => ActionResult::ok(address, action, component_key, data, elapsed),
            Err(err) => ActionResult::failed(address, action, component_key, err.to_string(), Duration::ZERO),
        }
    }

    async fn execute_legacy_action(&self, address: &str, component_key: &str, action: &str) -> ActionResult {
        let (component_type, id) = parse_component_key(component_key);

        let routed: Option<(String, Vec<(&str, String)>)> = match (component_type, action) {
            ("switch", "Toggle") => Some((format!("relay/{id}"), vec![("turn", "toggle".to_string())])),
            ("switch", "TurnOn") => Some((format!("relay/{id}"), vec![("turn", "on".to_string())])),
            ("switch", "TurnOff") => Some((format!("relay/{id}"), vec![("turn", "off".to_string())])),
            ("cover", "Open") => Some((format!("roller/{id}"), vec![("go", "open".to_string())])),
            ("cover", "Close") => Some((format!("roller/{id}"), vec![("go", "close".to_string())])),
            ("cover", "Stop") => Some((format!("roller/{id}"), vec![("go", "stop".to_string())])),
            ("input", "InputMomentary") => Some((format!("settings/relay/{id}"), vec![("btn_type", "momentary".to_string())])),
            ("input", "InputToggle") => Some((format!("settings/relay/{id}"), vec![("btn_type", "toggle".to_string())])),
            ("input", "InputEdge") => Some((format!("settings/relay/{id}"), vec![("btn_type", "edge".to_string())])),
            ("input", "InputDetached") => Some((format!("settings/relay/{id}"), vec![("btn_type", "detached".to_string())])),
            ("input", "InputActivation") => Some((format!("settings/relay/{id}"), vec![("btn_type", "activation".to_string())])),
            ("input", "InputMomentaryRelease") => {
                Some((format!("settings/relay/{id}"), vec![("btn_type", "momentary_release".to_string())]))
            },
            ("input", "InputReverse") => Some((format!("settings/relay/{id}"), vec![("btn_reverse", "1".to_string())])),
            ("input", "InputNormal") => Some((format!("settings/relay/{id}"), vec![("btn_reverse", "0".to_string())])),
            _ => None,
        };

        let verb = format!("Legacy.{action}");
        let component_key = Some(component_key.to_string());

        let Some((endpoint, query)) = routed else {
            return ActionResult::failed(
                address,
                verb,
                component_key,
                format!("unsupported legacy action 'Legacy.{action}' on component type '{component_type}'"),
                Duration::ZERO,
            );
        };

        let start = Instant::now();
        match self.legacy.get(address, &endpoint, &query, self.action_timeout).await {
            Ok(data) => ActionResult::ok(address, verb, component_key, data, start.elapsed()),
            Err(err) => ActionResult::failed(address, verb, component_key, err.to_string(), start.elapsed()),
        }
    }

    /// Runs one of the three device-wide verbs (`Update`, `Reboot`,
    /// `FactoryReset`) against a single address; any other verb is
    /// rejected without touching the network.
    pub async fn execute_bulk_action(&self, address: &str, action: &str, params: Option<Value>) -> ActionResult {
        if !matches!(action, "Update" | "Reboot" | "FactoryReset") {
            return ActionResult::failed(
                address,
                action,
                Some("shelly".to_string()),
                format!("bulk action '{action}' is not a supported device-wide verb"),
                Duration::ZERO,
            );
        }
        self.execute_component_action(address, "shelly", action, params).await
    }

    /// Convenience wrapper around `Sys.GetConfig`.
    pub async fn get_config(&self, address: &str) -> ActionResult {
        self.execute_component_action(address, "sys", "GetConfig", None).await
    }

    /// Convenience wrapper around `Sys.SetConfig {config: <map>}`.
    pub async fn set_config(&self, address: &str, config: Value) -> ActionResult {
        self.execute_component_action(address, "sys", "SetConfig", Some(json!({"config": config}))).await
    }
}
