// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The per-device snapshot assembled from a device's raw RPC/legacy
//! response, plus the result types the scanner and bulk orchestrator hand
//! back to callers.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::component::ComponentKind;

/// Serde helper for representing a `Duration` as whole milliseconds, which
/// is the resolution an RPC round trip actually needs.
mod serde_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Mirrors the discrete states a discovery attempt can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryOutcome {
    Detected,
    UpdateAvailable,
    NoUpdateNeeded,
    AuthRequired,
    NotADevice,
    Unreachable,
    Error,
}

impl DiscoveryOutcome {
    /// The set of outcomes a scan sweep keeps; everything else (currently
    /// nothing else exists besides these) is filtered out.
    pub fn is_kept_by_scan(self) -> bool {
        matches!(self, Self::Detected | Self::UpdateAvailable | Self::NoUpdateNeeded)
    }
}

/// Device-level identity fields, gathered from `Shelly.GetDeviceInfo` on
/// the modern path or the `shelly`/`settings` payloads on the legacy path.
/// Grouped into one struct rather than threaded as positional arguments
/// since the set keeps growing as more of the device-info surface is
/// covered.
#[derive(Debug, Clone, Default)]
pub struct DeviceIdentity {
    pub device_type: Option<String>,
    pub device_name: Option<String>,
    pub app_name: Option<String>,
    pub firmware_version: Option<String>,
    pub mac_address: Option<String>,
    pub config_revision: Option<i64>,
}

/// A fully assembled view of one device: identity, components, and the
/// derived rollups callers read most often.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub ip: String,
    pub mac_address: Option<String>,
    pub device_type: Option<String>,
    pub device_name: Option<String>,
    pub app_name: Option<String>,
    pub firmware_version: Option<String>,
    pub config_revision: Option<i64>,
    pub auth_required: bool,
    pub methods: Vec<String>,
    pub components: Vec<ComponentKind>,
}

impl DeviceSnapshot {
    /// Builds a snapshot from a modern device's raw component list, plus an
    /// optional out-of-band zigbee status blob synthesized into its own
    /// component when the device doesn't already report one.
    pub fn from_raw_response(
        ip: impl Into<String>,
        identity: DeviceIdentity,
        raw_components: &[Value],
        zigbee_status: Option<Value>,
        all_methods: &[String],
    ) -> Self {
        let mut components: Vec<ComponentKind> = raw_components
            .iter()
            .map(|raw| {
                let mut c = ComponentKind::from_raw(raw);
                c.resolve_available_actions(all_methods);
                c
            })
            .collect();

        if let Some(zigbee_status) = zigbee_status {
            let already_present = components.iter().any(|c| c.component_type() == "zigbee");
            if !already_present {
                let mut synthesized = ComponentKind::from_status_only("zigbee", zigbee_status);
                synthesized.resolve_available_actions(all_methods);
                components.push(synthesized);
            }
        }

        Self {
            ip: ip.into(),
            mac_address: identity.mac_address,
            device_type: identity.device_type,
            device_name: identity.device_name,
            app_name: identity.app_name,
            firmware_version: identity.firmware_version,
            config_revision: identity.config_revision,
            auth_required: false,
            methods: all_methods.to_vec(),
            components,
        }
    }

    pub fn get_component_by_key(&self, key: &str) -> Option<&ComponentKind> {
        self.components.iter().find(|c| c.key() == key)
    }

    pub fn get_components_by_type(&self, component_type: &str) -> Vec<&ComponentKind> {
        self.components.iter().filter(|c| c.component_type() == component_type).collect()
    }

    pub fn has_component_type(&self, component_type: &str) -> bool {
        self.components.iter().any(|c| c.component_type() == component_type)
    }

    pub fn switches(&self) -> impl Iterator<Item = &ComponentKind> {
        self.components.iter().filter(|c| matches!(c, ComponentKind::Switch(_)))
    }

    /// Sum of every switch's instantaneous power, every 3-phase energy
    /// meter's total active power, and every 1-phase energy meter's active
    /// power. Missing readings count as zero rather than excluding the
    /// component from the sum.
    pub fn total_power(&self) -> f64 {
        self.components
            .iter()
            .map(|c| match c {
                ComponentKind::Switch(s) => s.power,
                ComponentKind::Em(em) => em.total_act_power.unwrap_or(0.0),
                ComponentKind::Em1(em1) => em1.act_power.unwrap_or(0.0),
                _ => 0.0,
            })
            .sum()
    }

    pub fn summary(&self) -> Value {
        serde_json::json!({
            "ip": self.ip,
            "mac_address": self.mac_address,
            "device_type": self.device_type,
            "device_name": self.device_name,
            "firmware_version": self.firmware_version,
            "auth_required": self.auth_required,
            "component_count": self.components.len(),
            "total_power": self.total_power(),
        })
    }
}

/// The outcome of discovering a single target during a scan sweep.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResult {
    pub ip: String,
    pub outcome: DiscoveryOutcome,
    pub snapshot: Option<DeviceSnapshot>,
    pub error: Option<String>,
}

impl DiscoveryResult {
    /// Builds a successful discovery result. `has_update` is `None` when the
    /// update check itself couldn't be performed (falls back to plain
    /// `Detected`), `Some(true)`/`Some(false)` otherwise.
    pub fn detected(snapshot: DeviceSnapshot, has_update: Option<bool>) -> Self {
        let outcome = match has_update {
            None => DiscoveryOutcome::Detected,
            Some(true) => DiscoveryOutcome::UpdateAvailable,
            Some(false) => DiscoveryOutcome::NoUpdateNeeded,
        };
        Self {
            ip: snapshot.ip.clone(),
            outcome,
            snapshot: Some(snapshot),
            error: None,
        }
    }

    pub fn auth_required(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            outcome: DiscoveryOutcome::AuthRequired,
            snapshot: None,
            error: None,
        }
    }

    pub fn not_a_device(ip: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            outcome: DiscoveryOutcome::NotADevice,
            snapshot: None,
            error: Some(reason.into()),
        }
    }

    pub fn unreachable(ip: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            outcome: DiscoveryOutcome::Unreachable,
            snapshot: None,
            error: Some(reason.into()),
        }
    }

    pub fn error(ip: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            outcome: DiscoveryOutcome::Error,
            snapshot: None,
            error: Some(message.into()),
        }
    }
}

/// The result of one action against one device, as accumulated by the
/// bulk orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub ip: String,
    pub verb: String,
    pub component_key: Option<String>,
    pub success: bool,
    pub message: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    #[serde(with = "serde_millis")]
    pub duration: Duration,
    pub timestamp: String,
}

impl ActionResult {
    pub fn ok(ip: impl Into<String>, verb: impl Into<String>, component_key: Option<String>, result: Value, duration: Duration) -> Self {
        Self {
            ip: ip.into(),
            verb: verb.into(),
            component_key,
            success: true,
            message: "ok".to_string(),
            result: Some(result),
            error: None,
            duration,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn failed(ip: impl Into<String>, verb: impl Into<String>, component_key: Option<String>, error: impl Into<String>, duration: Duration) -> Self {
        let error = error.into();
        Self {
            ip: ip.into(),
            verb: verb.into(),
            component_key,
            success: false,
            message: error.clone(),
            result: None,
            error: Some(error),
            duration,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// A failure that still carries a partial data payload, e.g. per-component
    /// results gathered before one of them came back unsuccessful.
    pub fn failed_with_result(
        ip: impl Into<String>,
        verb: impl Into<String>,
        component_key: Option<String>,
        error: impl Into<String>,
        result: Value,
        duration: Duration,
    ) -> Self {
        let error = error.into();
        Self {
            ip: ip.into(),
            verb: verb.into(),
            component_key,
            success: false,
            message: error.clone(),
            result: Some(result),
            error: Some(error),
            duration,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Aggregate outcome of a bulk operation fanned out over many devices.
#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub verb: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ActionResult>,
    #[serde(with = "serde_millis")]
    pub duration: Duration,
}

impl BulkResult {
    pub fn from_results(verb: impl Into<String>, results: Vec<ActionResult>, duration: Duration) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        Self {
            verb: verb.into(),
            total: results.len(),
            succeeded,
            failed,
            results,
            duration,
        }
    }
}
