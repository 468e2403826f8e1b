// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bulk fan-out over many devices: scan, status, firmware update, reboot,
//! factory reset, and configuration export/apply, each bounded by a
//! semaphore-limited worker pool with per-device error isolation.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::{
    domain::{ActionResult, BulkResult, DeviceSnapshot},
    error::{CoreError, CoreResult},
    gateway::DeviceGateway,
};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const MAX_MAX_CONCURRENCY: usize = 50;

/// Fans single-device operations out over an address list with bounded
/// concurrency, aggregating per-device results without letting one
/// device's failure abort the batch.
pub struct BulkOrchestrator {
    gateway: Arc<DeviceGateway>,
    max_concurrency: usize,
}

fn clamp_concurrency(max_concurrency: usize) -> usize {
    max_concurrency.clamp(1, MAX_MAX_CONCURRENCY)
}

impl BulkOrchestrator {
    pub fn new(gateway: Arc<DeviceGateway>, max_concurrency: usize) -> Self {
        Self {
            gateway,
            max_concurrency: clamp_concurrency(max_concurrency),
        }
    }

    fn validate_addresses(addresses: &[String], operation: &str) -> CoreResult<()> {
        if addresses.is_empty() {
            return Err(CoreError::BulkOperationError {
                operation: operation.to_string(),
                message: "address list must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Runs `op` against every address with bounded concurrency, never
    /// letting one spawned task's panic take the rest of the batch down.
    async fn fan_out<F, Fut, T>(&self, addresses: &[String], op: F) -> Vec<T>
    where
        F: Fn(Arc<DeviceGateway>, String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let op = Arc::new(op);
        let mut set = JoinSet::new();

        for address in addresses.iter().cloned() {
            let gateway = Arc::clone(&self.gateway);
            let permit = Arc::clone(&semaphore);
            let op = Arc::clone(&op);
            set.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("bulk semaphore closed unexpectedly");
                op(gateway, address).await
            });
        }

        let mut results = Vec::with_capacity(addresses.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(value) => results.push(value),
                Err(e) => warn!(error = %e, "bulk fan-out task panicked"),
            }
        }
        results
    }

    /// Runs `Discover` per address; keeps only the positively-detected
    /// results.
    pub async fn bulk_scan(&self, addresses: &[String]) -> CoreResult<BulkResult> {
        Self::validate_addresses(addresses, "bulk_scan")?;
        let start = Instant::now();
        let discoveries = self.fan_out(addresses, |gateway, address| async move { gateway.discover_device(&address).await }).await;

        let results: Vec<ActionResult> = discoveries
            .into_iter()
            .filter(|d| d.outcome.is_kept_by_scan())
            .map(|d| match d.snapshot {
                Some(snapshot) => ActionResult::ok(d.ip, "Discover", None, snapshot.summary(), Duration::ZERO),
                None => ActionResult::ok(d.ip, "Discover", None, Value::Null, Duration::ZERO),
            })
            .collect();

        Ok(BulkResult::from_results("Discover", results, start.elapsed()))
    }

    /// Delegates to `DeviceGateway::execute_bulk_action(addr, "Update", {channel})`.
    pub async fn bulk_update(&self, addresses: &[String], channel: &str) -> CoreResult<BulkResult> {
        self.run_bulk_action(addresses, "Update", json!({"channel": channel})).await
    }

    /// Delegates to `DeviceGateway::execute_bulk_action(addr, "Reboot", {})`.
    pub async fn bulk_reboot(&self, addresses: &[String]) -> CoreResult<BulkResult> {
        self.run_bulk_action(addresses, "Reboot", json!({})).await
    }

    /// Delegates to `DeviceGateway::execute_bulk_action(addr, "FactoryReset", {})`.
    pub async fn bulk_factory_reset(&self, addresses: &[String]) -> CoreResult<BulkResult> {
        self.run_bulk_action(addresses, "FactoryReset", json!({})).await
    }

    async fn run_bulk_action(&self, addresses: &[String], action: &str, params: Value) -> CoreResult<BulkResult> {
        Self::validate_addresses(addresses, action)?;
        let start = Instant::now();
        let verb = action.to_string();
        let action = action.to_string();
        let results = self
            .fan_out(addresses, move |gateway, address| {
                let action = action.clone();
                let params = params.clone();
                async move { gateway.execute_bulk_action(&address, &action, Some(params)).await }
            })
            .await;
        Ok(BulkResult::from_results(verb, results, start.elapsed()))
    }

    /// Runs `GetFullStatus` per address with bounded concurrency. Unlike
    /// the sequential status loop the use case this is grounded on uses,
    /// every address is probed concurrently; a per-device failure is
    /// logged and excluded rather than aborting the batch.
    pub async fn bulk_status(&self, addresses: &[String]) -> CoreResult<Vec<DeviceSnapshot>> {
        Self::validate_addresses(addresses, "bulk_status")?;
        let results = self
            .fan_out(addresses, |gateway, address| async move { gateway.get_full_status(&address).await })
            .await;

        Ok(results
            .into_iter()
            .filter_map(|r| match r {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(error = %e, "bulk_status: device excluded from results");
                    None
                },
            })
            .collect())
    }

    /// Exports the `GetConfig` result of every component whose type is in
    /// `component_types`, for each address, as the nested shape described
    /// in spec §5.
    pub async fn bulk_config_export(&self, addresses: &[String], component_types: &[String]) -> CoreResult<Value> {
        Self::validate_addresses(addresses, "bulk_config_export")?;
        let component_types = component_types.to_vec();
        let component_types_for_metadata = component_types.clone();

        let devices = self
            .fan_out(addresses, move |gateway, address| {
                let component_types = component_types.clone();
                async move {
                    let snapshot = match gateway.get_full_status(&address).await {
                        Ok(snapshot) => snapshot,
                        Err(e) => return (address, Err(e.to_string())),
                    };

                    let mut components = Map::new();
                    for component in &snapshot.components {
                        if !component_types.iter().any(|t| t == component.component_type()) {
                            continue;
                        }
                        let result = gateway.execute_component_action(&address, component.key(), "GetConfig", None).await;
                        let entry = if result.success {
                            json!({
                                "type": component.component_type(),
                                "success": true,
                                "config": result.result,
                                "error": Value::Null,
                            })
                        } else {
                            json!({
                                "type": component.component_type(),
                                "success": false,
                                "config": Value::Null,
                                "error": result.error,
                            })
                        };
                        components.insert(component.key().to_string(), entry);
                    }

                    let device_info = json!({
                        "ip": snapshot.ip,
                        "mac_address": snapshot.mac_address,
                        "device_name": snapshot.device_name,
                        "device_type": snapshot.device_type,
                        "firmware_version": snapshot.firmware_version,
                    });

                    (address, Ok(json!({"device_info": device_info, "components": components})))
                }
            })
            .await;

        let mut devices_obj = Map::new();
        for (address, outcome) in devices {
            let entry = outcome.unwrap_or_else(|error| json!({"device_info": Value::Null, "components": {}, "error": error}));
            devices_obj.insert(address, entry);
        }

        Ok(json!({
            "export_metadata": {
                "timestamp": Utc::now().to_rfc3339(),
                "total_devices": devices_obj.len(),
                "component_types": component_types_for_metadata,
            },
            "devices": devices_obj,
        }))
    }

    /// Applies `config` via `SetConfig` to every component matching
    /// `component_type`, for each address.
    pub async fn bulk_config_apply(&self, addresses: &[String], component_type: &str, config: Value) -> CoreResult<BulkResult> {
        Self::validate_addresses(addresses, "bulk_config_apply")?;
        let start = Instant::now();
        let component_type = component_type.to_string();

        let results = self
            .fan_out(addresses, move |gateway, address| {
                let component_type = component_type.clone();
                let config = config.clone();
                async move {
                    let device_start = Instant::now();
                    let snapshot = match gateway.get_full_status(&address).await {
                        Ok(snapshot) => snapshot,
                        Err(e) => return ActionResult::failed(address, "SetConfig", None, e.to_string(), device_start.elapsed()),
                    };

                    let matching: Vec<_> = snapshot.components.iter().filter(|c| c.component_type() == component_type).collect();
                    if matching.is_empty() {
                        return ActionResult::failed(
                            address,
                            "SetConfig",
                            None,
                            format!("no '{component_type}' component on this device"),
                            device_start.elapsed(),
                        );
                    }

                    let mut per_component = Map::new();
                    let mut all_succeeded = true;
                    for component in matching {
                        let result = gateway.execute_component_action(&address, component.key(), "SetConfig", Some(json!({"config": config}))).await;
                        all_succeeded &= result.success;
                        per_component.insert(
                            component.key().to_string(),
                            json!({"success": result.success, "error": result.error}),
                        );
                    }

                    if all_succeeded {
                        ActionResult::ok(address, "SetConfig", None, Value::Object(per_component), device_start.elapsed())
                    } else {
                        ActionResult::failed_with_result(
                            address,
                            "SetConfig",
                            None,
                            "one or more components failed to apply config",
                            Value::Object(per_component),
                            device_start.elapsed(),
                        )
                    }
                }
            })
            .await;

        Ok(BulkResult::from_results("SetConfig", results, start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_address_list() {
        assert!(BulkOrchestrator::validate_addresses(&[], "op").unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn clamps_max_concurrency_to_bounds() {
        assert_eq!(clamp_concurrency(0), 1);
        assert_eq!(clamp_concurrency(1_000), MAX_MAX_CONCURRENCY);
        assert_eq!(clamp_concurrency(DEFAULT_MAX_CONCURRENCY), DEFAULT_MAX_CONCURRENCY);
    }
}
