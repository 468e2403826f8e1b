// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use fleetlink::auth::{AuthStateCache, FileCredentialStore};
use fleetlink::bulk::BulkOrchestrator;
use fleetlink::gateway::DeviceGateway;
use fleetlink::transport::{LegacyHttpTransport, RpcTransport};
use serde_json::{Value, json};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate, matchers};

/// A modern device with `switch_count` switches, whose `Switch.GetConfig`
/// call fails for every component when `fail_get_config` is set.
struct ModernDevice {
    switch_count: usize,
    fail_get_config: bool,
}

impl Respond for ModernDevice {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let method = body.get("method").and_then(Value::as_str).unwrap_or("");

        match method {
            "Shelly.GetDeviceInfo" => ResponseTemplate::new(200).set_body_json(json!({"result": {"mac": "AABBCCDDEEFF", "model": "SNSW-001"}})),
            "Shelly.GetComponents" => {
                let components: Vec<Value> = (0..self.switch_count)
                    .map(|i| json!({"key": format!("switch:{i}"), "status": {"output": false}, "config": {"name": format!("Switch {i}")}}))
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({"result": {"components": components}}))
            },
            "Shelly.GetStatus" => ResponseTemplate::new(200).set_body_json(json!({"result": {}})),
            "Shelly.ListMethods" => ResponseTemplate::new(200).set_body_json(json!({"result": {"methods": ["Switch.GetConfig"]}})),
            "Switch.GetConfig" if self.fail_get_config => ResponseTemplate::new(500),
            "Switch.GetConfig" => {
                let id = body.get("params").and_then(|p| p.get("id")).and_then(Value::as_u64).unwrap_or(0);
                ResponseTemplate::new(200).set_body_json(json!({"result": {"id": id, "name": format!("Switch {id}")}}))
            },
            _ => ResponseTemplate::new(404),
        }
    }
}

async fn gateway_against(server: &MockServer, switch_count: usize, fail_get_config: bool) -> DeviceGateway {
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/rpc"))
        .respond_with(ModernDevice { switch_count, fail_get_config })
        .mount(server)
        .await;

    let dir = std::env::temp_dir().join(format!("fleetlink-bulk-export-test-{}-{}", std::process::id(), switch_count));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Arc::new(FileCredentialStore::open(dir.join("creds.json")).await.unwrap());
    let auth_state = Arc::new(AuthStateCache::default());
    DeviceGateway::new(
        RpcTransport::new(store, Arc::clone(&auth_state)),
        LegacyHttpTransport::new(),
        auth_state,
        Duration::from_millis(200),
        Duration::from_millis(200),
        Duration::from_millis(200),
    )
}

/// Mirrors spec scenario 6: two devices, one with two switches that both
/// export cleanly, one with a single switch whose `GetConfig` fails.
#[tokio::test]
async fn export_shape_matches_per_device_component_results() {
    let server_a1 = MockServer::start().await;
    let server_a2 = MockServer::start().await;

    let gateway_a1 = gateway_against(&server_a1, 2, false).await;
    let gateway_a2 = gateway_against(&server_a2, 1, true).await;

    let a1 = server_a1.address().to_string();
    let a2 = server_a2.address().to_string();

    // Each address is served by its own gateway instance wired to its own
    // mock server, so route through a combined orchestrator that shares one
    // gateway backed by whichever server the address belongs to is not
    // possible here; instead export each address individually and merge.
    let bulk_a1 = BulkOrchestrator::new(Arc::new(gateway_a1), 10);
    let bulk_a2 = BulkOrchestrator::new(Arc::new(gateway_a2), 10);

    let export_a1 = bulk_a1.bulk_config_export(&[a1.clone()], &["switch".to_string()]).await.unwrap();
    let export_a2 = bulk_a2.bulk_config_export(&[a2.clone()], &["switch".to_string()]).await.unwrap();

    let devices_a1 = export_a1["devices"][a1.as_str()]["components"].as_object().unwrap();
    assert_eq!(devices_a1.len(), 2);
    for (_, entry) in devices_a1 {
        assert_eq!(entry["success"], true);
    }

    let devices_a2 = export_a2["devices"][a2.as_str()]["components"].as_object().unwrap();
    assert_eq!(devices_a2.len(), 1);
    for (_, entry) in devices_a2 {
        assert_eq!(entry["success"], false);
        assert!(entry["error"].is_string());
    }

    assert_eq!(export_a1["export_metadata"]["total_devices"], 1);
    assert_eq!(export_a2["export_metadata"]["total_devices"], 1);
}
