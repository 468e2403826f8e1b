// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use fleetlink::auth::{AuthStateCache, FileCredentialStore};
use fleetlink::domain::DiscoveryOutcome;
use fleetlink::gateway::DeviceGateway;
use fleetlink::transport::{LegacyHttpTransport, RpcTransport};
use serde_json::json;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

async fn gateway_against(server: &MockServer) -> DeviceGateway {
    let dir = std::env::temp_dir().join(format!("fleetlink-legacy-fallback-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Arc::new(FileCredentialStore::open(dir.join("creds.json")).await.unwrap());
    let auth_state = Arc::new(AuthStateCache::default());
    let _ = server;
    DeviceGateway::new(
        RpcTransport::new(store, Arc::clone(&auth_state)),
        LegacyHttpTransport::new(),
        auth_state,
        Duration::from_millis(200),
        Duration::from_millis(200),
        Duration::from_millis(200),
    )
}

/// A Gen1 device that refuses `/rpc` entirely but answers the three
/// legacy endpoints, matching spec scenario 3.
async fn start_legacy_only_device() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(matchers::path("/rpc")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/shelly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "shelly1-abc", "type": "SHSW-1", "fw": "v1.14.0"})))
        .mount(&server)
        .await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "has_update": true,
            "relays": [{"ison": false}],
            "meters": [{"power": 0}],
        })))
        .mount(&server)
        .await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Hallway",
            "relays": [{"name": "Main"}],
        })))
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn discover_falls_back_to_legacy_and_reports_update_available() {
    let server = start_legacy_only_device().await;
    let gateway = gateway_against(&server).await;
    let address = server.address().to_string();

    let result = gateway.discover_device(&address).await;

    assert_eq!(result.outcome, DiscoveryOutcome::UpdateAvailable);
    let snapshot = result.snapshot.expect("legacy discovery should produce a snapshot");
    assert_eq!(snapshot.device_name.as_deref(), Some("Hallway"));
}

#[tokio::test]
async fn full_status_maps_legacy_switch_and_sys_components() {
    let server = start_legacy_only_device().await;
    let gateway = gateway_against(&server).await;
    let address = server.address().to_string();

    let snapshot = gateway.get_full_status(&address).await.unwrap();

    let switch = snapshot.components.iter().find(|c| c.key() == "switch:0").expect("switch:0 component expected");
    let header = switch.header();
    assert_eq!(header.status.get("output"), Some(&json!(false)));
    assert_eq!(header.config.get("name"), Some(&json!("Main")));
    let legacy_actions = header.attrs.get("legacy_actions").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let legacy_actions: Vec<String> = legacy_actions.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
    for expected in ["Legacy.Toggle", "Legacy.TurnOn", "Legacy.TurnOff"] {
        assert!(legacy_actions.contains(&expected.to_string()), "missing {expected} in {legacy_actions:?}");
    }

    assert!(snapshot.components.iter().any(|c| c.key() == "sys"));
}
