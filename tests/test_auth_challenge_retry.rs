// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use fleetlink::auth::{AuthStateCache, Credential, CredentialStore, FileCredentialStore, Secret};
use fleetlink::transport::RpcTransport;
use serde_json::json;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate, matchers};

/// Answers a device-info probe unconditionally, and challenges the first
/// call to the method under test before letting the retry through.
struct DeviceInfoThenChallengeOnce {
    challenged: AtomicBool,
}

impl Respond for DeviceInfoThenChallengeOnce {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        match body.get("method").and_then(|m| m.as_str()) {
            Some("Shelly.GetDeviceInfo") => ResponseTemplate::new(200).set_body_json(json!({"result": {"mac": "AABBCCDDEEFF", "model": "SNSW-001"}})),
            Some("Shelly.Reboot") if !self.challenged.swap(true, Ordering::SeqCst) => {
                ResponseTemplate::new(401).insert_header("WWW-Authenticate", r#"Digest realm="shelly", nonce="abc123", qop="auth", algorithm=MD5"#)
            },
            Some("Shelly.Reboot") => {
                let had_auth = request.headers.get("Authorization").is_some();
                ResponseTemplate::new(200).set_body_json(json!({"result": {"ok": had_auth}}))
            },
            _ => ResponseTemplate::new(404),
        }
    }
}

#[tokio::test]
async fn retries_exactly_once_after_a_digest_challenge() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/rpc"))
        .respond_with(DeviceInfoThenChallengeOnce { challenged: AtomicBool::new(false) })
        .mount(&server)
        .await;

    let dir = std::env::temp_dir().join(format!("fleetlink-auth-retry-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = FileCredentialStore::open(dir.join("creds.json")).await.unwrap();
    store
        .set(Credential {
            key: "AABBCCDDEEFF".to_string(),
            username: "admin".to_string(),
            password: Secret::new("secret"),
        })
        .await
        .unwrap();

    let auth_state = Arc::new(AuthStateCache::default());
    let rpc = RpcTransport::new(Arc::new(store), Arc::clone(&auth_state));

    let address = server.address().to_string();
    let (value, _elapsed) = rpc.call(&address, "Shelly.Reboot", None, Duration::from_secs(2)).await.unwrap();

    assert_eq!(value["ok"], true);
    assert!(auth_state.requires_auth(&address));
    assert!(auth_state.requires_auth("AABBCCDDEEFF"));
}
