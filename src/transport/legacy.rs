// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Legacy HTTP/GET transport for Gen1 devices. No authentication, no
//! JSON-RPC envelope: every endpoint is a plain GET that returns a JSON
//! object, or occasionally bare text.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Speaks the Gen1 HTTP/GET dialect: `GET /{endpoint}?{params}`, parsed as
/// JSON when possible and wrapped as `{"response": <text>}` otherwise.
pub struct LegacyHttpTransport {
    client: Client,
}

impl Default for LegacyHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyHttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder().build().expect("failed to build reqwest client"),
        }
    }

    /// GETs `http://{address}/{endpoint}` with the given query parameters.
    pub async fn get(&self, address: &str, endpoint: &str, params: &[(&str, String)], timeout: Duration) -> CoreResult<Value> {
        let url = format!("http://{address}/{}", endpoint.trim_start_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| CoreError::unreachable(address, e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(CoreError::communication(address, format!("HTTP {}", response.status())));
        }

        let text = response.text().await.map_err(|e| CoreError::communication(address, e.to_string()))?;

        match serde_json::from_str::<Value>(&text) {
            Ok(value @ Value::Object(_)) => Ok(value),
            _ => Ok(serde_json::json!({"response": text})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_json_response_is_wrapped_as_raw_text() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/status"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let transport = LegacyHttpTransport::new();
        let address = server.address().to_string();
        let value = transport.get(&address, "status", &[], Duration::from_secs(1)).await.unwrap();
        assert_eq!(value["response"], "not json");
    }

    #[tokio::test]
    async fn json_object_response_is_passed_through() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/shelly"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({"type": "SHSW-1"})))
            .mount(&server)
            .await;

        let transport = LegacyHttpTransport::new();
        let address = server.address().to_string();
        let value = transport.get(&address, "shelly", &[], Duration::from_secs(1)).await.unwrap();
        assert_eq!(value["type"], "SHSW-1");
    }

    #[tokio::test]
    async fn non_200_status_is_a_communication_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/relay/0"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = LegacyHttpTransport::new();
        let address = server.address().to_string();
        let err = transport
            .get(&address, "relay/0", &[("turn", "toggle".to_string())], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Communication { .. }));
    }
}
