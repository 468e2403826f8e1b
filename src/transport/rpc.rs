// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Modern JSON-RPC-over-HTTP transport: one POST per call, with a single
//! 401-challenge-and-retry cycle and a per-hardware-address digest-auth
//! instance cache so nonce state survives across calls to the same
//! device.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use digest_auth::{AuthContext, HttpMethod, WwwAuthenticateHeader};
use reqwest::{
    Client, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE},
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::{AuthStateCache, CredentialStore, normalize_mac},
    error::{CoreError, CoreResult},
};

/// A cached digest-auth challenge for one device, reused across calls so
/// the nonce-count keeps advancing instead of re-challenging every call.
struct DigestCacheEntry {
    header: Mutex<WwwAuthenticateHeader>,
    username: String,
    password: String,
}

/// Speaks the modern JSON-RPC dialect to a single device over HTTP,
/// resolving authentication against a shared credential store and
/// auth-state cache.
pub struct RpcTransport {
    client: Client,
    credential_store: Arc<dyn CredentialStore>,
    auth_state: Arc<AuthStateCache>,
    digest_cache: DashMap<String, Arc<DigestCacheEntry>>,
    ip_to_mac: DashMap<String, String>,
}

enum ResolvedAuth {
    None,
    Basic(String, String),
    Digest(String),
}

impl RpcTransport {
    pub fn new(credential_store: Arc<dyn CredentialStore>, auth_state: Arc<AuthStateCache>) -> Self {
        Self {
            client: Client::builder().build().expect("failed to build reqwest client"),
            credential_store,
            auth_state,
            digest_cache: DashMap::new(),
            ip_to_mac: DashMap::new(),
        }
    }

    /// Calls a JSON-RPC method on a device, resolving auth automatically
    /// from the credential store and auth-state cache.
    pub async fn call(
        &self,
        address: &str,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> CoreResult<(Value, Duration)> {
        self.call_inner(address, method, params, timeout, None).await
    }

    /// Calls a JSON-RPC method using an explicit basic-auth credential
    /// instead of the credential store / digest flow.
    pub async fn call_with_credential(
        &self,
        address: &str,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
        username: &str,
        password: &str,
    ) -> CoreResult<(Value, Duration)> {
        self.call_inner(address, method, params, timeout, Some((username, password))).await
    }

    async fn call_inner(
        &self,
        address: &str,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
        explicit: Option<(&str, &str)>,
    ) -> CoreResult<(Value, Duration)> {
        let start = Instant::now();
        let url = format!("http://{address}/rpc");
        let mut body = serde_json::json!({"id": Uuid::new_v4().to_string(), "method": method});
        if let Some(p) = params {
            body["params"] = p;
        }
        let body_bytes = serde_json::to_vec(&body).map_err(|e| CoreError::communication(address, e.to_string()))?;

        let resolved = self.resolve_auth(address, explicit, timeout, &body_bytes).await;
        let had_auth = !matches!(resolved, ResolvedAuth::None);

        let response = self.post(&url, &body, timeout, &resolved).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if had_auth {
                self.invalidate(address).await;
                return Err(CoreError::auth_required(address, "authentication failed with stored credentials"));
            }
            return self.handle_challenge(address, &url, &body, &body_bytes, timeout, response, start).await;
        }

        if response.status() != StatusCode::OK {
            return Err(CoreError::communication(address, format!("HTTP {}", response.status())));
        }

        let value = parse_rpc_body(&response.text().await.map_err(|e| CoreError::communication(address, e.to_string()))?, address)?;
        Ok((value, start.elapsed()))
    }

    async fn resolve_auth(
        &self,
        address: &str,
        explicit: Option<(&str, &str)>,
        timeout: Duration,
        body_bytes: &[u8],
    ) -> ResolvedAuth {
        if let Some((user, pass)) = explicit {
            return ResolvedAuth::Basic(user.to_string(), pass.to_string());
        }

        let normalized_addr = normalize_mac(address);
        let known_mac = self.ip_to_mac.get(&normalized_addr).map(|e| e.clone());
        let requires = self.auth_state.requires_auth(address)
            || known_mac.as_deref().is_some_and(|m| self.auth_state.requires_auth(m));

        if !requires {
            return ResolvedAuth::None;
        }

        let Some(mac) = self.ensure_mac(address, timeout).await else {
            return ResolvedAuth::None;
        };

        // Reuse a digest instance only if one has already been minted from
        // a prior 401 challenge; without a live nonce there is nothing to
        // answer with, so the call falls through unauthenticated and earns
        // its own challenge below.
        match self.digest_cache.get(&mac) {
            Some(entry) => match digest_header_for(&entry, "POST", "/rpc", body_bytes) {
                Ok(header) => ResolvedAuth::Digest(header),
                Err(_) => ResolvedAuth::None,
            },
            None => ResolvedAuth::None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_challenge(
        &self,
        address: &str,
        url: &str,
        body: &Value,
        body_bytes: &[u8],
        timeout: Duration,
        challenge_response: reqwest::Response,
        start: Instant,
    ) -> CoreResult<(Value, Duration)> {
        let challenge = challenge_response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| CoreError::auth_required(address, "401 without a WWW-Authenticate challenge"))?;

        self.auth_state.mark_auth_required(address);

        let mac = self
            .ensure_mac(address, timeout)
            .await
            .ok_or_else(|| CoreError::auth_required(address, "could not resolve device hardware address for credential lookup"))?;
        self.auth_state.mark_auth_required(&mac);

        let credential = self
            .credential_store
            .get(&mac)
            .await
            .map_err(|e| CoreError::communication(address, e.to_string()))?
            .ok_or_else(|| CoreError::auth_required(address, "no credentials stored for this device"))?;

        let mut prompt: WwwAuthenticateHeader =
            digest_auth::parse(&challenge).map_err(|e| CoreError::auth_required(address, format!("invalid digest challenge: {e}")))?;
        let context = AuthContext::new_with_method(
            &credential.username,
            credential.password.expose(),
            "/rpc",
            Some(body_bytes),
            HttpMethod::POST,
        );
        let answer = prompt
            .respond(&context)
            .map_err(|e| CoreError::auth_required(address, format!("failed to answer digest challenge: {e}")))?;
        let header_value = answer.to_header_string();

        self.digest_cache.insert(
            mac.clone(),
            Arc::new(DigestCacheEntry {
                header: Mutex::new(prompt),
                username: credential.username.clone(),
                password: credential.password.expose().to_string(),
            }),
        );

        let retry = self.post(url, body, timeout, &ResolvedAuth::Digest(header_value)).await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            self.invalidate(address).await;
            return Err(CoreError::auth_required(address, "invalid credentials for device"));
        }
        if retry.status() != StatusCode::OK {
            return Err(CoreError::communication(address, format!("HTTP {}", retry.status())));
        }

        let value = parse_rpc_body(&retry.text().await.map_err(|e| CoreError::communication(address, e.to_string()))?, address)?;
        Ok((value, start.elapsed()))
    }

    async fn post(&self, url: &str, body: &Value, timeout: Duration, auth: &ResolvedAuth) -> CoreResult<reqwest::Response> {
        let mut builder = self.client.post(url).timeout(timeout).header(CONTENT_TYPE, "application/json").json(body);

        builder = match auth {
            ResolvedAuth::None => builder,
            ResolvedAuth::Basic(user, pass) => builder.basic_auth(user, Some(pass)),
            ResolvedAuth::Digest(header) => builder.header(AUTHORIZATION, header.clone()),
        };

        builder.send().await.map_err(|e| CoreError::unreachable(url, e.to_string()))
    }

    /// Resolves a device's hardware address, caching it by IP. Makes an
    /// unauthenticated `Shelly.GetDeviceInfo` call if not already known;
    /// swallows any failure, matching the "best effort" resolution the
    /// auth-challenge path relies on.
    async fn ensure_mac(&self, address: &str, timeout: Duration) -> Option<String> {
        let normalized_addr = normalize_mac(address);
        if let Some(mac) = self.ip_to_mac.get(&normalized_addr) {
            return Some(mac.clone());
        }

        let url = format!("http://{address}/rpc");
        let body = serde_json::json!({"id": Uuid::new_v4().to_string(), "method": "Shelly.GetDeviceInfo"});
        let response = self.post(&url, &body, timeout, &ResolvedAuth::None).await.ok()?;
        if response.status() != StatusCode::OK {
            return None;
        }
        let text = response.text().await.ok()?;
        let value = parse_rpc_body(&text, address).ok()?;

        let mac = value
            .get("mac")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| value.get("id").and_then(Value::as_str).and_then(|id| id.rsplit_once('-').map(|(_, m)| m.to_string())))?;

        let normalized_mac = normalize_mac(&mac);
        self.ip_to_mac.insert(normalized_addr, normalized_mac.clone());
        Some(normalized_mac)
    }

    /// Clears cached auth state for a device after a failed authenticated
    /// call: called by the transport itself on a failed retry, and by
    /// callers when stored credentials change.
    pub async fn invalidate(&self, address: &str) {
        self.auth_state.mark_auth_not_required(address);
        let normalized_addr = normalize_mac(address);
        if let Some(mac) = self.ip_to_mac.get(&normalized_addr).map(|e| e.clone()) {
            self.auth_state.mark_auth_not_required(&mac);
            self.digest_cache.remove(&mac);
        }
    }

    /// Invalidates the cached digest instance for a hardware address
    /// directly; called by the credential store when credentials for that
    /// key are updated or deleted.
    pub fn invalidate_credential_cache(&self, mac: &str) {
        self.digest_cache.remove(&normalize_mac(mac));
    }
}

fn digest_header_for(entry: &DigestCacheEntry, _method: &str, uri: &str, body: &[u8]) -> CoreResult<String> {
    let context = AuthContext::new_with_method(&entry.username, &entry.password, uri, Some(body), HttpMethod::POST);
    let mut guard = entry.header.lock().expect("digest cache mutex poisoned");
    let answer = guard.respond(&context).map_err(|e| CoreError::communication("", e.to_string()))?;
    Ok(answer.to_header_string())
}

/// Parses an RPC response body, accepting either `{"result": ...}` or a
/// bare result object at the top level.
fn parse_rpc_body(text: &str, address: &str) -> CoreResult<Value> {
    let parsed: Value = serde_json::from_str(text).map_err(|e| CoreError::communication(address, format!("malformed JSON response: {e}")))?;
    Ok(parsed.get("result").cloned().unwrap_or(parsed))
}
