// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! mDNS discovery boundary. The concrete zero-configuration networking
//! client (e.g. `_http._tcp.local.` / `_shelly._tcp.local.` service
//! browsing) is an external collaborator per spec; this module defines
//! only the trait the scanner dispatches through, plus a null
//! implementation so the scanner is constructible without one.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

/// Resolves candidate device addresses via mDNS/zeroconf. Infallible at
/// this boundary: a failed or unsupported discovery attempt returns an
/// empty list rather than an error, matching the "log and return empty"
/// behavior of the use case this trait replaces.
#[async_trait]
pub trait MdnsDiscovery: Send + Sync {
    async fn discover_device_ips(&self, timeout: Duration, service_types: Option<&[String]>) -> Vec<String>;
}

/// Default `MdnsDiscovery` for builds with no zeroconf backend wired in.
/// Always returns an empty list and logs a warning, mirroring
/// `ScanDevicesUseCase`'s behavior when no mDNS client is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMdnsDiscovery;

#[async_trait]
impl MdnsDiscovery for NullMdnsDiscovery {
    async fn discover_device_ips(&self, _timeout: Duration, _service_types: Option<&[String]>) -> Vec<String> {
        warn!("mDNS discovery requested but no mDNS gateway is configured");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_discovery_returns_empty() {
        let mdns = NullMdnsDiscovery;
        let ips = mdns.discover_device_ips(Duration::from_secs(1), None).await;
        assert!(ips.is_empty());
    }
}
