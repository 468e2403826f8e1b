// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bounded-concurrency device sweep: expands targets (or asks mDNS) into
//! an address list, probes each one through the gateway, and filters and
//! rewrites outcomes for the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    domain::{DiscoveryOutcome, DiscoveryResult},
    error::{CoreError, CoreResult},
    gateway::DeviceGateway,
    mdns::MdnsDiscovery,
    target::expand_targets,
};

/// Probes many addresses through a [`DeviceGateway`] with bounded
/// concurrency, an optional mDNS address source, and outcome
/// classification per spec §4.7.
pub struct Scanner {
    gateway: Arc<DeviceGateway>,
    mdns: Arc<dyn MdnsDiscovery>,
}

impl Scanner {
    pub fn new(gateway: Arc<DeviceGateway>, mdns: Arc<dyn MdnsDiscovery>) -> Self {
        Self { gateway, mdns }
    }

    /// Runs a scan sweep. `targets` is ignored (and may be empty) when
    /// `use_mdns` is set; otherwise it is expanded via [`expand_targets`]
    /// and rejected if empty.
    pub async fn scan(&self, targets: &[String], timeout: Duration, max_workers: usize, use_mdns: bool) -> CoreResult<Vec<DiscoveryResult>> {
        self.scan_with_cancellation(targets, timeout, max_workers, use_mdns, None).await
    }

    /// Same as [`Scanner::scan`], but cooperatively stops dispatching new
    /// probes once `cancellation` is triggered; in-flight probes still
    /// complete rather than being aborted mid-call.
    pub async fn scan_with_cancellation(
        &self,
        targets: &[String],
        timeout: Duration,
        max_workers: usize,
        use_mdns: bool,
        cancellation: Option<CancellationToken>,
    ) -> CoreResult<Vec<DiscoveryResult>> {
        let addresses = self.resolve_addresses(targets, timeout, use_mdns).await?;

        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut set = JoinSet::new();

        for address in addresses {
            if cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
                break;
            }
            let gateway = Arc::clone(&self.gateway);
            let permit = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("scan semaphore closed unexpectedly");
                gateway.discover_device(&address).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(Self::apply_outcome_rules(result)),
                Err(e) => debug!(error = %e, "scan probe task panicked"),
            }
        }

        Ok(results.into_iter().filter(|r| r.outcome.is_kept_by_scan()).collect())
    }

    async fn resolve_addresses(&self, targets: &[String], timeout: Duration, use_mdns: bool) -> CoreResult<Vec<String>> {
        if use_mdns {
            return Ok(self.mdns.discover_device_ips(timeout, None).await);
        }
        if targets.is_empty() {
            return Err(CoreError::validation("targets", "target list must not be empty when mDNS discovery is not enabled"));
        }
        expand_targets(targets)
    }

    /// Rewrites an otherwise-positive outcome to `auth-required` when the
    /// discovered snapshot reports it needs authentication.
    fn apply_outcome_rules(mut result: DiscoveryResult) -> DiscoveryResult {
        if result.outcome.is_kept_by_scan()
            && let Some(snapshot) = &result.snapshot
            && snapshot.auth_required
        {
            result.outcome = DiscoveryOutcome::AuthRequired;
            result.snapshot = None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        auth::{AuthStateCache, FileCredentialStore},
        transport::{LegacyHttpTransport, RpcTransport},
    };

    struct StubMdns(Vec<String>);

    #[async_trait]
    impl MdnsDiscovery for StubMdns {
        async fn discover_device_ips(&self, _timeout: Duration, _service_types: Option<&[String]>) -> Vec<String> {
            self.0.clone()
        }
    }

    async fn gateway() -> Arc<DeviceGateway> {
        let dir = std::env::temp_dir().join(format!("fleetlink-scanner-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = Arc::new(FileCredentialStore::open(dir.join("creds.json")).await.unwrap());
        let auth_state = Arc::new(AuthStateCache::default());
        Arc::new(DeviceGateway::new(
            RpcTransport::new(store, Arc::clone(&auth_state)),
            LegacyHttpTransport::new(),
            auth_state,
            Duration::from_millis(50),
            Duration::from_millis(50),
            Duration::from_millis(50),
        ))
    }

    #[tokio::test]
    async fn rejects_empty_targets_without_mdns() {
        let scanner = Scanner::new(gateway().await, Arc::new(StubMdns(Vec::new())));
        let err = scanner.scan(&[], Duration::from_millis(50), 4, false).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn unreachable_targets_are_filtered_out() {
        let scanner = Scanner::new(gateway().await, Arc::new(StubMdns(Vec::new())));
        let targets = vec!["10.255.255.1".to_string(), "10.255.255.2".to_string()];
        let results = scanner.scan(&targets, Duration::from_millis(50), 4, false).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn mdns_source_is_used_when_enabled() {
        let scanner = Scanner::new(gateway().await, Arc::new(StubMdns(vec!["10.255.255.3".to_string()])));
        let results = scanner.scan(&[], Duration::from_millis(50), 4, true).await.unwrap();
        assert!(results.is_empty());
    }
}
