// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the device gateway: network timeouts,
/// concurrency bounds, auth-state behavior, and the credential store
/// location.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Per-call network timeouts.
    pub network: NetworkConfig,
    /// Bounded-concurrency limits for the scanner and bulk orchestrator.
    pub concurrency: ConcurrencyConfig,
    /// Digest-auth state cache and credential-store settings.
    pub auth: AuthConfig,
}

/// Per-call timeouts, expressed in seconds in YAML.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NetworkConfig {
    #[serde(rename = "DiscoveryTimeout", with = "serde_secs")]
    /// Timeout for a single device's discovery RPC round trip.
    pub discovery_timeout: Duration,
    #[serde(rename = "StatusTimeout", with = "serde_secs")]
    /// Timeout for a single full-status RPC round trip.
    pub status_timeout: Duration,
    #[serde(rename = "ActionTimeout", with = "serde_secs")]
    /// Timeout for a single component-action RPC round trip.
    pub action_timeout: Duration,
}

/// Bounded-concurrency worker counts.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ConcurrencyConfig {
    #[serde(rename = "MaxConcurrentScans")]
    /// Maximum devices probed in parallel during a scan sweep.
    pub max_concurrent_scans: usize,
    #[serde(rename = "MaxConcurrentBulkOps")]
    /// Maximum devices acted on in parallel during a bulk operation.
    pub max_concurrent_bulk_ops: usize,
}

/// Auth-state cache TTL and credential-store location.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AuthConfig {
    #[serde(rename = "AuthStateTtl", with = "serde_secs")]
    /// How long a device is remembered as requiring auth before a fresh
    /// probe is allowed to re-check it.
    pub auth_state_ttl: Duration,
    #[serde(rename = "CredentialStorePath")]
    /// Path to the on-disk credential store.
    pub credential_store_path: String,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants that can't be expressed in the type system
    /// alone.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.concurrency.max_concurrent_scans >= 1, "MaxConcurrentScans must be >= 1");
        ensure!(self.concurrency.max_concurrent_bulk_ops >= 1, "MaxConcurrentBulkOps must be >= 1");
        ensure!(!self.auth.credential_store_path.is_empty(), "CredentialStorePath must not be empty");
        ensure!(self.network.discovery_timeout.as_millis() > 0, "DiscoveryTimeout must be > 0");
        ensure!(self.network.status_timeout.as_millis() > 0, "StatusTimeout must be > 0");
        ensure!(self.network.action_timeout.as_millis() > 0, "ActionTimeout must be > 0");
        Ok(())
    }
}

/// Serde helper for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
network:
  DiscoveryTimeout: 5
  StatusTimeout: 10
  ActionTimeout: 10
concurrency:
  MaxConcurrentScans: 32
  MaxConcurrentBulkOps: 16
auth:
  AuthStateTtl: 3600
  CredentialStorePath: "/tmp/fleetlink/credentials.json"
"#
    }

    #[test]
    fn parses_and_validates_a_well_formed_config() {
        let cfg: Config = serde_yaml::from_str(sample_yaml()).unwrap();
        let mut cfg = cfg;
        cfg.validate_and_normalize().unwrap();
        assert_eq!(cfg.concurrency.max_concurrent_scans, 32);
        assert_eq!(cfg.network.discovery_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut cfg: Config = serde_yaml::from_str(sample_yaml()).unwrap();
        cfg.concurrency.max_concurrent_scans = 0;
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn rejects_empty_credential_store_path() {
        let mut cfg: Config = serde_yaml::from_str(sample_yaml()).unwrap();
        cfg.auth.credential_store_path.clear();
        assert!(cfg.validate_and_normalize().is_err());
    }
}
