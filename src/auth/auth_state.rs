// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::normalize_mac;

pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Tracks which devices (keyed by MAC address or, failing that, raw IP) are
/// known to require authentication, with entries expiring after a TTL.
///
/// Entries are normalized the same way regardless of whether the key looks
/// like a MAC address or an IP — `normalize_mac` is a no-op on a key with no
/// colons or dashes, which is exactly the IP case.
pub struct AuthStateCache {
    entries: DashMap<String, Instant>,
    ttl: Duration,
}

impl Default for AuthStateCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECONDS)
    }
}

impl AuthStateCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Marks a device as requiring authentication, refreshing its TTL if
    /// already present.
    pub fn mark_auth_required(&self, key: &str) {
        let key = normalize_mac(key);
        self.entries.insert(key, Instant::now());
    }

    /// Clears a device's auth-required state.
    pub fn mark_auth_not_required(&self, key: &str) {
        let key = normalize_mac(key);
        self.entries.remove(&key);
    }

    /// Returns whether a device is currently known to require
    /// authentication. Expired entries are removed as a side effect.
    pub fn requires_auth(&self, key: &str) -> bool {
        let key = normalize_mac(key);
        match self.entries.get(&key) {
            Some(marked_at) if marked_at.elapsed() <= self.ttl => true,
            Some(_) => {
                drop(self.entries.remove(&key));
                false
            },
            None => false,
        }
    }

    /// Returns whether a device has any (possibly expired) entry, removing
    /// it first if expired.
    pub fn is_known(&self, key: &str) -> bool {
        self.requires_auth(key)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sweeps all expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().elapsed() > self.ttl)
            .map(|e| e.key().clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use std::{thread::sleep, time::Duration};

    use super::*;

    #[test]
    fn marks_and_queries_auth_required() {
        let cache = AuthStateCache::default();
        cache.mark_auth_required("AABBCCDDEEFF");
        assert!(cache.requires_auth("AABBCCDDEEFF"));
    }

    #[test]
    fn mark_not_required_clears_entry() {
        let cache = AuthStateCache::default();
        cache.mark_auth_required("AABBCCDDEEFF");
        cache.mark_auth_not_required("AABBCCDDEEFF");
        assert!(!cache.requires_auth("AABBCCDDEEFF"));
    }

    #[test]
    fn unknown_device_does_not_require_auth() {
        let cache = AuthStateCache::default();
        assert!(!cache.requires_auth("UNKNOWN"));
    }

    #[test]
    fn normalizes_mac_variants() {
        let cache = AuthStateCache::default();
        cache.mark_auth_required("AA:BB:CC:DD:EE:FF");
        assert!(cache.requires_auth("AABBCCDDEEFF"));
        assert!(cache.requires_auth("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn handles_ip_addresses_unchanged() {
        let cache = AuthStateCache::default();
        cache.mark_auth_required("192.168.1.100");
        assert!(cache.requires_auth("192.168.1.100"));
        assert!(cache.is_known("192.168.1.100"));
    }

    #[test]
    fn len_and_clear() {
        let cache = AuthStateCache::default();
        assert_eq!(cache.len(), 0);
        cache.mark_auth_required("DEVICE1");
        cache.mark_auth_required("DEVICE2");
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(!cache.is_known("DEVICE1"));
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = AuthStateCache::new(0);
        cache.mark_auth_required("AABBCCDDEEFF");
        sleep(Duration::from_millis(5));
        assert!(!cache.requires_auth("AABBCCDDEEFF"));
    }

    #[test]
    fn cleanup_expired_counts_and_removes() {
        let cache = AuthStateCache::new(0);
        cache.mark_auth_required("OLD_DEVICE");
        sleep(Duration::from_millis(5));
        let removed = cache.cleanup_expired();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn cleanup_expired_returns_zero_when_nothing_expired() {
        let cache = AuthStateCache::default();
        cache.mark_auth_required("DEVICE1");
        cache.mark_auth_required("DEVICE2");
        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.len(), 2);
    }
}
