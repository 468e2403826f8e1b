// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, fmt, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::normalize_mac;

/// A password that never prints its contents via `{:?}`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// MAC address (normalized) this credential applies to, or `"*"` for the
    /// global fallback.
    pub key: String,
    pub username: String,
    pub password: Secret,
}

/// Storage boundary for per-device credentials, keyed by normalized MAC
/// address (or `"*"` for a global fallback).
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Credential>>;
    async fn get(&self, mac: &str) -> Result<Option<Credential>>;
    async fn set(&self, credential: Credential) -> Result<()>;
    async fn delete(&self, mac: &str) -> Result<()>;
}

/// File-backed credential store. The on-disk JSON is obfuscated with a
/// local XOR key file rather than real at-rest encryption — integrators
/// who need genuine encryption-at-rest should supply their own
/// `CredentialStore` backed by a secrets manager.
pub struct FileCredentialStore {
    path: PathBuf,
    key_path: PathBuf,
    cache: DashMap<String, Credential>,
    lock: Arc<RwLock<()>>,
}

impl FileCredentialStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let key_path = path.with_extension("key");

        let store = Self {
            path,
            key_path,
            cache: DashMap::new(),
            lock: Arc::new(RwLock::new(())),
        };
        store.load().await?;
        Ok(store)
    }

    async fn obfuscation_key(&self) -> Result<Vec<u8>> {
        if let Ok(existing) = tokio::fs::read(&self.key_path).await {
            return Ok(existing);
        }
        let mut key = vec![0u8; 32];
        rand::rng().fill_bytes(&mut key);
        tokio::fs::write(&self.key_path, &key)
            .await
            .context("failed to persist credential obfuscation key")?;
        Ok(key)
    }

    fn xor(data: &[u8], key: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % key.len()])
            .collect()
    }

    async fn load(&self) -> Result<()> {
        let Ok(raw) = tokio::fs::read(&self.path).await else {
            return Ok(());
        };
        let key = self.obfuscation_key().await?;
        let plain = Self::xor(&raw, &key);
        let decoded: HashMap<String, Credential> = serde_json::from_slice(&plain)
            .context("failed to parse credential store contents")?;
        for (k, v) in decoded {
            self.cache.insert(k, v);
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.lock.write().await;
        let snapshot: HashMap<String, Credential> = self
            .cache
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let plain = serde_json::to_vec(&snapshot).context("failed to serialize credentials")?;
        let key = self.obfuscation_key().await?;
        let obfuscated = Self::xor(&plain, &key);
        tokio::fs::write(&self.path, obfuscated)
            .await
            .context("failed to write credential store")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn list_all(&self) -> Result<Vec<Credential>> {
        Ok(self.cache.iter().map(|e| e.value().clone()).collect())
    }

    async fn get(&self, mac: &str) -> Result<Option<Credential>> {
        let key = normalize_mac(mac);
        if let Some(cred) = self.cache.get(&key) {
            return Ok(Some(cred.clone()));
        }
        Ok(self.cache.get("*").map(|c| c.clone()))
    }

    async fn set(&self, credential: Credential) -> Result<()> {
        let key = normalize_mac(&credential.key);
        self.cache.insert(key, credential);
        self.persist().await
    }

    async fn delete(&self, mac: &str) -> Result<()> {
        let key = normalize_mac(mac);
        self.cache.remove(&key);
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let dir = tempfile_dir();
        let store = FileCredentialStore::open(dir.join("creds.json")).await.unwrap();

        store
            .set(Credential {
                key: "aa:bb:cc:dd:ee:ff".to_string(),
                username: "admin".to_string(),
                password: Secret::new("hunter2"),
            })
            .await
            .unwrap();

        let found = store.get("AABBCCDDEEFF").await.unwrap().unwrap();
        assert_eq!(found.username, "admin");
        assert_eq!(found.password.expose(), "hunter2");

        store.delete("AABBCCDDEEFF").await.unwrap();
        assert!(store.get("AABBCCDDEEFF").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn falls_back_to_wildcard_credential() {
        let dir = tempfile_dir();
        let store = FileCredentialStore::open(dir.join("creds.json")).await.unwrap();
        store
            .set(Credential {
                key: "*".to_string(),
                username: "default".to_string(),
                password: Secret::new("default-pass"),
            })
            .await
            .unwrap();

        let found = store.get("112233445566").await.unwrap().unwrap();
        assert_eq!(found.username, "default");
    }

    #[tokio::test]
    async fn reopening_reloads_persisted_credentials() {
        let dir = tempfile_dir();
        let path = dir.join("creds.json");
        {
            let store = FileCredentialStore::open(&path).await.unwrap();
            store
                .set(Credential {
                    key: "AABBCCDDEEFF".to_string(),
                    username: "admin".to_string(),
                    password: Secret::new("s3cret"),
                })
                .await
                .unwrap();
        }
        let reopened = FileCredentialStore::open(&path).await.unwrap();
        let found = reopened.get("AABBCCDDEEFF").await.unwrap().unwrap();
        assert_eq!(found.password.expose(), "s3cret");
    }

    fn tempfile_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fleetlink-test-{}-{}", std::process::id(), rand::random::<u32>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
