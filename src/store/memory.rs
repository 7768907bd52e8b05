// ABOUTME: In-memory ephemeral store backend with TTL and a background sweep task
// ABOUTME: take() removes under a single write-lock critical section for consume-once semantics
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::{EphemeralStoreProvider, StoreConfig, StoreKey};
use crate::errors::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Stored record with its expiry instant.
#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory ephemeral store.
///
/// Uses `Arc<RwLock<HashMap>>` shared between store operations and the
/// optional background sweep task. Atomicity of `take` comes from removing
/// the entry while holding the write lock; no lock is ever held across an
/// await point.
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl InMemoryStore {
    /// Spawn the periodic sweep that evicts expired entries.
    fn spawn_cleanup_task(
        entries: Arc<RwLock<HashMap<String, Entry>>>,
        interval: Duration,
        mut shutdown_rx: tokio::sync::mpsc::Receiver<()>,
    ) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mut map = entries.write().await;
                        let before = map.len();
                        map.retain(|_, entry| !entry.is_expired());
                        let evicted = before - map.len();
                        if evicted > 0 {
                            tracing::debug!("Ephemeral store sweep evicted {} expired entries", evicted);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Ephemeral store sweep task shutting down");
                        break;
                    }
                }
            }
        });
    }
}

#[async_trait::async_trait]
impl EphemeralStoreProvider for InMemoryStore {
    async fn new(config: StoreConfig) -> AuthResult<Self> {
        let entries = Arc::new(RwLock::new(HashMap::new()));

        let shutdown_tx = if config.enable_background_cleanup {
            let (tx, rx) = tokio::sync::mpsc::channel(1);
            Self::spawn_cleanup_task(Arc::clone(&entries), config.cleanup_interval, rx);
            Some(Arc::new(tx))
        } else {
            None
        };

        Ok(Self {
            entries,
            shutdown_tx,
        })
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &StoreKey,
        value: &T,
        ttl: Duration,
    ) -> AuthResult<()> {
        let data = serde_json::to_vec(value)
            .map_err(|e| AuthError::internal(format!("store serialization failed: {e}")))?;
        let mut map = self.entries.write().await;
        map.insert(key.to_string(), Entry::new(data, ttl));
        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &StoreKey) -> AuthResult<Option<T>> {
        let map = self.entries.read().await;
        match map.get(&key.to_string()) {
            Some(entry) if !entry.is_expired() => {
                let value = serde_json::from_slice(&entry.data).map_err(|e| {
                    AuthError::internal(format!("store deserialization failed: {e}"))
                })?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    async fn take<T: for<'de> Deserialize<'de>>(&self, key: &StoreKey) -> AuthResult<Option<T>> {
        // Remove-then-check under the write lock: a concurrent take sees
        // the entry gone, never a stale copy.
        let removed = {
            let mut map = self.entries.write().await;
            map.remove(&key.to_string())
        };

        match removed {
            Some(entry) if !entry.is_expired() => {
                let value = serde_json::from_slice(&entry.data).map_err(|e| {
                    AuthError::internal(format!("store deserialization failed: {e}"))
                })?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &StoreKey) -> AuthResult<()> {
        let mut map = self.entries.write().await;
        map.remove(&key.to_string());
        Ok(())
    }

    async fn increment(&self, key: &StoreKey, ttl: Duration) -> AuthResult<u32> {
        let mut map = self.entries.write().await;
        let full_key = key.to_string();

        let current: u32 = match map.get(&full_key) {
            Some(entry) if !entry.is_expired() => serde_json::from_slice(&entry.data)
                .map_err(|e| AuthError::internal(format!("counter decode failed: {e}")))?,
            // Expired or absent counters restart the window
            _ => 0,
        };

        let next = current.saturating_add(1);
        let data = serde_json::to_vec(&next)
            .map_err(|e| AuthError::internal(format!("counter encode failed: {e}")))?;

        // Preserve the original window: only a fresh counter gets a new expiry
        let expires_at = match map.get(&full_key) {
            Some(entry) if !entry.is_expired() => entry.expires_at,
            _ => Instant::now() + ttl,
        };
        map.insert(
            full_key,
            Entry {
                data,
                expires_at,
            },
        );
        Ok(next)
    }

    async fn health_check(&self) -> AuthResult<()> {
        // Nothing external to probe; taking the read lock proves liveness.
        let _ = self.entries.read().await;
        Ok(())
    }

    async fn clear_all(&self) -> AuthResult<()> {
        let mut map = self.entries.write().await;
        map.clear();
        Ok(())
    }
}

impl Drop for InMemoryStore {
    fn drop(&mut self) {
        // Last clone gone: stop the sweep task.
        if let Some(tx) = self.shutdown_tx.take() {
            if let Ok(tx) = Arc::try_unwrap(tx) {
                let _ = tx.try_send(());
            }
        }
    }
}
