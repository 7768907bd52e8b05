// ABOUTME: Redis ephemeral store backend for multi-instance deployments
// ABOUTME: GETDEL gives atomic consume-once, INCR + EXPIRE NX gives windowed counters
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::{EphemeralStoreProvider, StoreConfig, StoreKey};
use crate::errors::{AuthError, AuthResult};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Redis-backed ephemeral store.
///
/// Uses `ConnectionManager` for automatic reconnection. All keys carry the
/// crate prefix plus a namespace segment, so several services can share one
/// Redis without collisions.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    fn storage_err(op: &str, e: &redis::RedisError) -> AuthError {
        error!("Redis {op} operation failed: {e}");
        AuthError::internal(format!("ephemeral store error: {e}"))
    }
}

#[async_trait::async_trait]
impl EphemeralStoreProvider for RedisStore {
    async fn new(config: StoreConfig) -> AuthResult<Self> {
        let redis_url = config
            .redis_url
            .as_ref()
            .ok_or_else(|| AuthError::internal("Redis URL is required for the Redis backend"))?;

        info!("Connecting ephemeral store to Redis at {}", redis_url);

        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| AuthError::internal(format!("failed to create Redis client: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AuthError::internal(format!("failed to connect to Redis: {e}")))?;

        info!("Ephemeral store connected to Redis");
        Ok(Self { manager })
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &StoreKey,
        value: &T,
        ttl: Duration,
    ) -> AuthResult<()> {
        let data = serde_json::to_vec(value)
            .map_err(|e| AuthError::internal(format!("store serialization failed: {e}")))?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key.to_string(), data, ttl.as_secs())
            .await
            .map_err(|e| Self::storage_err("SETEX", &e))?;
        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &StoreKey) -> AuthResult<Option<T>> {
        let mut conn = self.manager.clone();
        let data: Option<Vec<u8>> = conn
            .get(key.to_string())
            .await
            .map_err(|e| Self::storage_err("GET", &e))?;

        data.map(|bytes| {
            serde_json::from_slice(&bytes)
                .map_err(|e| AuthError::internal(format!("store deserialization failed: {e}")))
        })
        .transpose()
    }

    async fn take<T: for<'de> Deserialize<'de>>(&self, key: &StoreKey) -> AuthResult<Option<T>> {
        let mut conn = self.manager.clone();
        // GETDEL is atomic server-side: concurrent takers race for one value.
        let data: Option<Vec<u8>> = redis::cmd("GETDEL")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::storage_err("GETDEL", &e))?;

        data.map(|bytes| {
            serde_json::from_slice(&bytes)
                .map_err(|e| AuthError::internal(format!("store deserialization failed: {e}")))
        })
        .transpose()
    }

    async fn delete(&self, key: &StoreKey) -> AuthResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key.to_string())
            .await
            .map_err(|e| Self::storage_err("DEL", &e))?;
        Ok(())
    }

    async fn increment(&self, key: &StoreKey, ttl: Duration) -> AuthResult<u32> {
        let mut conn = self.manager.clone();
        let full_key = key.to_string();

        let count: u32 = conn
            .incr(&full_key, 1u32)
            .await
            .map_err(|e| Self::storage_err("INCR", &e))?;

        // EXPIRE NX only stamps a fresh counter, preserving the window for
        // subsequent increments. Best-effort is fine for a throttle.
        let _: Result<i64, _> = redis::cmd("EXPIRE")
            .arg(&full_key)
            .arg(ttl.as_secs())
            .arg("NX")
            .query_async(&mut conn)
            .await;

        Ok(count)
    }

    async fn health_check(&self) -> AuthResult<()> {
        let mut conn = self.manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::storage_err("PING", &e))?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(AuthError::internal(format!(
                "unexpected PING response: {pong}"
            )))
        }
    }

    async fn clear_all(&self) -> AuthResult<()> {
        let mut conn = self.manager.clone();
        // Scoped to our prefix; never FLUSHDB on a shared instance.
        let pattern = format!("{}*", crate::constants::STORE_KEY_PREFIX);
        let keys: Vec<String> = conn
            .keys(&pattern)
            .await
            .map_err(|e| Self::storage_err("KEYS", &e))?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| Self::storage_err("DEL", &e))?;
        }
        Ok(())
    }
}
