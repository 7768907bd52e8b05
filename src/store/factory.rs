// ABOUTME: Ephemeral store factory dispatching to the configured backend
// ABOUTME: Runtime backend selection mirrors the repository factory pattern
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::{memory::InMemoryStore, redis::RedisStore, EphemeralStoreProvider, StoreConfig, StoreKey};
use crate::errors::AuthResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Ephemeral store instance wrapping the configured backend.
#[derive(Clone)]
pub enum EphemeralStore {
    /// Single-process in-memory backend
    Memory(InMemoryStore),
    /// Shared Redis backend for multi-instance deployments
    Redis(RedisStore),
}

impl EphemeralStore {
    /// Create a store from configuration: Redis when a URL is configured,
    /// in-memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if backend initialization fails.
    pub async fn from_config(config: StoreConfig) -> AuthResult<Self> {
        if config.redis_url.is_some() {
            info!("Initializing Redis ephemeral store");
            Ok(Self::Redis(RedisStore::new(config).await?))
        } else {
            info!("Initializing in-memory ephemeral store");
            Ok(Self::Memory(InMemoryStore::new(config).await?))
        }
    }

    /// Descriptive backend label for logs.
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::Memory(_) => "in-memory",
            Self::Redis(_) => "redis",
        }
    }

    /// Store a value with TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails.
    pub async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &StoreKey,
        value: &T,
        ttl: Duration,
    ) -> AuthResult<()> {
        match self {
            Self::Memory(s) => s.set(key, value, ttl).await,
            Self::Redis(s) => s.set(key, value, ttl).await,
        }
    }

    /// Read a value without consuming it.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, key: &StoreKey) -> AuthResult<Option<T>> {
        match self {
            Self::Memory(s) => s.get(key).await,
            Self::Redis(s) => s.get(key).await,
        }
    }

    /// Atomically read and delete a value (consume once).
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub async fn take<T: for<'de> Deserialize<'de>>(
        &self,
        key: &StoreKey,
    ) -> AuthResult<Option<T>> {
        match self {
            Self::Memory(s) => s.take(key).await,
            Self::Redis(s) => s.take(key).await,
        }
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    pub async fn delete(&self, key: &StoreKey) -> AuthResult<()> {
        match self {
            Self::Memory(s) => s.delete(key).await,
            Self::Redis(s) => s.delete(key).await,
        }
    }

    /// Increment a windowed counter and return the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    pub async fn increment(&self, key: &StoreKey, ttl: Duration) -> AuthResult<u32> {
        match self {
            Self::Memory(s) => s.increment(key, ttl).await,
            Self::Redis(s) => s.increment(key, ttl).await,
        }
    }

    /// Verify the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails.
    pub async fn health_check(&self) -> AuthResult<()> {
        match self {
            Self::Memory(s) => s.health_check().await,
            Self::Redis(s) => s.health_check().await,
        }
    }

    /// Drop every record (tests/admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    pub async fn clear_all(&self) -> AuthResult<()> {
        match self {
            Self::Memory(s) => s.clear_all().await,
            Self::Redis(s) => s.clear_all().await,
        }
    }
}
