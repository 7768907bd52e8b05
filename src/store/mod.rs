// ABOUTME: Ephemeral key-value store with per-key TTL and consume-once semantics
// ABOUTME: Pluggable backends (in-memory, Redis) behind a factory, one namespace per concern
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Ephemeral Store
//!
//! Short-lived protocol state lives here, never in the relational store:
//! OAuth exchange codes, OAuth state handles, tenant-selection sessions, and
//! MFA attempt counters. Each concern has its own key namespace and default
//! TTL.
//!
//! Two semantics matter for security:
//! - [`EphemeralStoreProvider::take`] is atomic read-then-delete. A second
//!   concurrent take after deletion observes absent, never a stale value.
//!   Codes and selection sessions rely on this for single use.
//! - [`EphemeralStoreProvider::increment`] is a best-effort windowed counter
//!   for MFA throttling; approximate behavior under contention is acceptable.

pub mod factory;
pub mod memory;
pub mod redis;

pub use factory::EphemeralStore;

use crate::constants::{limits, ttl, STORE_KEY_PREFIX};
use crate::errors::AuthResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One namespace per ephemeral concern, each with its own default TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// OAuth exchange codes (consume-once, ~60 s)
    OAuthCode,
    /// OAuth state handles round-tripped across provider redirects (~600 s)
    OAuthState,
    /// Tenant-selection sessions (consume-once, ~300 s)
    TenantSelection,
    /// Per-user MFA failed-attempt counters (~300 s window)
    MfaAttempts,
}

impl Namespace {
    /// Key prefix segment for this namespace
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::OAuthCode => "oauth_code",
            Self::OAuthState => "oauth_state",
            Self::TenantSelection => "tenant_selection",
            Self::MfaAttempts => "mfa_attempts",
        }
    }

    /// Default TTL for records in this namespace
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        let secs = match self {
            Self::OAuthCode => ttl::OAUTH_CODE_SECS,
            Self::OAuthState => ttl::OAUTH_STATE_SECS,
            Self::TenantSelection => ttl::TENANT_SELECTION_SECS,
            Self::MfaAttempts => ttl::MFA_ATTEMPT_WINDOW_SECS,
        };
        Duration::from_secs(secs as u64)
    }
}

/// Fully qualified store key: global prefix, namespace, record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKey {
    /// Concern this key belongs to
    pub namespace: Namespace,
    /// Record identifier within the namespace
    pub id: String,
}

impl StoreKey {
    /// Build a key for a record id within a namespace.
    #[must_use]
    pub fn new(namespace: Namespace, id: impl Into<String>) -> Self {
        Self {
            namespace,
            id: id.into(),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{STORE_KEY_PREFIX}{}:{}",
            self.namespace.prefix(),
            self.id
        )
    }
}

/// Ephemeral store backend contract.
///
/// Counters are stored as plain decimal integers so the in-memory and Redis
/// backends (`INCR`) agree on the representation.
#[async_trait::async_trait]
pub trait EphemeralStoreProvider: Send + Sync + Clone {
    /// Create a new store instance from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if backend initialization fails.
    async fn new(config: StoreConfig) -> AuthResult<Self>
    where
        Self: Sized;

    /// Store a value under the key with the given TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails.
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &StoreKey,
        value: &T,
        ttl: Duration,
    ) -> AuthResult<()>;

    /// Read a value without consuming it. Expired records read as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &StoreKey) -> AuthResult<Option<T>>;

    /// Atomically read and delete a value.
    ///
    /// Exactly one of any number of concurrent callers observes the record;
    /// the rest observe absent.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    async fn take<T: for<'de> Deserialize<'de>>(&self, key: &StoreKey) -> AuthResult<Option<T>>;

    /// Delete a record. Deleting an absent record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn delete(&self, key: &StoreKey) -> AuthResult<()>;

    /// Increment a windowed counter, initializing it with the TTL on first
    /// touch, and return the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn increment(&self, key: &StoreKey, ttl: Duration) -> AuthResult<u32>;

    /// Verify the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails.
    async fn health_check(&self) -> AuthResult<()>;

    /// Drop every record (tests/admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn clear_all(&self) -> AuthResult<()>;
}

/// Ephemeral store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis connection URL; `None` selects the in-memory backend
    pub redis_url: Option<String>,
    /// Sweep interval for expired in-memory entries
    pub cleanup_interval: Duration,
    /// Enable the background sweep task (disable in tests to avoid runtime
    /// conflicts)
    pub enable_background_cleanup: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            cleanup_interval: Duration::from_secs(limits::DEFAULT_STORE_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: true,
        }
    }
}
