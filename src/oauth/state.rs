// ABOUTME: OAuth state handles and one-time exchange codes backed by the ephemeral store
// ABOUTME: Both are consume-once records so a replayed callback or code lands on nothing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::constants::ttl;
use crate::errors::{AuthError, AuthResult};
use crate::store::{EphemeralStore, Namespace, StoreKey};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Context captured when an authorization redirect is issued, replayed to the
/// login flow when the provider calls back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthStatePayload {
    /// Tenant hint carried through the provider roundtrip
    pub requested_tenant_slug: Option<String>,
    /// Where to send the browser after the exchange code is minted
    pub redirect_uri: Option<String>,
    /// Opaque client data echoed back untouched
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// CSRF state handles and login-outcome exchange codes.
///
/// State handles bind an authorization redirect to its callback. Exchange
/// codes park a serialized login outcome for the few seconds between the
/// browser redirect and the client's code-exchange call, keeping tokens out
/// of redirect URLs.
#[derive(Clone)]
pub struct OAuthStateStore {
    store: EphemeralStore,
}

impl OAuthStateStore {
    #[must_use]
    pub const fn new(store: EphemeralStore) -> Self {
        Self { store }
    }

    fn random_handle() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Mint a state handle for an authorization redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn create_state(&self, payload: &OAuthStatePayload) -> AuthResult<String> {
        let handle = Self::random_handle();
        let key = StoreKey::new(Namespace::OAuthState, &handle);
        self.store
            .set(
                &key,
                payload,
                Duration::from_secs(u64::from(ttl::OAUTH_STATE_SECS)),
            )
            .await?;
        debug!("Issued OAuth state handle");
        Ok(handle)
    }

    /// Consume a state handle from a provider callback. Single-use: a second
    /// consume of the same handle fails.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpiredToken`] for unknown, expired, or
    /// already-consumed handles.
    pub async fn consume_state(&self, handle: &str) -> AuthResult<OAuthStatePayload> {
        let key = StoreKey::new(Namespace::OAuthState, handle);
        self.store
            .take::<OAuthStatePayload>(&key)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)
    }

    /// Park a login outcome behind a short-lived one-time exchange code.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn stash_login_outcome<T: Serialize + Send + Sync>(
        &self,
        outcome: &T,
    ) -> AuthResult<String> {
        let code = Self::random_handle();
        let key = StoreKey::new(Namespace::OAuthCode, &code);
        self.store
            .set(
                &key,
                outcome,
                Duration::from_secs(u64::from(ttl::OAUTH_CODE_SECS)),
            )
            .await?;
        debug!("Issued one-time login exchange code");
        Ok(code)
    }

    /// Redeem an exchange code for the parked login outcome. Single-use.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpiredToken`] for unknown, expired, or
    /// already-redeemed codes.
    pub async fn take_login_outcome<T: DeserializeOwned>(&self, code: &str) -> AuthResult<T> {
        let key = StoreKey::new(Namespace::OAuthCode, code);
        self.store
            .take::<T>(&key)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;

    async fn state_store() -> OAuthStateStore {
        let config = StoreConfig {
            enable_background_cleanup: false,
            ..StoreConfig::default()
        };
        OAuthStateStore::new(EphemeralStore::from_config(config).await.unwrap())
    }

    #[tokio::test]
    async fn state_handle_is_single_use() {
        let store = state_store().await;
        let payload = OAuthStatePayload {
            requested_tenant_slug: Some("acme".to_string()),
            ..OAuthStatePayload::default()
        };
        let handle = store.create_state(&payload).await.unwrap();

        let restored = store.consume_state(&handle).await.unwrap();
        assert_eq!(restored.requested_tenant_slug.as_deref(), Some("acme"));

        assert!(matches!(
            store.consume_state(&handle).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn unknown_state_handle_is_rejected() {
        let store = state_store().await;
        assert!(matches!(
            store.consume_state("deadbeef").await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn exchange_code_is_single_use() {
        let store = state_store().await;
        let code = store
            .stash_login_outcome(&"outcome-payload")
            .await
            .unwrap();

        let first: String = store.take_login_outcome(&code).await.unwrap();
        assert_eq!(first, "outcome-payload");
        assert!(matches!(
            store.take_login_outcome::<String>(&code).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }
}
