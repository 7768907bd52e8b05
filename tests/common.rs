// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides common database, store, service, and fixture creation helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]
//! Shared test utilities for `tenauth` integration tests.

use anyhow::Result;
use std::sync::{Arc, Once};
use tenauth::{
    auth::mfa::MfaChallengeManager,
    auth::AuthService,
    config::{ProviderCredentials, SocialProviderConfig},
    database::{sqlite::SqliteRepository, IdentityRepository, TenantScope},
    models::{Tenant, TenantStatus, User, UserRole, UserStatus},
    notifications::LoggingMailer,
    store::{EphemeralStore, StoreConfig},
    tokens::TokenIssuer,
};
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &[u8] = b"integration-test-signing-secret";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test repository on an in-memory database.
pub async fn create_test_repository() -> Result<Arc<SqliteRepository>> {
    init_test_logging();
    let repository = Arc::new(SqliteRepository::new("sqlite::memory:").await?);
    repository.migrate().await?;
    Ok(repository)
}

/// In-memory ephemeral store without the background sweep.
pub async fn create_test_store() -> EphemeralStore {
    EphemeralStore::from_config(StoreConfig {
        enable_background_cleanup: false,
        ..StoreConfig::default()
    })
    .await
    .expect("in-memory store creation cannot fail")
}

/// Token issuer with the shared test secret and no dedicated MFA secret.
pub fn create_test_issuer() -> TokenIssuer {
    TokenIssuer::new(TEST_JWT_SECRET, None, 24)
}

/// Social config with both providers configured.
pub fn test_social_config() -> SocialProviderConfig {
    SocialProviderConfig {
        google: Some(ProviderCredentials {
            client_id: "google-client-id".into(),
            client_secret: "google-client-secret".into(),
        }),
        github: Some(ProviderCredentials {
            client_id: "github-client-id".into(),
            client_secret: "github-client-secret".into(),
        }),
    }
}

/// Fully wired service plus the repository behind it.
pub async fn create_test_service() -> Result<(AuthService, Arc<SqliteRepository>)> {
    let repository = create_test_repository().await?;
    let store = create_test_store().await;
    let service = AuthService::new(
        repository.clone(),
        store,
        create_test_issuer(),
        Arc::new(LoggingMailer),
        test_social_config(),
    );
    Ok((service, repository))
}

/// Create an active tenant with the default provider set.
pub async fn create_tenant(repository: &SqliteRepository, slug: &str) -> Result<Tenant> {
    let mut name = slug.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    let tenant = Tenant::new(name, slug.to_string());
    repository.create_tenant(&tenant).await?;
    Ok(tenant)
}

/// Create a tenant with a non-default status.
pub async fn create_tenant_with_status(
    repository: &SqliteRepository,
    slug: &str,
    status: TenantStatus,
) -> Result<Tenant> {
    let mut tenant = Tenant::new(slug.to_uppercase(), slug.to_string());
    tenant.status = status;
    repository.create_tenant(&tenant).await?;
    Ok(tenant)
}

/// Create an active password user in a tenant.
pub async fn create_password_user(
    repository: &SqliteRepository,
    tenant: &Tenant,
    email: &str,
    password: &str,
) -> Result<User> {
    let hash = bcrypt::hash(password, 4)?; // low cost keeps tests fast
    let user = User::new(
        tenant.id,
        email.to_string(),
        Some(hash),
        UserRole::User,
        UserStatus::Active,
    );
    repository.create_user(&user).await?;
    Ok(user)
}

/// Create a user with explicit status; no password when `password` is None.
pub async fn create_user_with_status(
    repository: &SqliteRepository,
    tenant: &Tenant,
    email: &str,
    password: Option<&str>,
    status: UserStatus,
) -> Result<User> {
    let hash = password.map(|p| bcrypt::hash(p, 4)).transpose()?;
    let user = User::new(tenant.id, email.to_string(), hash, UserRole::User, status);
    repository.create_user(&user).await?;
    Ok(user)
}

/// Enroll TOTP for a user and return the base32 secret.
pub async fn enroll_mfa(repository: &SqliteRepository, user: &User) -> Result<String> {
    let (secret, _uri) =
        MfaChallengeManager::generate_enrollment(&user.email).expect("enrollment cannot fail");
    let updated = repository
        .update_user_mfa(
            TenantScope::Tenant(user.tenant_id),
            user.id,
            true,
            Some(&secret),
        )
        .await?;
    assert_eq!(updated, 1);
    Ok(secret)
}

/// Current TOTP code for a base32 secret, matching the service parameters.
pub fn current_totp_code(secret_base32: &str) -> String {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .expect("test secret is valid base32");
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret_bytes,
        Some("tenauth".to_string()),
        "test".to_string(),
    )
    .expect("TOTP init cannot fail for a generated secret");
    totp.generate_current().expect("system clock is available")
}

/// A code guaranteed wrong for the secret.
pub fn wrong_totp_code(secret_base32: &str) -> String {
    let current = current_totp_code(secret_base32);
    if current == "000000" {
        "111111".to_string()
    } else {
        "000000".to_string()
    }
}

/// Mailer that records deliveries so tests can read raw reset tokens.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub reset_mails: std::sync::Mutex<Vec<(String, String, String)>>,
    pub notices: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl tenauth::notifications::Mailer for RecordingMailer {
    async fn send_password_reset(
        &self,
        email: &str,
        tenant_slug: &str,
        raw_token: &str,
    ) -> Result<()> {
        self.reset_mails.lock().unwrap().push((
            email.to_string(),
            tenant_slug.to_string(),
            raw_token.to_string(),
        ));
        Ok(())
    }

    async fn send_security_notice(&self, email: &str, message: &str) -> Result<()> {
        self.notices
            .lock()
            .unwrap()
            .push((email.to_string(), message.to_string()));
        Ok(())
    }
}

/// Service wired with a [`RecordingMailer`].
pub async fn create_test_service_with_mailer(
) -> Result<(AuthService, Arc<SqliteRepository>, Arc<RecordingMailer>)> {
    let repository = create_test_repository().await?;
    let mailer = Arc::new(RecordingMailer::default());
    let service = AuthService::new(
        repository.clone(),
        create_test_store().await,
        create_test_issuer(),
        mailer.clone(),
        test_social_config(),
    );
    Ok((service, repository, mailer))
}

/// Reload a user across tenants.
pub async fn reload_user(repository: &SqliteRepository, user_id: Uuid) -> Result<User> {
    repository
        .get_user_for_auth(user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))
}
