// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables and runtime configuration parsing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Environment-based configuration for production deployment.
//!
//! The JWT signing secret is the one hard requirement: a deployment without
//! `TENAUTH_JWT_SECRET` refuses to start rather than falling back to a
//! generated value that would invalidate every session on restart.

use crate::constants::limits;
use anyhow::{Context, Result};
use std::env;
use tracing::{info, warn};

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Relational store connection string
    pub database_url: String,
    /// Redis URL for the ephemeral store; in-memory backend when absent
    pub redis_url: Option<String>,
    /// Token signing configuration
    pub auth: AuthConfig,
    /// Social login provider credentials
    pub social: SocialProviderConfig,
}

/// Token signing configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Primary HS256 signing secret
    pub jwt_secret: String,
    /// Dedicated secret for MFA continuation tokens; primary is used when absent
    pub mfa_signing_secret: Option<String>,
    /// Access token lifetime in hours
    pub access_token_expiry_hours: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets never appear in logs
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field(
                "mfa_signing_secret",
                &self.mfa_signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "access_token_expiry_hours",
                &self.access_token_expiry_hours,
            )
            .finish()
    }
}

/// Client credentials for one social login provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Social login provider configuration. A provider without credentials is
/// globally unavailable regardless of per-tenant settings.
#[derive(Debug, Clone, Default)]
pub struct SocialProviderConfig {
    pub google: Option<ProviderCredentials>,
    pub github: Option<ProviderCredentials>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when `TENAUTH_JWT_SECRET` is missing or a numeric
    /// variable fails to parse.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let jwt_secret = env::var("TENAUTH_JWT_SECRET")
            .context("TENAUTH_JWT_SECRET must be set; refusing to start without a signing secret")?;

        let config = Self {
            database_url: env_var_or("DATABASE_URL", "sqlite:./data/tenauth.db")?,
            redis_url: env::var("REDIS_URL").ok(),
            auth: AuthConfig {
                jwt_secret,
                mfa_signing_secret: env::var("TENAUTH_MFA_SIGNING_SECRET").ok(),
                access_token_expiry_hours: env_var_or(
                    "TENAUTH_TOKEN_EXPIRY_HOURS",
                    &limits::DEFAULT_ACCESS_TOKEN_EXPIRY_HOURS.to_string(),
                )?
                .parse()
                .context("Invalid TENAUTH_TOKEN_EXPIRY_HOURS value")?,
            },
            social: SocialProviderConfig {
                google: provider_from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
                github: provider_from_env("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
            },
        };

        info!(
            "Configuration loaded: database={}, ephemeral_store={}, google={}, github={}",
            config.database_url,
            if config.redis_url.is_some() { "redis" } else { "in-memory" },
            config.social.google.is_some(),
            config.social.github.is_some(),
        );

        Ok(config)
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> Result<String> {
    Ok(env::var(key).unwrap_or_else(|_| default.to_string()))
}

/// Read a provider credential pair; both halves must be present.
fn provider_from_env(id_key: &str, secret_key: &str) -> Option<ProviderCredentials> {
    match (env::var(id_key), env::var(secret_key)) {
        (Ok(client_id), Ok(client_secret)) => Some(ProviderCredentials {
            client_id,
            client_secret,
        }),
        (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
            warn!("Ignoring half-configured provider credentials for {id_key}");
            None
        }
        (Err(_), Err(_)) => None,
    }
}
