// ABOUTME: Main library entry point for the tenauth multi-tenant identity backend
// ABOUTME: Wires login flows, tenant resolution, MFA, token issuance, and scoped persistence
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![deny(unsafe_code)]

//! # tenauth
//!
//! A multi-tenant identity backend: password and social login, tenant
//! disambiguation for principals that exist in several tenants, TOTP-based
//! MFA, and tenant-scoped JWT issuance.
//!
//! ## Features
//!
//! - **One login funnel**: password and social entry points converge on the
//!   same eligibility, disambiguation, and MFA gates
//! - **Tenant selection**: a principal valid in N tenants gets a selection
//!   challenge, never a guessed tenant
//! - **Compile-time tenant scoping**: every scoped repository method takes a
//!   [`database::TenantScope`], so a forgotten filter is a type error
//! - **Consume-once ephemeral records**: selection sessions, OAuth state,
//!   and exchange codes are single use, backed by memory or Redis
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenauth::auth::AuthService;
//! use tenauth::config::ServerConfig;
//! use tenauth::database::{sqlite::SqliteRepository, IdentityRepository};
//! use tenauth::notifications::LoggingMailer;
//! use tenauth::store::{EphemeralStore, StoreConfig};
//! use tenauth::tokens::TokenIssuer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!
//!     let repository = SqliteRepository::new(&config.database_url).await?;
//!     repository.migrate().await?;
//!
//!     let store = EphemeralStore::from_config(StoreConfig {
//!         redis_url: config.redis_url.clone(),
//!         ..StoreConfig::default()
//!     })
//!     .await?;
//!
//!     let issuer = TokenIssuer::new(
//!         config.auth.jwt_secret.as_bytes(),
//!         config.auth.mfa_signing_secret.as_deref().map(str::as_bytes),
//!         config.auth.access_token_expiry_hours,
//!     );
//!
//!     let service = AuthService::new(
//!         Arc::new(repository),
//!         store,
//!         issuer,
//!         Arc::new(LoggingMailer),
//!         config.social.clone(),
//!     );
//!
//!     let outcome = service.login("a@x.com", "password", None).await?;
//!     println!("login outcome: {:?}", outcome.access_token().is_some());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod constants;
pub mod database;
pub mod errors;
pub mod models;
pub mod notifications;
pub mod oauth;
pub mod store;
pub mod tokens;
