// ABOUTME: Login flow building blocks and the three-way login outcome
// ABOUTME: Every entry point (password, social, selection, MFA) resolves to a LoginOutcome
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Authentication flows
//!
//! Password and social login share one funnel: resolve candidates, filter by
//! eligibility, then either issue a session, ask the caller to pick a tenant,
//! or demand a second factor. [`LoginOutcome`] is the funnel's result type
//! and is serializable so a social login can park it behind a one-time
//! exchange code.

pub mod credentials;
pub mod disambiguation;
pub mod mfa;
pub mod service;
pub mod social;

use crate::models::{TenantChoice, UserRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use service::AuthService;

/// A fully authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    /// Tenant-scoped access JWT
    pub access_token: String,
    /// Always `"bearer"`
    pub token_type: String,
    /// Access token expiry
    pub expires_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// The caller must pick one of several tenants before a session exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionChallenge {
    /// Short-lived token referencing the pending selection session
    pub selection_token: String,
    /// Tenants the principal may enter, public fields only
    pub tenants: Vec<TenantChoice>,
    /// Candidate matching the caller's tenant hint, when one matched
    pub suggested_tenant_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}

/// The first factor passed; a TOTP code is required to finish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaChallenge {
    /// Stable marker for clients, always `"MFA_REQUIRED"`
    pub message: String,
    /// Short-lived continuation token bound to one user and tenant
    pub mfa_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of any login entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginOutcome {
    /// Credentials resolved to exactly one eligible tenant and no second
    /// factor is pending
    Authenticated(TokenBundle),
    /// Credentials are valid in several tenants
    SelectionRequired(SelectionChallenge),
    /// A second factor must be presented
    MfaRequired(MfaChallenge),
}

impl LoginOutcome {
    /// The access token, when the flow is complete.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        match self {
            Self::Authenticated(bundle) => Some(&bundle.access_token),
            Self::SelectionRequired(_) | Self::MfaRequired(_) => None,
        }
    }
}
