// ABOUTME: Unified error taxonomy for the tenauth identity backend
// ABOUTME: Maps every failure kind to an HTTP status and an enumeration-safe message
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Unified Error Handling
//!
//! Every boundary operation returns [`AuthResult`]. The taxonomy follows a
//! strict rule: failures a caller could use to enumerate accounts (bad
//! password, inactive account, inactive tenant, filtered-out candidate) all
//! surface the same generic message. `MfaRequired` is deliberately absent —
//! it is a control-flow result carried by `LoginOutcome`, not an error.

use thiserror::Error;

/// Result alias used across the crate's public surface.
pub type AuthResult<T> = Result<T, AuthError>;

/// Generic message shared by every credentials-class rejection.
///
/// Deliberately identical for bad passwords, unknown emails, suspended
/// accounts, and inactive tenants so callers cannot distinguish them.
pub const GENERIC_UNAUTHORIZED_MSG: &str = "Invalid credentials";

/// Terminal failure kinds for authentication and tenant-resolution calls.
///
/// Nothing here is retried automatically; a user re-submitting a code or a
/// password is a new call.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad email/password, or a candidate filtered out by status checks.
    #[error("{GENERIC_UNAUTHORIZED_MSG}")]
    InvalidCredentials,

    /// The account or its tenant is not in a loginable state.
    ///
    /// Carries the same public message as [`Self::InvalidCredentials`];
    /// the distinct variant exists for logging and tests only.
    #[error("{GENERIC_UNAUTHORIZED_MSG}")]
    AccountOrTenantInactive,

    /// The submitted TOTP code did not verify (or MFA is not configured).
    #[error("Invalid MFA code")]
    InvalidMfaCode,

    /// Too many failed MFA verifications inside the throttle window.
    #[error("Too many MFA attempts, try again later")]
    MfaThrottled,

    /// Selection token, OAuth exchange code, MFA token, or reset token that
    /// is expired, tampered with, or already consumed.
    #[error("Token is invalid, expired, or already used")]
    InvalidOrExpiredToken,

    /// Provider credentials are missing at the deployment level.
    #[error("Auth provider '{0}' is not configured")]
    AuthProviderNotConfigured(String),

    /// The tenant does not allow this login method.
    #[error("Auth provider '{provider}' is not enabled for tenant '{tenant_slug}'")]
    AuthProviderDisabledForTenant {
        /// Provider that was attempted
        provider: String,
        /// Tenant that rejected it
        tenant_slug: String,
    },

    /// First-time OAuth signup arrived without a tenant hint; auto-creating
    /// tenants through OAuth is intentionally disallowed.
    #[error("Signup via an external provider requires a tenant context")]
    SignupRequiresTenantContext,

    /// Referenced tenant or resource does not exist.
    #[error("Tenant or resource not found")]
    TenantOrResourceNotFound,

    /// Caller is not allowed to perform the operation (selection-token
    /// mismatch, conflicting provider identity, cross-tenant access).
    #[error("Not authorized")]
    Unauthorized,

    /// Request-shaping failure (weak password, malformed email or slug).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A uniqueness constraint was violated (duplicate email or slug).
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Persistence, store, signing-key, or other infrastructure failure.
    /// Never surfaced as an authentication verdict.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Build an internal error from a displayable cause.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(message.into()))
    }

    /// HTTP status code the transport collaborator should map this to.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidCredentials
            | Self::AccountOrTenantInactive
            | Self::InvalidMfaCode
            | Self::InvalidOrExpiredToken
            | Self::Unauthorized => 401,
            Self::AuthProviderDisabledForTenant { .. } | Self::SignupRequiresTenantContext => 403,
            Self::TenantOrResourceNotFound => 404,
            Self::AlreadyExists(_) => 409,
            Self::InvalidInput(_) => 400,
            Self::MfaThrottled => 429,
            Self::AuthProviderNotConfigured(_) | Self::Internal(_) => 500,
        }
    }

    /// Message safe to show to an unauthenticated caller.
    ///
    /// Collapses every credentials-class failure into one string and hides
    /// internal causes entirely.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidCredentials
            | Self::AccountOrTenantInactive
            | Self::Unauthorized => GENERIC_UNAUTHORIZED_MSG.to_owned(),
            Self::Internal(_) => "Internal error".to_owned(),
            other => other.to_string(),
        }
    }

    /// Whether this failure belongs to the enumeration-safe class that must
    /// stay indistinguishable to callers.
    #[must_use]
    pub const fn is_credentials_class(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::AccountOrTenantInactive | Self::Unauthorized
        )
    }
}
