// ABOUTME: JWT issuance and verification for access, selection, and MFA tokens
// ABOUTME: HS256 with a primary signing secret and an optional dedicated MFA secret
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Token Issuer
//!
//! Three token shapes come out of one issuer:
//!
//! - **Access tokens** carry the full principal (`tenant_id`, `role`,
//!   `status`) and grant API access.
//! - **Selection tokens** reference a pending tenant-selection session and
//!   deliberately omit `tenant_id`/`role`, so they can never pass access
//!   verification.
//! - **MFA tokens** prove a completed first factor for exactly one user and
//!   are signed with the MFA secret when one is configured.
//!
//! Verification is shape-aware: each decode path rejects the other shapes.

use crate::constants::{service_names::TOKEN_AUDIENCE, ttl};
use crate::errors::{AuthError, AuthResult};
use crate::models::{User, UserRole, UserStatus};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Claims for a full access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    /// Login email
    pub email: String,
    /// Tenant the session is bound to
    pub tenant_id: String,
    /// Role within that tenant
    pub role: UserRole,
    /// Account status at issuance time
    pub status: UserStatus,
    /// Issued-at in milliseconds, made unique by a monotonic counter
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Audience
    pub aud: String,
}

/// Claims for a tenant-selection token.
///
/// `sub` is the selection session id, not a user id. The absence of
/// `tenant_id` and `role` is what makes this shape unusable as an access
/// token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionClaims {
    /// Selection session id
    pub sub: String,
    /// Email the candidates share
    pub email: String,
    /// Shape discriminator, always `"selection"`
    pub typ: String,
    /// Issued-at in milliseconds
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Audience
    pub aud: String,
}

/// Claims for an MFA continuation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaClaims {
    /// User id awaiting the second factor
    pub sub: String,
    /// Login email
    pub email: String,
    /// Tenant the pending session is bound to
    pub tenant_id: String,
    /// Shape discriminator, always `"mfa"`
    pub typ: String,
    /// Issued-at in milliseconds
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Audience
    pub aud: String,
}

/// Minimal probe used to classify an incoming token before the shape-specific
/// decode runs.
#[derive(Debug, Deserialize)]
struct RawClaims {
    tenant_id: Option<String>,
    role: Option<UserRole>,
    typ: Option<String>,
    #[allow(dead_code)]
    aud: Option<String>,
}

/// Issues and verifies the crate's JWT shapes.
pub struct TokenIssuer {
    primary_secret: Vec<u8>,
    mfa_secret: Option<Vec<u8>>,
    access_expiry_hours: i64,
    /// Monotonic counter to keep issued-at values unique
    token_counter: AtomicU64,
}

impl Clone for TokenIssuer {
    fn clone(&self) -> Self {
        Self {
            primary_secret: self.primary_secret.clone(),
            mfa_secret: self.mfa_secret.clone(),
            access_expiry_hours: self.access_expiry_hours,
            // Each clone keeps uniqueness independently
            token_counter: AtomicU64::new(0),
        }
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(
        primary_secret: &[u8],
        mfa_secret: Option<&[u8]>,
        access_expiry_hours: i64,
    ) -> Self {
        Self {
            primary_secret: primary_secret.to_vec(),
            mfa_secret: mfa_secret.map(<[u8]>::to_vec),
            access_expiry_hours,
            token_counter: AtomicU64::new(0),
        }
    }

    fn unique_iat(&self, now: DateTime<Utc>) -> i64 {
        let counter = self.token_counter.fetch_add(1, Ordering::Relaxed);
        now.timestamp() * 1000 + i64::from(u32::try_from(counter % 1000).unwrap_or(0))
    }

    fn mfa_key_bytes(&self) -> &[u8] {
        // Dedicated MFA secret when configured, primary otherwise
        self.mfa_secret.as_deref().unwrap_or(&self.primary_secret)
    }

    fn validation() -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation
    }

    fn validation_allow_expired() -> Validation {
        let mut validation = Self::validation();
        validation.validate_exp = false;
        validation
    }

    /// Issue a full access token for a user within a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn issue_full_token(&self, user: &User, tenant_id: Uuid) -> AuthResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expiry = now + Duration::hours(self.access_expiry_hours);

        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            tenant_id: tenant_id.to_string(),
            role: user.role,
            status: user.status,
            iat: self.unique_iat(now),
            exp: expiry.timestamp(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.primary_secret),
        )
        .map_err(|e| AuthError::internal(format!("token encoding failed: {e}")))?;
        Ok((token, expiry))
    }

    /// Issue a short-lived selection token referencing a pending
    /// disambiguation session.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn issue_selection_token(
        &self,
        session_id: &str,
        email: &str,
    ) -> AuthResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expiry = now + Duration::seconds(i64::from(ttl::TENANT_SELECTION_SECS));

        let claims = SelectionClaims {
            sub: session_id.to_string(),
            email: email.to_string(),
            typ: "selection".to_string(),
            iat: self.unique_iat(now),
            exp: expiry.timestamp(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.primary_secret),
        )
        .map_err(|e| AuthError::internal(format!("token encoding failed: {e}")))?;
        Ok((token, expiry))
    }

    /// Issue a short-lived MFA continuation token after a successful first
    /// factor.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn issue_mfa_token(
        &self,
        user: &User,
        tenant_id: Uuid,
    ) -> AuthResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expiry = now + Duration::seconds(i64::from(ttl::MFA_TOKEN_SECS));

        let claims = MfaClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            tenant_id: tenant_id.to_string(),
            typ: "mfa".to_string(),
            iat: self.unique_iat(now),
            exp: expiry.timestamp(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.mfa_key_bytes()),
        )
        .map_err(|e| AuthError::internal(format!("token encoding failed: {e}")))?;
        Ok((token, expiry))
    }

    fn probe(&self, token: &str, secret: &[u8], validation: &Validation) -> AuthResult<RawClaims> {
        decode::<RawClaims>(token, &DecodingKey::from_secret(secret), validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidOrExpiredToken)
    }

    /// Verify a full access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpiredToken`] for bad signatures,
    /// expiry, or a token of another shape.
    pub fn decode_full_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.decode_full_with(token, &Self::validation())
    }

    /// Verify a full access token ignoring expiry. Exists for the refresh
    /// path, which re-validates the principal against the database.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpiredToken`] for bad signatures or a
    /// token of another shape.
    pub fn decode_full_token_allow_expired(&self, token: &str) -> AuthResult<AccessClaims> {
        self.decode_full_with(token, &Self::validation_allow_expired())
    }

    fn decode_full_with(&self, token: &str, validation: &Validation) -> AuthResult<AccessClaims> {
        let raw = self.probe(token, &self.primary_secret, validation)?;
        // Selection and MFA tokens never carry both tenant_id and role
        if raw.tenant_id.is_none() || raw.role.is_none() || raw.typ.is_some() {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(&self.primary_secret),
            validation,
        )
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidOrExpiredToken)
    }

    /// Verify a selection token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpiredToken`] for bad signatures,
    /// expiry, or a token of another shape.
    pub fn decode_selection_token(&self, token: &str) -> AuthResult<SelectionClaims> {
        let validation = Self::validation();
        let raw = self.probe(token, &self.primary_secret, &validation)?;
        if raw.typ.as_deref() != Some("selection") {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        decode::<SelectionClaims>(
            token,
            &DecodingKey::from_secret(&self.primary_secret),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidOrExpiredToken)
    }

    /// Verify an MFA continuation token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpiredToken`] for bad signatures,
    /// expiry, or a token of another shape.
    pub fn decode_mfa_token(&self, token: &str) -> AuthResult<MfaClaims> {
        let validation = Self::validation();
        let raw = self.probe(token, self.mfa_key_bytes(), &validation)?;
        if raw.typ.as_deref() != Some("mfa") {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        decode::<MfaClaims>(
            token,
            &DecodingKey::from_secret(self.mfa_key_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidOrExpiredToken)
    }

    /// Access token lifetime in hours.
    #[must_use]
    pub const fn access_expiry_hours(&self) -> i64 {
        self.access_expiry_hours
    }
}
