// ABOUTME: TOTP challenge and verification with a windowed attempt throttle
// ABOUTME: RFC 6238 defaults: SHA1, 6 digits, 30 second step, one step of skew
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::auth::MfaChallenge;
use crate::constants::{audit_events, limits, service_names, ttl};
use crate::database::IdentityRepository;
use crate::errors::{AuthError, AuthResult};
use crate::models::{AuditEvent, User};
use crate::store::{EphemeralStore, Namespace, StoreKey};
use crate::tokens::TokenIssuer;
use std::sync::Arc;
use std::time::Duration;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::warn;
use uuid::Uuid;

fn build_totp(secret_base32: &str, account: &str) -> AuthResult<TOTP> {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| AuthError::internal(format!("stored MFA secret is malformed: {e}")))?;
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret_bytes,
        Some(service_names::TOTP_ISSUER.to_string()),
        account.to_string(),
    )
    .map_err(|e| AuthError::internal(format!("TOTP init failed: {e}")))
}

/// Issues MFA challenges and verifies TOTP codes.
///
/// The attempt counter lives in the ephemeral store keyed by user id, so the
/// throttle holds across instances when Redis backs the store. It is a
/// best-effort rate limiter, not a strict atomic counter.
pub struct MfaChallengeManager {
    store: EphemeralStore,
    issuer: Arc<TokenIssuer>,
    repository: Arc<dyn IdentityRepository>,
}

impl MfaChallengeManager {
    #[must_use]
    pub fn new(
        store: EphemeralStore,
        issuer: Arc<TokenIssuer>,
        repository: Arc<dyn IdentityRepository>,
    ) -> Self {
        Self {
            store,
            issuer,
            repository,
        }
    }

    /// Issue an MFA challenge for a user whose first factor passed.
    ///
    /// # Errors
    ///
    /// Returns an error if token encoding fails.
    pub fn challenge(&self, user: &User, tenant_id: Uuid) -> AuthResult<MfaChallenge> {
        let (mfa_token, expires_at) = self.issuer.issue_mfa_token(user, tenant_id)?;
        Ok(MfaChallenge {
            message: "MFA_REQUIRED".to_string(),
            mfa_token,
            expires_at,
        })
    }

    /// Verify a TOTP code for a user.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MfaThrottled`] once the attempt counter reaches the
    ///   limit; checked before the code, so a correct code cannot slip
    ///   through a locked window.
    /// - [`AuthError::InvalidMfaCode`] for a wrong code or a user with no
    ///   enrolled secret.
    pub async fn verify(&self, user: &User, code: &str) -> AuthResult<()> {
        let Some(secret) = user.mfa_secret.as_deref() else {
            return Err(AuthError::InvalidMfaCode);
        };

        let counter_key = StoreKey::new(Namespace::MfaAttempts, &user.id.to_string());
        let attempts: u32 = self.store.get(&counter_key).await?.unwrap_or(0);
        if attempts >= limits::MFA_MAX_ATTEMPTS {
            self.audit_throttled(user).await;
            return Err(AuthError::MfaThrottled);
        }

        let totp = build_totp(secret, &user.email)?;
        let valid = totp
            .check_current(code)
            .map_err(|e| AuthError::internal(format!("TOTP check failed: {e}")))?;

        if valid {
            self.store.delete(&counter_key).await?;
            Ok(())
        } else {
            self.store
                .increment(
                    &counter_key,
                    Duration::from_secs(u64::from(ttl::MFA_ATTEMPT_WINDOW_SECS)),
                )
                .await?;
            Err(AuthError::InvalidMfaCode)
        }
    }

    async fn audit_throttled(&self, user: &User) {
        let event = AuditEvent::new(
            audit_events::MFA_THROTTLED,
            Some(user.tenant_id),
            Some(user.id),
        );
        if let Err(e) = self.repository.record_audit_event(&event).await {
            warn!("Failed to record MFA throttle audit event: {e}");
        }
    }

    /// Generate a fresh TOTP enrollment for a user: base32 secret plus the
    /// otpauth provisioning URI.
    ///
    /// # Errors
    ///
    /// Returns an error if secret generation fails.
    pub fn generate_enrollment(account: &str) -> AuthResult<(String, String)> {
        let secret = Secret::generate_secret();
        let base32 = secret.to_encoded().to_string();
        let totp = build_totp(&base32, account)?;
        Ok((base32, totp.get_url()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_secret_verifies_current_code() {
        let (base32, uri) = MfaChallengeManager::generate_enrollment("dev@example.com").unwrap();
        assert!(uri.starts_with("otpauth://totp/"));

        let totp = build_totp(&base32, "dev@example.com").unwrap();
        let code = totp.generate_current().unwrap();
        assert!(totp.check_current(&code).unwrap());
    }

    #[test]
    fn malformed_stored_secret_is_internal_error() {
        assert!(build_totp("not base32!!!", "dev@example.com").is_err());
    }
}
