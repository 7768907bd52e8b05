// ABOUTME: Password verification against cross-tenant login candidates
// ABOUTME: Eligibility filtering runs before any hash comparison
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::database::IdentityRepository;
use crate::errors::{AuthError, AuthResult};
use crate::models::{AuthProviderKind, Tenant, User};
use std::sync::Arc;
use tracing::warn;

/// Verifies a password against every candidate row sharing the login email.
///
/// Candidates are filtered for eligibility first, so no hash comparison runs
/// for rows that could never log in. Each surviving candidate has its own
/// hash; the same password may verify in one tenant and not another.
pub struct CredentialValidator {
    repository: Arc<dyn IdentityRepository>,
}

impl CredentialValidator {
    #[must_use]
    pub fn new(repository: Arc<dyn IdentityRepository>) -> Self {
        Self { repository }
    }

    fn is_eligible(user: &User, tenant: &Tenant) -> bool {
        user.password_hash.is_some()
            && user.can_authenticate()
            && tenant.allows_login()
            && tenant.allows_provider(AuthProviderKind::Password)
    }

    fn password_matches(user: &User, password: &str) -> bool {
        let Some(hash) = user.password_hash.as_deref() else {
            return false;
        };
        match bcrypt::verify(password, hash) {
            Ok(matched) => matched,
            Err(e) => {
                // A malformed stored hash reads as a failed login, not a 500
                warn!("Stored password hash failed to verify for user {}: {e}", user.id);
                false
            }
        }
    }

    /// Resolve the `(User, Tenant)` candidates whose password matches.
    ///
    /// An empty result means the email is unknown, every candidate was
    /// ineligible, or the password matched nowhere; callers collapse all
    /// three into one generic failure.
    ///
    /// # Errors
    ///
    /// Returns an error only for repository failures.
    pub async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Vec<(User, Tenant)>> {
        let candidates = self
            .repository
            .find_login_candidates_by_email(email)
            .await
            .map_err(AuthError::from)?;

        let verified = candidates
            .into_iter()
            .filter(|(user, tenant)| Self::is_eligible(user, tenant))
            .filter(|(user, _)| Self::password_matches(user, password))
            .collect();

        Ok(verified)
    }

    /// Hash a new password for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    pub fn hash_password(password: &str) -> AuthResult<String> {
        bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TenantStatus, UserRole, UserStatus};
    use uuid::Uuid;

    fn user_with_hash(hash: Option<String>, status: UserStatus) -> User {
        User::new(
            Uuid::new_v4(),
            "dev@example.com".to_string(),
            hash,
            UserRole::User,
            status,
        )
    }

    #[test]
    fn social_only_accounts_are_ineligible() {
        let tenant = Tenant::new("Acme".to_string(), "acme".to_string());
        let user = user_with_hash(None, UserStatus::Active);
        assert!(!CredentialValidator::is_eligible(&user, &tenant));
    }

    #[test]
    fn suspended_user_is_ineligible() {
        let tenant = Tenant::new("Acme".to_string(), "acme".to_string());
        let user = user_with_hash(Some("$2b$12$hash".to_string()), UserStatus::Suspended);
        assert!(!CredentialValidator::is_eligible(&user, &tenant));
    }

    #[test]
    fn paused_tenant_blocks_eligible_user() {
        let mut tenant = Tenant::new("Acme".to_string(), "acme".to_string());
        tenant.status = TenantStatus::Paused;
        let user = user_with_hash(Some("$2b$12$hash".to_string()), UserStatus::Active);
        assert!(!CredentialValidator::is_eligible(&user, &tenant));
    }

    #[test]
    fn password_provider_disabled_blocks_login() {
        let mut tenant = Tenant::new("Acme".to_string(), "acme".to_string());
        tenant.enabled_auth_providers = vec![AuthProviderKind::Google];
        let user = user_with_hash(Some("$2b$12$hash".to_string()), UserStatus::Active);
        assert!(!CredentialValidator::is_eligible(&user, &tenant));
    }

    #[test]
    fn malformed_hash_reads_as_mismatch() {
        let user = user_with_hash(Some("not-a-bcrypt-hash".to_string()), UserStatus::Active);
        assert!(!CredentialValidator::password_matches(&user, "password"));
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = CredentialValidator::hash_password("correct horse").unwrap();
        let user = user_with_hash(Some(hash), UserStatus::Active);
        assert!(CredentialValidator::password_matches(&user, "correct horse"));
        assert!(!CredentialValidator::password_matches(&user, "wrong horse"));
    }
}
