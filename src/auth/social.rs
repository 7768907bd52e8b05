// ABOUTME: Resolves normalized social profiles to login candidates or a first-time signup
// ABOUTME: Account links key on the provider's stable external id, never on email
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::database::IdentityRepository;
use crate::errors::{AuthError, AuthResult};
use crate::models::{Account, Tenant, User, UserRole, UserStatus};
use crate::oauth::ExternalProfile;
use std::sync::Arc;
use tracing::{info, warn};

/// How a social profile resolved.
pub enum SocialResolution {
    /// Existing users matched; hand the eligible pairs to disambiguation
    Candidates(Vec<(User, Tenant)>),
    /// First-time signup: the user and account link were just created
    NewSignup(Box<(User, Tenant)>),
}

/// Maps an external identity onto local users.
///
/// Matching prefers the stable `(provider, external_id)` account link; a
/// verified-email match is the linking fallback for users who signed up with
/// a password first.
pub struct SocialProfileResolver {
    repository: Arc<dyn IdentityRepository>,
}

impl SocialProfileResolver {
    #[must_use]
    pub fn new(repository: Arc<dyn IdentityRepository>) -> Self {
        Self { repository }
    }

    /// Resolve a provider profile per the linking rules.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] when the profile has no verified
    ///   email or every matched row is ineligible.
    /// - [`AuthError::Unauthorized`] when the email is already linked to a
    ///   different external id under the same provider.
    /// - [`AuthError::AuthProviderDisabledForTenant`] when every candidate
    ///   was excluded only because its tenant disabled the provider.
    /// - [`AuthError::SignupRequiresTenantContext`] for a first-time signup
    ///   without a tenant hint.
    pub async fn resolve(
        &self,
        profile: &ExternalProfile,
        context_tenant_slug: Option<&str>,
    ) -> AuthResult<SocialResolution> {
        let email = profile
            .primary_verified_email()
            .ok_or(AuthError::InvalidCredentials)?;
        let provider = profile.provider.as_provider_kind();

        // Stable link first
        let linked = self
            .repository
            .find_login_candidates_by_account(provider, &profile.external_id)
            .await
            .map_err(AuthError::from)?;
        if !linked.is_empty() {
            return Ok(SocialResolution::Candidates(Self::filter_eligible(
                linked, provider,
            )?));
        }

        // Email fallback for users who never linked this provider
        let by_email = self
            .repository
            .find_login_candidates_by_email(email)
            .await
            .map_err(AuthError::from)?;
        if by_email.is_empty() {
            return self.first_time_signup(profile, email, context_tenant_slug).await;
        }

        // A same-provider link to a different external id means two external
        // identities claim one local email. Hard failure, never a silent skip.
        for (user, _) in &by_email {
            let accounts = self
                .repository
                .list_accounts_for_user(user.id)
                .await
                .map_err(AuthError::from)?;
            if accounts
                .iter()
                .any(|a| a.provider == provider && a.provider_account_id != profile.external_id)
            {
                warn!(
                    "Social login conflict: email already linked to a different {} identity",
                    provider.as_str()
                );
                return Err(AuthError::Unauthorized);
            }
        }

        let survivors = Self::filter_eligible(by_email, provider)?;

        // Bulk link, idempotent: a concurrent login creating the same link
        // first is skipped by the store
        for (user, _) in &survivors {
            self.repository
                .create_account(&Account::new(
                    user.id,
                    provider,
                    profile.external_id.clone(),
                ))
                .await
                .map_err(AuthError::from)?;
        }

        Ok(SocialResolution::Candidates(survivors))
    }

    /// Drop ineligible pairs. When provider-disablement is the only reason
    /// nothing survived, that is surfaced rather than collapsed into the
    /// generic failure.
    fn filter_eligible(
        candidates: Vec<(User, Tenant)>,
        provider: crate::models::AuthProviderKind,
    ) -> AuthResult<Vec<(User, Tenant)>> {
        let mut survivors = Vec::new();
        let mut disabled_for: Option<String> = None;

        for (user, tenant) in candidates {
            if !user.can_authenticate() || !tenant.allows_login() {
                continue;
            }
            if !tenant.allows_provider(provider) {
                disabled_for.get_or_insert(tenant.slug.clone());
                continue;
            }
            survivors.push((user, tenant));
        }

        if survivors.is_empty() {
            if let Some(tenant_slug) = disabled_for {
                return Err(AuthError::AuthProviderDisabledForTenant {
                    provider: provider.as_str().to_string(),
                    tenant_slug,
                });
            }
        }
        Ok(survivors)
    }

    /// Create a user and account link in the hinted tenant. New-tenant
    /// creation through social login is deliberately unsupported.
    async fn first_time_signup(
        &self,
        profile: &ExternalProfile,
        email: &str,
        context_tenant_slug: Option<&str>,
    ) -> AuthResult<SocialResolution> {
        let slug = context_tenant_slug.ok_or(AuthError::SignupRequiresTenantContext)?;
        let provider = profile.provider.as_provider_kind();

        let tenant = self
            .repository
            .get_tenant_by_slug(slug)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::TenantOrResourceNotFound)?;
        if !tenant.allows_login() {
            return Err(AuthError::AccountOrTenantInactive);
        }
        if !tenant.allows_provider(provider) {
            return Err(AuthError::AuthProviderDisabledForTenant {
                provider: provider.as_str().to_string(),
                tenant_slug: tenant.slug.clone(),
            });
        }

        // The provider vouched for the email, so the user starts active
        let mut user = User::new(
            tenant.id,
            email.to_string(),
            None,
            UserRole::User,
            UserStatus::Active,
        );
        user.display_name = profile.display_name.clone();

        self.repository
            .create_user(&user)
            .await
            .map_err(AuthError::from)?;
        self.repository
            .create_account(&Account::new(
                user.id,
                provider,
                profile.external_id.clone(),
            ))
            .await
            .map_err(AuthError::from)?;

        info!(
            "First-time social signup created user in tenant {}",
            tenant.slug
        );
        Ok(SocialResolution::NewSignup(Box::new((user, tenant))))
    }
}
