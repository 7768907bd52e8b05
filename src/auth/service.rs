// ABOUTME: Orchestrates every login entry point into the shared issuance funnel
// ABOUTME: All flows converge on complete_login so MFA and eligibility gates cannot be skipped
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::auth::credentials::CredentialValidator;
use crate::auth::disambiguation::{Resolution, TenantDisambiguator};
use crate::auth::mfa::MfaChallengeManager;
use crate::auth::social::{SocialProfileResolver, SocialResolution};
use crate::auth::{LoginOutcome, TokenBundle};
use crate::config::SocialProviderConfig;
use crate::constants::{audit_events, limits, ttl};
use crate::database::{IdentityRepository, TenantScope};
use crate::errors::{AuthError, AuthResult};
use crate::models::{
    AuditEvent, PasswordResetToken, Tenant, User, UserRole, UserStatus,
};
use crate::notifications::Mailer;
use crate::oauth::state::OAuthStateStore;
use crate::oauth::{ExternalProfile, SocialProvider};
use crate::store::EphemeralStore;
use crate::tokens::TokenIssuer;
use chrono::{Duration as ChronoDuration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The authentication facade. One instance per process; all state lives in
/// the repository and the ephemeral store.
pub struct AuthService {
    repository: Arc<dyn IdentityRepository>,
    store: EphemeralStore,
    issuer: Arc<TokenIssuer>,
    credentials: CredentialValidator,
    disambiguator: TenantDisambiguator,
    social_resolver: SocialProfileResolver,
    mfa: MfaChallengeManager,
    oauth_states: OAuthStateStore,
    mailer: Arc<dyn Mailer>,
    social_config: SocialProviderConfig,
}

impl AuthService {
    #[must_use]
    pub fn new(
        repository: Arc<dyn IdentityRepository>,
        store: EphemeralStore,
        issuer: TokenIssuer,
        mailer: Arc<dyn Mailer>,
        social_config: SocialProviderConfig,
    ) -> Self {
        let issuer = Arc::new(issuer);
        Self {
            credentials: CredentialValidator::new(Arc::clone(&repository)),
            disambiguator: TenantDisambiguator::new(store.clone(), Arc::clone(&issuer)),
            social_resolver: SocialProfileResolver::new(Arc::clone(&repository)),
            mfa: MfaChallengeManager::new(
                store.clone(),
                Arc::clone(&issuer),
                Arc::clone(&repository),
            ),
            oauth_states: OAuthStateStore::new(store.clone()),
            repository,
            store,
            issuer,
            mailer,
            social_config,
        }
    }

    /// OAuth state handles and exchange codes, for the transport layer.
    #[must_use]
    pub const fn oauth_states(&self) -> &OAuthStateStore {
        &self.oauth_states
    }

    // ================================
    // Registration
    // ================================

    /// Register with email and password.
    ///
    /// A fresh slug creates an active tenant with this user as its admin;
    /// an existing slug joins that tenant as a regular user. This is the
    /// only path that creates tenants.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] for malformed email, slug, or a short
    ///   password.
    /// - [`AuthError::AlreadyExists`] when the email is taken in the tenant.
    /// - [`AuthError::AccountOrTenantInactive`] when joining a non-active
    ///   tenant.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        tenant_name: &str,
        tenant_slug: &str,
    ) -> AuthResult<TokenBundle> {
        validate_email(email)?;
        validate_password(password)?;
        validate_slug(tenant_slug)?;

        let existing = self
            .repository
            .get_tenant_by_slug(tenant_slug)
            .await
            .map_err(AuthError::from)?;

        let (tenant, role) = match existing {
            Some(tenant) => {
                if !tenant.allows_login() {
                    return Err(AuthError::AccountOrTenantInactive);
                }
                let taken = self
                    .repository
                    .get_user_by_email(TenantScope::Tenant(tenant.id), email)
                    .await
                    .map_err(AuthError::from)?;
                if taken.is_some() {
                    return Err(AuthError::AlreadyExists(
                        "email already registered in this tenant".to_string(),
                    ));
                }
                (tenant, UserRole::User)
            }
            None => {
                let tenant = Tenant::new(tenant_name.to_string(), tenant_slug.to_string());
                self.repository
                    .create_tenant(&tenant)
                    .await
                    .map_err(AuthError::from)?;
                self.audit(AuditEvent::new(
                    audit_events::TENANT_CREATED,
                    Some(tenant.id),
                    None,
                ))
                .await;
                info!("Created tenant {} via registration", tenant.slug);
                (tenant, UserRole::Admin)
            }
        };

        let password_hash = CredentialValidator::hash_password(password)?;
        let user = User::new(
            tenant.id,
            email.to_string(),
            Some(password_hash),
            role,
            UserStatus::Active,
        );
        self.repository
            .create_user(&user)
            .await
            .map_err(AuthError::from)?;

        // Registration doubles as the first login; MFA cannot be enrolled yet
        self.issue_session(&user, &tenant).await
    }

    // ================================
    // Login entry points
    // ================================

    /// Password login.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when nothing matched; see
    /// [`LoginOutcome`] for the non-error branches.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        tenant_hint: Option<&str>,
    ) -> AuthResult<LoginOutcome> {
        let verified = self.credentials.verify_password(email, password).await?;
        match self.disambiguator.resolve(email, verified, tenant_hint).await? {
            Resolution::Single(pair) => self.complete_login(&pair.0, &pair.1).await,
            Resolution::Challenge(challenge) => Ok(LoginOutcome::SelectionRequired(challenge)),
        }
    }

    /// Redeem a selection token for the chosen tenant.
    ///
    /// # Errors
    ///
    /// See [`TenantDisambiguator::consume_selection`]; the chosen pair is
    /// re-validated, so a user suspended mid-selection still cannot enter.
    pub async fn select_tenant(
        &self,
        selection_token: &str,
        chosen_tenant_id: Uuid,
    ) -> AuthResult<LoginOutcome> {
        let candidate = self
            .disambiguator
            .consume_selection(selection_token, chosen_tenant_id)
            .await?;

        let user = self
            .repository
            .get_user_for_auth(candidate.user_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidCredentials)?;
        let tenant = self
            .repository
            .get_tenant(candidate.tenant_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::TenantOrResourceNotFound)?;

        self.complete_login(&user, &tenant).await
    }

    /// Social login callback with a normalized provider profile.
    ///
    /// `state_handle` is the single-use handle minted at redirect time; its
    /// stored payload supplies the tenant hint.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthProviderNotConfigured`] when the deployment has no
    ///   credentials for the provider.
    /// - See [`SocialProfileResolver::resolve`] for the matching failures.
    pub async fn oauth_callback(
        &self,
        profile: &ExternalProfile,
        state_handle: Option<&str>,
    ) -> AuthResult<LoginOutcome> {
        self.require_provider_configured(profile.provider)?;

        let tenant_hint = match state_handle {
            Some(handle) => {
                self.oauth_states
                    .consume_state(handle)
                    .await?
                    .requested_tenant_slug
            }
            None => None,
        };

        match self
            .social_resolver
            .resolve(profile, tenant_hint.as_deref())
            .await?
        {
            SocialResolution::NewSignup(pair) => {
                // The account was just created against an active tenant;
                // nothing to disambiguate and no MFA enrolled yet
                let bundle = self.issue_session(&pair.0, &pair.1).await?;
                Ok(LoginOutcome::Authenticated(bundle))
            }
            SocialResolution::Candidates(candidates) => {
                let email = profile
                    .primary_verified_email()
                    .ok_or(AuthError::InvalidCredentials)?;
                match self
                    .disambiguator
                    .resolve(email, candidates, tenant_hint.as_deref())
                    .await?
                {
                    Resolution::Single(pair) => self.complete_login(&pair.0, &pair.1).await,
                    Resolution::Challenge(challenge) => {
                        Ok(LoginOutcome::SelectionRequired(challenge))
                    }
                }
            }
        }
    }

    /// Park a login outcome behind a one-time exchange code, for callbacks
    /// that must bridge a browser redirect to a token response.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn create_oauth_exchange_code(&self, outcome: &LoginOutcome) -> AuthResult<String> {
        self.oauth_states.stash_login_outcome(outcome).await
    }

    /// Redeem a one-time exchange code for the parked login outcome.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpiredToken`] for unknown, expired, or
    /// replayed codes.
    pub async fn exchange_oauth_code(&self, code: &str) -> AuthResult<LoginOutcome> {
        self.oauth_states.take_login_outcome(code).await
    }

    // ================================
    // MFA
    // ================================

    /// Finish an MFA-gated login with a TOTP code.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidOrExpiredToken`] for a bad continuation token.
    /// - [`AuthError::InvalidMfaCode`] / [`AuthError::MfaThrottled`] from
    ///   code verification.
    pub async fn verify_mfa(&self, mfa_token: &str, code: &str) -> AuthResult<TokenBundle> {
        let claims = self.issuer.decode_mfa_token(mfa_token)?;
        let user_id = parse_token_uuid(&claims.sub)?;
        let tenant_id = parse_token_uuid(&claims.tenant_id)?;

        let user = self
            .repository
            .get_user_for_auth(user_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidCredentials)?;
        let tenant = self
            .repository
            .get_tenant(tenant_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::TenantOrResourceNotFound)?;

        self.mfa.verify(&user, code).await?;

        // Success re-enters the same issuance path as non-MFA logins
        if !user.can_authenticate() || !tenant.allows_login() {
            return Err(AuthError::AccountOrTenantInactive);
        }
        self.issue_session(&user, &tenant).await
    }

    // ================================
    // Session continuation
    // ================================

    /// Obtain a session in another tenant from an existing full token.
    ///
    /// Re-resolves the principal's email within the target tenant and runs
    /// the usual eligibility and MFA gates; this is a re-entry into the
    /// funnel, not a shortcut around it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when the email has no row
    /// in the target tenant.
    pub async fn switch_tenant(
        &self,
        full_token: &str,
        target_tenant_id: Uuid,
    ) -> AuthResult<LoginOutcome> {
        let claims = self.issuer.decode_full_token(full_token)?;

        let tenant = self
            .repository
            .get_tenant(target_tenant_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::TenantOrResourceNotFound)?;
        let user = self
            .repository
            .get_user_by_email(TenantScope::Tenant(tenant.id), &claims.email)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidCredentials)?;

        self.complete_login(&user, &tenant).await
    }

    /// Issue a fresh full token from a possibly expired one. Signature and
    /// shape are still enforced; the principal is re-validated against the
    /// database. MFA is not re-run.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidOrExpiredToken`] for a tampered token and
    /// [`AuthError::AccountOrTenantInactive`] when the principal lost
    /// eligibility since issuance.
    pub async fn refresh_token(&self, full_token: &str) -> AuthResult<TokenBundle> {
        let claims = self.issuer.decode_full_token_allow_expired(full_token)?;
        let user_id = parse_token_uuid(&claims.sub)?;
        let tenant_id = parse_token_uuid(&claims.tenant_id)?;

        let user = self
            .repository
            .get_user_for_auth(user_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidCredentials)?;
        if user.tenant_id != tenant_id {
            return Err(AuthError::Unauthorized);
        }
        let tenant = self
            .repository
            .get_tenant(tenant_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::TenantOrResourceNotFound)?;

        if !user.can_authenticate() || !tenant.allows_login() {
            return Err(AuthError::AccountOrTenantInactive);
        }
        self.issue_session(&user, &tenant).await
    }

    // ================================
    // Password reset
    // ================================

    /// Start a password reset. Always acknowledges identically whether or
    /// not the account exists.
    ///
    /// # Errors
    ///
    /// Returns an error only for repository failures; "no such account" is
    /// not one.
    pub async fn forgot_password(&self, email: &str, tenant_slug: &str) -> AuthResult<()> {
        let Some(tenant) = self
            .repository
            .get_tenant_by_slug(tenant_slug)
            .await
            .map_err(AuthError::from)?
        else {
            return Ok(());
        };
        let Some(user) = self
            .repository
            .get_user_by_email(TenantScope::Tenant(tenant.id), email)
            .await
            .map_err(AuthError::from)?
        else {
            return Ok(());
        };

        let raw_token = random_token();
        let record = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token_hash: hash_reset_token(&raw_token),
            expires_at: Utc::now() + ChronoDuration::seconds(i64::from(ttl::PASSWORD_RESET_SECS)),
            created_at: Utc::now(),
        };
        self.repository
            .create_password_reset_token(&record)
            .await
            .map_err(AuthError::from)?;

        if let Err(e) = self
            .mailer
            .send_password_reset(&user.email, &tenant.slug, &raw_token)
            .await
        {
            warn!("Password reset mail delivery failed: {e}");
        }
        Ok(())
    }

    /// Complete a password reset with the raw token from the reset link.
    ///
    /// Every reset token for the email is invalidated across all tenants,
    /// and the mass invalidation is audited.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidOrExpiredToken`] for unknown, expired, or
    ///   consumed tokens.
    /// - [`AuthError::InvalidInput`] for a short replacement password.
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;

        let record = self
            .repository
            .get_password_reset_token(&hash_reset_token(raw_token))
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        if record.is_expired() {
            self.repository
                .delete_password_reset_token(record.id)
                .await
                .map_err(AuthError::from)?;
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let user = self
            .repository
            .get_user_for_auth(record.user_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let password_hash = CredentialValidator::hash_password(new_password)?;
        let updated = self
            .repository
            .update_user_password(TenantScope::Tenant(user.tenant_id), user.id, &password_hash)
            .await
            .map_err(AuthError::from)?;
        if updated == 0 {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let invalidated = self
            .repository
            .delete_password_reset_tokens_for_email(&user.email)
            .await
            .map_err(AuthError::from)?;
        self.audit(
            AuditEvent::new(
                audit_events::PASSWORD_MASS_RESET,
                Some(user.tenant_id),
                Some(user.id),
            )
            .with_detail(serde_json::json!({ "tokens_invalidated": invalidated })),
        )
        .await;

        if let Err(e) = self
            .mailer
            .send_security_notice(&user.email, "Your password was changed")
            .await
        {
            warn!("Security notice delivery failed: {e}");
        }
        Ok(())
    }

    // ================================
    // Health
    // ================================

    /// Probe the ephemeral store backend.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is unreachable.
    pub async fn health_check(&self) -> AuthResult<()> {
        self.store.health_check().await
    }

    // ================================
    // Shared funnel
    // ================================

    /// Eligibility gate plus MFA gate. Every authenticated flow lands here
    /// before a session exists.
    async fn complete_login(&self, user: &User, tenant: &Tenant) -> AuthResult<LoginOutcome> {
        if !user.can_authenticate() || !tenant.allows_login() {
            return Err(AuthError::AccountOrTenantInactive);
        }

        if tenant.mfa_required || user.mfa_enabled {
            let challenge = self.mfa.challenge(user, tenant.id)?;
            return Ok(LoginOutcome::MfaRequired(challenge));
        }

        let bundle = self.issue_session(user, tenant).await?;
        Ok(LoginOutcome::Authenticated(bundle))
    }

    /// Mint the tenant-scoped session token plus best-effort bookkeeping.
    async fn issue_session(&self, user: &User, tenant: &Tenant) -> AuthResult<TokenBundle> {
        let (access_token, expires_at) = self.issuer.issue_full_token(user, tenant.id)?;

        if let Err(e) = self
            .repository
            .update_last_active(TenantScope::Tenant(tenant.id), user.id)
            .await
        {
            warn!("Failed to update last-active timestamp for {}: {e}", user.id);
        }
        self.audit(AuditEvent::new(
            audit_events::LOGIN_SUCCESS,
            Some(tenant.id),
            Some(user.id),
        ))
        .await;

        info!("Issued session for user {} in tenant {}", user.id, tenant.slug);
        Ok(TokenBundle {
            access_token,
            token_type: "bearer".to_string(),
            expires_at,
            user_id: user.id,
            tenant_id: tenant.id,
            email: user.email.clone(),
            role: user.role,
        })
    }

    fn require_provider_configured(&self, provider: SocialProvider) -> AuthResult<()> {
        let configured = match provider {
            SocialProvider::Google => self.social_config.google.is_some(),
            SocialProvider::Github => self.social_config.github.is_some(),
        };
        if configured {
            Ok(())
        } else {
            Err(AuthError::AuthProviderNotConfigured(
                provider.as_str().to_string(),
            ))
        }
    }

    /// Audit writes never fail the surrounding operation.
    async fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.repository.record_audit_event(&event).await {
            warn!("Failed to record audit event {}: {e}", event.kind);
        }
    }
}

fn parse_token_uuid(value: &str) -> AuthResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| AuthError::InvalidOrExpiredToken)
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn validate_email(email: &str) -> AuthResult<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidInput("invalid email address".to_string()));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(AuthError::InvalidInput("invalid email address".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.len() < limits::MIN_PASSWORD_LENGTH {
        return Err(AuthError::InvalidInput(format!(
            "password must be at least {} characters",
            limits::MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> AuthResult<()> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidInput(
            "tenant slug must be lowercase letters, digits, or hyphens".to_string(),
        ))
    }
}
