// ABOUTME: Repository abstraction for the relational identity store
// ABOUTME: Every tenant-scoped method takes an explicit TenantScope so call sites cannot forget the filter
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Identity Repository
//!
//! The repository replaces a runtime "inject the caller's tenant id into
//! every query" interceptor with a compile-time rule: every method touching
//! a tenant-scoped entity requires a [`TenantScope`] argument. Forgetting
//! the filter is a type error, not a data leak.
//!
//! Methods in the "principal resolution" section run *before* a tenant is
//! known — they exist only for the login path, which must see a principal's
//! rows across all tenants to disambiguate.

pub mod sqlite;

use crate::models::{Account, AuditEvent, AuthProviderKind, PasswordResetToken, Tenant, User, UserRole};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Tenant visibility for a repository call.
///
/// `Unscoped` is the explicit super-admin-only variant: construct it through
/// [`TenantScope::for_caller`] so role precedence stays in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// Reads and writes are confined to this tenant
    Tenant(Uuid),
    /// Cross-tenant access; reserved for super-admin callers
    Unscoped,
}

impl TenantScope {
    /// Derive the scope for a caller: super-admins see across tenants,
    /// everyone else is pinned to their own tenant.
    #[must_use]
    pub const fn for_caller(role: UserRole, tenant_id: Uuid) -> Self {
        match role {
            UserRole::SuperAdmin => Self::Unscoped,
            UserRole::User | UserRole::Admin => Self::Tenant(tenant_id),
        }
    }

    /// Tenant filter to apply, if any.
    #[must_use]
    pub const fn tenant_id(&self) -> Option<Uuid> {
        match self {
            Self::Tenant(id) => Some(*id),
            Self::Unscoped => None,
        }
    }
}

/// Relational store contract for identity data.
///
/// Implementations return `anyhow::Result`; the service layer maps failures
/// to the public error taxonomy.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Run schema migrations.
    async fn migrate(&self) -> Result<()>;

    // ================================
    // Tenants
    // ================================

    /// Create a tenant. Fails if the slug is already taken.
    async fn create_tenant(&self, tenant: &Tenant) -> Result<Uuid>;

    /// Get a tenant by id, including soft-deleted rows (callers check).
    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>>;

    /// Get a tenant by its globally unique slug.
    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>>;

    // ================================
    // Users (tenant-scoped)
    // ================================

    /// Create a user. Fails if the email already exists within the tenant.
    async fn create_user(&self, user: &User) -> Result<Uuid>;

    /// Get a non-deleted user by id within the scope.
    async fn get_user(&self, scope: TenantScope, user_id: Uuid) -> Result<Option<User>>;

    /// Get a non-deleted user by email within the scope.
    ///
    /// Email is not globally unique, so under a tenant filter this is a
    /// first-match lookup rather than a unique-key point read.
    async fn get_user_by_email(&self, scope: TenantScope, email: &str) -> Result<Option<User>>;

    /// List non-deleted users visible in the scope.
    async fn list_users(&self, scope: TenantScope) -> Result<Vec<User>>;

    /// Count non-deleted users visible in the scope.
    async fn count_users(&self, scope: TenantScope) -> Result<i64>;

    /// Replace a user's password hash. Returns affected rows — zero when
    /// the user is outside the scope.
    async fn update_user_password(
        &self,
        scope: TenantScope,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<u64>;

    /// Store MFA enrollment state for a user.
    async fn update_user_mfa(
        &self,
        scope: TenantScope,
        user_id: Uuid,
        mfa_enabled: bool,
        mfa_secret: Option<&str>,
    ) -> Result<u64>;

    /// Bump the user's last-active timestamp.
    async fn update_last_active(&self, scope: TenantScope, user_id: Uuid) -> Result<()>;

    // ================================
    // Principal resolution (login path only — runs before a tenant is known)
    // ================================

    /// All non-deleted `(User, Tenant)` rows sharing a login email, across
    /// tenants whose rows are not soft-deleted. Status filtering is the
    /// caller's job.
    async fn find_login_candidates_by_email(&self, email: &str) -> Result<Vec<(User, Tenant)>>;

    /// All non-deleted `(User, Tenant)` rows owning an account link for the
    /// given external identity.
    async fn find_login_candidates_by_account(
        &self,
        provider: AuthProviderKind,
        provider_account_id: &str,
    ) -> Result<Vec<(User, Tenant)>>;

    /// Get a non-deleted user by id regardless of tenant. Exists for token
    /// verification flows that must re-load the principal before a scope
    /// can be derived.
    async fn get_user_for_auth(&self, user_id: Uuid) -> Result<Option<User>>;

    // ================================
    // Provider accounts
    // ================================

    /// Link an external identity to a user. Idempotent: an existing
    /// `(provider, provider_account_id)` link is skipped, not an error.
    async fn create_account(&self, account: &Account) -> Result<()>;

    /// Find an account link by external identity.
    async fn get_account(
        &self,
        provider: AuthProviderKind,
        provider_account_id: &str,
    ) -> Result<Option<Account>>;

    /// All account links owned by a user.
    async fn list_accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>>;

    // ================================
    // Password reset tokens
    // ================================

    /// Persist a hashed reset token.
    async fn create_password_reset_token(&self, token: &PasswordResetToken) -> Result<()>;

    /// Look up a reset token by its hash.
    async fn get_password_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>>;

    /// Delete one reset token (successful use).
    async fn delete_password_reset_token(&self, token_id: Uuid) -> Result<()>;

    /// Invalidate every reset token for an email, across all tenants.
    /// Returns the number of tokens removed.
    async fn delete_password_reset_tokens_for_email(&self, email: &str) -> Result<u64>;

    // ================================
    // Audit
    // ================================

    /// Record an audit event. Callers treat failures as best-effort.
    async fn record_audit_event(&self, event: &AuditEvent) -> Result<()>;
}
