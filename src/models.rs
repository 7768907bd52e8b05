// ABOUTME: Core data model for the multi-tenant identity backend
// ABOUTME: Users, tenants, provider accounts, reset tokens, and ephemeral session payloads
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Data Model
//!
//! A principal's logical identity is its email; the same email may own
//! independent [`User`] rows in independent tenants. Those rows are distinct
//! principals that happen to share a login email, which is why emails are
//! unique only *within* a tenant.

use crate::errors::AuthError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// User role for the permission precedence `super_admin` > `admin` > `user`.
///
/// Only the `SuperAdmin` distinction matters inside this crate: it is the
/// single role exempt from tenant-scope injection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular tenant member
    #[default]
    User,
    /// Tenant administrator
    Admin,
    /// Cross-tenant operator, exempt from tenant scoping
    SuperAdmin,
}

impl UserRole {
    /// Database/storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(AuthError::InvalidInput(format!("invalid role: {other}"))),
        }
    }
}

/// User account status.
///
/// `Pending` accounts may still authenticate — the transport layer decides
/// what a pending principal is allowed to see. `Suspended` and `Deleted`
/// accounts can never receive a token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Newly registered, not yet confirmed
    #[default]
    Pending,
    /// Fully active account
    Active,
    /// Blocked by an administrator
    Suspended,
    /// Soft-deleted
    Deleted,
}

impl UserStatus {
    /// Whether this status may enter the token-issuance path
    #[must_use]
    pub const fn can_authenticate(&self) -> bool {
        matches!(self, Self::Active | Self::Pending)
    }

    /// Database/storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }
}

impl Display for UserStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "deleted" => Ok(Self::Deleted),
            other => Err(AuthError::InvalidInput(format!("invalid status: {other}"))),
        }
    }
}

/// Tenant lifecycle status. Only `Active` tenants accept logins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Accepting logins
    #[default]
    Active,
    /// Temporarily blocked (billing hold, manual pause)
    Paused,
    /// Soft-deleted
    Deleted,
}

impl TenantStatus {
    /// Whether members of this tenant may log in
    #[must_use]
    pub const fn allows_login(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Database/storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Deleted => "deleted",
        }
    }
}

impl Display for TenantStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "deleted" => Ok(Self::Deleted),
            other => Err(AuthError::InvalidInput(format!(
                "invalid tenant status: {other}"
            ))),
        }
    }
}

/// Login methods a tenant can enable for its members.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuthProviderKind {
    /// Email + password
    Password,
    /// Google OAuth profile
    Google,
    /// GitHub OAuth profile
    Github,
}

impl AuthProviderKind {
    /// Database/storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl Display for AuthProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Self::Password),
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(AuthError::InvalidInput(format!(
                "invalid auth provider: {other}"
            ))),
        }
    }
}

/// Identity row scoped to exactly one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Login email, unique only within the tenant
    pub email: String,
    /// Display name
    pub display_name: Option<String>,
    /// Bcrypt hash; `None` marks an OAuth-only account
    pub password_hash: Option<String>,
    /// Permission role
    pub role: UserRole,
    /// Account status
    pub status: UserStatus,
    /// Per-user MFA opt-in
    pub mfa_enabled: bool,
    /// Base32 TOTP secret, present once MFA has been enrolled
    pub mfa_secret: Option<String>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// Last time the user obtained a token
    pub last_active: DateTime<Utc>,
    /// Soft-delete timestamp
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user row in the given tenant.
    #[must_use]
    pub fn new(
        tenant_id: Uuid,
        email: String,
        password_hash: Option<String>,
        role: UserRole,
        status: UserStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            email,
            display_name: None,
            password_hash,
            role,
            status,
            mfa_enabled: false,
            mfa_secret: None,
            created_at: now,
            last_active: now,
            deleted_at: None,
        }
    }

    /// Whether the row has been soft-deleted
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some() || matches!(self.status, UserStatus::Deleted)
    }

    /// Whether the account itself (ignoring its tenant) may authenticate
    #[must_use]
    pub const fn can_authenticate(&self) -> bool {
        !self.is_deleted() && self.status.can_authenticate()
    }
}

/// Organizational boundary. All user data and access is scoped to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Globally unique, URL-safe slug
    pub slug: String,
    /// Lifecycle status
    pub status: TenantStatus,
    /// Tenant-wide MFA policy; `true` forces a second factor for every member
    pub mfa_required: bool,
    /// Login methods allowed for members of this tenant
    pub enabled_auth_providers: Vec<AuthProviderKind>,
    /// Configuration visible to tenant members
    pub config_public: serde_json::Value,
    /// Configuration visible to tenant admins only
    pub config_private: serde_json::Value,
    /// When the tenant was created
    pub created_at: DateTime<Utc>,
    /// When the tenant was last updated
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tenant {
    /// Create a new active tenant with the default provider set.
    #[must_use]
    pub fn new(name: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            slug,
            status: TenantStatus::Active,
            mfa_required: false,
            enabled_auth_providers: vec![
                AuthProviderKind::Password,
                AuthProviderKind::Google,
                AuthProviderKind::Github,
            ],
            config_public: serde_json::Value::Object(serde_json::Map::new()),
            config_private: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether members may log in: active status and not soft-deleted
    #[must_use]
    pub const fn allows_login(&self) -> bool {
        self.status.allows_login() && self.deleted_at.is_none()
    }

    /// Whether the tenant permits the given login method
    #[must_use]
    pub fn allows_provider(&self, provider: AuthProviderKind) -> bool {
        self.enabled_auth_providers.contains(&provider)
    }
}

/// Link between a [`User`] and one external OAuth provider identity.
///
/// Unique per `(provider, provider_account_id)`. Created when a social
/// profile is first linked, never updated, removed only by cascading user
/// deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique link identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// External provider
    pub provider: AuthProviderKind,
    /// Provider-assigned stable identifier
    pub provider_account_id: String,
    /// When the link was created
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new provider link for a user.
    #[must_use]
    pub fn new(user_id: Uuid, provider: AuthProviderKind, provider_account_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider,
            provider_account_id,
            created_at: Utc::now(),
        }
    }
}

/// One-time, hashed, time-boxed credential-reset capability.
///
/// The raw token is mailed to the user and never persisted; only its SHA-256
/// hex digest is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetToken {
    /// Unique token identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// SHA-256 hex digest of the raw token
    pub token_hash: String,
    /// Hard expiry
    pub expires_at: DateTime<Utc>,
    /// When the token was minted
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Whether the token window has elapsed
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Best-effort audit record. Writes are never allowed to fail the operation
/// that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier
    pub id: Uuid,
    /// Tenant context, when one was resolved
    pub tenant_id: Option<Uuid>,
    /// Acting user, when one was resolved
    pub user_id: Option<Uuid>,
    /// Event kind, see [`crate::constants::audit_events`]
    pub kind: String,
    /// Free-form structured detail
    pub detail: serde_json::Value,
    /// When the event occurred
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Create an audit event of the given kind.
    #[must_use]
    pub fn new(kind: &str, tenant_id: Option<Uuid>, user_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            kind: kind.to_owned(),
            detail: serde_json::Value::Object(serde_json::Map::new()),
            created_at: Utc::now(),
        }
    }

    /// Attach structured detail to the event.
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// A `{user, tenant}` pair parked in the ephemeral store while the caller
/// picks a tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionCandidate {
    /// Candidate user row
    pub user_id: Uuid,
    /// Tenant that user row belongs to
    pub tenant_id: Uuid,
}

/// Tenant-selection session stored under the session id embedded in a
/// selection token. Consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionSession {
    /// Email shared by every candidate
    pub email: String,
    /// Eligible `{user, tenant}` pairs
    pub candidates: Vec<SelectionCandidate>,
}

/// Human-readable tenant entry returned alongside a selection token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantChoice {
    /// Tenant id the caller passes back to `select_tenant`
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// URL-safe slug
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspended_and_deleted_users_cannot_authenticate() {
        let mut user = User::new(
            Uuid::new_v4(),
            "a@x.com".into(),
            Some("hash".into()),
            UserRole::User,
            UserStatus::Active,
        );
        assert!(user.can_authenticate());

        user.status = UserStatus::Suspended;
        assert!(!user.can_authenticate());

        user.status = UserStatus::Active;
        user.deleted_at = Some(Utc::now());
        assert!(!user.can_authenticate());
    }

    #[test]
    fn pending_users_may_authenticate() {
        let user = User::new(
            Uuid::new_v4(),
            "a@x.com".into(),
            Some("hash".into()),
            UserRole::User,
            UserStatus::Pending,
        );
        assert!(user.can_authenticate());
    }

    #[test]
    fn paused_tenant_blocks_login() {
        let mut tenant = Tenant::new("Acme".into(), "acme".into());
        assert!(tenant.allows_login());
        tenant.status = TenantStatus::Paused;
        assert!(!tenant.allows_login());
    }

    #[test]
    fn role_round_trips_through_storage_repr() {
        for role in [UserRole::User, UserRole::Admin, UserRole::SuperAdmin] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
    }

    #[test]
    fn provider_enablement_is_per_tenant() {
        let mut tenant = Tenant::new("Acme".into(), "acme".into());
        assert!(tenant.allows_provider(AuthProviderKind::Google));
        tenant.enabled_auth_providers = vec![AuthProviderKind::Password];
        assert!(!tenant.allows_provider(AuthProviderKind::Google));
    }
}
