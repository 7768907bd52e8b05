// ABOUTME: SQLite implementation of the identity repository using runtime sqlx queries
// ABOUTME: Uuids and enums are stored as TEXT, timestamps as chrono values
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::{IdentityRepository, TenantScope};
use crate::models::{
    Account, AuditEvent, AuthProviderKind, PasswordResetToken, Tenant, TenantStatus, User,
    UserRole, UserStatus,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// SQLite-backed identity repository.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect to the database at `database_url`, creating the file if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database URL: {database_url}"))?
            .create_if_missing(true);

        // An in-memory database exists per connection; a larger pool would
        // silently hand out empty databases.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("failed to connect to SQLite")?;

        Ok(Self { pool })
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let id: String = row.try_get("id")?;
        let tenant_id: String = row.try_get("tenant_id")?;
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;
        Ok(User {
            id: Uuid::parse_str(&id).context("invalid user id in database")?,
            tenant_id: Uuid::parse_str(&tenant_id).context("invalid tenant id in database")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            password_hash: row.try_get("password_hash")?,
            role: role.parse::<UserRole>().map_err(anyhow::Error::new)?,
            status: status.parse::<UserStatus>().map_err(anyhow::Error::new)?,
            mfa_enabled: row.try_get("mfa_enabled")?,
            mfa_secret: row.try_get("mfa_secret")?,
            created_at: row.try_get("created_at")?,
            last_active: row.try_get("last_active")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn row_to_tenant(row: &SqliteRow) -> Result<Tenant> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let providers: String = row.try_get("enabled_auth_providers")?;
        let config_public: String = row.try_get("config_public")?;
        let config_private: String = row.try_get("config_private")?;
        Ok(Tenant {
            id: Uuid::parse_str(&id).context("invalid tenant id in database")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            status: status.parse::<TenantStatus>().map_err(anyhow::Error::new)?,
            mfa_required: row.try_get("mfa_required")?,
            enabled_auth_providers: serde_json::from_str(&providers)
                .context("invalid provider list in database")?,
            config_public: serde_json::from_str(&config_public)
                .context("invalid public config in database")?,
            config_private: serde_json::from_str(&config_private)
                .context("invalid private config in database")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;
        let provider: String = row.try_get("provider")?;
        Ok(Account {
            id: Uuid::parse_str(&id).context("invalid account id in database")?,
            user_id: Uuid::parse_str(&user_id).context("invalid user id in database")?,
            provider: provider
                .parse::<AuthProviderKind>()
                .map_err(anyhow::Error::new)?,
            provider_account_id: row.try_get("provider_account_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_reset_token(row: &SqliteRow) -> Result<PasswordResetToken> {
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;
        Ok(PasswordResetToken {
            id: Uuid::parse_str(&id).context("invalid token id in database")?,
            user_id: Uuid::parse_str(&user_id).context("invalid user id in database")?,
            token_hash: row.try_get("token_hash")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Load the owning tenant for a user row, skipping soft-deleted tenants.
    async fn owning_tenant(&self, user: &User) -> Result<Option<Tenant>> {
        let tenant = self.get_tenant(user.tenant_id).await?;
        Ok(tenant.filter(|t| t.deleted_at.is_none()))
    }
}

#[async_trait]
impl IdentityRepository for SqliteRepository {
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT UNIQUE NOT NULL,
                status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'paused', 'deleted')),
                mfa_required BOOLEAN NOT NULL DEFAULT 0,
                enabled_auth_providers TEXT NOT NULL DEFAULT '[]',
                config_public TEXT NOT NULL DEFAULT '{}',
                config_private TEXT NOT NULL DEFAULT '{}',
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                deleted_at DATETIME
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL REFERENCES tenants(id),
                email TEXT NOT NULL,
                display_name TEXT,
                password_hash TEXT,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin', 'super_admin')),
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'active', 'suspended', 'deleted')),
                mfa_enabled BOOLEAN NOT NULL DEFAULT 0,
                mfa_secret TEXT,
                created_at DATETIME NOT NULL,
                last_active DATETIME NOT NULL,
                deleted_at DATETIME,
                UNIQUE (tenant_id, email)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                provider TEXT NOT NULL,
                provider_account_id TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                UNIQUE (provider, provider_account_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS password_reset_tokens (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_hash TEXT UNIQUE NOT NULL,
                expires_at DATETIME NOT NULL,
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                tenant_id TEXT,
                user_id TEXT,
                kind TEXT NOT NULL,
                detail TEXT NOT NULL DEFAULT '{}',
                created_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_user_id ON accounts(user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reset_tokens_user_id ON password_reset_tokens(user_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_tenant(&self, tenant: &Tenant) -> Result<Uuid> {
        sqlx::query(
            r"
            INSERT INTO tenants (id, name, slug, status, mfa_required, enabled_auth_providers,
                                 config_public, config_private, created_at, updated_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(tenant.id.to_string())
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(tenant.status.as_str())
        .bind(tenant.mfa_required)
        .bind(serde_json::to_string(&tenant.enabled_auth_providers)?)
        .bind(serde_json::to_string(&tenant.config_public)?)
        .bind(serde_json::to_string(&tenant.config_private)?)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .bind(tenant.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                anyhow!("tenant slug already in use: {}", tenant.slug)
            } else {
                e.into()
            }
        })?;
        Ok(tenant.id)
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>> {
        let row = sqlx::query("SELECT * FROM tenants WHERE id = ?1")
            .bind(tenant_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_tenant).transpose()
    }

    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query("SELECT * FROM tenants WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_tenant).transpose()
    }

    async fn create_user(&self, user: &User) -> Result<Uuid> {
        sqlx::query(
            r"
            INSERT INTO users (id, tenant_id, email, display_name, password_hash, role, status,
                               mfa_enabled, mfa_secret, created_at, last_active, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
        )
        .bind(user.id.to_string())
        .bind(user.tenant_id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.mfa_enabled)
        .bind(&user.mfa_secret)
        .bind(user.created_at)
        .bind(user.last_active)
        .bind(user.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                anyhow!("email already in use within tenant")
            } else {
                e.into()
            }
        })?;
        Ok(user.id)
    }

    async fn get_user(&self, scope: TenantScope, user_id: Uuid) -> Result<Option<User>> {
        let row = match scope.tenant_id() {
            Some(tenant_id) => {
                sqlx::query(
                    "SELECT * FROM users WHERE id = ?1 AND tenant_id = ?2 AND deleted_at IS NULL",
                )
                .bind(user_id.to_string())
                .bind(tenant_id.to_string())
                .fetch_optional(&self.pool)
                .await?
            }
            None => sqlx::query("SELECT * FROM users WHERE id = ?1 AND deleted_at IS NULL")
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await?,
        };
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn get_user_by_email(&self, scope: TenantScope, email: &str) -> Result<Option<User>> {
        // First-match under the tenant filter: email alone is not a
        // tenant-qualified unique key.
        let row = match scope.tenant_id() {
            Some(tenant_id) => sqlx::query(
                "SELECT * FROM users WHERE email = ?1 AND tenant_id = ?2 AND deleted_at IS NULL LIMIT 1",
            )
            .bind(email)
            .bind(tenant_id.to_string())
            .fetch_optional(&self.pool)
            .await?,
            None => sqlx::query("SELECT * FROM users WHERE email = ?1 AND deleted_at IS NULL LIMIT 1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        };
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn list_users(&self, scope: TenantScope) -> Result<Vec<User>> {
        let rows = match scope.tenant_id() {
            Some(tenant_id) => sqlx::query(
                "SELECT * FROM users WHERE tenant_id = ?1 AND deleted_at IS NULL ORDER BY created_at",
            )
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await?,
            None => sqlx::query("SELECT * FROM users WHERE deleted_at IS NULL ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        };
        rows.iter().map(Self::row_to_user).collect()
    }

    async fn count_users(&self, scope: TenantScope) -> Result<i64> {
        let row = match scope.tenant_id() {
            Some(tenant_id) => sqlx::query(
                "SELECT COUNT(*) AS n FROM users WHERE tenant_id = ?1 AND deleted_at IS NULL",
            )
            .bind(tenant_id.to_string())
            .fetch_one(&self.pool)
            .await?,
            None => sqlx::query("SELECT COUNT(*) AS n FROM users WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?,
        };
        Ok(row.try_get("n")?)
    }

    async fn update_user_password(
        &self,
        scope: TenantScope,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<u64> {
        let result = match scope.tenant_id() {
            Some(tenant_id) => sqlx::query(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2 AND tenant_id = ?3 AND deleted_at IS NULL",
            )
            .bind(password_hash)
            .bind(user_id.to_string())
            .bind(tenant_id.to_string())
            .execute(&self.pool)
            .await?,
            None => sqlx::query(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            )
            .bind(password_hash)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?,
        };
        Ok(result.rows_affected())
    }

    async fn update_user_mfa(
        &self,
        scope: TenantScope,
        user_id: Uuid,
        mfa_enabled: bool,
        mfa_secret: Option<&str>,
    ) -> Result<u64> {
        let result = match scope.tenant_id() {
            Some(tenant_id) => sqlx::query(
                "UPDATE users SET mfa_enabled = ?1, mfa_secret = ?2 WHERE id = ?3 AND tenant_id = ?4 AND deleted_at IS NULL",
            )
            .bind(mfa_enabled)
            .bind(mfa_secret)
            .bind(user_id.to_string())
            .bind(tenant_id.to_string())
            .execute(&self.pool)
            .await?,
            None => sqlx::query(
                "UPDATE users SET mfa_enabled = ?1, mfa_secret = ?2 WHERE id = ?3 AND deleted_at IS NULL",
            )
            .bind(mfa_enabled)
            .bind(mfa_secret)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?,
        };
        Ok(result.rows_affected())
    }

    async fn update_last_active(&self, scope: TenantScope, user_id: Uuid) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        match scope.tenant_id() {
            Some(tenant_id) => {
                sqlx::query("UPDATE users SET last_active = ?1 WHERE id = ?2 AND tenant_id = ?3")
                    .bind(now)
                    .bind(user_id.to_string())
                    .bind(tenant_id.to_string())
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query("UPDATE users SET last_active = ?1 WHERE id = ?2")
                    .bind(now)
                    .bind(user_id.to_string())
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn find_login_candidates_by_email(&self, email: &str) -> Result<Vec<(User, Tenant)>> {
        let rows = sqlx::query(
            "SELECT * FROM users WHERE email = ?1 AND deleted_at IS NULL AND status != 'deleted'",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let user = Self::row_to_user(row)?;
            if let Some(tenant) = self.owning_tenant(&user).await? {
                candidates.push((user, tenant));
            }
        }
        Ok(candidates)
    }

    async fn find_login_candidates_by_account(
        &self,
        provider: AuthProviderKind,
        provider_account_id: &str,
    ) -> Result<Vec<(User, Tenant)>> {
        let rows = sqlx::query(
            "SELECT user_id FROM accounts WHERE provider = ?1 AND provider_account_id = ?2",
        )
        .bind(provider.as_str())
        .bind(provider_account_id)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let user_id: String = row.try_get("user_id")?;
            let user_id = Uuid::parse_str(&user_id).context("invalid user id in database")?;
            if let Some(user) = self.get_user_for_auth(user_id).await? {
                if let Some(tenant) = self.owning_tenant(&user).await? {
                    candidates.push((user, tenant));
                }
            }
        }
        Ok(candidates)
    }

    async fn get_user_for_auth(&self, user_id: Uuid) -> Result<Option<User>> {
        self.get_user(TenantScope::Unscoped, user_id).await
    }

    async fn create_account(&self, account: &Account) -> Result<()> {
        // INSERT OR IGNORE keeps bulk linking idempotent: an existing
        // (provider, provider_account_id) pair is skipped.
        sqlx::query(
            r"
            INSERT OR IGNORE INTO accounts (id, user_id, provider, provider_account_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(account.id.to_string())
        .bind(account.user_id.to_string())
        .bind(account.provider.as_str())
        .bind(&account.provider_account_id)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_account(
        &self,
        provider: AuthProviderKind,
        provider_account_id: &str,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT * FROM accounts WHERE provider = ?1 AND provider_account_id = ?2",
        )
        .bind(provider.as_str())
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_account).transpose()
    }

    async fn list_accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT * FROM accounts WHERE user_id = ?1 ORDER BY created_at")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_account).collect()
    }

    async fn create_password_reset_token(&self, token: &PasswordResetToken) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(token.id.to_string())
        .bind(token.user_id.to_string())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_password_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>> {
        let row = sqlx::query("SELECT * FROM password_reset_tokens WHERE token_hash = ?1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_reset_token).transpose()
    }

    async fn delete_password_reset_token(&self, token_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE id = ?1")
            .bind(token_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_password_reset_tokens_for_email(&self, email: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE user_id IN (SELECT id FROM users WHERE email = ?1)",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn record_audit_event(&self, event: &AuditEvent) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO audit_log (id, tenant_id, user_id, kind, detail, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(event.id.to_string())
        .bind(event.tenant_id.map(|id| id.to_string()))
        .bind(event.user_id.map(|id| id.to_string()))
        .bind(&event.kind)
        .bind(serde_json::to_string(&event.detail)?)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
