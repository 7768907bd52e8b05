// ABOUTME: Outbound notification seam for password reset and security notices
// ABOUTME: The default implementation logs instead of sending real mail
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Outbound mail contract.
///
/// Login flows treat delivery as best-effort: a mailer failure is logged,
/// never surfaced to the caller, so response timing cannot reveal whether an
/// address exists.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a password reset link containing the raw one-time token.
    async fn send_password_reset(
        &self,
        email: &str,
        tenant_slug: &str,
        raw_token: &str,
    ) -> Result<()>;

    /// Notify a user that a security-relevant change happened on their
    /// account.
    async fn send_security_notice(&self, email: &str, message: &str) -> Result<()>;
}

/// Mailer that writes to the log. Used in development and tests; raw tokens
/// are never logged.
#[derive(Debug, Clone, Default)]
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send_password_reset(
        &self,
        email: &str,
        tenant_slug: &str,
        _raw_token: &str,
    ) -> Result<()> {
        info!(
            "Password reset requested for {} (tenant: {}); token withheld from logs",
            email, tenant_slug
        );
        Ok(())
    }

    async fn send_security_notice(&self, email: &str, message: &str) -> Result<()> {
        info!("Security notice for {}: {}", email, message);
        Ok(())
    }
}
