// ABOUTME: Social login provider types and normalized external profiles
// ABOUTME: Provider callbacks hand the service an ExternalProfile, never raw provider JSON
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod state;

use crate::errors::AuthError;
use crate::models::AuthProviderKind;
use serde::{Deserialize, Serialize};

/// Supported social login providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Github,
}

impl SocialProvider {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }

    /// The persistence-layer provider kind for account links.
    #[must_use]
    pub const fn as_provider_kind(&self) -> AuthProviderKind {
        match self {
            Self::Google => AuthProviderKind::Google,
            Self::Github => AuthProviderKind::Github,
        }
    }
}

impl std::fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SocialProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(AuthError::AuthProviderNotConfigured(other.to_string())),
        }
    }
}

/// One email address reported by a provider, with its verification flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEmail {
    pub address: String,
    pub verified: bool,
    #[serde(default)]
    pub primary: bool,
}

/// Normalized identity payload returned by a provider after code exchange.
///
/// `external_id` is the provider's stable subject identifier; email addresses
/// can change and are never used as the link key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub provider: SocialProvider,
    pub external_id: String,
    pub emails: Vec<ProfileEmail>,
    pub display_name: Option<String>,
}

impl ExternalProfile {
    /// The primary verified email, falling back to the first verified one.
    /// Unverified addresses are never returned.
    #[must_use]
    pub fn primary_verified_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.verified && e.primary)
            .or_else(|| self.emails.iter().find(|e| e.verified))
            .map(|e| e.address.as_str())
    }
}
