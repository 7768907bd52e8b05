// ABOUTME: Domain-grouped constants for the tenauth identity backend
// ABOUTME: TTLs, throttle limits, token audiences, and store key prefixes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Constants module
//!
//! Constants are grouped into logical domains rather than being spread
//! across call sites. Every time window the login protocol depends on
//! lives here so configuration and tests agree on the same numbers.

/// Time-to-live windows for ephemeral protocol state (seconds)
pub mod ttl {
    /// OAuth exchange codes bridge a provider redirect to a token response
    pub const OAUTH_CODE_SECS: u32 = 60;

    /// OAuth state handles round-trip context across the provider redirect
    pub const OAUTH_STATE_SECS: u32 = 600;

    /// Tenant-selection sessions parked between login and `select_tenant`
    pub const TENANT_SELECTION_SECS: u32 = 300;

    /// MFA challenge token lifetime
    pub const MFA_TOKEN_SECS: u32 = 300;

    /// Failed MFA attempts are counted within this rolling window
    pub const MFA_ATTEMPT_WINDOW_SECS: u32 = 300;

    /// Password reset tokens expire after this window
    pub const PASSWORD_RESET_SECS: u32 = 1800;
}

/// Hard limits enforced by the authentication flows
pub mod limits {
    /// Failed MFA verifications allowed before throttling kicks in
    pub const MFA_MAX_ATTEMPTS: u32 = 5;

    /// Default full-token lifetime (7 days)
    pub const DEFAULT_ACCESS_TOKEN_EXPIRY_HOURS: i64 = 168;

    /// Minimum accepted password length for registration and reset
    pub const MIN_PASSWORD_LENGTH: usize = 8;

    /// Default sweep interval for the in-memory ephemeral store
    pub const DEFAULT_STORE_CLEANUP_INTERVAL_SECS: u64 = 60;
}

/// Token audiences and service identifiers
pub mod service_names {
    /// Audience claim stamped into every token this service signs
    pub const TOKEN_AUDIENCE: &str = "tenauth";

    /// Issuer label used for TOTP enrollment URIs
    pub const TOTP_ISSUER: &str = "tenauth";
}

/// Audit event kinds recorded through the repository
pub mod audit_events {
    /// Successful login and token issuance
    pub const LOGIN_SUCCESS: &str = "login_success";

    /// A throttled MFA verification attempt
    pub const MFA_THROTTLED: &str = "mfa_throttled";

    /// All reset tokens for an email were invalidated across tenants
    pub const PASSWORD_MASS_RESET: &str = "password_mass_reset";

    /// New tenant created through password registration
    pub const TENANT_CREATED: &str = "tenant_created";
}

/// Key prefix applied to every ephemeral-store key
pub const STORE_KEY_PREFIX: &str = "tenauth:";
