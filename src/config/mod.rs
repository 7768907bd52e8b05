// ABOUTME: Configuration module for deployment-specific settings
// ABOUTME: Environment variable loading lives in the environment submodule
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod environment;

pub use environment::{AuthConfig, ProviderCredentials, ServerConfig, SocialProviderConfig};
