//! Configuration types for the DNS sync system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::domain_filter::DomainFilter;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsyncConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Names the provider manages
    #[serde(default)]
    pub domain_filter: DomainFilter,
}

impl DnsyncConfig {
    /// Create a configuration for a provider with an empty (match-all) filter
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            domain_filter: DomainFilter::default(),
        }
    }

    /// Set the domain filter
    pub fn with_domain_filter(mut self, domain_filter: DomainFilter) -> Self {
        self.domain_filter = domain_filter;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Pi-hole v6 provider
    Pihole {
        /// Base URL of the Pi-hole web server (e.g., "http://pi.hole")
        server: String,
        /// Admin password; empty when authentication is disabled
        #[serde(default)]
        password: String,
        /// Skip TLS certificate verification
        #[serde(default)]
        tls_insecure_skip_verify: bool,
        /// Log mutations instead of sending them
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Pihole {
                server,
                password,
                tls_insecure_skip_verify,
                dry_run,
            } => f
                .debug_struct("Pihole")
                .field("server", server)
                .field("password", &if password.is_empty() { "" } else { "<redacted>" })
                .field("tls_insecure_skip_verify", tls_insecure_skip_verify)
                .field("dry_run", dry_run)
                .finish(),
            ProviderConfig::Custom { factory, config } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", config)
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Pihole { server, .. } => {
                if server.trim().is_empty() {
                    return Err(crate::Error::config("no pihole server found"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Pihole { .. } => "pihole",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}
