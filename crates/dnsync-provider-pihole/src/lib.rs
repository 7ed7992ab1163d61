// # Pi-hole DNS Provider
//
// This crate provides a Pi-hole (v6 REST API) provider for the dnsync system.
//
// ## Layout
//
// - `client`: authenticated HTTP access with session renewal
// - `adapter`: local DNS records (hosts, CNAME) as a `RecordAdapter`
// - the provider itself is `dnsync_core::SyncProvider<PiholeAdapter>`, so
//   ordering, scoping and validation come from the core reconciler
//
// ## Backend Constraints
//
// - One target per stored line: multi-target records become one call per target
// - No wildcard names
// - CNAME records carry exactly one target
// - A/AAAA share one list and are told apart by IP family
//
// ## Security Requirements
//
// - Password and session id NEVER appear in logs
// - Provider MUST fail fast if the server URL is empty
//
// ## API Reference
//
// - Auth: POST/GET `/api/auth`
// - Hosts: GET `/api/config/dns/hosts`, PUT/DELETE `/api/config/dns/hosts/{ip name}`
// - CNAME: GET `/api/config/dns/cnameRecords`, PUT/DELETE `/api/config/dns/cnameRecords/{name,target[,ttl]}`

mod api;
pub mod adapter;
pub mod client;

use async_trait::async_trait;
use dnsync_core::config::{DnsyncConfig, ProviderConfig};
use dnsync_core::traits::{DnsProvider, DnsProviderFactory};
use dnsync_core::{Error, ProviderRegistry, Result, SyncProvider};
use tokio_util::sync::CancellationToken;

pub use adapter::PiholeAdapter;
pub use client::{ClientConfig, SessionClient, MAX_TOKEN_RENEWALS};

/// Pi-hole provider: the generic sync provider over [`PiholeAdapter`]
pub type PiholeProvider = SyncProvider<PiholeAdapter>;

/// Connect to Pi-hole and build a provider from configuration
pub async fn connect(config: &DnsyncConfig, cancel: &CancellationToken) -> Result<PiholeProvider> {
    match &config.provider {
        ProviderConfig::Pihole {
            server,
            password,
            tls_insecure_skip_verify,
            dry_run,
        } => {
            let client = SessionClient::connect(
                ClientConfig {
                    server: server.clone(),
                    password: password.clone(),
                    tls_insecure_skip_verify: *tls_insecure_skip_verify,
                },
                cancel,
            )
            .await?;

            tracing::info!(
                "Connected to Pi-hole at {} [mode: {}]",
                client.server(),
                if *dry_run { "DRY-RUN" } else { "LIVE" }
            );

            Ok(SyncProvider::new(
                PiholeAdapter::new(client, *dry_run),
                config.domain_filter.clone(),
            ))
        }
        _ => Err(Error::config("Invalid config for Pi-hole provider")),
    }
}

/// Factory for creating Pi-hole providers
pub struct PiholeFactory;

#[async_trait]
impl DnsProviderFactory for PiholeFactory {
    async fn create(
        &self,
        config: &DnsyncConfig,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn DnsProvider>> {
        let provider = connect(config, cancel).await?;
        Ok(Box::new(provider))
    }
}

/// Register the Pi-hole provider with a registry
///
/// # Example
///
/// ```rust
/// use dnsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dnsync_provider_pihole::register(&registry);
/// assert!(registry.has_provider("pihole"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("pihole", Box::new(PiholeFactory));
}
