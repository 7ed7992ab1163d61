// # DNS Provider Trait
//
// Defines the synchronization unit an external planner talks to.
//
// ## Implementations
//
// - Generic: `dnsync_core::provider::SyncProvider<A: RecordAdapter>`
// - Pi-hole: `dnsync-provider-pihole` crate (an adapter plugged into `SyncProvider`)
//
// ## Usage
//
// ```rust,ignore
// use dnsync_core::{Changes, DnsProvider};
// use tokio_util::sync::CancellationToken;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//     let cancel = CancellationToken::new();
//
//     let current = provider.records(&cancel).await?;
//     let changes = /* planner diff against `current` */;
//     let report = provider.apply_changes(changes, &cancel).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::changes::Changes;
use crate::config::DnsyncConfig;
use crate::domain_filter::DomainFilter;
use crate::endpoint::Endpoint;
use crate::reconcile::ApplyReport;

/// Trait for DNS provider implementations
///
/// A provider exposes the observed record set and applies change sets
/// against it. Both calls are scoped by the provider's [`DomainFilter`].
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
/// Concurrent passes against one provider are allowed; any shared state
/// (such as a session token) must be synchronized by the implementation.
///
/// # Cancellation
///
/// Every call takes a [`CancellationToken`]. Implementations abort in-flight
/// requests and return [`Error::Cancelled`](crate::Error::Cancelled) once it
/// fires, and never leave background work running after returning.
///
/// # Statelessness
///
/// Nothing is carried between `apply_changes` calls: each invocation is a
/// fresh computation over its input plus live backend reads.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Current observed records, restricted to the domain filter
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Endpoint>)`: Observed records
    /// - `Err(Error)`: If any listing call failed
    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, crate::Error>;

    /// Apply a change set
    ///
    /// Deletes run first, unchanged update pairs are suppressed, and
    /// out-of-scope records are skipped silently. Unsupported record
    /// shapes are reported as soft errors in the returned report.
    ///
    /// # Returns
    ///
    /// - `Ok(ApplyReport)`: Every in-scope, valid record was applied
    /// - `Err(Error)`: The first hard error; remaining steps were not run
    async fn apply_changes(
        &self,
        changes: Changes,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport, crate::Error>;

    /// The filter scoping this provider
    fn domain_filter(&self) -> &DomainFilter;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
///
/// Construction may talk to the backend (for example to open a session),
/// so it is async.
#[async_trait]
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// Any backend call made during construction honors `cancel`.
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object, or a configuration error
    async fn create(
        &self,
        config: &DnsyncConfig,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
