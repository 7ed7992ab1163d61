// # dnsync-core
//
// Core library for keeping a DNS backend in sync with a desired record set.
//
// ## Architecture Overview
//
// An external planner computes the difference between desired and observed
// records and hands it over as a [`Changes`] set. This library turns that
// set into backend calls:
// - **Endpoint**: Canonical, backend-neutral DNS record
// - **DomainFilter**: Decides which names this installation may touch
// - **Reconciler**: Orders, deduplicates, scopes and validates a change set
// - **RecordAdapter**: Trait for one backend's list/create/delete calls
// - **DnsProvider**: Trait for the synchronization unit the planner talks to
// - **ProviderRegistry**: Plugin-based registry for DNS providers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Reconciliation is separate from backend wire formats
// 2. **Stateless Passes**: Each apply is a fresh computation over its input
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library

pub mod changes;
pub mod config;
pub mod domain_filter;
pub mod endpoint;
pub mod error;
pub mod provider;
pub mod reconcile;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use changes::Changes;
pub use config::{DnsyncConfig, ProviderConfig};
pub use domain_filter::DomainFilter;
pub use endpoint::{Endpoint, EntryKey, RecordType};
pub use error::{Error, Result};
pub use provider::SyncProvider;
pub use reconcile::{ApplyPlan, ApplyReport, Reconciler};
pub use registry::ProviderRegistry;
pub use traits::{AdapterCapabilities, DnsProvider, DnsProviderFactory, RecordAdapter, TargetGrouping};
