//! Core traits for dnsync
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Public synchronization unit (`records` / `apply_changes`)
//! - [`RecordAdapter`]: Backend-specific record translation used by the reconciler

pub mod dns_provider;
pub mod record_adapter;

pub use dns_provider::{DnsProvider, DnsProviderFactory};
pub use record_adapter::{AdapterCapabilities, RecordAdapter, TargetGrouping};
