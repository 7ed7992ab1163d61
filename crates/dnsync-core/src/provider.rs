//! Generic provider built from a [`RecordAdapter`]
//!
//! [`SyncProvider`] owns the parts every backend shares: the domain filter,
//! the merged listing and the reconciler. A backend only supplies the
//! adapter.

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::changes::Changes;
use crate::domain_filter::DomainFilter;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::reconcile::{ApplyReport, Reconciler};
use crate::traits::{DnsProvider, RecordAdapter};

/// A [`DnsProvider`] driving a single adapter
pub struct SyncProvider<A> {
    adapter: A,
    domain_filter: DomainFilter,
    reconciler: Reconciler,
}

impl<A: RecordAdapter> SyncProvider<A> {
    /// Wrap an adapter, scoped by `domain_filter`
    pub fn new(adapter: A, domain_filter: DomainFilter) -> Self {
        let reconciler = Reconciler::for_adapter(&adapter);
        Self {
            adapter,
            domain_filter,
            reconciler,
        }
    }

    /// The wrapped adapter
    pub fn adapter(&self) -> &A {
        &self.adapter
    }
}

#[async_trait]
impl<A: RecordAdapter> DnsProvider for SyncProvider<A> {
    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>> {
        let types = self.adapter.supported_types();
        let listings = try_join_all(
            types
                .iter()
                .map(|record_type| self.adapter.list_records(*record_type, cancel)),
        )
        .await?;

        let records: Vec<Endpoint> = listings
            .into_iter()
            .flatten()
            .filter(|endpoint| self.domain_filter.matches(&endpoint.dns_name))
            .collect();

        debug!(
            "Listed {} records across {} types from {}",
            records.len(),
            types.len(),
            self.adapter.adapter_name()
        );

        Ok(records)
    }

    async fn apply_changes(&self, changes: Changes, cancel: &CancellationToken) -> Result<ApplyReport> {
        let plan = self.reconciler.plan(changes, &self.domain_filter);
        let report = self.reconciler.execute(plan, &self.adapter, cancel).await?;

        info!(
            "Applied changes via {}: {} created, {} deleted, {} unchanged, {} skipped, {} unsupported",
            self.adapter.adapter_name(),
            report.created,
            report.deleted,
            report.unchanged,
            report.skipped,
            report.soft_errors.len()
        );

        Ok(report)
    }

    fn domain_filter(&self) -> &DomainFilter {
        &self.domain_filter
    }

    fn provider_name(&self) -> &'static str {
        self.adapter.adapter_name()
    }
}
