// # Record Adapter Trait
//
// Translation layer between canonical endpoints and one backend's native
// record shape. Adapters are deliberately thin: they list, create and
// delete exactly what they are given. Ordering, no-op suppression, domain
// scoping and shape validation are owned by the reconciler, which learns
// what the backend can express from [`AdapterCapabilities`].

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{Endpoint, RecordType};

/// How a backend addresses multiple targets of one name+type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetGrouping {
    /// The backend treats the whole `(name, type)` group as one record;
    /// update targets sharing a key are merged before applying
    PerKey,
    /// The backend keeps one target per record; update targets are not
    /// merged and only the first target is compared
    PerTarget,
}

/// What the backend can represent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterCapabilities {
    /// Update merge strategy
    pub grouping: TargetGrouping,
    /// Each physical call carries a single target
    pub one_target_per_call: bool,
    /// Names containing `*` can be stored
    pub wildcard_names: bool,
}

impl Default for AdapterCapabilities {
    fn default() -> Self {
        Self {
            grouping: TargetGrouping::PerKey,
            one_target_per_call: false,
            wildcard_names: true,
        }
    }
}

/// Backend-specific record operations
///
/// # Contract
///
/// - `create_record` treats "already exists" as success
/// - `delete_record` treats "not found" as success
/// - neither retries on its own beyond session renewal
/// - when `one_target_per_call` is set, the reconciler only ever passes
///   single-target endpoints
#[async_trait]
pub trait RecordAdapter: Send + Sync {
    /// Adapter name used in logs and errors
    fn adapter_name(&self) -> &'static str;

    /// Backend capabilities consulted by the reconciler
    fn capabilities(&self) -> AdapterCapabilities;

    /// Record types the backend can list and store, in listing order
    fn supported_types(&self) -> &'static [RecordType];

    /// List all records of one type
    async fn list_records(
        &self,
        record_type: RecordType,
        cancel: &CancellationToken,
    ) -> Result<Vec<Endpoint>, crate::Error>;

    /// Create a record
    async fn create_record(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<(), crate::Error>;

    /// Delete a record
    async fn delete_record(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<(), crate::Error>;
}
