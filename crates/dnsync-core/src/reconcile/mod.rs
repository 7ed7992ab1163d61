//! Change reconciler
//!
//! The reconciler is responsible for:
//! - Ordering a change set so deletes happen before creates
//! - Merging update targets for backends that address whole name+type groups
//! - Suppressing update pairs whose targets did not change
//! - Skipping records outside the domain filter
//! - Rejecting record shapes the backend cannot represent (soft errors)
//! - Driving the resulting calls through a [`RecordAdapter`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐         ┌──────────────┐         ┌───────────────┐
//! │   Changes   │──plan──▶│  ApplyPlan   │─execute▶│ RecordAdapter │
//! └─────────────┘         └──────────────┘         └───────────────┘
//!        │                        │
//!        ▼                        ▼
//! ┌─────────────┐         ┌──────────────┐
//! │DomainFilter │         │ ApplyReport  │
//! │  (scope)    │         │ (soft errors)│
//! └─────────────┘         └──────────────┘
//! ```
//!
//! ## Plan order
//!
//! 1. `Delete` entries
//! 2. `UpdateOld` entries whose replacement differs (delete old)
//! 3. `Create` entries
//! 4. Surviving `UpdateNew` entries (create new)
//!
//! Planning is pure; only [`Reconciler::execute`] talks to the backend.
//! The reconciler keeps no state between calls.

use std::collections::HashMap;
use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::changes::Changes;
use crate::domain_filter::DomainFilter;
use crate::endpoint::{Endpoint, EntryKey, RecordType};
use crate::error::{Error, Result};
use crate::traits::{AdapterCapabilities, RecordAdapter, TargetGrouping};

/// Backend operation for one plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Remove the record
    Delete,
    /// Add the record
    Create,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepAction::Delete => f.write_str("DELETE"),
            StepAction::Create => f.write_str("CREATE"),
        }
    }
}

/// One record-level operation in a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyStep {
    /// What to do
    pub action: StepAction,
    /// The record to do it to
    pub endpoint: Endpoint,
}

/// Why a record produced no step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The name is outside the domain filter
    OutOfScope,
    /// The record has no targets
    NoTargets,
    /// The backend does not store this record type
    UnsupportedType,
    /// An `UpdateOld` entry without a matching `UpdateNew`
    Unpaired,
}

/// A record that was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// The operation that would have been issued
    pub action: StepAction,
    /// The record
    pub endpoint: Endpoint,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// A per-record rejection that does not abort the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftError {
    /// The operation that was rejected
    pub action: StepAction,
    /// The rejected record
    pub endpoint: Endpoint,
    /// Human-readable reason
    pub message: String,
}

impl fmt::Display for SoftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {}",
            self.action, self.endpoint.dns_name, self.endpoint.record_type, self.message
        )
    }
}

/// Ordered, validated operations derived from a change set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    /// Steps in execution order
    pub steps: Vec<ApplyStep>,
    /// Update pairs suppressed because nothing changed
    pub unchanged: usize,
    /// Records that produced no step
    pub skipped: Vec<SkippedRecord>,
    /// Records rejected as unsupported
    pub soft_errors: Vec<SoftError>,
}

impl ApplyPlan {
    /// Whether executing this plan would issue no backend call
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcome of [`Reconciler::execute`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Physical create calls issued
    pub created: usize,
    /// Physical delete calls issued
    pub deleted: usize,
    /// Update pairs suppressed as no-ops
    pub unchanged: usize,
    /// Records skipped (out of scope, no targets, unsupported type, unpaired)
    pub skipped: usize,
    /// Records rejected as unsupported shapes
    pub soft_errors: Vec<SoftError>,
}

/// Turns change sets into ordered adapter calls
#[derive(Debug, Clone)]
pub struct Reconciler {
    capabilities: AdapterCapabilities,
    supported_types: Option<&'static [RecordType]>,
}

impl Reconciler {
    /// Create a reconciler for a backend with the given capabilities
    ///
    /// Every record type is considered supported.
    pub fn new(capabilities: AdapterCapabilities) -> Self {
        Self {
            capabilities,
            supported_types: None,
        }
    }

    /// Create a reconciler matching an adapter's capabilities and types
    pub fn for_adapter<A: RecordAdapter + ?Sized>(adapter: &A) -> Self {
        Self {
            capabilities: adapter.capabilities(),
            supported_types: Some(adapter.supported_types()),
        }
    }

    /// The capabilities this reconciler plans for
    pub fn capabilities(&self) -> AdapterCapabilities {
        self.capabilities
    }

    /// Compute the ordered steps for a change set
    pub fn plan(&self, changes: Changes, filter: &DomainFilter) -> ApplyPlan {
        let Changes {
            create,
            update_old,
            update_new,
            delete,
        } = changes;

        let mut plan = ApplyPlan::default();

        for endpoint in delete {
            self.push_step(&mut plan, StepAction::Delete, endpoint, filter);
        }

        let (order, mut merged) = self.merge_updates(update_new);

        for old in update_old {
            let key = old.key();
            let Some(new) = merged.get(&key) else {
                warn!(
                    "No UpdateNew entry for {} {}, leaving it untouched",
                    old.dns_name, old.record_type
                );
                plan.skipped.push(SkippedRecord {
                    action: StepAction::Delete,
                    endpoint: old,
                    reason: SkipReason::Unpaired,
                });
                continue;
            };

            if self.targets_equal(&old, new) {
                debug!("Unchanged {}, skipping update", old);
                merged.remove(&key);
                plan.unchanged += 1;
                continue;
            }

            self.push_step(&mut plan, StepAction::Delete, old, filter);
        }

        for endpoint in create {
            self.push_step(&mut plan, StepAction::Create, endpoint, filter);
        }

        for key in order {
            if let Some(endpoint) = merged.remove(&key) {
                self.push_step(&mut plan, StepAction::Create, endpoint, filter);
            }
        }

        plan
    }

    /// Issue the calls of a plan
    ///
    /// With `one_target_per_call`, every target of a step is attempted even
    /// if an earlier one failed; the first failure then aborts the rest of
    /// the plan.
    pub async fn execute<A: RecordAdapter + ?Sized>(
        &self,
        plan: ApplyPlan,
        adapter: &A,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport {
            unchanged: plan.unchanged,
            skipped: plan.skipped.len(),
            soft_errors: plan.soft_errors,
            ..Default::default()
        };

        for step in plan.steps {
            let calls: Vec<Endpoint> =
                if self.capabilities.one_target_per_call && step.endpoint.targets.len() > 1 {
                    step.endpoint
                        .targets
                        .iter()
                        .map(|target| step.endpoint.with_single_target(target))
                        .collect()
                } else {
                    vec![step.endpoint.clone()]
                };

            let mut first_error = None;
            for call in &calls {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                info!("{} {}", step.action, call);
                let result = match step.action {
                    StepAction::Delete => adapter.delete_record(call, cancel).await,
                    StepAction::Create => adapter.create_record(call, cancel).await,
                };

                match result {
                    Ok(()) => match step.action {
                        StepAction::Delete => report.deleted += 1,
                        StepAction::Create => report.created += 1,
                    },
                    Err(e) if e.is_soft() => {
                        warn!("{} {} rejected by {}: {}", step.action, call, adapter.adapter_name(), e);
                        report.soft_errors.push(SoftError {
                            action: step.action,
                            endpoint: call.clone(),
                            message: e.to_string(),
                        });
                    }
                    Err(e) => {
                        error!("{} {} failed: {}", step.action, call, e);
                        first_error.get_or_insert(e);
                    }
                }
            }

            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok(report)
    }

    /// Plan and execute in one call
    pub async fn apply<A: RecordAdapter + ?Sized>(
        &self,
        changes: Changes,
        filter: &DomainFilter,
        adapter: &A,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let plan = self.plan(changes, filter);
        self.execute(plan, adapter, cancel).await
    }

    fn merge_updates(&self, update_new: Vec<Endpoint>) -> (Vec<EntryKey>, HashMap<EntryKey, Endpoint>) {
        let mut order = Vec::new();
        let mut merged: HashMap<EntryKey, Endpoint> = HashMap::new();

        for endpoint in update_new {
            let key = endpoint.key();
            match merged.get_mut(&key) {
                Some(existing) => match self.capabilities.grouping {
                    TargetGrouping::PerKey => {
                        existing.targets.extend(endpoint.targets);
                        existing.targets = existing.target_set();
                    }
                    TargetGrouping::PerTarget => *existing = endpoint,
                },
                None => {
                    order.push(key.clone());
                    merged.insert(key, endpoint);
                }
            }
        }

        (order, merged)
    }

    fn targets_equal(&self, old: &Endpoint, new: &Endpoint) -> bool {
        match self.capabilities.grouping {
            TargetGrouping::PerKey => old.target_set() == new.target_set(),
            TargetGrouping::PerTarget => old.targets.first() == new.targets.first(),
        }
    }

    fn push_step(
        &self,
        plan: &mut ApplyPlan,
        action: StepAction,
        endpoint: Endpoint,
        filter: &DomainFilter,
    ) {
        let skip = if !filter.matches(&endpoint.dns_name) {
            debug!("Skipping {} {} that does not match domain filter", action, endpoint.dns_name);
            Some(SkipReason::OutOfScope)
        } else if self
            .supported_types
            .is_some_and(|types| !types.contains(&endpoint.record_type))
        {
            warn!("Skipping unsupported endpoint {} {}", action, endpoint);
            Some(SkipReason::UnsupportedType)
        } else if endpoint.targets.is_empty() {
            info!(
                "Skipping {} {} {}: missing targets",
                action, endpoint.dns_name, endpoint.record_type
            );
            Some(SkipReason::NoTargets)
        } else {
            None
        };

        if let Some(reason) = skip {
            plan.skipped.push(SkippedRecord {
                action,
                endpoint,
                reason,
            });
            return;
        }

        let rejection = if !self.capabilities.wildcard_names && endpoint.dns_name.contains('*') {
            Some("wildcard DNS names are not supported")
        } else if !endpoint.record_type.allows_multiple_targets() && endpoint.targets.len() > 1 {
            Some("record type cannot have multiple targets")
        } else {
            None
        };

        if let Some(message) = rejection {
            let soft = SoftError {
                action,
                endpoint,
                message: message.to_string(),
            };
            warn!("UNSUPPORTED: {}", soft);
            plan.soft_errors.push(soft);
            return;
        }

        plan.steps.push(ApplyStep { action, endpoint });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(name: &str, targets: &[&str]) -> Endpoint {
        Endpoint::new(name, RecordType::A, targets.iter().copied())
    }

    fn grouped() -> Reconciler {
        Reconciler::new(AdapterCapabilities {
            grouping: TargetGrouping::PerKey,
            one_target_per_call: true,
            wildcard_names: false,
        })
    }

    fn per_target() -> Reconciler {
        Reconciler::new(AdapterCapabilities {
            grouping: TargetGrouping::PerTarget,
            one_target_per_call: true,
            wildcard_names: false,
        })
    }

    fn actions(plan: &ApplyPlan) -> Vec<(StepAction, String, Vec<String>)> {
        plan.steps
            .iter()
            .map(|s| (s.action, s.endpoint.dns_name.clone(), s.endpoint.targets.clone()))
            .collect()
    }

    #[test]
    fn test_equal_update_pair_is_noop() {
        let changes = Changes::new().with_update(a("a.example.org", &["1.2.3.4"]), a("a.example.org", &["1.2.3.4"]));

        let plan = grouped().plan(changes, &DomainFilter::default());
        assert!(plan.is_noop());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn test_changed_update_deletes_old_before_creating_new() {
        let changes = Changes::new().with_update(a("a.example.org", &["1.2.3.4"]), a("a.example.org", &["5.6.7.8"]));

        let plan = grouped().plan(changes, &DomainFilter::default());
        assert_eq!(
            actions(&plan),
            vec![
                (StepAction::Delete, "a.example.org".to_string(), vec!["1.2.3.4".to_string()]),
                (StepAction::Create, "a.example.org".to_string(), vec!["5.6.7.8".to_string()]),
            ]
        );
    }

    #[test]
    fn test_plan_order_is_deletes_updates_creates() {
        let changes = Changes::new()
            .with_create(a("new.example.org", &["10.0.0.1"]))
            .with_delete(a("gone.example.org", &["10.0.0.2"]))
            .with_update(a("web.example.org", &["10.0.0.3"]), a("web.example.org", &["10.0.0.4"]));

        let plan = grouped().plan(changes, &DomainFilter::default());
        let names: Vec<(StepAction, String)> =
            plan.steps.iter().map(|s| (s.action, s.endpoint.dns_name.clone())).collect();
        assert_eq!(
            names,
            vec![
                (StepAction::Delete, "gone.example.org".to_string()),
                (StepAction::Delete, "web.example.org".to_string()),
                (StepAction::Create, "new.example.org".to_string()),
                (StepAction::Create, "web.example.org".to_string()),
            ]
        );
    }

    #[test]
    fn test_grouped_backend_merges_update_targets() {
        let mut changes = Changes::new();
        changes.update_old.push(a("multi.example.org", &["1.1.1.1", "2.2.2.2"]));
        changes.update_new.push(a("multi.example.org", &["3.3.3.3"]));
        changes.update_new.push(a("multi.example.org", &["2.2.2.2", "3.3.3.3"]));

        let plan = grouped().plan(changes, &DomainFilter::default());
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].action, StepAction::Create);
        assert_eq!(
            plan.steps[1].endpoint.targets,
            vec!["2.2.2.2".to_string(), "3.3.3.3".to_string()]
        );
    }

    #[test]
    fn test_grouped_backend_compares_target_sets() {
        let mut changes = Changes::new();
        changes.update_old.push(a("multi.example.org", &["2.2.2.2", "1.1.1.1"]));
        changes.update_new.push(a("multi.example.org", &["1.1.1.1"]));
        changes.update_new.push(a("multi.example.org", &["2.2.2.2"]));

        let plan = grouped().plan(changes, &DomainFilter::default());
        assert!(plan.is_noop());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn test_per_target_backend_compares_first_target_only() {
        let changes = Changes::new().with_update(
            a("a.example.org", &["1.2.3.4", "9.9.9.9"]),
            a("a.example.org", &["1.2.3.4", "8.8.8.8"]),
        );

        let plan = per_target().plan(changes, &DomainFilter::default());
        assert!(plan.is_noop());

        let changes = Changes::new().with_update(a("a.example.org", &["1.2.3.4"]), a("a.example.org", &["4.3.2.1"]));
        let plan = per_target().plan(changes, &DomainFilter::default());
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn test_per_target_backend_does_not_merge() {
        let mut changes = Changes::new();
        changes.update_old.push(a("a.example.org", &["1.1.1.1"]));
        changes.update_new.push(a("a.example.org", &["2.2.2.2"]));
        changes.update_new.push(a("a.example.org", &["3.3.3.3"]));

        let plan = per_target().plan(changes, &DomainFilter::default());
        let created: Vec<&ApplyStep> =
            plan.steps.iter().filter(|s| s.action == StepAction::Create).collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].endpoint.targets, vec!["3.3.3.3".to_string()]);
    }

    #[test]
    fn test_update_key_is_case_insensitive() {
        let changes = Changes::new().with_update(a("A.Example.org.", &["1.2.3.4"]), a("a.example.org", &["1.2.3.4"]));
        assert!(grouped().plan(changes, &DomainFilter::default()).is_noop());
    }

    #[test]
    fn test_update_key_folds_idna_encoding() {
        let changes = Changes::new().with_update(
            a("xn--c1yn36f.example.org", &["1.2.3.4"]),
            a("點看.example.org", &["1.2.3.4"]),
        );

        let plan = grouped().plan(changes, &DomainFilter::default());
        assert!(plan.is_noop());
        assert_eq!(plan.unchanged, 1);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_out_of_scope_records_are_skipped() {
        let filter = DomainFilter::new(["example.org"]);
        let changes = Changes::new()
            .with_create(a("www.example.com", &["1.2.3.4"]))
            .with_delete(a("old.example.net", &["1.2.3.4"]));

        let plan = grouped().plan(changes, &filter);
        assert!(plan.is_noop());
        assert!(plan.soft_errors.is_empty());
        assert_eq!(plan.skipped.len(), 2);
        assert!(plan.skipped.iter().all(|s| s.reason == SkipReason::OutOfScope));
    }

    #[test]
    fn test_multi_target_cname_is_soft_error() {
        let changes = Changes::new()
            .with_create(Endpoint::new("alias.example.org", RecordType::Cname, ["a.example.org", "b.example.org"]))
            .with_create(a("www.example.org", &["1.2.3.4"]));

        let plan = grouped().plan(changes, &DomainFilter::default());
        assert_eq!(plan.soft_errors.len(), 1);
        assert_eq!(plan.soft_errors[0].endpoint.dns_name, "alias.example.org");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].endpoint.dns_name, "www.example.org");
    }

    #[test]
    fn test_wildcard_depends_on_capabilities() {
        let wildcard = || Changes::new().with_create(a("*.example.org", &["1.2.3.4"]));

        let plan = grouped().plan(wildcard(), &DomainFilter::default());
        assert_eq!(plan.soft_errors.len(), 1);
        assert!(plan.steps.is_empty());

        let permissive = Reconciler::new(AdapterCapabilities::default());
        let plan = permissive.plan(wildcard(), &DomainFilter::default());
        assert!(plan.soft_errors.is_empty());
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn test_empty_targets_are_skipped_not_deleted() {
        let changes = Changes::new()
            .with_delete(a("empty.example.org", &[]))
            .with_create(a("empty2.example.org", &[]));

        let plan = grouped().plan(changes, &DomainFilter::default());
        assert!(plan.is_noop());
        assert!(plan.skipped.iter().all(|s| s.reason == SkipReason::NoTargets));
    }

    #[test]
    fn test_unpaired_update_old_is_left_alone() {
        let mut changes = Changes::new();
        changes.update_old.push(a("orphan.example.org", &["1.2.3.4"]));

        let plan = grouped().plan(changes, &DomainFilter::default());
        assert!(plan.is_noop());
        assert_eq!(plan.skipped[0].reason, SkipReason::Unpaired);
    }
}
