//! Test doubles and common utilities for reconciliation contract tests
//!
//! The mock adapter records every backend call in order so tests can
//! assert on exactly what reached the backend.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dnsync_core::error::{Error, Result};
use dnsync_core::traits::{AdapterCapabilities, RecordAdapter, TargetGrouping};
use dnsync_core::{Endpoint, RecordType};
use tokio_util::sync::CancellationToken;

/// One observed backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(RecordType),
    Create(String, RecordType, Vec<String>),
    Delete(String, RecordType, Vec<String>),
}

impl Call {
    pub fn create(name: &str, record_type: RecordType, targets: &[&str]) -> Self {
        Call::Create(name.to_string(), record_type, targets.iter().map(|t| t.to_string()).collect())
    }

    pub fn delete(name: &str, record_type: RecordType, targets: &[&str]) -> Self {
        Call::Delete(name.to_string(), record_type, targets.iter().map(|t| t.to_string()).collect())
    }
}

const MOCK_TYPES: &[RecordType] = &[RecordType::A, RecordType::Aaaa, RecordType::Cname];

/// A RecordAdapter that tracks calls and can be told to fail
#[derive(Clone)]
pub struct MockAdapter {
    capabilities: AdapterCapabilities,
    records: Arc<Mutex<Vec<Endpoint>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    failing_targets: Arc<Mutex<Vec<String>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockAdapter {
    /// Adapter for a backend that keeps one target per record
    pub fn per_target() -> Self {
        Self::with_capabilities(AdapterCapabilities {
            grouping: TargetGrouping::PerTarget,
            one_target_per_call: true,
            wildcard_names: false,
        })
    }

    /// Adapter for a backend that stores whole name+type groups
    pub fn grouped() -> Self {
        Self::with_capabilities(AdapterCapabilities::default())
    }

    pub fn with_capabilities(capabilities: AdapterCapabilities) -> Self {
        Self {
            capabilities,
            records: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failing_targets: Arc::new(Mutex::new(Vec::new())),
            cancel_after: None,
        }
    }

    /// Seed the records returned by list_records
    pub fn with_records(self, records: Vec<Endpoint>) -> Self {
        *self.records.lock().unwrap() = records;
        self
    }

    /// Any mutation carrying this target fails with a backend error
    pub fn fail_on_target(self, target: &str) -> Self {
        self.failing_targets.lock().unwrap().push(target.to_string());
        self
    }

    /// Cancel `token` once `calls` mutations have been issued
    pub fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::List(_)))
            .collect()
    }

    fn mutate(&self, call: Call, endpoint: &Endpoint) -> Result<()> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.iter().filter(|c| !matches!(c, Call::List(_))).count()
        };

        if let Some((limit, token)) = &self.cancel_after {
            if count >= *limit {
                token.cancel();
            }
        }

        let failing = self.failing_targets.lock().unwrap();
        if endpoint.targets.iter().any(|t| failing.contains(t)) {
            return Err(Error::Backend {
                status: 400,
                key: "bad_request".to_string(),
                message: format!("rejected {}", endpoint.dns_name),
                hint: String::new(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordAdapter for MockAdapter {
    fn adapter_name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        self.capabilities
    }

    fn supported_types(&self) -> &'static [RecordType] {
        MOCK_TYPES
    }

    async fn list_records(
        &self,
        record_type: RecordType,
        cancel: &CancellationToken,
    ) -> Result<Vec<Endpoint>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.calls.lock().unwrap().push(Call::List(record_type));
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.record_type == record_type)
            .cloned()
            .collect())
    }

    async fn create_record(&self, endpoint: &Endpoint, _cancel: &CancellationToken) -> Result<()> {
        let call = Call::Create(endpoint.dns_name.clone(), endpoint.record_type, endpoint.targets.clone());
        self.mutate(call, endpoint)
    }

    async fn delete_record(&self, endpoint: &Endpoint, _cancel: &CancellationToken) -> Result<()> {
        let call = Call::Delete(endpoint.dns_name.clone(), endpoint.record_type, endpoint.targets.clone());
        self.mutate(call, endpoint)
    }
}

/// Shorthand for an A record
pub fn a(name: &str, targets: &[&str]) -> Endpoint {
    Endpoint::new(name, RecordType::A, targets.iter().copied())
}

/// Shorthand for a CNAME record
pub fn cname(name: &str, target: &str) -> Endpoint {
    Endpoint::new(name, RecordType::Cname, [target])
}
