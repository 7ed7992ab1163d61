//! Change sets handed to [`DnsProvider::apply_changes`](crate::traits::DnsProvider::apply_changes)

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;

/// Desired-versus-observed diff
///
/// `update_old[i]` and its replacement in `update_new` are paired by
/// [`EntryKey`](crate::endpoint::EntryKey), not by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Changes {
    /// Records to create
    #[serde(default)]
    pub create: Vec<Endpoint>,

    /// Prior state of records being replaced
    #[serde(default)]
    pub update_old: Vec<Endpoint>,

    /// Desired state of records being replaced
    #[serde(default)]
    pub update_new: Vec<Endpoint>,

    /// Records to remove
    #[serde(default)]
    pub delete: Vec<Endpoint>,
}

impl Changes {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to create
    pub fn with_create(mut self, endpoint: Endpoint) -> Self {
        self.create.push(endpoint);
        self
    }

    /// Add a record to delete
    pub fn with_delete(mut self, endpoint: Endpoint) -> Self {
        self.delete.push(endpoint);
        self
    }

    /// Add an old/new update pair
    pub fn with_update(mut self, old: Endpoint, new: Endpoint) -> Self {
        self.update_old.push(old);
        self.update_new.push(new);
        self
    }

    /// Whether there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::RecordType;

    #[test]
    fn test_changes_json_keys() {
        let json = r#"{
            "Create": [{"dnsName": "new.example.org", "recordType": "A", "targets": ["1.2.3.4"]}],
            "UpdateOld": [{"dnsName": "web.example.org", "recordType": "A", "targets": ["1.1.1.1"]}],
            "UpdateNew": [{"dnsName": "web.example.org", "recordType": "A", "targets": ["2.2.2.2"]}]
        }"#;

        let changes: Changes = serde_json::from_str(json).unwrap();
        assert_eq!(changes.create.len(), 1);
        assert_eq!(changes.update_old[0].targets, vec!["1.1.1.1".to_string()]);
        assert_eq!(changes.update_new[0].record_type, RecordType::A);
        assert!(changes.delete.is_empty());
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_changes_json_canonicalizes_names() {
        let json = r#"{
            "Create": [{"dnsName": "www.example.org.", "recordType": "A", "targets": ["1.2.3.4"]}],
            "Delete": [{"dnsName": "old.example.org.", "recordType": "CNAME", "targets": ["www.example.org"]}]
        }"#;

        let changes: Changes = serde_json::from_str(json).unwrap();
        assert_eq!(changes.create[0].dns_name, "www.example.org");
        assert_eq!(changes.delete[0].dns_name, "old.example.org");
    }

    #[test]
    fn test_builder_pairs_updates() {
        let changes = Changes::new().with_update(
            Endpoint::new("a.example.org", RecordType::A, ["1.2.3.4"]),
            Endpoint::new("a.example.org", RecordType::A, ["5.6.7.8"]),
        );
        assert_eq!(changes.update_old.len(), changes.update_new.len());
        assert_eq!(changes.update_old[0].key(), changes.update_new[0].key());
        assert!(Changes::new().is_empty());
    }
}
