//! Pi-hole local DNS records as a [`RecordAdapter`]
//!
//! Pi-hole stores local records as plain text lines:
//!
//! - `/api/config/dns/hosts`: `"<ip> <name>"` (A and AAAA share the list)
//! - `/api/config/dns/cnameRecords`: `"<name>,<target>[,<ttl>]"`
//!
//! Each line is one target, so every mutation carries exactly one target
//! and is addressed by its percent-encoded line.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use dnsync_core::traits::{AdapterCapabilities, RecordAdapter, TargetGrouping};
use dnsync_core::{Endpoint, Error, RecordType, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ApiRecordsResponse;
use crate::client::SessionClient;

const API_CONFIG_DNS: &str = "/api/config/dns";

const SUPPORTED_TYPES: &[RecordType] = &[RecordType::A, RecordType::Aaaa, RecordType::Cname];

/// Record adapter for the Pi-hole v6 API
#[derive(Debug)]
pub struct PiholeAdapter {
    client: SessionClient,
    dry_run: bool,
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Create,
    Delete,
}

impl Mutation {
    fn verb(self) -> &'static str {
        match self {
            Mutation::Create => "PUT",
            Mutation::Delete => "DELETE",
        }
    }
}

impl PiholeAdapter {
    /// Wrap a connected session client
    pub fn new(client: SessionClient, dry_run: bool) -> Self {
        if dry_run {
            warn!("Pi-hole adapter running in DRY-RUN mode - no changes will be made");
        }
        Self { client, dry_run }
    }

    /// Whether mutations are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// The underlying session client
    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    fn list_url(&self, record_type: RecordType) -> Result<String> {
        match record_type {
            RecordType::A | RecordType::Aaaa => Ok(self.client.url(&format!("{}/hosts", API_CONFIG_DNS))),
            RecordType::Cname => Ok(self.client.url(&format!("{}/cnameRecords", API_CONFIG_DNS))),
            other => Err(Error::invalid_input(format!("unsupported record type: {}", other))),
        }
    }

    async fn mutate(
        &self,
        mutation: Mutation,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let list_url = self.list_url(endpoint.record_type)?;

        for target in &endpoint.targets {
            if self.dry_run {
                info!(
                    "DRY RUN: {} {} IN {} -> {}",
                    mutation.verb(),
                    endpoint.dns_name,
                    endpoint.record_type,
                    target
                );
                continue;
            }

            let url = format!(
                "{}/{}",
                list_url,
                urlencoding::encode(&record_line(endpoint, target))
            );
            debug!("{} {}", mutation.verb(), url);

            match mutation {
                Mutation::Create => self.client.put(&url, cancel).await?,
                Mutation::Delete => self.client.delete(&url, cancel).await?,
            };
        }

        Ok(())
    }
}

#[async_trait]
impl RecordAdapter for PiholeAdapter {
    fn adapter_name(&self) -> &'static str {
        "pihole"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            grouping: TargetGrouping::PerKey,
            one_target_per_call: true,
            wildcard_names: false,
        }
    }

    fn supported_types(&self) -> &'static [RecordType] {
        SUPPORTED_TYPES
    }

    async fn list_records(
        &self,
        record_type: RecordType,
        cancel: &CancellationToken,
    ) -> Result<Vec<Endpoint>> {
        let url = self.list_url(record_type)?;
        debug!("Listing {} records from {}", record_type, url);

        let body = self.client.get(&url, cancel).await?;
        let response: ApiRecordsResponse = serde_json::from_slice(&body)?;

        let lines = match record_type {
            RecordType::Cname => response.config.dns.cname_records,
            _ => response.config.dns.hosts,
        };

        Ok(parse_records(record_type, &lines))
    }

    async fn create_record(&self, endpoint: &Endpoint, cancel: &CancellationToken) -> Result<()> {
        self.mutate(Mutation::Create, endpoint, cancel).await
    }

    async fn delete_record(&self, endpoint: &Endpoint, cancel: &CancellationToken) -> Result<()> {
        self.mutate(Mutation::Delete, endpoint, cancel).await
    }
}

/// The stored text line for one target of `endpoint`
fn record_line(endpoint: &Endpoint, target: &str) -> String {
    match (endpoint.record_type, endpoint.ttl) {
        (RecordType::Cname, Some(ttl)) if endpoint.ttl_configured() => {
            format!("{},{},{}", endpoint.dns_name, target, ttl)
        }
        (RecordType::Cname, _) => format!("{},{}", endpoint.dns_name, target),
        _ => format!("{} {}", target, endpoint.dns_name),
    }
}

/// Parse Pi-hole record lines of one type
///
/// Lines sharing a name are merged into one endpoint, in first-seen order.
pub(crate) fn parse_records(record_type: RecordType, lines: &[String]) -> Vec<Endpoint> {
    let mut records: Vec<Endpoint> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in lines {
        let fields: Vec<&str> = line
            .split([' ', ','])
            .filter(|field| !field.is_empty())
            .collect();

        if fields.len() < 2 {
            warn!("skipping record {}: invalid format received from PiHole", line);
            continue;
        }

        let (name, target, ttl) = match record_type {
            RecordType::Cname => {
                let ttl = fields.get(2).and_then(|raw| match raw.parse::<u32>() {
                    Ok(ttl) => Some(ttl),
                    Err(e) => {
                        warn!("failed to parse TTL value received from PiHole '{}': {}; ignoring it", raw, e);
                        None
                    }
                });
                (fields[0], fields[1], ttl)
            }
            _ => {
                let keep = match fields[0].parse::<IpAddr>() {
                    Ok(IpAddr::V4(_)) => record_type == RecordType::A,
                    Ok(IpAddr::V6(_)) => record_type == RecordType::Aaaa,
                    Err(_) => false,
                };
                if !keep {
                    continue;
                }
                (fields[1], fields[0], None)
            }
        };

        let mut endpoint = Endpoint::new(name, record_type, [target]);
        if let Some(ttl) = ttl {
            endpoint = endpoint.with_ttl(ttl);
        }

        match index.get(&endpoint.dns_name) {
            Some(&position) => records[position].targets.push(target.to_string()),
            None => {
                index.insert(endpoint.dns_name.clone(), records.len());
                records.push(endpoint);
            }
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_hosts_are_split_by_ip_family() {
        let hosts = lines(&[
            "192.168.178.33 service1.example.com",
            "fc00::1:192:168:1:1 service1.example.com",
            "192.168.178.34 service2.example.com",
        ]);

        let a = parse_records(RecordType::A, &hosts);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].dns_name, "service1.example.com");
        assert_eq!(a[0].targets, vec!["192.168.178.33".to_string()]);

        let aaaa = parse_records(RecordType::Aaaa, &hosts);
        assert_eq!(aaaa.len(), 1);
        assert_eq!(aaaa[0].targets, vec!["fc00::1:192:168:1:1".to_string()]);
    }

    #[test]
    fn test_same_name_lines_are_merged() {
        let hosts = lines(&[
            "10.0.0.1 multi.example.com",
            "10.0.0.2 other.example.com",
            "10.0.0.3 multi.example.com",
        ]);

        let records = parse_records(RecordType::A, &hosts);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dns_name, "multi.example.com");
        assert_eq!(records[0].targets, vec!["10.0.0.1".to_string(), "10.0.0.3".to_string()]);
    }

    #[test]
    fn test_cname_lines_with_and_without_ttl() {
        let cnames = lines(&[
            "source1.example.com,target1.domain.com",
            "source2.example.com,target2.domain.com,300",
            "source3.example.com,target3.domain.com,soon",
        ]);

        let records = parse_records(RecordType::Cname, &cnames);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].ttl, None);
        assert_eq!(records[1].ttl, Some(300));
        assert_eq!(records[1].targets, vec!["target2.domain.com".to_string()]);
        assert_eq!(records[2].ttl, None);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let hosts = lines(&["", "10.0.0.1", "not-an-ip host.example.com", "10.0.0.2 ok.example.com"]);

        let records = parse_records(RecordType::A, &hosts);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dns_name, "ok.example.com");
    }

    #[test]
    fn test_record_lines() {
        let a = Endpoint::new("www.example.com", RecordType::A, ["1.2.3.4"]);
        assert_eq!(record_line(&a, "1.2.3.4"), "1.2.3.4 www.example.com");

        let cname = Endpoint::new("alias.example.com", RecordType::Cname, ["www.example.com"]);
        assert_eq!(record_line(&cname, "www.example.com"), "alias.example.com,www.example.com");

        let cname = cname.with_ttl(600);
        assert_eq!(
            record_line(&cname, "www.example.com"),
            "alias.example.com,www.example.com,600"
        );
    }
}
