//! Canonical DNS record model
//!
//! An [`Endpoint`] is the backend-neutral shape every provider translates
//! to and from. Records are correlated across change lists by [`EntryKey`].

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain_filter::normalize_domain;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
    /// Canonical name
    #[serde(rename = "CNAME")]
    Cname,
    /// Text record
    #[serde(rename = "TXT")]
    Txt,
    /// Service locator
    #[serde(rename = "SRV")]
    Srv,
    /// Name server
    #[serde(rename = "NS")]
    Ns,
    /// Mail exchange
    #[serde(rename = "MX")]
    Mx,
    /// Reverse pointer
    #[serde(rename = "PTR")]
    Ptr,
}

impl RecordType {
    /// The record type mnemonic as it appears in zone files
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Srv => "SRV",
            RecordType::Ns => "NS",
            RecordType::Mx => "MX",
            RecordType::Ptr => "PTR",
        }
    }

    /// Whether a record of this type may carry more than one target
    pub fn allows_multiple_targets(&self) -> bool {
        !matches!(self, RecordType::Cname)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "CNAME" => Ok(RecordType::Cname),
            "TXT" => Ok(RecordType::Txt),
            "SRV" => Ok(RecordType::Srv),
            "NS" => Ok(RecordType::Ns),
            "MX" => Ok(RecordType::Mx),
            "PTR" => Ok(RecordType::Ptr),
            other => Err(crate::Error::invalid_input(format!(
                "unsupported record type: {}",
                other
            ))),
        }
    }
}

/// A canonical DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Fully-qualified name without the trailing dot
    #[serde(deserialize_with = "deserialize_dns_name")]
    pub dns_name: String,

    /// Record type
    pub record_type: RecordType,

    /// Time-to-live in seconds; `None` means the backend default
    #[serde(default, rename = "recordTTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    /// Record targets, in order
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Endpoint {
    /// Create an endpoint without an explicit TTL
    pub fn new<I, S>(dns_name: impl AsRef<str>, record_type: RecordType, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dns_name: strip_root(dns_name.as_ref()),
            record_type,
            ttl: None,
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The key used to correlate this record across change lists
    pub fn key(&self) -> EntryKey {
        EntryKey::new(&self.dns_name, self.record_type)
    }

    /// Whether the TTL was set explicitly (zero counts as unset)
    pub fn ttl_configured(&self) -> bool {
        self.ttl.is_some_and(|ttl| ttl > 0)
    }

    /// Copy of this record carrying a single target
    pub fn with_single_target(&self, target: &str) -> Self {
        Self {
            dns_name: self.dns_name.clone(),
            record_type: self.record_type,
            ttl: self.ttl,
            targets: vec![target.to_string()],
        }
    }

    /// Targets as a sorted, de-duplicated list
    pub fn target_set(&self) -> Vec<String> {
        let mut targets = self.targets.clone();
        targets.sort();
        targets.dedup();
        targets
    }
}

fn strip_root(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_string()
}

fn deserialize_dns_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(strip_root(&name))
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} IN {} -> [{}]",
            self.dns_name,
            self.record_type,
            self.targets.join(", ")
        )
    }
}

/// `(name, type)` pair used to de-duplicate and correlate records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    /// Normalized DNS name, see [`normalize_domain`]
    pub dns_name: String,
    /// Record type
    pub record_type: RecordType,
}

impl EntryKey {
    /// Build a key, folding case, IDNA encoding and the trailing dot
    pub fn new(dns_name: &str, record_type: RecordType) -> Self {
        Self {
            dns_name: normalize_domain(dns_name),
            record_type,
        }
    }
}
