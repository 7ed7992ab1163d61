//! Pi-hole v6 REST payloads

use serde::Deserialize;

/// `GET|POST /api/auth`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiAuthResponse {
    #[serde(default)]
    pub session: Session,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Session {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of every non-success response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiError,
    #[serde(default)]
    pub took: f64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub hint: Option<String>,
}

/// `GET /api/config/dns/{hosts,cnameRecords}`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiRecordsResponse {
    #[serde(default)]
    pub config: ConfigSection,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigSection {
    #[serde(default)]
    pub dns: DnsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DnsSection {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub cname_records: Vec<String>,
}
