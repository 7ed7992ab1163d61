//! Shared fixtures for Pi-hole HTTP contract tests

#![allow(dead_code)]

use dnsync_core::{DnsyncConfig, DomainFilter, ProviderConfig};
use dnsync_provider_pihole::PiholeProvider;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const HOSTS_PATH: &str = "/api/config/dns/hosts";
pub const CNAME_PATH: &str = "/api/config/dns/cnameRecords";
pub const AUTH_PATH: &str = "/api/auth";
pub const PASSWORD: &str = "correct horse";

/// Body of a successful login or introspection
pub fn session(valid: bool, sid: &str) -> Value {
    json!({
        "session": {
            "valid": valid,
            "totp": false,
            "sid": sid,
            "csrf": "csrf-token",
            "validity": 1800,
            "message": if valid { "password correct" } else { "session invalid" }
        },
        "took": 0.01
    })
}

/// Pi-hole error envelope
pub fn error_body(key: &str, message: &str) -> Value {
    json!({
        "error": { "key": key, "message": message, "hint": null },
        "took": 0.002
    })
}

pub fn unauthorized() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(error_body("unauthorized", "Unauthorized"))
}

/// Records listing body
pub fn records(hosts: &[&str], cname_records: &[&str]) -> Value {
    json!({
        "config": { "dns": { "hosts": hosts, "cnameRecords": cname_records } },
        "took": 0.004
    })
}

/// Answer `times` logins with `sid`, at the given priority
pub async fn mount_login(server: &MockServer, sid: &str, times: u64, priority: u8) {
    Mock::given(method("POST"))
        .and(path(AUTH_PATH))
        .and(body_json(json!({ "password": PASSWORD })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session(true, sid)))
        .up_to_n_times(times)
        .with_priority(priority)
        .mount(server)
        .await;
}

pub fn config(server: &MockServer, password: &str, dry_run: bool, filter: DomainFilter) -> DnsyncConfig {
    DnsyncConfig::new(ProviderConfig::Pihole {
        server: server.uri(),
        password: password.to_string(),
        tls_insecure_skip_verify: false,
        dry_run,
    })
    .with_domain_filter(filter)
}

/// Provider without authentication
pub async fn open_provider(server: &MockServer) -> PiholeProvider {
    dnsync_provider_pihole::connect(
        &config(server, "", false, DomainFilter::default()),
        &CancellationToken::new(),
    )
    .await
    .expect("provider connects")
}

/// Provider that logs in with [`PASSWORD`]
pub async fn authenticated_provider(server: &MockServer) -> PiholeProvider {
    dnsync_provider_pihole::connect(
        &config(server, PASSWORD, false, DomainFilter::default()),
        &CancellationToken::new(),
    )
    .await
    .expect("provider connects")
}
