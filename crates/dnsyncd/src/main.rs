// # dnsyncd - DNS Sync Daemon
//
// This is a thin integration layer: all reconciliation logic lives in
// dnsync-core and the provider crates.
//
// The dnsyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers
// 4. Running one reconciliation pass
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### DNS Provider
// - `DNSYNC_PROVIDER_TYPE`: Provider type (pihole)
// - `DNSYNC_PIHOLE_SERVER`: Pi-hole base URL (e.g., http://pi.hole)
// - `DNSYNC_PIHOLE_PASSWORD`: Admin password (optional)
// - `DNSYNC_PIHOLE_TLS_INSECURE`: Skip TLS verification (true/false)
// - `DNSYNC_DRY_RUN`: Log changes instead of applying them (true/false)
//
// ### Domain Filter
// - `DNSYNC_DOMAIN_FILTER`: Comma-separated domains to manage
// - `DNSYNC_EXCLUDE_DOMAINS`: Comma-separated domains to leave alone
// - `DNSYNC_REGEX_DOMAIN_FILTER`: Regex of names to manage
// - `DNSYNC_REGEX_DOMAIN_EXCLUSION`: Regex of names to leave alone
//
// ### Pass
// - `DNSYNC_CHANGES_FILE`: JSON change set to apply (optional)
// - `DNSYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export DNSYNC_PIHOLE_SERVER=http://pi.hole
// export DNSYNC_PIHOLE_PASSWORD=secret
// export DNSYNC_DOMAIN_FILTER=home.example.org
// export DNSYNC_CHANGES_FILE=/var/lib/dnsync/changes.json
//
// dnsyncd
// ```

use anyhow::{Context, Result};
use dnsync_core::{Changes, DnsyncConfig, DomainFilter, ProviderConfig, ProviderRegistry};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsyncExitCode {
    /// Pass completed
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (backend failure, cancellation)
    RuntimeError = 2,
}

impl From<DnsyncExitCode> for ExitCode {
    fn from(code: DnsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
struct Config {
    provider_type: String,
    pihole_server: Option<String>,
    pihole_password: String,
    pihole_tls_insecure: bool,
    dry_run: bool,
    domain_filter: Vec<String>,
    exclude_domains: Vec<String>,
    regex_domain_filter: Option<String>,
    regex_domain_exclusion: Option<String>,
    changes_file: Option<PathBuf>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            provider_type: non_empty("DNSYNC_PROVIDER_TYPE").unwrap_or_else(|| "pihole".to_string()),
            pihole_server: non_empty("DNSYNC_PIHOLE_SERVER"),
            pihole_password: lookup("DNSYNC_PIHOLE_PASSWORD").unwrap_or_default(),
            pihole_tls_insecure: parse_bool("DNSYNC_PIHOLE_TLS_INSECURE", non_empty("DNSYNC_PIHOLE_TLS_INSECURE"))?,
            dry_run: parse_bool("DNSYNC_DRY_RUN", non_empty("DNSYNC_DRY_RUN"))?,
            domain_filter: parse_list(lookup("DNSYNC_DOMAIN_FILTER")),
            exclude_domains: parse_list(lookup("DNSYNC_EXCLUDE_DOMAINS")),
            regex_domain_filter: non_empty("DNSYNC_REGEX_DOMAIN_FILTER"),
            regex_domain_exclusion: non_empty("DNSYNC_REGEX_DOMAIN_EXCLUSION"),
            changes_file: non_empty("DNSYNC_CHANGES_FILE").map(PathBuf::from),
            log_level: non_empty("DNSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.provider_type.as_str() {
            "pihole" => {}
            _ => anyhow::bail!(
                "DNSYNC_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: pihole",
                self.provider_type
            ),
        }

        if self.pihole_server.is_none() {
            anyhow::bail!(
                "DNSYNC_PIHOLE_SERVER is required. \
                Set it via: export DNSYNC_PIHOLE_SERVER=http://pi.hole"
            );
        }

        if let Some(ref server) = self.pihole_server
            && !server.starts_with("https://")
            && !server.starts_with("http://")
        {
            anyhow::bail!(
                "DNSYNC_PIHOLE_SERVER must use HTTP or HTTPS scheme. Got: {}",
                server
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DNSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Core configuration for the provider registry
    fn to_dnsync_config(&self) -> Result<DnsyncConfig> {
        let domain_filter = DomainFilter::from_parts(
            self.domain_filter.clone(),
            self.exclude_domains.clone(),
            self.regex_domain_filter.clone(),
            self.regex_domain_exclusion.clone(),
        )
        .context("invalid domain filter")?;

        let provider = ProviderConfig::Pihole {
            server: self.pihole_server.clone().unwrap_or_default(),
            password: self.pihole_password.clone(),
            tls_insecure_skip_verify: self.pihole_tls_insecure,
            dry_run: self.dry_run,
        };

        Ok(DnsyncConfig::new(provider).with_domain_filter(domain_filter))
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(key: &str, raw: Option<String>) -> Result<bool> {
    match raw.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("{} must be true or false. Got: {}", key, other),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    let dnsync_config = match config.to_dnsync_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(config.log_level()).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    info!("Starting dnsyncd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsyncExitCode::RuntimeError.into();
        }
    };

    let changes_file = config.changes_file;
    let result = rt.block_on(async move {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

        let code = match run_pass(dnsync_config, changes_file, &cancel).await {
            Ok(()) => DnsyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Pass failed: {:#}", e);
                exit_code_for(&e)
            }
        };

        watcher.abort();
        code
    });

    result.into()
}

/// Map a pass error to an exit code
fn exit_code_for(error: &anyhow::Error) -> DnsyncExitCode {
    match error.downcast_ref::<dnsync_core::Error>() {
        Some(dnsync_core::Error::Config(_)) => DnsyncExitCode::ConfigError,
        _ => DnsyncExitCode::RuntimeError,
    }
}

/// Run one reconciliation pass
async fn run_pass(
    config: DnsyncConfig,
    changes_file: Option<PathBuf>,
    cancel: &CancellationToken,
) -> Result<()> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "pihole")]
    {
        info!("Registering Pi-hole provider");
        dnsync_provider_pihole::register(&registry);
    }

    debug!("Registered providers: {:?}", registry.list_providers());

    let provider = registry.create_provider(&config, cancel).await?;
    info!("Provider ready: {}", provider.provider_name());

    if let Some(path) = changes_file {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read changes file {}", path.display()))?;
        let changes: Changes = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse changes file {}", path.display()))?;

        if changes.is_empty() {
            info!("Change set is empty, nothing to apply");
        } else {
            let report = provider.apply_changes(changes, cancel).await?;
            for soft in &report.soft_errors {
                warn!("Unsupported record: {}", soft);
            }
        }
    }

    let records = provider.records(cancel).await?;
    info!("{} record(s) in scope", records.len());
    for record in &records {
        debug!("{}", record);
    }

    Ok(())
}

/// Cancel the pass on SIGTERM or SIGINT
#[cfg(unix)]
async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to setup signal handlers: {}", e);
            return;
        }
    };

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    info!("Received shutdown signal: {}", name);
    cancel.cancel();
}

/// Cancel the pass on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal: SIGINT");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to wait for CTRL-C: {}", e),
    }
}
