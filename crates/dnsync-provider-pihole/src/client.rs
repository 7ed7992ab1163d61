// # Pi-hole Session Client
//
// Authenticated HTTP access to the Pi-hole v6 REST API.
//
// ## Session lifecycle
//
// - `connect` logs in immediately when a password is configured
// - every request carries the session id in `X-FTL-SID`
// - a 401 starts a bounded renewal loop: introspect, log in again if the
//   session is gone, then re-issue the request
// - renewal is single-flight: the token mutex is held for the whole
//   introspect/login exchange, and a caller whose stale token was already
//   replaced just retries with the new one
//
// ## Security Requirements
//
// - Password and session id NEVER appear in logs or `Debug` output
//
// ## API Reference
//
// - Login: POST `/api/auth` `{"password": "..."}`
// - Introspect: GET `/api/auth`

use std::time::Duration;

use dnsync_core::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::api::{ApiAuthResponse, ApiErrorResponse};

/// Maximum session renewal rounds per request
pub const MAX_TOKEN_RENEWALS: usize = 3;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const CONTENT_TYPE_JSON: &str = "application/json";
const SESSION_HEADER: &str = "X-FTL-SID";
const API_AUTH_PATH: &str = "/api/auth";

/// Connection settings for [`SessionClient::connect`]
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Base URL of the Pi-hole web server
    pub server: String,
    /// Admin password; empty when authentication is disabled
    pub password: String,
    /// Skip TLS certificate verification
    pub tls_insecure_skip_verify: bool,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("password", &"<REDACTED>")
            .field("tls_insecure_skip_verify", &self.tls_insecure_skip_verify)
            .finish()
    }
}

/// HTTP client holding one Pi-hole session
pub struct SessionClient {
    server: String,
    password: String,
    http: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("server", &self.server)
            .field("password", &"<REDACTED>")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl SessionClient {
    /// Build a client and, if a password is set, open a session
    ///
    /// # Errors
    ///
    /// - `Error::Config`: The server URL is empty or unparsable
    /// - any request error from the initial login
    pub async fn connect(config: ClientConfig, cancel: &CancellationToken) -> Result<Self> {
        let server = config.server.trim().trim_end_matches('/').to_string();
        if server.is_empty() {
            return Err(Error::config("no pihole server found"));
        }
        Url::parse(&server)
            .map_err(|e| Error::config(format!("invalid pihole server URL '{}': {}", server, e)))?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(config.tls_insecure_skip_verify)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))?;

        let client = Self {
            server,
            password: config.password,
            http,
            token: Mutex::new(None),
        };

        if !client.password.is_empty() {
            let token = client.login(cancel).await?;
            *client.token.lock().await = token;
        }

        Ok(client)
    }

    /// Base URL without a trailing slash
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    /// Whether a session id is currently held
    pub async fn has_session(&self) -> bool {
        self.token.lock().await.is_some()
    }

    /// GET a URL, returning the response body
    pub async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.request(Method::GET, url, cancel).await
    }

    /// PUT a URL; "Item already present" counts as success
    pub async fn put(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.request(Method::PUT, url, cancel).await
    }

    /// DELETE a URL; 404 counts as success
    pub async fn delete(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.request(Method::DELETE, url, cancel).await
    }

    /// Issue an authenticated request with session renewal
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let mut token = self.lock_session(cancel).await?.clone();
        let mut renewals = 0;

        loop {
            let (status, body) = self
                .send(method.clone(), url, None, token.as_deref(), cancel)
                .await?;

            if is_success(status) {
                return Ok(body);
            }

            if status == StatusCode::NOT_FOUND && method == Method::DELETE {
                debug!("{} {} answered 404, treating as already deleted", method, url);
                return Ok(body);
            }

            if status == StatusCode::UNAUTHORIZED && token.is_some() {
                if renewals >= MAX_TOKEN_RENEWALS {
                    return Err(Error::TokenRenewalExhausted { attempts: renewals });
                }
                renewals += 1;
                token = self.renew(token.as_deref(), renewals, cancel).await?;
                continue;
            }

            let envelope = decode_error(status, &body)?;

            if method == Method::PUT && envelope.error.message.contains("Item already present") {
                debug!("{} {} already present", method, url);
                return Ok(body);
            }

            debug!("Error on request {} {} - {}s", method, url, envelope.took);
            return Err(backend_error(status, envelope));
        }
    }

    /// Replace a stale session, returning the token to retry with
    async fn renew(
        &self,
        stale: Option<&str>,
        attempt: usize,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let mut current = self.lock_session(cancel).await?;

        if current.as_deref() != stale {
            debug!("Pihole session was renewed concurrently, retrying");
            return Ok(current.clone());
        }

        if !self.introspect(stale, cancel).await? {
            debug!(
                "Pihole token has expired, fetching a new one. Try ({}/{})",
                attempt, MAX_TOKEN_RENEWALS
            );
            *current = self.login(cancel).await?;
        }

        Ok(current.clone())
    }

    /// Wait for the session slot, giving up when `cancel` fires
    async fn lock_session(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, Option<String>>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            guard = self.token.lock() => Ok(guard),
        }
    }

    /// Whether the server still accepts `token`
    async fn introspect(&self, token: Option<&str>, cancel: &CancellationToken) -> Result<bool> {
        let Some(token) = token else {
            return Ok(false);
        };

        let url = self.url(API_AUTH_PATH);
        let (_, body) = self.send(Method::GET, &url, None, Some(token), cancel).await?;
        let parsed: ApiAuthResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::http(format!("failed to decode auth response: {}", e)))?;

        Ok(parsed.session.valid)
    }

    /// Open a new session with the configured password
    async fn login(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        if self.password.is_empty() {
            return Ok(None);
        }

        let url = self.url(API_AUTH_PATH);
        debug!("Fetching new token from {}", url);

        let payload = serde_json::json!({ "password": self.password });
        let (status, body) = self.send(Method::POST, &url, Some(&payload), None, cancel).await?;

        if !is_success(status) {
            return Err(backend_error(status, decode_error(status, &body)?));
        }

        let parsed: ApiAuthResponse = serde_json::from_slice(&body).map_err(|e| {
            error!("Auth Query : failed to decode response: {}", e);
            Error::http(format!("failed to decode auth response: {}", e))
        })?;

        if !parsed.session.valid {
            let message = parsed.session.message.unwrap_or_default();
            return Err(Error::provider("pihole", format!("authentication rejected: {}", message)));
        }

        Ok(parsed.session.sid.filter(|sid| !sid.is_empty()))
    }

    /// One HTTP round trip, raced against cancellation
    async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Option<&serde_json::Value>,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let mut request = self.http.request(method, url).header(CONTENT_TYPE, CONTENT_TYPE_JSON);
        if let Some(token) = token {
            request = request.header(SESSION_HEADER, token);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::http(format!("failed to read response body: {}", e)))?;
            Ok((status, body.to_vec()))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = exchange => result,
        }
    }
}

fn is_success(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT
    )
}

fn decode_error(status: StatusCode, body: &[u8]) -> Result<ApiErrorResponse> {
    serde_json::from_slice(body).map_err(|e| {
        Error::http(format!(
            "received {} status code with undecodable error response: {}",
            status.as_u16(),
            e
        ))
    })
}

fn backend_error(status: StatusCode, envelope: ApiErrorResponse) -> Error {
    Error::Backend {
        status: status.as_u16(),
        key: envelope.error.key,
        message: envelope.error.message,
        hint: envelope.error.hint.unwrap_or_default(),
    }
}
