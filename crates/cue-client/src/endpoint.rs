//! Where to connect, resolved fresh at every attempt.

use std::sync::Arc;

use cue_core::HostSettings;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::errors::ConnectionError;

/// Settings key for `host:port`.
pub const HOST_KEY: &str = "host";
/// Settings key for the auth token.
pub const TOKEN_KEY: &str = "token";

/// Bridge address plus credential.
#[derive(Clone)]
pub struct Endpoint {
    pub host: String,
    pub token: SecretString,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: SecretString::from(token.into()),
        }
    }

    pub fn url(&self) -> Result<Url, ConnectionError> {
        build_url(&self.host, self.token.expose_secret())
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// `ws://{host}/?token={urlencoded token}`.
pub fn build_url(host: &str, token: &str) -> Result<Url, ConnectionError> {
    let host = host.trim().trim_start_matches("ws://").trim_end_matches('/');
    if host.is_empty() {
        return Err(ConnectionError::InvalidUrl("empty host".into()));
    }
    if host.contains(['/', '?', '#', ' ']) {
        return Err(ConnectionError::InvalidUrl(format!("host {host:?} is not host:port")));
    }
    let raw = format!("ws://{host}/?token={}", urlencoding::encode(token));
    let url = Url::parse(&raw).map_err(|e| ConnectionError::InvalidUrl(format!("{host}: {e}")))?;
    if url.host_str().is_none() {
        return Err(ConnectionError::InvalidUrl(format!("{host}: missing host")));
    }
    Ok(url)
}

/// Supplies the endpoint for the next connect attempt.
pub trait EndpointSource: Send + Sync {
    fn endpoint(&self) -> Endpoint;
}

/// Fixed endpoint.
pub struct StaticEndpoint(pub Endpoint);

impl EndpointSource for StaticEndpoint {
    fn endpoint(&self) -> Endpoint {
        self.0.clone()
    }
}

/// Reads `(namespace, "host")` and `(namespace, "token")` from the host
/// settings store, falling back per field to a static endpoint when a value
/// is missing or blank.
pub struct SettingsEndpoint {
    settings: Arc<dyn HostSettings>,
    namespace: String,
    fallback: Endpoint,
}

impl SettingsEndpoint {
    pub fn new(settings: Arc<dyn HostSettings>, namespace: impl Into<String>, fallback: Endpoint) -> Self {
        Self {
            settings,
            namespace: namespace.into(),
            fallback,
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.settings
            .get(&self.namespace, key)
            .and_then(|v| v.as_str().map(str::to_owned))
            .filter(|s| !s.trim().is_empty())
    }
}

impl EndpointSource for SettingsEndpoint {
    fn endpoint(&self) -> Endpoint {
        let host = self.lookup(HOST_KEY).unwrap_or_else(|| self.fallback.host.clone());
        let token = self
            .lookup(TOKEN_KEY)
            .map_or_else(|| self.fallback.token.clone(), SecretString::from);
        Endpoint { host, token }
    }
}
