//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file only needs the fields it changes.

use std::collections::BTreeMap;

use cue_core::{NormalizationRule, Normalizer};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Lowest accepted reconnect delay from the environment, in milliseconds.
pub const MIN_ENV_RETRY_DELAY_MS: u64 = 5_000;
/// Highest accepted reconnect delay from the environment, in milliseconds.
pub const MAX_ENV_RETRY_DELAY_MS: u64 = 60_000;

/// Root settings type.
///
/// ```json
/// {
///   "bridge": { "host": "localhost:8088", "token": "s3cret" },
///   "normalization": [
///     { "direction": "inbound", "methods": ["setVolume"], "internalMax": 1.0 }
///   ]
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CueSettings {
    /// Settings schema version.
    pub version: String,
    /// Connection to the controller-side bridge server.
    pub bridge: BridgeSettings,
    /// Handling of the legacy `{ "index": n }` message.
    pub legacy: LegacySettings,
    /// Value normalization table, evaluated in order.
    pub normalization: Vec<NormalizationRule>,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            bridge: BridgeSettings::default(),
            legacy: LegacySettings::default(),
            normalization: Normalizer::default_rules(),
            logging: LoggingSettings::default(),
        }
    }
}

impl CueSettings {
    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bridge.host.trim().is_empty() {
            return Err(SettingsError::invalid("bridge.host", "must not be empty"));
        }
        if self.bridge.retry_delay_ms == 0 {
            return Err(SettingsError::invalid(
                "bridge.retryDelayMs",
                "must be greater than zero",
            ));
        }
        for (i, rule) in self.normalization.iter().enumerate() {
            rule.validate()
                .map_err(|reason| SettingsError::invalid(format!("normalization[{i}]"), reason))?;
        }
        Ok(())
    }
}

/// Where and how to reach the bridge server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// `host:port` of the bridge server.
    pub host: String,
    /// Shared-secret token passed as the `token` query parameter.
    pub token: String,
    /// Name announced in the readiness handshake (`"<name> client ready"`).
    pub client_name: String,
    /// Delay before each reconnect attempt, in milliseconds.
    pub retry_delay_ms: u64,
    /// Host settings namespace consulted for `host`/`token` at connect time.
    pub settings_namespace: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            host: "localhost:8088".to_string(),
            token: String::new(),
            client_name: "cue".to_string(),
            retry_delay_ms: 5_000,
            settings_namespace: "cue".to_string(),
        }
    }
}

/// Target of the legacy `{ "index": n }` message.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacySettings {
    pub enabled: bool,
    pub module: String,
    pub method: String,
}

impl Default for LegacySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            module: "game.soundscape".to_string(),
            method: "setSoundscape".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`..`error`). `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-target level overrides, e.g. `{"cue_client": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}
