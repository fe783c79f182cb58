//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source, so a user-supplied
//!   `normalization` table replaces the default table as a whole
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{CueSettings, MAX_ENV_RETRY_DELAY_MS, MIN_ENV_RETRY_DELAY_MS};

/// Resolve the path to the settings file (`~/.cue/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".cue").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CueSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides, then validate.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<CueSettings> {
    let defaults = serde_json::to_value(CueSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: CueSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `CUE_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut CueSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary lookup. Invalid values are ignored with a
/// warning and the file/default value stays in place.
pub fn apply_overrides<F>(settings: &mut CueSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = string("CUE_HOST") {
        settings.bridge.host = v;
    }
    if let Some(v) = string("CUE_TOKEN") {
        settings.bridge.token = v;
    }
    if let Some(v) = string("CUE_CLIENT_NAME") {
        settings.bridge.client_name = v;
    }
    if let Some(v) = string("CUE_RETRY_DELAY_MS") {
        match parse_u64_range(&v, MIN_ENV_RETRY_DELAY_MS, MAX_ENV_RETRY_DELAY_MS) {
            Some(ms) => settings.bridge.retry_delay_ms = ms,
            None => warn!(key = "CUE_RETRY_DELAY_MS", value = %v, "invalid u64 env var, ignoring"),
        }
    }
    if let Some(v) = string("CUE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("CUE_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "CUE_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
