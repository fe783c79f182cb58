//! Logging setup for the cue bridge.
//!
//! One `tracing` subscriber per process: an `EnvFilter` behind a reload layer
//! (so levels can change at runtime) and either JSON or human-readable output.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "cue_client" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines instead of pretty text.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Build from textual levels, skipping any that do not parse.
    pub fn from_levels<'a, I>(level: &str, modules: I, json: bool) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let module_levels = modules
            .into_iter()
            .filter_map(|(module, lvl)| parse_level(lvl).map(|l| (module.to_string(), l)))
            .collect();
        Self {
            log_level: parse_level(level).unwrap_or(Level::INFO),
            module_levels,
            json,
        }
    }
}

/// Parse `trace`/`debug`/`info`/`warn`/`error` (any case).
pub fn parse_level(raw: &str) -> Option<Level> {
    raw.trim().parse().ok()
}

/// Render the filter directive string, e.g. `info,cue_client=debug`.
pub fn filter_directives(base: Level, modules: &[(String, Level)]) -> String {
    let mut directives = base.to_string().to_lowercase();
    for (module, level) in modules {
        directives.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    directives
}

/// Keeps the reload handle for runtime level changes.
pub struct TelemetryGuard {
    base: Level,
    level_filter: Arc<RwLock<Vec<(String, Level)>>>,
    handle: reload::Handle<EnvFilter, Registry>,
}

impl TelemetryGuard {
    /// Change the log level for a specific module at runtime.
    pub fn set_module_level(&self, module: &str, level: Level) {
        let directives = {
            let mut levels = self.level_filter.write();
            if let Some(entry) = levels.iter_mut().find(|(m, _)| m == module) {
                entry.1 = level;
            } else {
                levels.push((module.to_string(), level));
            }
            filter_directives(self.base, &levels)
        };
        if let Err(e) = self.handle.reload(EnvFilter::new(&directives)) {
            tracing::warn!(error = %e, "failed to reload log filter");
        }
    }

    /// Get current per-module log level overrides.
    pub fn module_levels(&self) -> Vec<(String, Level)> {
        self.level_filter.read().clone()
    }
}

/// Initialize the telemetry subsystem. Call once at startup; later calls leave
/// the first subscriber in place.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let directives = filter_directives(config.log_level, &config.module_levels);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));
    let (filter_layer, handle) = reload::Layer::new(env_filter);

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
    });
    let text_layer = (!config.json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    if tracing_subscriber::registry()
        .with(filter_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }

    TelemetryGuard {
        base: config.log_level,
        level_filter: Arc::new(RwLock::new(config.module_levels)),
        handle,
    }
}
