//! # cue
//!
//! Bridge binary: loads settings, starts logging, builds the host and its
//! capability surface, and keeps the controller connection alive until Ctrl-C.
//! `SIGHUP` re-reads the per-module log levels and forces an immediate reconnect.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cue_client::{ConnectionConfig, ConnectionManager, Endpoint, SettingsEndpoint};
use cue_core::Normalizer;
use cue_dispatch::{CapabilityRegistry, Dispatcher, LegacyTarget};
use cue_host::StateHost;
use cue_settings::CueSettings;
use cue_telemetry::{init_telemetry, parse_level, TelemetryConfig, TelemetryGuard};

/// Remote-control bridge client.
#[derive(Parser, Debug)]
#[command(name = "cue", about = "Remote-control bridge client")]
struct Cli {
    /// Settings file (defaults to `~/.cue/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON document used as the host state (defaults to a built-in demo scene).
    #[arg(long)]
    state: Option<PathBuf>,

    /// Bridge `host:port`, overriding settings.
    #[arg(long)]
    host: Option<String>,

    /// Bridge auth token, overriding settings.
    #[arg(long)]
    token: Option<String>,
}

fn resolve_settings(args: &Cli) -> Result<CueSettings> {
    let mut settings = match &args.config {
        Some(path) => cue_settings::load_settings_from_path(path),
        None => cue_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    if let Some(host) = &args.host {
        settings.bridge.host.clone_from(host);
    }
    if let Some(token) = &args.token {
        settings.bridge.token.clone_from(token);
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

/// Apply the settings file's per-module levels to the running subscriber.
fn reload_log_levels(telemetry: &TelemetryGuard, args: &Cli) {
    let settings = match resolve_settings(args) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "settings reload failed, keeping log levels");
            return;
        }
    };
    for (module, raw) in &settings.logging.modules {
        match parse_level(raw) {
            Some(level) => telemetry.set_module_level(module, level),
            None => tracing::warn!(module = %module, level = %raw, "unknown log level, ignoring"),
        }
    }
    tracing::info!(levels = ?telemetry.module_levels(), "log levels reloaded");
}

/// Resolves when the operator asks for a reconnect.
#[cfg(unix)]
async fn hangup(signal: &mut Option<tokio::signal::unix::Signal>) {
    match signal {
        Some(s) => {
            let _ = s.recv().await;
        }
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = resolve_settings(&args)?;

    let telemetry = init_telemetry(TelemetryConfig::from_levels(
        &settings.logging.level,
        settings
            .logging
            .modules
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
        settings.logging.json,
    ));
    tracing::info!(version = %settings.version, host = %settings.bridge.host, "starting cue bridge");

    let host = match &args.state {
        Some(path) => StateHost::load(path)
            .with_context(|| format!("Failed to load host state from {}", path.display()))?,
        None => StateHost::demo(),
    };
    let host = Arc::new(host);

    let mut registry = CapabilityRegistry::new();
    cue_host::register_capabilities(&mut registry, &host);
    tracing::debug!(methods = ?registry.methods(), "capabilities ready");

    let legacy = settings
        .legacy
        .enabled
        .then(|| LegacyTarget::new(&settings.legacy.module, &settings.legacy.method));
    if legacy.is_some() && !registry.has_method(&settings.legacy.method) {
        tracing::warn!(method = %settings.legacy.method, "legacy index target is not a registered capability");
    }
    let normalizer = Normalizer::new(settings.normalization.clone());
    tracing::debug!(rules = normalizer.len(), "normalization table ready");
    let dispatcher = Dispatcher::new(
        host.clone(),
        host.clone(),
        Arc::new(registry),
        Arc::new(normalizer),
    )
    .with_legacy(legacy);

    let endpoint = SettingsEndpoint::new(
        host.clone(),
        settings.bridge.settings_namespace.clone(),
        Endpoint::new(settings.bridge.host.clone(), settings.bridge.token.clone()),
    );
    let config = ConnectionConfig {
        client_name: settings.bridge.client_name.clone(),
        retry_delay: Duration::from_millis(settings.bridge.retry_delay_ms),
    };
    let bridge = ConnectionManager::spawn(config, Arc::new(endpoint), Arc::new(dispatcher));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(error = %e, "SIGHUP handler unavailable, manual reconnect disabled");
                None
            }
        };
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for ctrl+c")?;
                    break;
                }
                () = hangup(&mut sighup) => {
                    reload_log_levels(&telemetry, &args);
                    bridge.reconnect_now();
                }
            }
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    bridge.shutdown().await;
    Ok(())
}
