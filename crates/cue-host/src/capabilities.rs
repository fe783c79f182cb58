//! The host operations reachable from the controller.

use std::sync::Arc;

use async_trait::async_trait;
use cue_core::{HostSettings, InvokeError, Notifier};
use cue_dispatch::{Capability, CapabilityRegistry, CapabilitySpec, Invocation};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::state::StateHost;

/// Setting mirrored by `setMasterVolume`.
const MASTER_VOLUME_SETTING: (&str, &str) = ("core", "globalPlaylistVolume");

/// Install every capability onto `registry`.
pub fn register_capabilities(registry: &mut CapabilityRegistry, host: &Arc<StateHost>) {
    let h = || Arc::clone(host);

    registry.register(
        CapabilitySpec::new("setSoundscape", "game.soundscape").min_args(1),
        SetSoundscape(h()),
    );
    registry.register(CapabilitySpec::new("stopSoundscape", "game.soundscape"), StopSoundscape(h()));
    registry.register(
        CapabilitySpec::new("setMasterVolume", "game.audio").min_args(1),
        SetMasterVolume(h()),
    );
    registry.register(CapabilitySpec::new("setVolume", "*").min_args(1), SetVolume(h()));
    registry.register(CapabilitySpec::new("play", "game.playlists.*"), SetPlaying(h(), true));
    registry.register(CapabilitySpec::new("stop", "game.playlists.*"), SetPlaying(h(), false));
    registry.register(
        CapabilitySpec::new("get", "game.settings").min_args(2).replies(),
        GetSetting(h()),
    );
    registry.register(
        CapabilitySpec::new("set", "game.settings").min_args(3).replies(),
        SetSetting(h()),
    );
    registry.register(CapabilitySpec::new("info", "ui.notifications").min_args(1), Notify(h(), false));
    registry.register(CapabilitySpec::new("warn", "ui.notifications").min_args(1), Notify(h(), true));
    registry.register(CapabilitySpec::new("pan", "canvas").min_args(1), Pan(h()));

    debug!(count = registry.count(), "host capabilities registered");
}

/// Apply `f` to the invocation target, which must be an object.
fn with_target<R>(
    host: &StateHost,
    call: &Invocation,
    f: impl FnOnce(&mut Map<String, Value>) -> R,
) -> Result<R, InvokeError> {
    host.update(&call.module, |target| target.as_object_mut().map(f))
        .ok_or_else(|| InvokeError::Unavailable(call.module.to_string()))?
        .ok_or_else(|| InvokeError::InvalidArguments(format!("{} is not an object", call.module)))
}

fn soundscape_count(target: &Value) -> usize {
    target
        .get("soundscapes")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Select (and optionally start) a soundscape by index.
pub struct SetSoundscape(Arc<StateHost>);

#[async_trait]
impl Capability for SetSoundscape {
    #[instrument(skip_all, fields(method = "setSoundscape"))]
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        let index = call
            .arg(0)
            .and_then(Value::as_u64)
            .ok_or_else(|| InvokeError::InvalidArguments("soundscape index must be a non-negative integer".into()))?;
        let play = call.arg(1).and_then(Value::as_bool).unwrap_or(false);

        let count = soundscape_count(&call.target);
        if usize::try_from(index).map_or(true, |i| i >= count) {
            return Err(InvokeError::InvalidArguments(format!(
                "soundscape index {index} out of range (0..{count})"
            )));
        }
        with_target(&self.0, &call, |soundscape| {
            let _ = soundscape.insert("active".into(), Value::from(index));
            let _ = soundscape.insert("playing".into(), Value::Bool(play));
        })?;
        Ok(Value::Null)
    }
}

pub struct StopSoundscape(Arc<StateHost>);

#[async_trait]
impl Capability for StopSoundscape {
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        with_target(&self.0, &call, |soundscape| {
            let _ = soundscape.insert("playing".into(), Value::Bool(false));
        })?;
        Ok(Value::Null)
    }
}

/// Set `volume` on any object target. Receives the internal (normalized) level.
pub struct SetVolume(Arc<StateHost>);

#[async_trait]
impl Capability for SetVolume {
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        let volume = call.f64_arg(0)?;
        with_target(&self.0, &call, |target| {
            let _ = target.insert("volume".into(), Value::from(volume));
        })?;
        Ok(Value::Null)
    }
}

/// Master volume: the audio object plus the persisted playlist-volume setting.
pub struct SetMasterVolume(Arc<StateHost>);

#[async_trait]
impl Capability for SetMasterVolume {
    #[instrument(skip_all, fields(method = "setMasterVolume"))]
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        let volume = call.f64_arg(0)?;
        with_target(&self.0, &call, |audio| {
            let _ = audio.insert("volume".into(), Value::from(volume));
        })?;
        let (namespace, key) = MASTER_VOLUME_SETTING;
        if !self.0.set_setting(namespace, key, Value::from(volume)) {
            return Err(InvokeError::Failed("settings store is not writable".into()));
        }
        Ok(Value::Null)
    }
}

/// `play` / `stop` on a playlist.
pub struct SetPlaying(Arc<StateHost>, bool);

#[async_trait]
impl Capability for SetPlaying {
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        let playing = self.1;
        with_target(&self.0, &call, |playlist| {
            let _ = playlist.insert("playing".into(), Value::Bool(playing));
        })?;
        Ok(Value::Null)
    }
}

pub struct GetSetting(Arc<StateHost>);

#[async_trait]
impl Capability for GetSetting {
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        let namespace = call.str_arg(0)?;
        let key = call.str_arg(1)?;
        Ok(self.0.get(namespace, key).unwrap_or(Value::Null))
    }
}

pub struct SetSetting(Arc<StateHost>);

#[async_trait]
impl Capability for SetSetting {
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        let namespace = call.str_arg(0)?;
        let key = call.str_arg(1)?;
        let value = call.arg(2).cloned().unwrap_or(Value::Null);
        if !self.0.set_setting(namespace, key, value.clone()) {
            return Err(InvokeError::Failed("settings store is not writable".into()));
        }
        Ok(value)
    }
}

/// Operator notification; the flag selects warning level.
pub struct Notify(Arc<StateHost>, bool);

#[async_trait]
impl Capability for Notify {
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        let message = call.str_arg(0)?;
        if self.1 {
            self.0.warn(message);
        } else {
            self.0.info(message);
        }
        Ok(Value::Null)
    }
}

/// Merge `{x, y, scale}` into `canvas.view`.
pub struct Pan(Arc<StateHost>);

#[async_trait]
impl Capability for Pan {
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError> {
        let requested = call
            .arg(0)
            .and_then(Value::as_object)
            .ok_or_else(|| InvokeError::InvalidArguments("pan expects an {x, y, scale} object".into()))?;
        let view: Map<String, Value> = ["x", "y", "scale"]
            .into_iter()
            .filter_map(|k| {
                requested
                    .get(k)
                    .filter(|v| v.is_number())
                    .map(|v| (k.to_string(), v.clone()))
            })
            .collect();
        if view.is_empty() {
            return Err(InvokeError::InvalidArguments("pan needs at least one of x, y, scale".into()));
        }

        with_target(&self.0, &call, |canvas| {
            let current = canvas
                .entry("view")
                .or_insert_with(|| Value::Object(Map::new()));
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            if let Some(current) = current.as_object_mut() {
                current.extend(view);
            }
        })?;
        Ok(Value::Null)
    }
}
