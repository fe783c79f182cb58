//! JSON-backed host state.

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Utc};
use cue_core::{HostGraph, HostSettings, ModulePath, Notifier, EXTENSIONS_KEY, EXTENSION_API_KEY};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::errors::HostError;

/// Where the settings store lives inside the document.
const SETTINGS_PATH: [&str; 2] = ["game", "settings"];
/// Notices kept in memory; older ones are dropped first.
pub const MAX_NOTICES: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warn,
}

/// One operator notification.
#[derive(Clone, Debug, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Host whose whole world is one JSON document.
pub struct StateHost {
    doc: RwLock<Value>,
    notices: Mutex<VecDeque<Notice>>,
}

impl StateHost {
    pub fn new(doc: Value) -> Result<Self, HostError> {
        if !doc.is_object() {
            return Err(HostError::NotAnObject);
        }
        Ok(Self {
            doc: RwLock::new(doc),
            notices: Mutex::new(VecDeque::new()),
        })
    }

    /// Load a state document from disk.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let content = std::fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&content)?;
        Self::new(doc)
    }

    /// A small tabletop scene: soundscapes, master audio, two playlists,
    /// settings, a canvas view and an empty notification tray.
    pub fn demo() -> Self {
        Self {
            doc: RwLock::new(demo_document()),
            notices: Mutex::new(VecDeque::new()),
        }
    }

    /// Run `f` against the current document.
    pub fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.doc.read())
    }

    /// Mutate the object at `path`, following the same extension fallback as
    /// lookups. Returns `None` when nothing is there.
    pub fn update<R>(&self, path: &ModulePath, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let mut doc = self.doc.write();
        locate_mut(&mut doc, path).map(f)
    }

    /// Write `game.settings.<namespace>.<key>`, creating intermediate objects.
    pub fn set_setting(&self, namespace: &str, key: &str, value: Value) -> bool {
        let mut doc = self.doc.write();
        let keys = [SETTINGS_PATH[0], SETTINGS_PATH[1], namespace];
        match object_at(&mut doc, &keys) {
            Some(section) => {
                let _ = section.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Most recent notices, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().iter().cloned().collect()
    }

    fn push_notice(&self, level: NoticeLevel, message: &str) {
        let mut notices = self.notices.lock();
        if notices.len() == MAX_NOTICES {
            let _ = notices.pop_front();
        }
        notices.push_back(Notice {
            level,
            message: message.to_string(),
            at: Utc::now(),
        });
    }
}

impl HostGraph for StateHost {
    fn snapshot(&self) -> Value {
        self.doc.read().clone()
    }
}

impl HostSettings for StateHost {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let doc = self.doc.read();
        doc.get(SETTINGS_PATH[0])?
            .get(SETTINGS_PATH[1])?
            .get(namespace)?
            .get(key)
            .cloned()
    }
}

impl Notifier for StateHost {
    fn info(&self, message: &str) {
        info!(target: "cue::notice", notice = message, "operator notice");
        self.push_notice(NoticeLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        warn!(target: "cue::notice", notice = message, "operator warning");
        self.push_notice(NoticeLevel::Warn, message);
    }
}

/// Mutable counterpart of `cue_core::locate`.
fn locate_mut<'a>(root: &'a mut Value, path: &ModulePath) -> Option<&'a mut Value> {
    if path.resolve(root).is_some() {
        return path.resolve_mut(root);
    }
    let head = path.head()?;
    let extension = root.get(EXTENSIONS_KEY)?.get(head)?;
    if extension.get("active").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let api_path = ModulePath::from_segments(
        [EXTENSIONS_KEY, head, EXTENSION_API_KEY]
            .into_iter()
            .map(str::to_string)
            .chain(path.tail().segments().iter().cloned()),
    );
    api_path.resolve_mut(root)
}

/// Walk `keys` from `value`, inserting empty objects for missing keys.
fn object_at<'a>(value: &'a mut Value, keys: &[&str]) -> Option<&'a mut Map<String, Value>> {
    let mut current = value;
    for key in keys {
        let map = current.as_object_mut()?;
        current = map
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current.as_object_mut()
}

pub(crate) fn demo_document() -> Value {
    json!({
        "game": {
            "soundscape": {
                "active": 0,
                "playing": false,
                "soundscapes": [
                    {"name": "Forest Night"},
                    {"name": "Dungeon Drips"},
                    {"name": "Harbor Storm"},
                    {"name": "Tavern Crowd"}
                ]
            },
            "audio": {"volume": 0.5},
            "playlists": {
                "combat": {"name": "Combat", "playing": false, "volume": 0.8},
                "ambient": {"name": "Ambient", "playing": true, "volume": 0.4}
            },
            "settings": {
                "core": {"globalPlaylistVolume": 0.5},
                "cue": {"host": "", "token": ""}
            }
        },
        "canvas": {"view": {"x": 0, "y": 0, "scale": 1.0}},
        "ui": {"notifications": {"enabled": true}},
        "modules": {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn settings_read_through_game_settings() {
        let host = StateHost::demo();
        assert_eq!(host.get("core", "globalPlaylistVolume"), Some(json!(0.5)));
        assert_eq!(host.get("core", "missing"), None);
        assert_eq!(host.get("nope", "x"), None);
    }

    #[test]
    fn set_setting_creates_namespace() {
        let host = StateHost::demo();
        assert!(host.set_setting("fresh", "flag", json!(true)));
        assert_eq!(host.get("fresh", "flag"), Some(json!(true)));
    }

    #[test]
    fn set_setting_on_bare_document() {
        let host = StateHost::new(json!({})).unwrap();
        assert!(host.set_setting("cue", "host", json!("h:1")));
        assert_eq!(host.snapshot()["game"]["settings"]["cue"]["host"], "h:1");
    }

    #[test]
    fn update_follows_extension_api() {
        let host = StateHost::new(json!({
            "modules": {
                "ambience": {"active": true, "api": {"deck": {"volume": 0.1}}},
                "off": {"active": false, "api": {"deck": {"volume": 0.1}}}
            }
        }))
        .unwrap();

        let path = ModulePath::parse("ambience.deck").unwrap();
        let hit = host.update(&path, |deck| deck["volume"] = json!(0.9));
        assert!(hit.is_some());
        assert_eq!(host.snapshot()["modules"]["ambience"]["api"]["deck"]["volume"], json!(0.9));

        let path = ModulePath::parse("off.deck").unwrap();
        assert!(host.update(&path, |_| ()).is_none());
    }

    #[test]
    fn notifier_keeps_log() {
        let host = StateHost::demo();
        host.info("connected");
        host.warn("bad index");
        let notices = host.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Info);
        assert_eq!(notices[1].level, NoticeLevel::Warn);
        assert_eq!(notices[1].message, "bad index");
    }

    #[test]
    fn notice_log_is_bounded() {
        let host = StateHost::demo();
        for i in 0..MAX_NOTICES + 10 {
            host.info(&format!("notice {i}"));
        }
        let notices = host.notices();
        assert_eq!(notices.len(), MAX_NOTICES);
        assert_eq!(notices[0].message, "notice 10");
        assert_eq!(
            notices[MAX_NOTICES - 1].message,
            format!("notice {}", MAX_NOTICES + 9)
        );
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"game": {{"audio": {{"volume": 1.0}}}}}}"#).unwrap();
        let host = StateHost::load(file.path()).unwrap();
        assert_eq!(host.snapshot()["game"]["audio"]["volume"], json!(1.0));
    }

    #[test]
    fn load_rejects_non_objects() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(matches!(StateHost::load(file.path()), Err(HostError::NotAnObject)));

        let missing = Path::new("/definitely/not/here.json");
        assert!(matches!(StateHost::load(missing), Err(HostError::Io { .. })));
    }
}
