//! Module-path parsing and resolution over a JSON object graph.
//!
//! Paths use `.` between field accesses and `[n]` / `[key]` for indexing;
//! bracket notation is normalized to dot notation first, so `a[0].b` and
//! `a.0.b` name the same location. Resolution never fails on a missing
//! location, it reports it as unresolved.

use std::fmt;

use serde_json::Value;

use crate::errors::PathError;

/// A parsed module path, held as canonical dot-separated segments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModulePath {
    segments: Vec<String>,
}

impl ModulePath {
    /// Parse a dotted/bracketed path. The empty string parses to an empty path.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let mut dotted = String::with_capacity(raw.len() + 4);
        let mut in_bracket = false;
        let mut closed_at: Option<usize> = None;

        for (i, ch) in raw.char_indices() {
            if let Some(close) = closed_at.take() {
                if ch != '.' && ch != '[' {
                    return Err(PathError::UnexpectedChar(ch, close + 1));
                }
            }
            match ch {
                '[' if in_bracket => return Err(PathError::UnbalancedBracket(i)),
                '[' => {
                    in_bracket = true;
                    dotted.push('.');
                }
                ']' if !in_bracket => return Err(PathError::UnbalancedBracket(i)),
                ']' => {
                    in_bracket = false;
                    closed_at = Some(i);
                }
                '.' if in_bracket => return Err(PathError::UnexpectedChar('.', i)),
                _ => dotted.push(ch),
            }
        }
        if in_bracket {
            return Err(PathError::UnbalancedBracket(raw.len()));
        }

        // A path may open with an index (`[0].name`).
        let body = if raw.starts_with('[') {
            &dotted[1..]
        } else {
            dotted.as_str()
        };

        let mut segments = Vec::new();
        for segment in body.split('.') {
            let segment = strip_quotes(segment);
            if segment.is_empty() {
                return Err(PathError::EmptySegment(raw.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// First segment (the namespace the path is rooted at).
    pub fn head(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Everything after the first segment.
    pub fn tail(&self) -> Self {
        Self {
            segments: self.segments.iter().skip(1).cloned().collect(),
        }
    }

    /// Last segment.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path without its last segment; `None` for paths of length < 2.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Walk `root` segment by segment. Missing keys, out-of-range indices, and
    /// primitives (null included) with segments left over yield `None`. A null
    /// leaf is a value and resolves to `Some(&Value::Null)`.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        if self.segments.is_empty() {
            return None;
        }
        let mut current = root;
        for segment in &self.segments {
            current = step(current, segment)?;
        }
        Some(current)
    }

    /// Mutable counterpart of [`resolve`](Self::resolve).
    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        if self.segments.is_empty() {
            return None;
        }
        let mut current = root;
        for segment in &self.segments {
            current = step_mut(current, segment)?;
        }
        Some(current)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl std::str::FromStr for ModulePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Resolve `path` against `root`. Empty and malformed paths are unresolved.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    ModulePath::parse(path).ok()?.resolve(root)
}

fn step<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

fn strip_quotes(segment: &str) -> &str {
    for quote in ['"', '\''] {
        if segment.len() >= 2 && segment.starts_with(quote) && segment.ends_with(quote) {
            return &segment[1..segment.len() - 1];
        }
    }
    segment
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> Value {
        json!({
            "game": {
                "soundscape": {
                    "active": 1,
                    "soundscapes": [{"name": "Tavern"}, {"name": "Forest"}]
                },
                "playlists": [
                    {"name": "Combat", "volume": 0.5, "tracks": [[1, 2], [3]]}
                ],
                "paused": false,
                "title": null
            },
            "ui": {"notifications": {}},
            "a": [{"b": "deep"}]
        })
    }

    /// Collect every (path, value) pair reachable by manual traversal.
    fn walk(value: &Value, prefix: &mut Vec<String>, out: &mut Vec<(ModulePath, Value)>) {
        let children: Vec<(String, &Value)> = match value {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Vec::new(),
        };
        for (key, child) in children {
            prefix.push(key);
            out.push((ModulePath::from_segments(prefix.clone()), child.clone()));
            walk(child, prefix, out);
            prefix.pop();
        }
    }

    #[test]
    fn every_reachable_path_resolves_to_its_value() {
        let root = graph();
        let mut pairs = Vec::new();
        walk(&root, &mut Vec::new(), &mut pairs);
        assert!(pairs.len() > 10);

        for (path, expected) in pairs {
            assert_eq!(resolve(&root, &path.to_string()), Some(&expected), "path {path}");
        }
    }

    #[test]
    fn bracket_and_dot_notation_are_equivalent() {
        let root = graph();
        assert_eq!(resolve(&root, "a[0].b"), resolve(&root, "a.0.b"));
        assert_eq!(resolve(&root, "a[0].b"), Some(&json!("deep")));
        assert_eq!(
            resolve(&root, "game.playlists[0].tracks[0][1]"),
            Some(&json!(2))
        );
        assert_eq!(
            resolve(&root, "game[\"soundscape\"].active"),
            resolve(&root, "game.soundscape.active")
        );
    }

    #[test]
    fn missing_paths_are_unresolved() {
        let root = graph();
        assert!(resolve(&root, "").is_none());
        assert!(resolve(&root, "   ").is_none());
        assert!(resolve(&root, "nonexistent.path").is_none());
        assert!(resolve(&root, "game.missing.volume").is_none());
        assert!(resolve(&root, "game.playlists.5").is_none());
        assert!(resolve(&root, "game.playlists.name").is_none());
    }

    #[test]
    fn primitives_are_dead_ends() {
        let root = graph();
        assert!(resolve(&root, "game.paused.value").is_none());
        assert!(resolve(&root, "game.soundscape.active.0").is_none());
        assert!(resolve(&root, "a.0.b.length").is_none());
    }

    #[test]
    fn null_leaf_resolves_but_is_a_dead_end() {
        let root = graph();
        assert_eq!(resolve(&root, "game.title"), Some(&Value::Null));
        assert!(resolve(&root, "game.title.inner").is_none());

        let settings = json!({"game": {"settings": {"core": {"theme": null}}}});
        assert_eq!(resolve(&settings, "game.settings.core.theme"), Some(&Value::Null));
    }

    #[test]
    fn leading_index_is_allowed() {
        let root = json!([{"name": "first"}]);
        assert_eq!(resolve(&root, "[0].name"), Some(&json!("first")));
    }

    #[test]
    fn malformed_paths_are_errors_when_parsed() {
        assert_eq!(
            ModulePath::parse("a[0"),
            Err(PathError::UnbalancedBracket(3))
        );
        assert_eq!(ModulePath::parse("a]"), Err(PathError::UnbalancedBracket(1)));
        assert_eq!(ModulePath::parse("a[[0]]"), Err(PathError::UnbalancedBracket(2)));
        assert!(matches!(
            ModulePath::parse("a..b"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            ModulePath::parse("a[0]b"),
            Err(PathError::UnexpectedChar('b', 4))
        ));
        // ... but malformed text is simply unresolved through `resolve`.
        assert!(resolve(&graph(), "a..b").is_none());
    }

    #[test]
    fn parent_leaf_head_tail() {
        let path = ModulePath::parse("game.playlists[0].volume").unwrap();
        assert_eq!(path.to_string(), "game.playlists.0.volume");
        assert_eq!(path.len(), 4);
        assert_eq!(path.head(), Some("game"));
        assert_eq!(path.leaf(), Some("volume"));
        assert_eq!(path.parent().unwrap().to_string(), "game.playlists.0");
        assert_eq!(path.tail().to_string(), "playlists.0.volume");
        assert!(ModulePath::parse("game").unwrap().parent().is_none());
    }

    #[test]
    fn resolve_mut_writes_through() {
        let mut root = graph();
        let path = ModulePath::parse("game.playlists[0].volume").unwrap();
        *path.resolve_mut(&mut root).unwrap() = json!(1.0);
        assert_eq!(resolve(&root, "game.playlists.0.volume"), Some(&json!(1.0)));

        let title = ModulePath::parse("game.title").unwrap();
        assert!(title.resolve_mut(&mut root).is_some());
    }
}
