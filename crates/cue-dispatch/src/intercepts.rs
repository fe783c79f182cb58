//! Methods answered directly from host state instead of through the registry.

use cue_core::{Direction, Normalizer};
use serde_json::Value;

use crate::protocol::parse_index;

pub const GET_SOUNDSCAPE_VALUE: &str = "getSoundscapeValue";
pub const GET_MASTER_VOLUME_VALUE: &str = "getMasterVolumeValue";
pub const READ_VARIABLE: &str = "readVariable";

/// Field searched for the soundscape list when the target itself is not a list.
pub const SOUNDSCAPE_LIST_KEY: &str = "soundscapes";
/// Reply for lookups that do not land on a named entry.
pub const INVALID_INDEX: &str = "Invalid index";

/// Intercepted methods. `readVariable` is routed separately by the dispatcher
/// because it may still call a registered getter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intercept {
    SoundscapeValue,
    MasterVolume,
}

impl Intercept {
    pub fn for_method(method: &str) -> Option<Self> {
        match method {
            GET_SOUNDSCAPE_VALUE => Some(Self::SoundscapeValue),
            GET_MASTER_VOLUME_VALUE => Some(Self::MasterVolume),
            _ => None,
        }
    }
}

/// The list a soundscape query reads: the target when it is a list, otherwise
/// its `soundscapes` field.
fn soundscape_list(target: &Value) -> Option<&Vec<Value>> {
    target
        .as_array()
        .or_else(|| target.get(SOUNDSCAPE_LIST_KEY).and_then(Value::as_array))
}

/// `["count"]` → last index (`len - 1`, 0 for empty or missing lists);
/// `[n]` → display name of entry `n`, or `"Invalid index"`.
pub fn soundscape_value(target: &Value, args: &[Value]) -> Value {
    let list = soundscape_list(target);
    match args.first() {
        Some(Value::String(s)) if s == "count" => {
            let len = list.map_or(0, Vec::len);
            Value::from(len.saturating_sub(1))
        }
        Some(arg) => {
            let entry = list
                .zip(index_arg(arg))
                .and_then(|(items, i)| items.get(i));
            match entry.and_then(display_name) {
                Some(name) => Value::String(name.to_string()),
                None => Value::String(INVALID_INDEX.to_string()),
            }
        }
        None => Value::String(INVALID_INDEX.to_string()),
    }
}

/// Same rules as a legacy index; negatives never land on an entry.
fn index_arg(arg: &Value) -> Option<usize> {
    parse_index(arg).and_then(|i| usize::try_from(i).ok())
}

fn display_name(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(s) => Some(s),
        other => other.get("name").and_then(Value::as_str),
    }
}

/// Raw master volume: a number, or an object's `volume` field.
pub fn raw_volume(target: &Value) -> f64 {
    target
        .as_f64()
        .or_else(|| target.get("volume").and_then(Value::as_f64))
        .unwrap_or(f64::NAN)
}

/// External percentage for a master-volume query. Without a matching outbound
/// rule the raw value is only rounded.
#[allow(clippy::cast_possible_truncation)]
pub fn master_volume(normalizer: &Normalizer, module: &str, target: &Value) -> i64 {
    let raw = raw_volume(target);
    match normalizer.find(Direction::Outbound, GET_MASTER_VOLUME_VALUE, module) {
        Some(rule) => rule.to_external(raw),
        None if raw.is_finite() => raw.round() as i64,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cue_core::NormalizationRule;
    use serde_json::json;

    #[test]
    fn count_is_last_index() {
        let five = json!([1, 2, 3, 4, 5]);
        assert_eq!(soundscape_value(&five, &[json!("count")]), json!(4));
        assert_eq!(soundscape_value(&json!([]), &[json!("count")]), json!(0));
        assert_eq!(soundscape_value(&json!({"x": 1}), &[json!("count")]), json!(0));
        assert_eq!(soundscape_value(&json!(12), &[json!("count")]), json!(0));
    }

    #[test]
    fn count_reads_nested_list() {
        let subsystem = json!({"soundscapes": [{"name": "A"}, {"name": "B"}]});
        assert_eq!(soundscape_value(&subsystem, &[json!("count")]), json!(1));
    }

    #[test]
    fn index_returns_display_name() {
        let list = json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]);
        assert_eq!(soundscape_value(&list, &[json!(2)]), json!("C"));
        assert_eq!(soundscape_value(&list, &[json!("1")]), json!("B"));
        assert_eq!(soundscape_value(&list, &[json!(99)]), json!(INVALID_INDEX));
        assert_eq!(soundscape_value(&list, &[json!(-1)]), json!(INVALID_INDEX));
        assert_eq!(soundscape_value(&list, &[json!("-1")]), json!(INVALID_INDEX));
        assert_eq!(soundscape_value(&list, &[json!(true)]), json!(INVALID_INDEX));
        assert_eq!(soundscape_value(&list, &[]), json!(INVALID_INDEX));
    }

    #[test]
    fn float_index_truncates_like_legacy_index() {
        let list = json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]);
        assert_eq!(soundscape_value(&list, &[json!(2.0)]), json!("C"));
        assert_eq!(soundscape_value(&list, &[json!(1.9)]), json!("B"));
        assert_eq!(soundscape_value(&list, &[json!(-0.5)]), json!("A"));
        assert_eq!(soundscape_value(&list, &[json!(3.2)]), json!(INVALID_INDEX));
    }

    #[test]
    fn index_handles_unnamed_and_string_entries() {
        let list = json!(["Rain", {"title": "no name"}]);
        assert_eq!(soundscape_value(&list, &[json!(0)]), json!("Rain"));
        assert_eq!(soundscape_value(&list, &[json!(1)]), json!(INVALID_INDEX));
    }

    #[test]
    fn master_volume_uses_outbound_rule() {
        let normalizer = Normalizer::default();
        assert_eq!(master_volume(&normalizer, "game.audio", &json!(1.25)), 100);
        assert_eq!(master_volume(&normalizer, "game.audio", &json!(0.625)), 50);
        assert_eq!(
            master_volume(&normalizer, "game.audio", &json!({"volume": 0.25})),
            20
        );
        assert_eq!(master_volume(&normalizer, "game.audio", &json!("loud")), 0);
    }

    #[test]
    fn master_volume_without_rule_rounds_raw() {
        let normalizer = Normalizer::new(vec![NormalizationRule::outbound(
            &["getMasterVolumeValue"],
            "game.mixer",
            1.0,
        )]);
        assert_eq!(master_volume(&normalizer, "game.audio", &json!(42.6)), 43);
        assert_eq!(master_volume(&normalizer, "game.audio", &json!(null)), 0);
        assert_eq!(master_volume(&normalizer, "game.mixer", &json!(0.5)), 50);
    }

    #[test]
    fn intercept_lookup() {
        assert_eq!(
            Intercept::for_method("getSoundscapeValue"),
            Some(Intercept::SoundscapeValue)
        );
        assert_eq!(
            Intercept::for_method("getMasterVolumeValue"),
            Some(Intercept::MasterVolume)
        );
        assert_eq!(Intercept::for_method("readVariable"), None);
        assert_eq!(Intercept::for_method("setVolume"), None);
    }
}
