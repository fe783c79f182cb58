//! Wire-format types for the controller protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DispatchError;

/// A full invocation request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    /// Dotted/bracketed path of the invocation target.
    #[serde(default)]
    pub module: String,
    /// Operation to invoke on the resolved target.
    #[serde(default)]
    pub method: String,
    /// Positional arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    /// Correlation token echoed verbatim in any response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
}

impl InboundRequest {
    pub fn new(module: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            module: module.into(),
            method: method.into(),
            args: Some(args),
            request_id: None,
        }
    }

    /// The request id to echo, `null` when the request had none.
    pub fn echo_id(&self) -> Value {
        self.request_id.clone().unwrap_or(Value::Null)
    }
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    Request(InboundRequest),
    /// Legacy `{ "index": n }` selection, carrying the raw index value (`null`
    /// when the frame has no `index` field).
    LegacyIndex(Value),
}

/// Decode one text frame. Anything with `module` or `method` is a full request;
/// every other object is a legacy selection, valid or not.
pub fn parse_frame(text: &str) -> Result<InboundMessage, DispatchError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DispatchError::Malformed(e.to_string()))?;
    let Value::Object(fields) = &value else {
        return Err(DispatchError::Malformed("frame is not a JSON object".into()));
    };

    if fields.contains_key("module") || fields.contains_key("method") {
        let request: InboundRequest = serde_json::from_value(value)
            .map_err(|e| DispatchError::Malformed(e.to_string()))?;
        return Ok(InboundMessage::Request(request));
    }
    let index = fields.get("index").cloned().unwrap_or(Value::Null);
    Ok(InboundMessage::LegacyIndex(index))
}

/// Interpret an index argument: integers, finite floats (truncated toward
/// zero), or text starting with an integer (`"3"`, `" 4 tracks"`, `"-1"`).
/// Range checks belong to whoever consumes the index.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            let t = f.trunc();
            (t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64).then(|| t as i64)
        }
        Value::String(s) => parse_int_prefix(s),
        _ => None,
    }
}

/// Parse the leading integer of `s`, ignoring leading whitespace and any
/// trailing text.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(digits.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Messages sent back to the controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundResponse {
    /// Generic query result.
    DataResponse {
        value: Value,
        #[serde(rename = "requestId")]
        request_id: Value,
    },
    /// Soundscape list lookups (entry name or count).
    SoundscapeData {
        value: Value,
        #[serde(rename = "requestId")]
        request_id: Value,
    },
    /// Master volume as an external percentage.
    MasterVolumeUpdate {
        volume: i64,
        #[serde(rename = "requestId")]
        request_id: Value,
    },
}

impl OutboundResponse {
    pub fn request_id(&self) -> &Value {
        match self {
            Self::DataResponse { request_id, .. }
            | Self::SoundscapeData { request_id, .. }
            | Self::MasterVolumeUpdate { request_id, .. } => request_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_full_request() {
        let msg = parse_frame(
            r#"{"module":"game.audio","method":"setMasterVolume","args":[80],"requestId":"r1"}"#,
        )
        .unwrap();
        let InboundMessage::Request(req) = msg else {
            panic!("expected request");
        };
        assert_eq!(req.module, "game.audio");
        assert_eq!(req.method, "setMasterVolume");
        assert_eq!(req.args, Some(vec![json!(80)]));
        assert_eq!(req.echo_id(), json!("r1"));
    }

    #[test]
    fn args_and_request_id_are_optional() {
        let InboundMessage::Request(req) =
            parse_frame(r#"{"module":"canvas","method":"pan","requestId":null}"#).unwrap()
        else {
            panic!("expected request");
        };
        assert!(req.args.is_none());
        assert_eq!(req.echo_id(), Value::Null);
    }

    #[test]
    fn numeric_request_id_kept_verbatim() {
        let InboundMessage::Request(req) =
            parse_frame(r#"{"module":"a","method":"b","requestId":42}"#).unwrap()
        else {
            panic!("expected request");
        };
        assert_eq!(req.echo_id(), json!(42));
    }

    #[test]
    fn parse_legacy_index() {
        assert_eq!(
            parse_frame(r#"{"index": 3}"#).unwrap(),
            InboundMessage::LegacyIndex(json!(3))
        );
    }

    #[test]
    fn parse_failures() {
        assert!(matches!(parse_frame("not json"), Err(DispatchError::Malformed(_))));
        assert!(matches!(parse_frame("[1,2]"), Err(DispatchError::Malformed(_))));
        assert!(matches!(
            parse_frame(r#"{"module": 5, "method": "x"}"#),
            Err(DispatchError::Malformed(_))
        ));
        assert!(matches!(
            parse_frame(r#"{"module":"a","method":"b","args":"oops"}"#),
            Err(DispatchError::Malformed(_))
        ));
    }

    #[test]
    fn object_without_request_fields_is_legacy() {
        assert_eq!(parse_frame("{}").unwrap(), InboundMessage::LegacyIndex(Value::Null));
        assert_eq!(
            parse_frame(r#"{"idx": 2}"#).unwrap(),
            InboundMessage::LegacyIndex(Value::Null)
        );
    }

    #[test]
    fn index_parsing_follows_integer_prefix_rules() {
        assert_eq!(parse_index(&json!(2)), Some(2));
        assert_eq!(parse_index(&json!(2.9)), Some(2));
        assert_eq!(parse_index(&json!("4")), Some(4));
        assert_eq!(parse_index(&json!("  7 tracks")), Some(7));
        assert_eq!(parse_index(&json!("+1")), Some(1));
        assert_eq!(parse_index(&json!("abc")), None);
        assert_eq!(parse_index(&json!("-1")), Some(-1));
        assert_eq!(parse_index(&json!(-3)), Some(-3));
        assert_eq!(parse_index(&json!(-2.5)), Some(-2));
        assert_eq!(parse_index(&json!(u64::MAX)), None);
        assert_eq!(parse_index(&json!(null)), None);
        assert_eq!(parse_index(&json!([1])), None);
        assert_eq!(parse_int_prefix("-12x"), Some(-12));
        assert_eq!(parse_int_prefix("-"), None);
    }

    #[test]
    fn responses_serialize_with_type_tags() {
        let data = OutboundResponse::DataResponse {
            value: json!({"a": 1}),
            request_id: json!("q"),
        };
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({"type": "dataResponse", "value": {"a": 1}, "requestId": "q"})
        );

        let soundscape = OutboundResponse::SoundscapeData {
            value: json!("Tavern"),
            request_id: Value::Null,
        };
        assert_eq!(
            serde_json::to_value(&soundscape).unwrap(),
            json!({"type": "soundscapeData", "value": "Tavern", "requestId": null})
        );

        let volume = OutboundResponse::MasterVolumeUpdate {
            volume: 80,
            request_id: json!(7),
        };
        assert_eq!(
            serde_json::to_value(&volume).unwrap(),
            json!({"type": "masterVolumeUpdate", "volume": 80, "requestId": 7})
        );
        assert_eq!(volume.request_id(), &json!(7));
    }
}
