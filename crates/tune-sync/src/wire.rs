//! Wire formats of the rendering backend.
//!
//! `GET /param` answers
//! `{"params": {key: {name, widget, min, max, value}}, "order": [key, ...]}`,
//! `GET /param/version` answers `{"version": n}` and the live-update socket
//! carries `{"event": "param_updated", "version": n}` text frames.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use smol_str::SmolStr;
use tracing::warn;
use tune_core::{Metadata, ParamKey, ParamMeta, SyncError, WidgetKind};

const FETCH_METADATA: &str = "fetch metadata";
const FETCH_VERSION: &str = "fetch version";
const LIVE_UPDATE: &str = "live update";

/// A notice received on the live-update socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEvent {
    /// Parameters changed remotely; the artifact for `version` is current.
    ParamUpdated {
        /// Version to adopt.
        version: u64,
    },
}

#[derive(Debug, Deserialize)]
struct MetadataBody {
    params: IndexMap<String, ParamBody>,
    #[serde(default)]
    order: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ParamBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    widget: Option<String>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PushBody {
    event: Option<String>,
    version: Option<Value>,
}

/// Decode a `GET /param` body.
///
/// Unknown widgets fall back to `floatbox`; a missing `order` sorts keys.
pub fn decode_metadata(body: &[u8]) -> Result<Metadata, SyncError> {
    let body: MetadataBody = serde_json::from_slice(body)
        .map_err(|err| SyncError::protocol(FETCH_METADATA, err.to_string()))?;
    let mut entries = Vec::with_capacity(body.params.len());
    for (key, param) in body.params {
        let widget = match param.widget.as_deref() {
            None => WidgetKind::default(),
            Some(name) => WidgetKind::parse(name).unwrap_or_else(|| {
                warn!("parameter '{key}' declares unknown widget '{name}', using floatbox");
                WidgetKind::default()
            }),
        };
        if let (Some(min), Some(max)) = (param.min, param.max) {
            if min > max {
                return Err(SyncError::protocol(
                    FETCH_METADATA,
                    format!("parameter '{key}' has min {min} greater than max {max}"),
                ));
            }
        }
        let value = match param.value {
            Some(Value::Number(number)) => number.as_f64(),
            _ => None,
        }
        .ok_or_else(|| {
            SyncError::protocol(
                FETCH_METADATA,
                format!("parameter '{key}' has no numeric value"),
            )
        })?;
        let meta = ParamMeta {
            display_name: param.name.map(SmolStr::new),
            widget,
            min: param.min,
            max: param.max,
        };
        entries.push((ParamKey::new(key), meta, value));
    }
    let order = body
        .order
        .map(|keys| keys.into_iter().map(ParamKey::new).collect::<Vec<_>>());
    Ok(Metadata::from_entries(entries, order.as_deref()))
}

/// Decode `{"version": n}`. A body without `version` means version `0`.
pub fn decode_version(body: &[u8]) -> Result<u64, SyncError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| SyncError::protocol(FETCH_VERSION, err.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(SyncError::protocol(FETCH_VERSION, "expected a JSON object"));
    };
    match fields.get("version") {
        None | Some(Value::Null) => Ok(0),
        Some(version) => version.as_u64().ok_or_else(|| {
            SyncError::protocol(
                FETCH_VERSION,
                format!("version {version} is not a non-negative integer"),
            )
        }),
    }
}

/// Body of `PUT /param/{key}`: `{"<key>": <number>}`.
///
/// Whole numbers are sent as JSON integers since the backend validates
/// integer parameters strictly.
pub fn encode_write(key: &str, value: f64) -> Result<String, SyncError> {
    let number = whole_number(value)
        .map(Number::from)
        .or_else(|| Number::from_f64(value))
        .ok_or_else(|| {
            SyncError::protocol(
                format!("write '{key}'"),
                format!("{value} cannot be encoded as JSON"),
            )
        })?;
    let mut body = Map::new();
    body.insert(key.to_string(), Value::Number(number));
    Ok(Value::Object(body).to_string())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole_number(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_007_199_254_740_992.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= LIMIT {
        Some(value as i64)
    } else {
        None
    }
}

/// `message` of a backend error body (`{"status": ..., "message": ...}`).
#[must_use]
pub fn decode_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}

/// Decode one live-update frame.
///
/// Well-formed frames for other events yield `Ok(None)`; frames that are not
/// JSON objects, or a `param_updated` without an integer version, are errors.
pub fn decode_push(text: &str) -> Result<Option<PushEvent>, SyncError> {
    let body: PushBody = serde_json::from_str(text)
        .map_err(|err| SyncError::protocol(LIVE_UPDATE, err.to_string()))?;
    if body.event.as_deref() != Some("param_updated") {
        return Ok(None);
    }
    let version = body.version.as_ref().and_then(Value::as_u64).ok_or_else(|| {
        SyncError::protocol(LIVE_UPDATE, "param_updated without an integer version")
    })?;
    Ok(Some(PushEvent::ParamUpdated { version }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn metadata_with_defaults() {
        let body = br#"{
            "params": {
                "b": {"value": 2},
                "a": {"name": "Alpha", "widget": "intslider", "min": 0, "max": 10, "value": 5},
                "c": {"widget": "dial", "min": -1.5, "value": 0.25}
            },
            "order": ["a", "ghost", "b"]
        }"#;
        let metadata = decode_metadata(body).expect("decode");
        let order: Vec<&str> = metadata.order().iter().map(SmolStr::as_str).collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert_eq!(metadata.values.get("a"), Some(5.0));
        let a = &metadata.params["a"];
        assert_eq!(a.label("a"), "Alpha");
        assert_eq!(a.widget, WidgetKind::IntSlider);
        assert_eq!((a.min, a.max), (Some(0.0), Some(10.0)));
        let b = &metadata.params["b"];
        assert_eq!(b.label("b"), "b");
        assert_eq!(b.widget, WidgetKind::FloatBox);
        assert_eq!((b.min, b.max), (None, None));
        let c = &metadata.params["c"];
        assert_eq!(c.widget, WidgetKind::FloatBox);
        assert_eq!((c.min, c.max), (Some(-1.5), None));
    }

    #[test]
    fn metadata_errors() {
        let missing_value = decode_metadata(br#"{"params": {"a": {"min": 0}}}"#);
        assert!(matches!(missing_value, Err(SyncError::Protocol { .. })));
        let text_value = decode_metadata(br#"{"params": {"a": {"value": "5"}}}"#);
        assert!(matches!(text_value, Err(SyncError::Protocol { .. })));
        let inverted = decode_metadata(br#"{"params": {"a": {"min": 5, "max": 1, "value": 3}}}"#)
            .map(|_| ())
            .unwrap_err();
        expect![[r#"malformed fetch metadata response: parameter 'a' has min 5 greater than max 1"#]]
            .assert_eq(&inverted.to_string());
        assert!(decode_metadata(b"[]").is_err());
    }

    #[test]
    fn version_defaults_to_zero() {
        assert_eq!(decode_version(br#"{"version": 12}"#), Ok(12));
        assert_eq!(decode_version(b"{}"), Ok(0));
        assert!(decode_version(br#"{"version": 1.5}"#).is_err());
        assert!(decode_version(br#"{"version": -1}"#).is_err());
        assert!(decode_version(b"12").is_err());
    }

    #[test]
    fn writes_send_whole_numbers_as_integers() {
        assert_eq!(encode_write("inline", 18.0).as_deref(), Ok(r#"{"inline":18}"#));
        assert_eq!(encode_write("aperture", 0.5).as_deref(), Ok(r#"{"aperture":0.5}"#));
        assert!(encode_write("a", f64::NAN).is_err());
        assert!(encode_write("a", f64::INFINITY).is_err());
    }

    #[test]
    fn error_message_from_backend_body() {
        let body = br#"{"status": "failure", "message": "Parameter x does not exist"}"#;
        assert_eq!(
            decode_error_message(body).as_deref(),
            Some("Parameter x does not exist")
        );
        assert_eq!(decode_error_message(b"<html>"), None);
    }

    #[test]
    fn push_frames() {
        assert_eq!(
            decode_push(r#"{"event": "param_updated", "version": 7}"#),
            Ok(Some(PushEvent::ParamUpdated { version: 7 }))
        );
        assert_eq!(decode_push(r#"{"event": "hello"}"#), Ok(None));
        assert!(decode_push(r#"{"event": "param_updated"}"#).is_err());
        assert!(decode_push("not json").is_err());
    }
}
