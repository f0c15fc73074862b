//! Total "stringify anything" used by log rows and copy actions.

use std::collections::HashSet;

use chrono::SecondsFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::StringifyError;
use crate::payload::{JsonConvertible, Payload, error_display, function_placeholder};

/// Returned when every rendering path failed.
pub const UNSERIALIZABLE: &str = "[Unserializable]";
/// Replaces a shared node already visited in the same call.
pub const CIRCULAR: &str = "[Circular]";

/// Renders `payload` as display text. Never fails.
///
/// Strings are returned verbatim and nullish values as an empty string.
/// Errors render their stack or message, UI synthetic events a short
/// placeholder, and convertible values their own JSON form. Everything else
/// is pretty-printed JSON with 2-space indentation in which functions, dates,
/// patterns, maps, sets and host nodes are replaced by readable stand-ins and
/// revisited shared nodes by `[Circular]`.
pub fn stringify(payload: &Payload) -> String {
    stringify_checked(payload).unwrap_or_else(|| UNSERIALIZABLE.to_string())
}

/// Like [`stringify`], but returns `None` where `stringify` would fall back
/// to [`UNSERIALIZABLE`].
pub fn stringify_checked(payload: &Payload) -> Option<String> {
    let resolved = match payload {
        Payload::Shared(node) => node.read(Payload::clone).ok(),
        _ => None,
    };
    let head = resolved.as_ref().unwrap_or(payload);

    match head {
        Payload::Undefined | Payload::Null => return Some(String::new()),
        Payload::String(s) => return Some(s.clone()),
        Payload::Error {
            name,
            message,
            stack,
        } => return Some(error_text(name, message, stack.as_deref())),
        _ => {}
    }
    if let Some(placeholder) = synthetic_event(head) {
        return Some(placeholder);
    }
    if let Payload::Convertible(value) = head
        && let Some(text) = via_conversion(value.as_ref())
    {
        return Some(text);
    }

    match safe_stringify(payload) {
        Ok(text) => Some(text),
        Err(e) => {
            debug!(error = %e, "JSON rendering failed; using default conversion");
            payload.try_display().ok()
        }
    }
}

fn error_text(name: &str, message: &str, stack: Option<&str>) -> String {
    match stack.filter(|s| !s.is_empty()) {
        Some(stack) => stack.to_string(),
        None if !message.is_empty() => message.to_string(),
        None => error_display(name, message),
    }
}

/// Detects UI framework event wrappers, which carry a native event and an
/// `isDefaultPrevented` marker and usually reference the whole UI tree.
fn synthetic_event(payload: &Payload) -> Option<String> {
    let native = payload.field("nativeEvent")?;
    if !native.is_object_like() {
        return None;
    }
    payload.field("isDefaultPrevented")?;
    let event_type = payload
        .field("type")
        .and_then(|t| t.as_str().map(str::to_owned))
        .unwrap_or_else(|| "unknown".to_string());
    Some(format!("[SyntheticEvent type={event_type}]"))
}

fn via_conversion(value: &dyn JsonConvertible) -> Option<String> {
    match value.to_json_string() {
        Some(Ok(text)) => return Some(text),
        Some(Err(e)) => debug!(error = %e, "to_json_string failed"),
        None => {}
    }
    let converted = [value.to_json(), value.to_plain_object()];
    for candidate in converted.into_iter().flatten() {
        match candidate.and_then(|p| safe_stringify(&p)) {
            Ok(text) => return Some(text),
            Err(e) => debug!(error = %e, "JSON conversion failed"),
        }
    }
    None
}

fn safe_stringify(payload: &Payload) -> Result<String, StringifyError> {
    let mut seen = HashSet::new();
    let value = to_json_value(payload, &mut seen)?.ok_or(StringifyError::Unsupported)?;
    serde_json::to_string_pretty(&value).map_err(|e| StringifyError::conversion(e.to_string()))
}

fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Converts one value; `None` means "omit" (undefined).
fn to_json_value(
    payload: &Payload,
    seen: &mut HashSet<usize>,
) -> Result<Option<Value>, StringifyError> {
    let value = match payload {
        Payload::Undefined => return Ok(None),
        Payload::Null => Value::Null,
        Payload::Bool(b) => Value::Bool(*b),
        Payload::Number(n) => number_value(*n),
        Payload::BigInt(n) => Value::String(n.to_string()),
        Payload::String(s) => Value::String(s.clone()),
        Payload::Symbol(desc) => {
            Value::String(format!("Symbol({})", desc.as_deref().unwrap_or_default()))
        }
        Payload::Function { name } => Value::String(function_placeholder(name.as_deref())),
        Payload::Error {
            name,
            message,
            stack,
        } => {
            let mut map = serde_json::Map::new();
            map.insert("name".into(), Value::String(name.clone()));
            map.insert("message".into(), Value::String(message.clone()));
            if let Some(stack) = stack {
                map.insert("stack".into(), Value::String(stack.clone()));
            }
            Value::Object(map)
        }
        Payload::Date(date) => {
            Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Payload::RegExp { source, flags } => Value::String(format!("/{source}/{flags}")),
        Payload::Array(items) | Payload::Set(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_json_value(item, seen)?.unwrap_or(Value::Null));
            }
            Value::Array(out)
        }
        Payload::Object(fields) => {
            let mut map = serde_json::Map::new();
            for (key, field) in fields {
                if let Some(value) = to_json_value(field, seen)? {
                    map.insert(key.clone(), value);
                }
            }
            Value::Object(map)
        }
        Payload::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (key, entry) in entries {
                let key = key.try_display()?;
                if let Some(value) = to_json_value(entry, seen)? {
                    map.insert(key, value);
                }
            }
            Value::Object(map)
        }
        Payload::Node { node_name } => Value::String(format!(
            "[Node {}]",
            node_name.as_deref().unwrap_or("?")
        )),
        Payload::Shared(node) => {
            if !seen.insert(node.id()) {
                return Ok(Some(Value::String(CIRCULAR.to_string())));
            }
            return node.read(|inner| to_json_value(inner, seen))?;
        }
        Payload::Convertible(convertible) => {
            let converted = convertible
                .to_json()
                .or_else(|| convertible.to_plain_object())
                .ok_or(StringifyError::Unsupported)??;
            return to_json_value(&converted, seen);
        }
    };
    Ok(Some(value))
}
