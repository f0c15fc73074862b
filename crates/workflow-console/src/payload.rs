//! Dynamic values carried by timeline events.
//!
//! Events mix wire messages, error values and arbitrary objects handed over by
//! the host UI. `Payload` models all of them so the stringifier can render any
//! of them without failing.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::errors::StringifyError;

/// A value able to render itself as JSON, such as a generated message type.
///
/// Each method returns `None` when the value has no such conversion.
pub trait JsonConvertible: fmt::Debug + Send + Sync {
    /// Ready-made JSON text, used verbatim.
    fn to_json_string(&self) -> Option<Result<String, StringifyError>> {
        None
    }

    /// JSON-shaped value, serialized by the caller.
    fn to_json(&self) -> Option<Result<Payload, StringifyError>> {
        None
    }

    /// Plain object form, serialized by the caller.
    fn to_plain_object(&self) -> Option<Result<Payload, StringifyError>> {
        None
    }

    /// Default string conversion.
    fn display(&self) -> Result<String, StringifyError> {
        Ok("[object Object]".to_string())
    }
}

/// Identity-bearing payload node.
///
/// Two clones of the same `SharedPayload` are the same node; this is the only
/// way a payload graph can reference itself.
#[derive(Clone)]
pub struct SharedPayload(Arc<RwLock<Payload>>);

impl SharedPayload {
    pub fn new(value: Payload) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Stable identity of the node for the lifetime of any clone.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Runs `f` against the current value.
    pub fn read<R>(&self, f: impl FnOnce(&Payload) -> R) -> Result<R, StringifyError> {
        let guard = self.0.read().map_err(|_| StringifyError::Poisoned)?;
        Ok(f(&guard))
    }

    /// Mutates the value in place, e.g. to close a reference cycle.
    pub fn update(&self, f: impl FnOnce(&mut Payload)) -> Result<(), StringifyError> {
        let mut guard = self.0.write().map_err(|_| StringifyError::Poisoned)?;
        f(&mut guard);
        Ok(())
    }
}

impl fmt::Debug for SharedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedPayload({:#x})", self.id())
    }
}

#[derive(Clone, Debug)]
pub enum Payload {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    Symbol(Option<String>),
    Function {
        name: Option<String>,
    },
    Error {
        name: String,
        message: String,
        stack: Option<String>,
    },
    Date(DateTime<Utc>),
    RegExp {
        source: String,
        flags: String,
    },
    Array(Vec<Payload>),
    /// Object fields in insertion order.
    Object(Vec<(String, Payload)>),
    Map(Vec<(Payload, Payload)>),
    Set(Vec<Payload>),
    /// Host document node.
    Node {
        node_name: Option<String>,
    },
    Shared(SharedPayload),
    Convertible(Arc<dyn JsonConvertible>),
}

impl Payload {
    pub fn object<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Payload>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn shared(value: Payload) -> Self {
        Self::Shared(SharedPayload::new(value))
    }

    /// Looks up a named field on object-like values.
    ///
    /// Objects (directly or behind a shared node) expose their keys and errors
    /// expose `name`, `message` and `stack`. A key present with an undefined
    /// value yields `Some(Payload::Undefined)`.
    pub fn field(&self, key: &str) -> Option<Payload> {
        match self {
            Payload::Object(fields) => fields
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            Payload::Error {
                name,
                message,
                stack,
            } => match key {
                "name" => Some(Payload::String(name.clone())),
                "message" => Some(Payload::String(message.clone())),
                "stack" => stack.clone().map(Payload::String),
                _ => None,
            },
            Payload::Shared(node) => node.read(|inner| inner.field(key)).ok().flatten(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Payload::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Payload::Undefined | Payload::Null)
    }

    /// Values other than primitives and functions.
    pub fn is_object_like(&self) -> bool {
        !matches!(
            self,
            Payload::Undefined
                | Payload::Bool(_)
                | Payload::Number(_)
                | Payload::BigInt(_)
                | Payload::String(_)
                | Payload::Symbol(_)
                | Payload::Function { .. }
        )
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Payload::Undefined | Payload::Null => false,
            Payload::Bool(b) => *b,
            Payload::Number(n) => *n != 0.0 && !n.is_nan(),
            Payload::BigInt(n) => *n != 0,
            Payload::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Default string conversion, in the style of a script engine's
    /// `String(value)`.
    pub fn try_display(&self) -> Result<String, StringifyError> {
        self.display_inner(&mut HashSet::new())
    }

    fn display_inner(&self, seen: &mut HashSet<usize>) -> Result<String, StringifyError> {
        Ok(match self {
            Payload::Undefined => "undefined".to_string(),
            Payload::Null => "null".to_string(),
            Payload::Bool(b) => b.to_string(),
            Payload::Number(n) => js_number(*n),
            Payload::BigInt(n) => n.to_string(),
            Payload::String(s) => s.clone(),
            Payload::Symbol(desc) => format!("Symbol({})", desc.as_deref().unwrap_or_default()),
            Payload::Function { name } => function_placeholder(name.as_deref()),
            Payload::Error { name, message, .. } => error_display(name, message),
            Payload::Date(date) => date.format("%a %b %d %Y %H:%M:%S GMT%z").to_string(),
            Payload::RegExp { source, flags } => format!("/{source}/{flags}"),
            Payload::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(if item.is_nullish() {
                        String::new()
                    } else {
                        item.display_inner(seen)?
                    });
                }
                parts.join(",")
            }
            Payload::Set(_) => "[object Set]".to_string(),
            Payload::Object(_) => "[object Object]".to_string(),
            Payload::Map(_) => "[object Map]".to_string(),
            Payload::Node { .. } => "[object Node]".to_string(),
            Payload::Shared(node) => {
                if !seen.insert(node.id()) {
                    return Ok(String::new());
                }
                node.read(|inner| inner.display_inner(seen))??
            }
            Payload::Convertible(value) => value.display()?,
        })
    }
}

pub(crate) fn function_placeholder(name: Option<&str>) -> String {
    match name.filter(|n| !n.is_empty()) {
        Some(name) => format!("[Function: {name}]"),
        None => "[Function]".to_string(),
    }
}

pub(crate) fn error_display(name: &str, message: &str) -> String {
    let name = if name.is_empty() { "Error" } else { name };
    if message.is_empty() {
        name.to_string()
    } else {
        format!("{name}: {message}")
    }
}

/// Formats a number the way script engines print it: integers without a
/// fractional part, `NaN`/`Infinity` spelled out, exponents signed.
pub fn js_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        if n.fract() == 0.0 {
            format!("{n:.0}")
        } else {
            n.to_string()
        }
    } else {
        let formatted = format!("{n:e}");
        match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::String(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::String(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Number(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Number(value as f64)
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Payload::Number(f64::from(value))
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(value: Vec<Payload>) -> Self {
        Payload::Array(value)
    }
}

impl From<SharedPayload> for Payload {
    fn from(value: SharedPayload) -> Self {
        Payload::Shared(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Payload::Null,
            serde_json::Value::Bool(b) => Payload::Bool(b),
            serde_json::Value::Number(n) => {
                n.as_f64().map(Payload::Number).unwrap_or(Payload::Null)
            }
            serde_json::Value::String(s) => Payload::String(s),
            serde_json::Value::Array(items) => {
                Payload::Array(items.into_iter().map(Payload::from).collect())
            }
            serde_json::Value::Object(map) => Payload::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Payload::from(v)))
                    .collect(),
            ),
        }
    }
}
