use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A normalized metadata value, as stored in a [`MetadataRecord`](crate::manager::MetadataRecord)
/// or in a template.
///
/// Serializes untagged, so `"Canon"`, `5`, `0.5` and `["a", "b"]` are all
/// valid JSON for a template field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Number(f64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Build a list of text values.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::Text(s.into())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Items of a list, or the value itself as a one-element slice.
    pub fn items(&self) -> Vec<&Value> {
        match self {
            Value::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// `true` for empty text, empty lists and empty maps.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Integer(_) | Value::Number(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Map(map) => {
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// A tag value as decoded by the EXIF reader, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bytes(Vec<u8>),
    Text(String),
    Int(i64),
    Float(f64),
    /// `(numerator, denominator)`
    Rational(i64, i64),
    IntList(Vec<i64>),
    RationalList(Vec<(i64, i64)>),
    List(Vec<RawValue>),
    Map(BTreeMap<String, RawValue>),
}

/// Parse a free-text field into a scalar or a list.
///
/// A `|` anywhere makes it a pipe-separated list. Otherwise commas separate
/// items and the first item is capitalized, so `"subject, fun"` becomes
/// `["Subject", "fun"]`. Text with neither stays a scalar.
pub fn parse_field_value(text: &str) -> Value {
    if text.contains('|') {
        return Value::list(text.split('|').map(str::trim));
    }
    if text.contains(',') {
        let mut items: Vec<String> = text.split(',').map(|s| s.trim().to_string()).collect();
        if let Some(first) = items.first_mut() {
            *first = capitalize(first);
        }
        return Value::list(items);
    }
    Value::text(text)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}
