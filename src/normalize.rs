//! Conversion of raw decoded tag values into display/storage friendly values.
//!
//! Everything here is total: malformed input degrades to a best-effort string
//! (ultimately a hex summary) instead of an error.

use crate::value::{RawValue, Value};
use std::collections::BTreeMap;

/// Number of leading bytes shown in a hex summary.
const HEX_SUMMARY_BYTES: usize = 16;

/// Normalize a raw tag value.
pub fn normalize(raw: &RawValue) -> Value {
    match raw {
        RawValue::Bytes(bytes) => Value::Text(decode_bytes(bytes)),
        RawValue::Text(s) => Value::Text(strip_trailing_controls(s).to_string()),
        RawValue::Int(i) => Value::Integer(*i),
        RawValue::Float(f) => Value::Number(*f),
        RawValue::Rational(num, den) => rational(*num, *den),
        RawValue::IntList(ints) => int_list(ints),
        RawValue::RationalList(pairs) => rational_list(pairs),
        RawValue::List(items) => Value::List(items.iter().map(normalize).collect()),
        RawValue::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (normalize_key(k).to_string(), normalize(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

/// Strip a leading `{namespace-uri}` from an element or attribute name.
pub fn normalize_key(key: &str) -> &str {
    if key.starts_with('{') {
        if let Some(end) = key.find('}') {
            return &key[end + 1..];
        }
    }
    key
}

/// Decode a byte string, trying UTF-8, UTF-16LE, UTF-16BE and Latin-1 in turn.
///
/// The first decoding that is non-empty after stripping trailing NUL and
/// control characters wins. If none does, a hex summary is returned.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let candidates = [
        std::str::from_utf8(bytes).ok().map(str::to_string),
        decode_utf16(bytes, u16::from_le_bytes),
        decode_utf16(bytes, u16::from_be_bytes),
        Some(decode_latin1(bytes)),
    ];
    candidates
        .into_iter()
        .flatten()
        .map(|s| strip_trailing_controls(&s).to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| hex_summary(bytes))
}

/// Strict UTF-16 decode; `None` on odd length or unpaired surrogates.
pub(crate) fn decode_utf16(bytes: &[u8], word: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| word([c[0], c[1]])).collect();
    String::from_utf16(&units).ok()
}

pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn hex_summary(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(HEX_SUMMARY_BYTES)];
    format!("<bytes {} bytes: {}...>", bytes.len(), hex::encode(shown))
}

fn is_control(c: char) -> bool {
    (c as u32) < 0x20 || c == '\u{7f}'
}

fn strip_trailing_controls(s: &str) -> &str {
    s.trim_end_matches(is_control)
}

/// Split text on `;`, `,` and NUL runs.
///
/// More than one non-empty part gives a list; otherwise the cleaned text is
/// returned as a scalar.
pub fn split_parts(text: &str) -> Value {
    let parts: Vec<&str> = text
        .split(|c| c == ';' || c == ',' || c == '\0')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() > 1 {
        return Value::list(parts);
    }
    let cleaned: String = text.chars().filter(|c| !is_control(*c)).collect();
    Value::Text(cleaned.trim().to_string())
}

fn rational_to_f64(num: i64, den: i64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn round8(x: f64) -> f64 {
    (x * 1e8).round() / 1e8
}

fn rational(num: i64, den: i64) -> Value {
    if den == 0 {
        return Value::Number(0.0);
    }
    let q = num as f64 / den as f64;
    if q.is_nan() {
        return Value::Text(format!("{num}/{den}"));
    }
    Value::Number(round8(q))
}

fn int_list(ints: &[i64]) -> Value {
    if ints.is_empty() {
        return Value::List(Vec::new());
    }
    if !ints.iter().all(|i| (0..=255).contains(i)) {
        return Value::List(ints.iter().map(|i| Value::Integer(*i)).collect());
    }
    let bytes: Vec<u8> = ints.iter().map(|&i| i as u8).collect();
    let decoded = [
        decode_utf16(&bytes, u16::from_le_bytes),
        std::str::from_utf8(&bytes).ok().map(str::to_string),
        Some(decode_latin1(&bytes)),
    ]
    .into_iter()
    .flatten()
    .map(|s| strip_trailing_controls(&s).to_string())
    .find(|s| !s.is_empty());

    match decoded {
        Some(text) => split_parts(&text),
        None => Value::Text(hex_summary(&bytes)),
    }
}

fn rational_list(pairs: &[(i64, i64)]) -> Value {
    let floats: Vec<f64> = pairs.iter().map(|&(n, d)| rational_to_f64(n, d)).collect();
    if let [deg, min, sec] = floats[..] {
        return Value::Number(deg + min / 60.0 + sec / 3600.0);
    }
    Value::List(floats.into_iter().map(|f| Value::Number(round8(f))).collect())
}
