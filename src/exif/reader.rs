use nom_exif::*;
use regex::bytes::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use super::tags::{self, Ifd};
use crate::error::{MetaError, Result};
use crate::value::RawValue;

// nom-exif reports the thumbnail IFD as index 1.
const THUMBNAIL_IFD_INDEX: usize = 1;

static USER_COMMENT_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)\A(?:ASCII|UNICODE|JIS)[ \t]*\x00+").expect("static regex")
});

/// Read every EXIF tag from an image, keyed by tag name.
///
/// The thumbnail IFD is skipped. Tags missing from the standard dictionary
/// are named `<IFD>:0x<TAG>`. When the same name occurs twice, the first
/// (primary image) occurrence wins.
///
/// The IFD part of a fallback name is approximate. The parser reports only
/// the top-level IFD index, so unknown tags from the Exif and GPS sub-IFDs
/// are also named `0th:0x…`. Match on the tag code, not the prefix.
pub fn read_exif(path: &Path) -> Result<BTreeMap<String, RawValue>> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).map_err(|e| MetaError::Codec(e.to_string()))?;

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(e) => {
            log::debug!("No EXIF data found in {}: {e}", path.display());
            return Ok(BTreeMap::new());
        }
    };

    let mut tags = BTreeMap::new();
    for mut entry in iter {
        let ifd_index = entry.ifd_index();
        if ifd_index == THUMBNAIL_IFD_INDEX {
            continue;
        }
        let code = entry.tag_code();
        let Some(value) = entry.take_value() else {
            log::debug!("Skipping undecodable tag 0x{code:04X}");
            continue;
        };

        let name = match tags::tag_name(code) {
            Some(name) => name.to_string(),
            None => tags::fallback_name(ifd_for_index(ifd_index), code),
        };
        let raw = if name.starts_with("XP") {
            decode_xp(value)
        } else if code == tags::TAG_USER_COMMENT {
            decode_user_comment(value)
        } else {
            entry_to_raw(value)
        };
        tags.entry(name).or_insert(raw);
    }

    log::debug!("Read {} EXIF tags from {}", tags.len(), path.display());
    Ok(tags)
}

fn ifd_for_index(index: usize) -> Ifd {
    match index {
        0 => Ifd::Zeroth,
        _ => Ifd::First,
    }
}

/// Convert a nom-exif value to its raw form.
fn entry_to_raw(value: EntryValue) -> RawValue {
    match value {
        EntryValue::Text(s) => RawValue::Bytes(s.into_bytes()),
        EntryValue::URational(r) => RawValue::Rational(r.0 as i64, r.1 as i64),
        EntryValue::IRational(r) => RawValue::Rational(r.0 as i64, r.1 as i64),
        EntryValue::U8(v) => RawValue::Int(v as i64),
        EntryValue::U16(v) => RawValue::Int(v as i64),
        EntryValue::U32(v) => RawValue::Int(v as i64),
        EntryValue::I8(v) => RawValue::Int(v as i64),
        EntryValue::I16(v) => RawValue::Int(v as i64),
        EntryValue::I32(v) => RawValue::Int(v as i64),
        EntryValue::F32(v) => RawValue::Float(v as f64),
        EntryValue::F64(v) => RawValue::Float(v),
        EntryValue::Undefined(bytes) => RawValue::Bytes(bytes),
        EntryValue::URationalArray(v) => {
            rationals(v.iter().map(|r| (r.0 as i64, r.1 as i64)).collect())
        }
        EntryValue::IRationalArray(v) => {
            rationals(v.iter().map(|r| (r.0 as i64, r.1 as i64)).collect())
        }
        EntryValue::U8Array(v) => RawValue::IntList(v.into_iter().map(i64::from).collect()),
        EntryValue::U16Array(v) => RawValue::IntList(v.into_iter().map(i64::from).collect()),
        EntryValue::U32Array(v) => RawValue::IntList(v.into_iter().map(i64::from).collect()),
        EntryValue::Time(t) => RawValue::Text(t.format("%Y:%m:%d %H:%M:%S").to_string()),
        other => RawValue::Text(other.to_string()),
    }
}

fn rationals(pairs: Vec<(i64, i64)>) -> RawValue {
    if let [(num, den)] = pairs[..] {
        return RawValue::Rational(num, den);
    }
    RawValue::RationalList(pairs)
}

/// Byte payload of a value, or the value back if it carries none.
fn entry_bytes(value: EntryValue) -> std::result::Result<Vec<u8>, EntryValue> {
    match value {
        EntryValue::U8Array(v) | EntryValue::Undefined(v) => Ok(v),
        EntryValue::Text(s) => Ok(s.into_bytes()),
        other => Err(other),
    }
}

/// `XP*` tags carry UTF-16LE text, optionally holding several `;`-separated values.
fn decode_xp(value: EntryValue) -> RawValue {
    if let EntryValue::Text(s) = value {
        return split_to_raw(&s);
    }
    match entry_bytes(value) {
        Ok(bytes) => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            split_to_raw(&String::from_utf16_lossy(&units))
        }
        Err(other) => entry_to_raw(other),
    }
}

fn split_to_raw(text: &str) -> RawValue {
    let parts: Vec<&str> = text
        .split(|c| c == ';' || c == ',' || c == '\0')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    match parts[..] {
        [] => RawValue::Text(String::new()),
        [single] => RawValue::Text(single.to_string()),
        _ => RawValue::List(parts.iter().map(|p| RawValue::Text(p.to_string())).collect()),
    }
}

/// Drop the charset designator from a `UserComment` payload.
fn decode_user_comment(value: EntryValue) -> RawValue {
    match entry_bytes(value) {
        Ok(bytes) => RawValue::Bytes(strip_charset_header(&bytes).to_vec()),
        Err(other) => entry_to_raw(other),
    }
}

pub(crate) fn strip_charset_header(bytes: &[u8]) -> &[u8] {
    match USER_COMMENT_CHARSET.find(bytes) {
        Some(m) => &bytes[m.end()..],
        None => bytes,
    }
}
