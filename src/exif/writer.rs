use img_parts::{Bytes, DynImage, ImageEXIF};
use little_exif::endian::Endian;
use little_exif::exif_tag::{ExifTag, ExifTagGroup};
use little_exif::exif_tag_format::ExifTagFormat;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::collections::BTreeMap;
use std::path::Path;

use super::tags::{self, Encoding, WritableTag};
use crate::error::{MetaError, Result};
use crate::value::Value;

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10;

/// Charset header written in front of every `UserComment`.
pub const USER_COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";

/// Encode a string as UTF-16LE bytes (used for XP* tags).
fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
    // Null terminator
    bytes.push(0);
    bytes.push(0);
    bytes
}

/// Create an XP* tag (UTF-16LE encoded, IFD0 group).
fn make_xp_tag(tag_id: u16, raw_data: Vec<u8>) -> Option<ExifTag> {
    ExifTag::from_u16_with_data(
        tag_id,
        &ExifTagFormat::INT8U,
        &raw_data,
        &Endian::Little,
        &ExifTagGroup::IFD0,
    )
    .ok()
}

/// Load existing EXIF metadata from a file path using little_exif.
/// Returns None if it can't parse.
fn load_existing_metadata(path: &Path) -> Option<Metadata> {
    let path_owned = path.to_path_buf();
    // Suppress panics from little_exif
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let result = std::panic::catch_unwind(move || Metadata::new_from_path(&path_owned));
    std::panic::set_hook(prev_hook);

    match result {
        Ok(Ok(m)) => {
            log::debug!("little_exif loaded {} existing EXIF tags", m.data().len());
            Some(m)
        }
        Ok(Err(e)) => {
            log::debug!("little_exif could not parse EXIF: {e}");
            None
        }
        Err(_) => {
            log::debug!("little_exif panicked parsing EXIF");
            None
        }
    }
}

/// Bytes to store for a writable tag, following its encoding rule.
///
/// Lists of byte-sized integers are taken as already-encoded payloads.
/// Other lists are joined (`;` for XP tags, `; ` otherwise). Maps are not
/// writable.
pub(crate) fn encode_value(tag: &WritableTag, value: &Value) -> Option<Vec<u8>> {
    let text = match value {
        Value::List(items) => {
            if let Some(raw) = byte_payload(items) {
                return Some(raw);
            }
            let sep = if tag.encoding == Encoding::Utf16Le { ";" } else { "; " };
            items.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(sep)
        }
        Value::Map(_) => return None,
        other => other.to_string(),
    };

    Some(match tag.encoding {
        Encoding::Text => text.into_bytes(),
        Encoding::Utf16Le => encode_utf16le(&text),
        Encoding::UserComment => {
            let bytes = text.into_bytes();
            if bytes.starts_with(USER_COMMENT_ASCII) {
                bytes
            } else {
                let mut out = USER_COMMENT_ASCII.to_vec();
                out.extend_from_slice(&bytes);
                out
            }
        }
    })
}

fn byte_payload(items: &[Value]) -> Option<Vec<u8>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|v| match v {
            Value::Integer(i) => u8::try_from(*i).ok(),
            _ => None,
        })
        .collect()
}

fn make_tag(tag: &WritableTag, bytes: Vec<u8>) -> Option<ExifTag> {
    if tag.encoding == Encoding::Utf16Le {
        return make_xp_tag(tag.id, bytes);
    }
    if tag.encoding == Encoding::UserComment {
        return Some(ExifTag::UserComment(bytes));
    }
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let exif_tag = match tag.name {
        "Artist" => ExifTag::Artist(text),
        "Copyright" => ExifTag::Copyright(text),
        "ImageDescription" => ExifTag::ImageDescription(text),
        "Software" => ExifTag::Software(text),
        "DateTime" => ExifTag::ModifyDate(text),
        "Make" => ExifTag::Make(text),
        "Model" => ExifTag::Model(text),
        "DateTimeOriginal" => ExifTag::DateTimeOriginal(text),
        "DateTimeDigitized" => ExifTag::CreateDate(text),
        _ => return None,
    };
    Some(exif_tag)
}

/// Translate a tag-name map into little_exif tags, dropping anything outside
/// the writable allow-list.
fn collect_tags(values: &BTreeMap<String, Value>) -> Vec<ExifTag> {
    let mut out = Vec::new();
    for (name, value) in values {
        let Some(tag) = tags::writable(name) else {
            log::debug!("Dropping non-writable EXIF tag {name}");
            continue;
        };
        match encode_value(tag, value).and_then(|bytes| make_tag(tag, bytes)) {
            Some(exif_tag) => out.push(exif_tag),
            None => log::debug!("Could not encode EXIF tag {name}"),
        }
    }
    out
}

/// Write EXIF tags to an image.
///
/// With `merge`, existing tags are loaded first and overlaid; otherwise the
/// file's EXIF is replaced by exactly the given tags. An empty map without
/// `merge` strips EXIF entirely.
pub fn write_exif(path: &Path, values: &BTreeMap<String, Value>, merge: bool) -> Result<()> {
    let mut metadata = if merge {
        load_existing_metadata(path).unwrap_or_else(Metadata::new)
    } else {
        Metadata::new()
    };
    let new_tags = collect_tags(values);
    let count = new_tags.len();
    for tag in new_tags {
        metadata.set_tag(tag);
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "webp" => replace_exif_segment(path, &metadata)?,
        _ => metadata
            .write_to_file(path)
            .map_err(|e| MetaError::Codec(format!("little_exif write failed: {e}")))?,
    }

    log::debug!("Wrote {count} EXIF tags to {}", path.display());
    Ok(())
}

/// Strip all EXIF from an image.
pub fn clear_exif(path: &Path) -> Result<()> {
    write_exif(path, &BTreeMap::new(), false)
}

/// Swap the container's EXIF payload, leaving every other segment/chunk intact.
fn replace_exif_segment(path: &Path, metadata: &Metadata) -> Result<()> {
    let file_bytes = std::fs::read(path)?;
    let mut image = DynImage::from_bytes(Bytes::from(file_bytes))
        .map_err(|e| MetaError::Codec(format!("Failed to parse image: {e}")))?
        .ok_or_else(|| MetaError::Codec(format!("Unrecognized image: {}", path.display())))?;

    let tiff_data = if metadata.data().is_empty() {
        None
    } else {
        let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
        (exif_bytes.len() > JPEG_EXIF_OVERHEAD)
            .then(|| Bytes::from(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec()))
    };
    image.set_exif(tiff_data);

    let output = image.encoder().bytes();
    std::fs::write(path, &output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> &'static WritableTag {
        tags::writable(name).unwrap()
    }

    // ── encode_value ──

    #[test]
    fn text_tag_is_utf8() {
        assert_eq!(
            encode_value(tag("Artist"), &Value::text("Zoë")).unwrap(),
            "Zoë".as_bytes()
        );
    }

    #[test]
    fn xp_tag_is_utf16le_with_terminator() {
        assert_eq!(
            encode_value(tag("XPKeywords"), &Value::text("ab")).unwrap(),
            vec![b'a', 0, b'b', 0, 0, 0]
        );
    }

    #[test]
    fn xp_list_joined_with_semicolon() {
        let bytes = encode_value(tag("XPKeywords"), &Value::list(["a", "b"])).unwrap();
        assert_eq!(bytes, encode_utf16le("a;b"));
    }

    #[test]
    fn text_list_joined_with_semicolon_space() {
        let bytes = encode_value(tag("Artist"), &Value::list(["Ann", "Bob"])).unwrap();
        assert_eq!(bytes, b"Ann; Bob");
    }

    #[test]
    fn user_comment_gets_ascii_header_once() {
        let fresh = encode_value(tag("UserComment"), &Value::text("hi")).unwrap();
        assert_eq!(fresh, b"ASCII\0\0\0hi");
        let already = encode_value(tag("UserComment"), &Value::text("ASCII\0\0\0hi")).unwrap();
        assert_eq!(already, b"ASCII\0\0\0hi");
    }

    #[test]
    fn byte_lists_pass_through() {
        let raw = Value::List(vec![Value::Integer(1), Value::Integer(255)]);
        assert_eq!(encode_value(tag("XPComment"), &raw).unwrap(), vec![1, 255]);
    }

    #[test]
    fn numbers_become_text() {
        assert_eq!(encode_value(tag("Software"), &Value::Integer(7)).unwrap(), b"7");
    }

    #[test]
    fn maps_are_not_writable() {
        assert!(encode_value(tag("Artist"), &Value::Map(BTreeMap::new())).is_none());
    }

    // ── collect_tags ──

    #[test]
    fn unlisted_tags_are_dropped() {
        let mut values = BTreeMap::new();
        values.insert("Artist".to_string(), Value::text("Ann"));
        values.insert("LensModel".to_string(), Value::text("50mm"));
        values.insert("XPTitle".to_string(), Value::text("nope"));
        assert_eq!(collect_tags(&values).len(), 1);
    }
}
