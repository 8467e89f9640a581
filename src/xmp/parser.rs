use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;
use std::path::Path;

use super::bare_key;
use crate::error::{MetaError, Result};
use crate::normalize::{decode_latin1, normalize_key};
use crate::value::Value;

const XMPMETA_OPEN: &[u8] = b"<x:xmpmeta";
const XMPMETA_CLOSE: &[u8] = b"</x:xmpmeta>";

/// Minimal element tree; enough to flatten RDF descriptions.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Non-empty text of every `rdf:li` below this element, in document order.
    fn li_texts(&self, out: &mut Vec<String>) {
        for child in &self.children {
            if child.local_name() == "li" {
                let text = child.text.trim();
                if !text.is_empty() {
                    out.push(text.to_string());
                }
            }
            child.li_texts(out);
        }
    }

    fn descriptions<'a>(&'a self, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.local_name() == "Description" {
                out.push(child);
            }
            child.descriptions(out);
        }
    }
}

fn local_name(name: &str) -> &str {
    bare_key(normalize_key(name))
}

/// Locate the `<x:xmpmeta …>…</x:xmpmeta>` block by byte search.
pub fn find_packet(data: &[u8]) -> Option<&[u8]> {
    let start = find(data, XMPMETA_OPEN)?;
    let end = find(&data[start..], XMPMETA_CLOSE)? + start + XMPMETA_CLOSE.len();
    Some(&data[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => decode_latin1(bytes),
    }
}

/// Parse the XMP packet embedded anywhere in a file's raw bytes.
pub fn parse_embedded(data: &[u8]) -> Result<BTreeMap<String, Value>> {
    let packet = find_packet(data).ok_or(MetaError::NoXmp)?;
    parse_xmp(&decode(packet))
}

/// Read and parse the packet embedded in an image file.
pub fn read_embedded(path: &Path) -> Result<BTreeMap<String, Value>> {
    parse_embedded(&std::fs::read(path)?)
}

/// Read a standalone `.xmp` sidecar file.
pub fn read_sidecar(path: &Path) -> Result<BTreeMap<String, Value>> {
    let data = std::fs::read(path)?;
    match find_packet(&data) {
        Some(packet) => parse_xmp(&decode(packet)),
        None => parse_xmp(&decode(&data)),
    }
}

/// Flatten RDF/XML into a property map.
///
/// Description attributes become scalar entries. A child element with
/// `rdf:li` items becomes a list, or a scalar when there is exactly one item;
/// without items its own text is used. Empty properties are omitted.
pub fn parse_xmp(xml: &str) -> Result<BTreeMap<String, Value>> {
    let root = parse_tree(xml)?;
    let mut descriptions = Vec::new();
    root.descriptions(&mut descriptions);

    let mut props = BTreeMap::new();
    for desc in descriptions {
        for (name, value) in &desc.attrs {
            if name.starts_with("xmlns") || name == "rdf:about" {
                continue;
            }
            props.insert(local_name(name).to_string(), Value::text(value.as_str()));
        }
        for child in &desc.children {
            let key = child.local_name().to_string();
            let mut items = Vec::new();
            child.li_texts(&mut items);
            match items.len() {
                0 => {
                    let text = child.text.trim();
                    if !text.is_empty() {
                        props.insert(key, Value::text(text));
                    }
                }
                1 => {
                    props.insert(key, Value::Text(items.remove(0)));
                }
                _ => {
                    props.insert(key, Value::list(items));
                }
            }
        }
    }
    Ok(props)
}

fn collect_attributes(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let raw_value = String::from_utf8_lossy(attr.value.as_ref());
            let value = match unescape(&raw_value) {
                Ok(unescaped) => unescaped.to_string(),
                Err(_) => raw_value.to_string(),
            };
            (key, value)
        })
        .collect()
}

fn open_element(e: &BytesStart<'_>) -> Element {
    Element {
        name: String::from_utf8_lossy(e.name().as_ref()).to_string(),
        attrs: collect_attributes(e),
        ..Default::default()
    }
}

fn parse_tree(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = vec![Element::default()];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(open_element(&e)),
            Ok(Event::Empty(e)) => {
                let element = open_element(&e);
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(MetaError::XmpParse("unbalanced closing tag".into()));
                }
                if let Some(element) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let raw_text = String::from_utf8_lossy(e.as_ref());
                let text = match unescape(&raw_text) {
                    Ok(unescaped) => unescaped.to_string(),
                    Err(_) => raw_text.to_string(),
                };
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                // &amp; and friends arrive as separate events
                let entity = format!("&{};", String::from_utf8_lossy(e.as_ref()));
                let resolved = match unescape(&entity) {
                    Ok(resolved) => resolved.to_string(),
                    Err(_) => entity.clone(),
                };
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MetaError::XmpParse(format!(
                    "XML error at {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(MetaError::XmpParse("unclosed element".into()));
    }
    stack.pop().ok_or_else(|| MetaError::XmpParse("empty document".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmp::build_xmp;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about="" xmlns:xmp="http://ns.adobe.com/xap/1.0/"
     xmlns:dc="http://purl.org/dc/elements/1.1/" xmp:Rating="4">
   <dc:title><rdf:Alt><rdf:li xml:lang="x-default">Harbour</rdf:li></rdf:Alt></dc:title>
   <dc:subject><rdf:Bag><rdf:li>boats</rdf:li><rdf:li> </rdf:li><rdf:li>sea</rdf:li></rdf:Bag></dc:subject>
   <dc:creator><rdf:Seq/></dc:creator>
   <xmp:Label>Red &amp; Blue</xmp:Label>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>"#;

    // ── flattening ──

    #[test]
    fn flattens_description() {
        let props = parse_xmp(SAMPLE).unwrap();
        assert_eq!(props.get("Rating"), Some(&Value::text("4")));
        assert_eq!(props.get("title"), Some(&Value::text("Harbour")));
        assert_eq!(props.get("subject"), Some(&Value::list(["boats", "sea"])));
        assert_eq!(props.get("Label"), Some(&Value::text("Red & Blue")));
        assert!(!props.contains_key("creator"));
        assert!(!props.contains_key("about"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_xmp("<x:xmpmeta><rdf:RDF></x:xmpmeta>"),
            Err(MetaError::XmpParse(_))
        ));
    }

    // ── round trip ──

    #[test]
    fn build_then_parse() {
        let mut props = BTreeMap::new();
        props.insert("title".to_string(), Value::text("Sunset <1>"));
        props.insert("description".to_string(), Value::text("Evening sky"));
        props.insert("rights".to_string(), Value::text("© Ann"));
        props.insert("subject".to_string(), Value::list(["sea", "sky", "sun"]));
        props.insert("creator".to_string(), Value::list(["Ann", "Bob"]));
        props.insert("Headline".to_string(), Value::text("Big & bold"));
        props.insert("DateCreated".to_string(), Value::text("2024-05-01"));
        props.insert("CreateDate".to_string(), Value::text("2024-05-01T10:00:00"));

        let parsed = parse_xmp(&build_xmp(&props)).unwrap();
        assert_eq!(parsed, props);
    }

    #[test]
    fn single_item_list_collapses_to_scalar() {
        let mut props = BTreeMap::new();
        props.insert("subject".to_string(), Value::list(["only"]));
        let parsed = parse_xmp(&build_xmp(&props)).unwrap();
        assert_eq!(parsed.get("subject"), Some(&Value::text("only")));
    }

    // ── embedded / sidecar ──

    #[test]
    fn embedded_packet_found_by_byte_search() {
        let mut data = vec![0xFF, 0xD8, 0x00, 0x12];
        data.extend_from_slice(SAMPLE.as_bytes());
        data.extend_from_slice(&[0xFF, 0xD9]);
        let props = parse_embedded(&data).unwrap();
        assert_eq!(props.get("title"), Some(&Value::text("Harbour")));
    }

    #[test]
    fn embedded_latin1_fallback() {
        let mut data = b"<x:xmpmeta><rdf:RDF><rdf:Description><dc:title>Caf".to_vec();
        data.push(0xE9);
        data.extend_from_slice(b"</dc:title></rdf:Description></rdf:RDF></x:xmpmeta>");
        let props = parse_embedded(&data).unwrap();
        assert_eq!(props.get("title"), Some(&Value::text("Café")));
    }

    #[test]
    fn no_packet() {
        assert!(matches!(parse_embedded(b"\xFF\xD8\xFF\xD9"), Err(MetaError::NoXmp)));
    }

    #[test]
    fn sidecar_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.xmp");
        std::fs::write(&path, SAMPLE).unwrap();
        let props = read_sidecar(&path).unwrap();
        assert_eq!(props.get("subject"), Some(&Value::list(["boats", "sea"])));
    }
}
