use quick_xml::escape::escape;
use std::collections::BTreeMap;

use super::{NS_DC, NS_PHOTOSHOP, NS_RDF, NS_XMP, bare_key};
use crate::value::Value;

/// XML shape a property is serialized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `rdf:Alt` with a single `x-default` item.
    AltText,
    /// Ordered `rdf:Seq`.
    SeqList,
    /// Unordered `rdf:Bag`.
    BagList,
    /// Plain element text.
    Flat,
}

#[derive(Debug, Clone, Copy)]
pub struct XmpProperty {
    pub key: &'static str,
    pub prefix: &'static str,
    pub shape: Shape,
}

/// Properties the builder emits, in output order. Other keys are dropped.
pub const XMP_PROPERTIES: &[XmpProperty] = &[
    XmpProperty { key: "title", prefix: "dc", shape: Shape::AltText },
    XmpProperty { key: "description", prefix: "dc", shape: Shape::AltText },
    XmpProperty { key: "creator", prefix: "dc", shape: Shape::SeqList },
    XmpProperty { key: "subject", prefix: "dc", shape: Shape::BagList },
    XmpProperty { key: "rights", prefix: "dc", shape: Shape::AltText },
    XmpProperty { key: "Headline", prefix: "photoshop", shape: Shape::Flat },
    XmpProperty { key: "DateCreated", prefix: "photoshop", shape: Shape::Flat },
    XmpProperty { key: "CreateDate", prefix: "xmp", shape: Shape::Flat },
];

pub fn property(key: &str) -> Option<&'static XmpProperty> {
    XMP_PROPERTIES.iter().find(|p| p.key == key)
}

/// Serialize a property map into a complete XMP packet.
///
/// Keys may carry a namespace prefix (`dc:title`); it is ignored. Empty
/// values are skipped.
pub fn build_xmp(props: &BTreeMap<String, Value>) -> String {
    let by_key: BTreeMap<&str, &Value> = props.iter().map(|(k, v)| (bare_key(k), v)).collect();
    for key in by_key.keys().filter(|k| property(k).is_none()) {
        log::debug!("Dropping unsupported XMP property {key}");
    }

    let mut xmp = String::new();
    xmp.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    xmp.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
    xmp.push_str(&format!("<rdf:RDF xmlns:rdf=\"{NS_RDF}\">\n"));
    xmp.push_str("<rdf:Description rdf:about=\"\"\n");
    xmp.push_str(&format!("  xmlns:dc=\"{NS_DC}\"\n"));
    xmp.push_str(&format!("  xmlns:photoshop=\"{NS_PHOTOSHOP}\"\n"));
    xmp.push_str(&format!("  xmlns:xmp=\"{NS_XMP}\">\n"));

    for prop in XMP_PROPERTIES {
        if let Some(value) = by_key.get(prop.key) {
            push_property(&mut xmp, prop, value);
        }
    }

    xmp.push_str("</rdf:Description>\n");
    xmp.push_str("</rdf:RDF>\n");
    xmp.push_str("</x:xmpmeta>\n");
    xmp.push_str("<?xpacket end=\"w\"?>");
    xmp
}

fn push_property(xmp: &mut String, prop: &XmpProperty, value: &Value) {
    let tag = format!("{}:{}", prop.prefix, prop.key);
    match prop.shape {
        Shape::AltText | Shape::Flat => {
            let text = value.to_string();
            if text.is_empty() {
                return;
            }
            let text = escape(text.as_str());
            if prop.shape == Shape::AltText {
                xmp.push_str(&format!(
                    "  <{tag}><rdf:Alt><rdf:li xml:lang=\"x-default\">{text}</rdf:li></rdf:Alt></{tag}>\n"
                ));
            } else {
                xmp.push_str(&format!("  <{tag}>{text}</{tag}>\n"));
            }
        }
        Shape::SeqList | Shape::BagList => {
            let items: Vec<String> = value
                .items()
                .into_iter()
                .map(|v| v.to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if items.is_empty() {
                return;
            }
            let container = if prop.shape == Shape::SeqList { "rdf:Seq" } else { "rdf:Bag" };
            xmp.push_str(&format!("  <{tag}><{container}>\n"));
            for item in &items {
                xmp.push_str(&format!("    <rdf:li>{}</rdf:li>\n", escape(item.as_str())));
            }
            xmp.push_str(&format!("  </{container}></{tag}>\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn preamble_and_namespaces() {
        let xml = build_xmp(&BTreeMap::new());
        assert!(xml.starts_with("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>"));
        assert!(xml.contains("xmlns:dc=\"http://purl.org/dc/elements/1.1/\""));
        assert!(xml.contains("xmlns:photoshop=\"http://ns.adobe.com/photoshop/1.0/\""));
        assert!(xml.contains("xmlns:xmp=\"http://ns.adobe.com/xap/1.0/\""));
        assert!(xml.ends_with("<?xpacket end=\"w\"?>"));
    }

    #[test]
    fn shapes_follow_the_table() {
        let xml = build_xmp(&props(&[
            ("title", Value::text("Sunset")),
            ("creator", Value::text("Ann")),
            ("subject", Value::list(["sea", "sky"])),
            ("Headline", Value::text("Big")),
            ("CreateDate", Value::text("2024-05-01")),
        ]));
        assert!(xml.contains(
            "<dc:title><rdf:Alt><rdf:li xml:lang=\"x-default\">Sunset</rdf:li></rdf:Alt></dc:title>"
        ));
        assert!(xml.contains("<dc:creator><rdf:Seq>\n    <rdf:li>Ann</rdf:li>\n  </rdf:Seq></dc:creator>"));
        assert!(xml.contains("<dc:subject><rdf:Bag>\n    <rdf:li>sea</rdf:li>\n    <rdf:li>sky</rdf:li>"));
        assert!(xml.contains("<photoshop:Headline>Big</photoshop:Headline>"));
        assert!(xml.contains("<xmp:CreateDate>2024-05-01</xmp:CreateDate>"));
    }

    #[test]
    fn unknown_keys_are_dropped_and_prefixes_ignored() {
        let xml = build_xmp(&props(&[
            ("dc:rights", Value::text("CC-BY")),
            ("Rating", Value::Integer(5)),
        ]));
        assert!(xml.contains("<dc:rights><rdf:Alt>"));
        assert!(!xml.contains("Rating"));
    }

    #[test]
    fn text_is_escaped() {
        let xml = build_xmp(&props(&[("title", Value::text("Fish & <Chips>"))]));
        assert!(xml.contains("Fish &amp; &lt;Chips&gt;"));
    }

    #[test]
    fn empty_values_are_skipped() {
        let xml = build_xmp(&props(&[
            ("title", Value::text("")),
            ("subject", Value::List(vec![])),
        ]));
        assert!(!xml.contains("dc:title>"));
        assert!(!xml.contains("dc:subject>"));
    }
}
