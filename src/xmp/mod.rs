//! XMP packet building and parsing.
//!
//! Properties are keyed by bare names (`title`, `subject`, `Headline`); a
//! `prefix:` in an incoming key is ignored.

mod builder;
mod parser;

pub use builder::{Shape, XMP_PROPERTIES, XmpProperty, build_xmp, property};
pub use parser::{find_packet, parse_embedded, parse_xmp, read_embedded, read_sidecar};

pub const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NS_PHOTOSHOP: &str = "http://ns.adobe.com/photoshop/1.0/";
pub const NS_XMP: &str = "http://ns.adobe.com/xap/1.0/";

/// Strip a `prefix:` from a property name.
pub fn bare_key(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(_, local)| local)
}
