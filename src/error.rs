use thiserror::Error;

/// Errors raised by the metadata core.
///
/// Most public entry points swallow these (see [`crate::manager`]); the
/// `try_*` variants surface them for callers that want the cause.
#[derive(Debug, Error)]
pub enum MetaError {
    /// Working-copy or store file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The EXIF library rejected the file or the tag data.
    #[error("EXIF codec error: {0}")]
    Codec(String),

    /// The byte stream does not start with a JPEG SOI marker.
    #[error("not a JPEG stream (missing SOI marker)")]
    InvalidJpeg,

    /// An XMP APP1 segment would exceed the 16-bit length field.
    #[error("XMP segment too large: {size} bytes (max {max})")]
    SegmentTooLarge { size: usize, max: usize },

    /// The XMP packet could not be parsed.
    #[error("XMP parse error: {0}")]
    XmpParse(String),

    /// No `x:xmpmeta` block was found.
    #[error("no XMP packet found")]
    NoXmp,

    /// Template or naming store failure.
    #[error("store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MetaError>;
