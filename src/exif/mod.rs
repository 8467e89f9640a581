//! EXIF reading and writing.
//!
//! - [`read_exif`]: enumerate every tag of an image (nom-exif)
//! - [`write_exif`]: write the allow-listed tags in [`tags::WRITABLE_TAGS`]
//!   (little_exif, with img-parts doing segment replacement for JPEG/PNG/WebP)
//! - [`clear_exif`]: strip EXIF entirely
//!
//! [`ExifCodec`] is the seam the [`MetadataManager`](crate::manager::MetadataManager)
//! talks to, so tests can substitute a failing codec.

mod reader;
pub mod tags;
mod writer;

pub use reader::read_exif;
pub use writer::{USER_COMMENT_ASCII, clear_exif, write_exif};

use crate::error::Result;
use crate::value::{RawValue, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Read/write access to a file's EXIF block.
pub trait ExifCodec {
    /// Every tag found, keyed by name, not yet normalized.
    fn read(&self, path: &Path) -> Result<BTreeMap<String, RawValue>>;

    /// Write allow-listed tags. With `merge` existing tags are kept.
    fn write(&self, path: &Path, values: &BTreeMap<String, Value>, merge: bool) -> Result<()>;

    /// Remove all tags.
    fn clear(&self, path: &Path) -> Result<()> {
        self.write(path, &BTreeMap::new(), false)
    }
}

/// The library-backed codec used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibExifCodec;

impl ExifCodec for LibExifCodec {
    fn read(&self, path: &Path) -> Result<BTreeMap<String, RawValue>> {
        read_exif(path)
    }

    fn write(&self, path: &Path, values: &BTreeMap<String, Value>, merge: bool) -> Result<()> {
        write_exif(path, values, merge)
    }

    fn clear(&self, path: &Path) -> Result<()> {
        clear_exif(path)
    }
}
