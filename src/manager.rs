//! Per-file metadata orchestration.
//!
//! [`MetadataManager`] composes the EXIF codec, the XMP builder/parser and the
//! JPEG segment editor. Writes go to a temporary copy next to the target which
//! only replaces the original once every step has run, so a failed write
//! never leaves a half-edited file behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MetaError, Result};
use crate::exif::{ExifCodec, LibExifCodec};
use crate::normalize::{normalize, normalize_key};
use crate::value::Value;
use crate::{jpeg, xmp};

/// Snapshot of a file's metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub exif: BTreeMap<String, Value>,
    pub xmp: BTreeMap<String, Value>,
}

impl MetadataRecord {
    pub fn is_empty(&self) -> bool {
        self.exif.is_empty() && self.xmp.is_empty()
    }
}

/// `true` for `.jpg`/`.jpeg` paths, the only format with embedded XMP support.
pub fn is_jpeg_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| e == "jpg" || e == "jpeg")
}

fn is_sidecar_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("xmp"))
}

pub struct MetadataManager {
    codec: Box<dyn ExifCodec>,
}

impl Default for MetadataManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataManager {
    pub fn new() -> Self {
        Self::with_codec(Box::new(LibExifCodec))
    }

    /// Use a custom EXIF codec.
    pub fn with_codec(codec: Box<dyn ExifCodec>) -> Self {
        Self { codec }
    }

    /// Read EXIF and embedded XMP. Never fails; unreadable parts come back empty.
    ///
    /// A `.xmp` path is read as a sidecar and only fills `xmp`.
    pub fn get_metadata(&self, path: &Path) -> MetadataRecord {
        let mut record = MetadataRecord::default();

        if is_sidecar_path(path) {
            match xmp::read_sidecar(path) {
                Ok(props) => record.xmp = props,
                Err(e) => log::warn!("Could not read sidecar {}: {e}", path.display()),
            }
            return record;
        }

        match self.codec.read(path) {
            Ok(tags) => {
                record.exif = tags
                    .iter()
                    .map(|(k, v)| (normalize_key(k).to_string(), normalize(v)))
                    .collect();
            }
            Err(e) => log::warn!("Could not read EXIF from {}: {e}", path.display()),
        }

        match xmp::read_embedded(path) {
            Ok(props) => record.xmp = props,
            Err(MetaError::NoXmp) => log::debug!("No XMP packet in {}", path.display()),
            Err(e) => log::warn!("Could not read XMP from {}: {e}", path.display()),
        }

        record
    }

    /// Write metadata, reporting success as a boolean.
    pub fn set_metadata(
        &self,
        path: &Path,
        exif: &BTreeMap<String, Value>,
        xmp: &BTreeMap<String, Value>,
        merge: bool,
    ) -> bool {
        match self.try_set_metadata(path, exif, xmp, merge) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to write metadata to {}: {e}", path.display());
                false
            }
        }
    }

    /// Write EXIF, then (JPEG only) the XMP packet.
    ///
    /// I/O failures on the working copy abort and leave the original
    /// untouched. Codec failures only skip their own step. With `merge`,
    /// existing EXIF tags and XMP properties are kept unless overridden.
    pub fn try_set_metadata(
        &self,
        path: &Path,
        exif: &BTreeMap<String, Value>,
        xmp: &BTreeMap<String, Value>,
        merge: bool,
    ) -> Result<()> {
        if exif.is_empty() && xmp.is_empty() {
            log::debug!("Nothing to write for {}", path.display());
            return Ok(());
        }

        with_working_copy(path, |work| {
            if !exif.is_empty() {
                match self.codec.write(work, exif, merge) {
                    Ok(()) => {}
                    Err(MetaError::Io(e)) => return Err(MetaError::Io(e)),
                    Err(e) => log::warn!("EXIF write skipped for {}: {e}", path.display()),
                }
            }

            if !xmp.is_empty() {
                if is_jpeg_path(path) {
                    write_xmp(work, xmp, merge, path)?;
                } else {
                    log::warn!("Embedded XMP not supported for {}, skipped", path.display());
                }
            }
            Ok(())
        })?;

        log::info!("Metadata written to {}", path.display());
        Ok(())
    }

    /// Strip EXIF and embedded XMP, reporting success as a boolean.
    pub fn delete_metadata(&self, path: &Path) -> bool {
        match self.try_delete_metadata(path) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to delete metadata from {}: {e}", path.display());
                false
            }
        }
    }

    /// Clear EXIF, then remove the XMP segment of a JPEG.
    ///
    /// A failed EXIF clear fails the whole operation; a failed XMP removal
    /// is only logged.
    pub fn try_delete_metadata(&self, path: &Path) -> Result<()> {
        with_working_copy(path, |work| {
            self.codec.clear(work)?;
            if is_jpeg_path(path) {
                if let Err(e) = jpeg::remove_xmp_file(work) {
                    log::warn!("Could not remove XMP from {}: {e}", path.display());
                }
            }
            Ok(())
        })?;

        log::info!("Metadata removed from {}", path.display());
        Ok(())
    }
}

fn write_xmp(
    work: &Path,
    props: &BTreeMap<String, Value>,
    merge: bool,
    original: &Path,
) -> Result<()> {
    let mut merged = BTreeMap::new();
    if merge {
        match xmp::read_embedded(work) {
            Ok(existing) => merged = existing,
            Err(MetaError::NoXmp) => {}
            Err(MetaError::Io(e)) => return Err(MetaError::Io(e)),
            Err(e) => log::warn!(
                "Existing XMP in {} is unreadable, replacing it: {e}",
                original.display()
            ),
        }
    }
    for (key, value) in props {
        merged.insert(xmp::bare_key(key).to_string(), value.clone());
    }

    let packet = xmp::build_xmp(&merged);
    match jpeg::inject_xmp_file(work, packet.as_bytes()) {
        Ok(()) => Ok(()),
        Err(MetaError::Io(e)) => Err(MetaError::Io(e)),
        Err(e) => {
            log::warn!("XMP write skipped for {}: {e}", original.display());
            Ok(())
        }
    }
}

/// Run `mutate` on a temporary copy of `path`, then move the copy over the
/// original. On error the copy is dropped and the original is not touched.
fn with_working_copy<F>(path: &Path, mutate: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    // keep the extension, format sniffing depends on it
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let work = tempfile::Builder::new()
        .prefix(".photo-meta-")
        .suffix(&suffix)
        .tempfile_in(&dir)?;
    std::fs::copy(path, work.path())?;

    mutate(work.path())?;

    work.persist(path).map_err(|e| MetaError::Io(e.error))?;
    Ok(())
}
