//! # photo-meta
//!
//! Photo metadata editor: read, write, merge and strip EXIF and XMP metadata,
//! and derive new filenames from metadata through `{token}` patterns.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use photo_meta::manager::MetadataManager;
//! use photo_meta::naming::NamingEngine;
//! use photo_meta::value::Value;
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! let path = Path::new("photo.jpg");
//! let manager = MetadataManager::new();
//!
//! // Read EXIF and embedded XMP, normalized to plain values
//! let record = manager.get_metadata(path);
//! println!("Camera: {:?}", record.exif.get("Model"));
//!
//! // Write a title and keywords, keeping the other existing tags
//! let mut exif = BTreeMap::new();
//! exif.insert("ImageDescription".to_string(), Value::text("Harbour at dusk"));
//! let mut xmp = BTreeMap::new();
//! xmp.insert("subject".to_string(), Value::list(["harbour", "boats"]));
//! assert!(manager.set_metadata(path, &exif, &xmp, true));
//!
//! // Render a new filename
//! let record = manager.get_metadata(path);
//! let name = NamingEngine::new().generate_filename(
//!     "{date}_{title}_{sequence:03d}",
//!     path,
//!     &record,
//!     1,
//! );
//! println!("New name: {name}");
//! ```
//!
//! ## Batch Usage
//!
//! ```rust,no_run
//! use photo_meta::pipeline::{ApplyOptions, apply_template, collect_images};
//! use photo_meta::store::TemplateStore;
//! use std::path::PathBuf;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = TemplateStore::open_default()?;
//! store.seed_defaults()?;
//! let template = store.template("Travel Log");
//!
//! let images = collect_images(&[PathBuf::from("./photos")]);
//! let options = ApplyOptions { dry_run: true, ..Default::default() };
//! for result in apply_template(&images, template.as_ref(), Some("{original_name}_{sequence:02d}"), &options) {
//!     println!("{} -> {:?}", result.path.display(), result.new_path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | EXIF | Embedded XMP |
//! |--------|------|--------------|
//! | JPEG (`.jpg`, `.jpeg`) | read + write | read + write |
//! | PNG, TIFF | read + write | read only |
//! | GIF, BMP | read where present | read only |
//! | `.xmp` sidecar | n/a | read |
//!
//! ## Modules
//!
//! - [`manager`]: per-file read/write/delete with atomic replace
//! - [`exif`]: EXIF codec (tag tables, reader, writer)
//! - [`xmp`]: XMP packet builder and parser
//! - [`jpeg`]: JPEG segment editing for XMP APP1 packets
//! - [`normalize`]: raw tag values to display values
//! - [`naming`]: filename patterns
//! - [`store`]: JSON template and naming-convention store
//! - [`pipeline`]: image collection and batch template application
//! - [`config`]: configuration types and loading/saving

pub mod config;
pub mod error;
pub mod exif;
pub mod jpeg;
pub mod manager;
pub mod naming;
pub mod normalize;
pub mod pipeline;
pub mod store;
pub mod value;
pub mod xmp;

pub use error::{MetaError, Result};
pub use manager::{MetadataManager, MetadataRecord};
pub use naming::NamingEngine;
pub use value::Value;
