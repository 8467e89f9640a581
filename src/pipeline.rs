use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::manager::{MetadataManager, MetadataRecord};
use crate::naming::NamingEngine;
use crate::store::Template;
use crate::xmp::bare_key;

/// Supported image extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "gif", "bmp"];

/// Image format, detected from the file extension.
///
/// ```rust
/// use photo_meta::pipeline::ImageKind;
/// use std::path::Path;
///
/// let kind = ImageKind::from_path(Path::new("photo.JPG"));
/// assert_eq!(kind, Some(ImageKind::Jpeg));
/// assert!(kind.unwrap().supports_embedded_xmp());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Tiff,
    Gif,
    Bmp,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Only JPEG gets an embedded XMP packet.
    pub fn supports_embedded_xmp(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks) in file-name order.
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Copy `photo.jpg` to `photo.jpg.bak` unless a backup already exists.
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path).context("Failed to create backup")?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}

/// Options for [`apply_template`].
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Keep existing tags that the template does not set.
    pub merge: bool,
    /// Compute new names only.
    pub dry_run: bool,
    /// Back up each original before writing metadata.
    pub backup: bool,
}

impl ApplyOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            merge: config.merge,
            dry_run: config.output.dry_run,
            backup: config.output.backup_originals,
        }
    }
}

/// Outcome for one file of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub path: PathBuf,
    /// Target name when a pattern was given (also set in dry-run).
    pub new_path: Option<PathBuf>,
    pub renamed: bool,
    pub written: bool,
    pub error: Option<String>,
}

impl ApplyResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            new_path: None,
            renamed: false,
            written: false,
            error: None,
        }
    }
}

/// Write `template` to each file and/or rename it from `pattern`.
///
/// File *i* gets sequence number *i + 1*. Names that collide with an existing
/// file, or with a name already handed out in this batch, get `_1`, `_2`, …
/// appended to the stem. A file is only renamed once its metadata write
/// succeeded.
pub fn apply_template(
    files: &[PathBuf],
    template: Option<&Template>,
    pattern: Option<&str>,
    options: &ApplyOptions,
) -> Vec<ApplyResult> {
    apply_template_with(
        &MetadataManager::new(),
        &NamingEngine::new(),
        files,
        template,
        pattern,
        options,
    )
}

/// [`apply_template`] with an explicit manager and naming engine.
pub fn apply_template_with(
    manager: &MetadataManager,
    engine: &NamingEngine,
    files: &[PathBuf],
    template: Option<&Template>,
    pattern: Option<&str>,
    options: &ApplyOptions,
) -> Vec<ApplyResult> {
    let mut claimed = HashSet::new();
    let total = files.len();

    files
        .iter()
        .enumerate()
        .map(|(i, path)| {
            log::info!("[{}/{}] {}", i + 1, total, path.display());
            let result = apply_one(
                manager,
                engine,
                path,
                (i + 1) as i64,
                template,
                pattern,
                options,
                &mut claimed,
            );
            if let Some(ref err) = result.error {
                log::error!("  Error: {err}");
            }
            result
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn apply_one(
    manager: &MetadataManager,
    engine: &NamingEngine,
    path: &Path,
    sequence: i64,
    template: Option<&Template>,
    pattern: Option<&str>,
    options: &ApplyOptions,
    claimed: &mut HashSet<PathBuf>,
) -> ApplyResult {
    let mut result = ApplyResult::new(path);
    let template = template.filter(|t| !t.exif.is_empty() || !t.xmp.is_empty());

    if let Some(pattern) = pattern {
        let mut record = manager.get_metadata(path);
        if let Some(t) = template {
            overlay(&mut record, t);
        }
        let name = sanitize_file_name(&engine.generate_filename(pattern, path, &record, sequence));
        let target = path.with_file_name(name);
        let target = if target == path {
            target
        } else {
            unique_path(&target, claimed)
        };
        claimed.insert(target.clone());
        result.new_path = Some(target);
    }

    if options.dry_run {
        if let Some(ref new_path) = result.new_path {
            log::info!("  would rename to {}", new_path.display());
        }
        return result;
    }

    if let Some(t) = template {
        if options.backup {
            if let Err(e) = backup_file(path) {
                result.error = Some(format!("{e:#}"));
                return result;
            }
        }
        if let Err(e) = manager.try_set_metadata(path, &t.exif, &t.xmp, options.merge) {
            result.error = Some(format!("Metadata write failed: {e}"));
            return result;
        }
        result.written = true;
    }

    if let Some(new_path) = result.new_path.clone() {
        if new_path != path {
            match std::fs::rename(path, &new_path) {
                Ok(()) => {
                    log::info!("  renamed to {}", new_path.display());
                    result.renamed = true;
                }
                Err(e) => result.error = Some(format!("Rename failed: {e}")),
            }
        }
    }

    result
}

/// What the file's metadata will look like once `template` is written.
fn overlay(record: &mut MetadataRecord, template: &Template) {
    for (k, v) in &template.exif {
        record.exif.insert(k.clone(), v.clone());
    }
    for (k, v) in &template.xmp {
        record.xmp.insert(bare_key(k).to_string(), v.clone());
    }
}

/// Keep a rendered name inside its directory.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

/// `target`, or the first free `<stem>_<n>.<ext>`.
pub fn unique_path(target: &Path, claimed: &HashSet<PathBuf>) -> PathBuf {
    let taken = |p: &Path| p.exists() || claimed.contains(p);
    if !taken(target) {
        return target.to_path_buf();
    }

    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|n| target.with_file_name(format!("{stem}_{n}{ext}")))
        .find(|p| !taken(p))
        .unwrap_or_else(|| target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn write_jpeg(path: &Path) {
        image::RgbImage::from_pixel(16, 16, image::Rgb([200, 120, 40]))
            .save(path)
            .unwrap();
    }

    fn engine() -> NamingEngine {
        NamingEngine::fixed(
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
        )
    }

    fn template(artist: &str, title: &str) -> Template {
        let mut exif = BTreeMap::new();
        exif.insert("Artist".to_string(), Value::text(artist));
        let mut xmp = BTreeMap::new();
        xmp.insert("dc:title".to_string(), Value::text(title));
        Template {
            name: "t".into(),
            exif,
            xmp,
        }
    }

    fn run(
        files: &[PathBuf],
        template: Option<&Template>,
        pattern: Option<&str>,
        options: &ApplyOptions,
    ) -> Vec<ApplyResult> {
        apply_template_with(&MetadataManager::new(), &engine(), files, template, pattern, options)
    }

    // ── ImageKind::from_path ──────────────────────────────────────────

    #[test]
    fn image_kinds() {
        assert_eq!(ImageKind::from_path(Path::new("a.jpeg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("A.PNG")), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_path(Path::new("a.tif")), Some(ImageKind::Tiff));
        assert_eq!(ImageKind::from_path(Path::new("a.gif")), Some(ImageKind::Gif));
        assert_eq!(ImageKind::from_path(Path::new("a.bmp")), Some(ImageKind::Bmp));
        assert_eq!(ImageKind::from_path(Path::new("a.heic")), None);
        assert_eq!(ImageKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn only_jpeg_embeds_xmp() {
        assert!(ImageKind::Jpeg.supports_embedded_xmp());
        assert!(!ImageKind::Png.supports_embedded_xmp());
        assert!(!ImageKind::Tiff.supports_embedded_xmp());
    }

    // ── collect_images ───────────────────────────────────────────────

    #[test]
    fn collects_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        fs::create_dir(dir.join("sub")).unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "sub/c.tif"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        fs::write(dir.join("single.gif"), b"x").unwrap();

        let images = collect_images(&[
            dir.join("single.gif"),
            dir.join("notes.txt"),
            dir.join("sub"),
            dir.join("missing"),
        ]);
        assert_eq!(images, vec![dir.join("single.gif"), dir.join("sub/c.tif")]);

        let all = collect_images(&[dir.to_path_buf()]);
        let names: Vec<_> = all
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jpg", "b.PNG", "single.gif", "c.tif"]);
    }

    // ── backups and collisions ───────────────────────────────────────

    #[test]
    fn backup_is_created_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p.jpg");
        fs::write(&path, b"one").unwrap();
        let backup = backup_file(&path).unwrap();
        assert_eq!(backup, tmp.path().join("p.jpg.bak"));

        fs::write(&path, b"two").unwrap();
        backup_file(&path).unwrap();
        assert_eq!(fs::read(&backup).unwrap(), b"one");
    }

    #[test]
    fn unique_path_appends_counter() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("x.jpg");
        assert_eq!(unique_path(&target, &HashSet::new()), target);

        fs::write(&target, b"").unwrap();
        fs::write(tmp.path().join("x_1.jpg"), b"").unwrap();
        let mut claimed = HashSet::new();
        claimed.insert(tmp.path().join("x_2.jpg"));
        assert_eq!(unique_path(&target, &claimed), tmp.path().join("x_3.jpg"));
    }

    #[test]
    fn separators_are_replaced() {
        assert_eq!(sanitize_file_name("a/b\\c.jpg"), "a_b_c.jpg");
    }

    // ── apply_template ───────────────────────────────────────────────

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("img.jpg");
        write_jpeg(&path);
        let before = fs::read(&path).unwrap();

        let options = ApplyOptions {
            dry_run: true,
            backup: true,
            ..Default::default()
        };
        let t = template("Ann", "Pier");
        let results = run(&[path.clone()], Some(&t), Some("{title}_{sequence:03d}"), &options);

        assert_eq!(results[0].new_path, Some(tmp.path().join("Pier_001.jpg")));
        assert!(!results[0].renamed && !results[0].written);
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!tmp.path().join("img.jpg.bak").exists());
    }

    #[test]
    fn renames_in_sequence() {
        let tmp = TempDir::new().unwrap();
        let files: Vec<PathBuf> = ["b.jpg", "a.jpg"].iter().map(|n| tmp.path().join(n)).collect();
        for f in &files {
            write_jpeg(f);
        }

        let results = run(&files, None, Some("shot_{sequence:02d}"), &ApplyOptions::default());
        assert!(results.iter().all(|r| r.renamed && !r.written && r.error.is_none()));
        assert!(tmp.path().join("shot_01.jpg").exists());
        assert!(tmp.path().join("shot_02.jpg").exists());
        assert!(!files[0].exists());
    }

    #[test]
    fn same_name_within_batch_gets_counter() {
        let tmp = TempDir::new().unwrap();
        let files: Vec<PathBuf> = ["1.jpg", "2.jpg"].iter().map(|n| tmp.path().join(n)).collect();
        for f in &files {
            write_jpeg(f);
        }
        fs::write(tmp.path().join("fixed.jpg"), b"occupied").unwrap();

        let results = run(&files, None, Some("fixed"), &ApplyOptions::default());
        assert_eq!(results[0].new_path, Some(tmp.path().join("fixed_1.jpg")));
        assert_eq!(results[1].new_path, Some(tmp.path().join("fixed_2.jpg")));
        assert_eq!(fs::read(tmp.path().join("fixed.jpg")).unwrap(), b"occupied");
    }

    #[test]
    fn unchanged_name_is_not_a_collision() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keep.jpg");
        write_jpeg(&path);
        let results = run(&[path.clone()], None, Some("{original_name}"), &ApplyOptions::default());
        assert_eq!(results[0].new_path, Some(path.clone()));
        assert!(!results[0].renamed);
        assert!(results[0].error.is_none());
        assert!(path.exists());
    }

    #[test]
    fn writes_template_then_renames() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("raw.jpg");
        write_jpeg(&path);

        let options = ApplyOptions {
            backup: true,
            ..Default::default()
        };
        let t = template("Ann", "Harbour");
        let results = run(&[path.clone()], Some(&t), Some("{title}"), &options);
        let r = &results[0];
        assert!(r.written && r.renamed, "{r:?}");

        let renamed = tmp.path().join("Harbour.jpg");
        assert!(tmp.path().join("raw.jpg.bak").exists());
        let meta = MetadataManager::new().get_metadata(&renamed);
        assert_eq!(meta.exif.get("Artist"), Some(&Value::text("Ann")));
        assert_eq!(meta.xmp.get("title"), Some(&Value::text("Harbour")));
    }

    #[test]
    fn failures_are_per_file() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.jpg");
        write_jpeg(&good);
        let missing = tmp.path().join("missing.jpg");

        let t = template("Ann", "X");
        let results = run(&[missing, good.clone()], Some(&t), None, &ApplyOptions::default());
        assert!(results[0].error.is_some());
        assert!(!results[0].written);
        assert!(results[1].written && results[1].error.is_none());
    }

    #[test]
    fn options_from_config() {
        let mut config = Config::default();
        config.merge = true;
        config.output.dry_run = true;
        let options = ApplyOptions::from_config(&config);
        assert!(options.merge && options.dry_run && options.backup);
    }
}
