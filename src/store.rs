//! JSON directory store for metadata templates and naming conventions.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/templates/<name>.json   {"name": ..., "exif": {...}, "xmp": {...}}
//! <root>/naming/<name>.json      {"name": ..., "pattern": ...}
//! ```
//!
//! File names are derived from the entry name (`"Travel Log"` becomes
//! `travel_log.json`), but lookups and deletes go by the `name` field inside
//! each file.

use directories::BaseDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MetaError, Result};
use crate::value::Value;
use crate::xmp::bare_key;

const STORE_DIR_NAME: &str = ".photo_meta_editor";
const TEMPLATES_DIR: &str = "templates";
const NAMING_DIR: &str = "naming";

/// A named bundle of EXIF tags and XMP properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "EXIF")]
    pub exif: BTreeMap<String, Value>,
    #[serde(default, alias = "XMP")]
    pub xmp: BTreeMap<String, Value>,
}

impl Template {
    /// Drop any `prefix:` from XMP keys (`dc:creator` becomes `creator`).
    fn normalized(mut self) -> Self {
        self.xmp = std::mem::take(&mut self.xmp)
            .into_iter()
            .map(|(k, v)| (bare_key(&k).to_string(), v))
            .collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamingConvention {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default)]
    pub pattern: String,
}

/// Entry name to file name.
pub fn file_name_for(name: &str) -> String {
    format!("{}.json", name.to_lowercase().replace(' ', "_"))
}

pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    /// `~/.photo_meta_editor`, if a home directory can be determined.
    pub fn default_root() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(STORE_DIR_NAME))
    }

    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };
        fs::create_dir_all(store.templates_dir())?;
        fs::create_dir_all(store.naming_dir())?;
        Ok(store)
    }

    pub fn open_default() -> Result<Self> {
        let root = Self::default_root()
            .ok_or_else(|| MetaError::Store("could not determine home directory".into()))?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    pub fn naming_dir(&self) -> PathBuf {
        self.root.join(NAMING_DIR)
    }

    // ── templates ──

    /// All templates keyed by name. Unreadable files are skipped.
    pub fn get_templates(&self) -> BTreeMap<String, Template> {
        load_dir::<Template>(&self.templates_dir())
            .into_iter()
            .map(|(stem, t)| {
                let t = t.normalized();
                let key = if t.name.is_empty() { stem } else { t.name.clone() };
                (key, t)
            })
            .collect()
    }

    pub fn template(&self, name: &str) -> Option<Template> {
        self.get_templates().remove(name)
    }

    pub fn save_template(
        &self,
        name: &str,
        exif: &BTreeMap<String, Value>,
        xmp: &BTreeMap<String, Value>,
    ) -> bool {
        let template = Template {
            name: name.to_string(),
            exif: exif.clone(),
            xmp: xmp.clone(),
        };
        match self.try_save_template(&template) {
            Ok(path) => {
                log::info!("Template saved: {name} ({})", path.display());
                true
            }
            Err(e) => {
                log::error!("Error saving template {name}: {e}");
                false
            }
        }
    }

    pub fn try_save_template(&self, template: &Template) -> Result<PathBuf> {
        if template.name.trim().is_empty() {
            return Err(MetaError::Store("template name is empty".into()));
        }
        let path = self.templates_dir().join(file_name_for(&template.name));
        write_json(&path, template)?;
        Ok(path)
    }

    /// Remove the template whose `name` field matches. `false` if none did.
    pub fn delete_template(&self, name: &str) -> bool {
        delete_by_name(&self.templates_dir(), name)
    }

    // ── naming conventions ──

    pub fn get_naming_conventions(&self) -> BTreeMap<String, NamingConvention> {
        load_dir::<NamingConvention>(&self.naming_dir())
            .into_iter()
            .map(|(stem, n)| {
                let key = if n.name.is_empty() { stem } else { n.name.clone() };
                (key, n)
            })
            .collect()
    }

    pub fn naming(&self, name: &str) -> Option<NamingConvention> {
        self.get_naming_conventions().remove(name)
    }

    pub fn save_naming(&self, name: &str, pattern: &str) -> bool {
        let naming = NamingConvention {
            name: name.to_string(),
            pattern: pattern.to_string(),
        };
        match self.try_save_naming(&naming) {
            Ok(path) => {
                log::info!("Naming convention saved: {name} ({})", path.display());
                true
            }
            Err(e) => {
                log::error!("Error saving naming convention {name}: {e}");
                false
            }
        }
    }

    pub fn try_save_naming(&self, naming: &NamingConvention) -> Result<PathBuf> {
        if naming.name.trim().is_empty() {
            return Err(MetaError::Store("naming convention name is empty".into()));
        }
        let path = self.naming_dir().join(file_name_for(&naming.name));
        write_json(&path, naming)?;
        Ok(path)
    }

    pub fn delete_naming(&self, name: &str) -> bool {
        delete_by_name(&self.naming_dir(), name)
    }

    // ── import / export ──

    /// Import a template from JSON text. Returns the imported name.
    pub fn import_template(&self, json: &str) -> Result<String> {
        let template: Template = serde_json::from_str(json)?;
        if template.name.is_empty() {
            return Err(MetaError::Store("Template must have a 'name' field".into()));
        }
        let template = template.normalized();
        self.try_save_template(&template)?;
        log::info!("Template '{}' imported", template.name);
        Ok(template.name)
    }

    pub fn import_naming(&self, json: &str) -> Result<String> {
        let naming: NamingConvention = serde_json::from_str(json)?;
        if naming.name.is_empty() {
            return Err(MetaError::Store(
                "Naming convention must have a 'name' field".into(),
            ));
        }
        if naming.pattern.is_empty() {
            return Err(MetaError::Store(
                "Naming convention must have a 'pattern' field".into(),
            ));
        }
        self.try_save_naming(&naming)?;
        log::info!("Naming convention '{}' imported", naming.name);
        Ok(naming.name)
    }

    /// Pretty JSON for the named template, in its on-disk shape.
    pub fn export_template(&self, name: &str) -> Result<String> {
        let template = self
            .template(name)
            .ok_or_else(|| MetaError::Store(format!("no template named '{name}'")))?;
        Ok(serde_json::to_string_pretty(&template)?)
    }

    pub fn export_naming(&self, name: &str) -> Result<String> {
        let naming = self
            .naming(name)
            .ok_or_else(|| MetaError::Store(format!("no naming convention named '{name}'")))?;
        Ok(serde_json::to_string_pretty(&naming)?)
    }

    // ── defaults ──

    /// Write the sample templates and naming conventions whose files are
    /// missing. Returns how many files were written.
    pub fn seed_defaults(&self) -> Result<usize> {
        let templates = [
            (
                "portrait_template.json",
                json!({
                    "name": "Portrait Template",
                    "exif": {
                        "Artist": "Photographer Name",
                        "Copyright": "© 2025 Photographer Name",
                        "ImageDescription": "Professional portrait photography"
                    },
                    "xmp": {
                        "dc:creator": "Photographer Name",
                        "dc:description": "Professional portrait",
                        "photoshop:Headline": "Portrait Session"
                    }
                }),
            ),
            (
                "travel_template.json",
                json!({
                    "name": "Travel Log",
                    "exif": {
                        "Artist": "Travel Photographer",
                        "ImageDescription": "Travel documentation"
                    },
                    "xmp": {
                        "dc:creator": "Travel Photographer",
                        "dc:keywords": ["travel", "adventure", "documentation"]
                    }
                }),
            ),
        ];
        let namings = [
            (
                "date_title.json",
                json!({"name": "Date + Title", "pattern": "{date}_{title}_{sequence:03d}"}),
            ),
            (
                "timestamp_camera.json",
                json!({
                    "name": "Timestamp + Camera",
                    "pattern": "{datetime:%Y%m%d_%H%M%S}_{camera_model}"
                }),
            ),
        ];

        let mut written = 0;
        for (dir, entries) in [(self.templates_dir(), &templates), (self.naming_dir(), &namings)] {
            for (file, body) in entries.iter() {
                let path = dir.join(file);
                if path.exists() {
                    continue;
                }
                write_json(&path, body)?;
                written += 1;
            }
        }
        if written > 0 {
            log::info!("Seeded {written} default entries in {}", self.root.display());
        }
        Ok(written)
    }
}

fn json_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
        .collect();
    files.sort();
    files
}

/// Parse every `*.json` in `dir`, paired with its file stem.
fn load_dir<T: DeserializeOwned>(dir: &Path) -> Vec<(String, T)> {
    json_files(dir)
        .into_iter()
        .filter_map(|path| {
            let parsed = fs::read_to_string(&path)
                .map_err(MetaError::from)
                .and_then(|text| serde_json::from_str::<T>(&text).map_err(MetaError::from));
            match parsed {
                Ok(item) => {
                    let stem = path.file_stem()?.to_string_lossy().into_owned();
                    Some((stem, item))
                }
                Err(e) => {
                    log::warn!("Error loading {}: {e}", path.display());
                    None
                }
            }
        })
        .collect()
}

fn delete_by_name(dir: &Path, name: &str) -> bool {
    for path in json_files(dir) {
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        let Ok(doc) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };
        let entry_name = doc.get("name").or_else(|| doc.get("Name"));
        if entry_name.and_then(|n| n.as_str()) == Some(name) {
            return match fs::remove_file(&path) {
                Ok(()) => {
                    log::info!("Deleted {name} ({})", path.display());
                    true
                }
                Err(e) => {
                    log::error!("Error deleting {}: {e}", path.display());
                    false
                }
            };
        }
    }
    log::debug!("No entry named {name} in {}", dir.display());
    false
}

/// Pretty-print `value` to a temp file in the target directory, then rename.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| MetaError::Store(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
    tmp.persist(path).map_err(|e| MetaError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, TemplateStore) {
        let tmp = TempDir::new().unwrap();
        let store = TemplateStore::open(tmp.path().join("store")).unwrap();
        (tmp, store)
    }

    fn map(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    // ── layout ──

    #[test]
    fn open_creates_directories() {
        let (_tmp, store) = store();
        assert!(store.templates_dir().is_dir());
        assert!(store.naming_dir().is_dir());
    }

    #[test]
    fn file_names_from_entry_names() {
        assert_eq!(file_name_for("Travel Log"), "travel_log.json");
        assert_eq!(file_name_for("Date + Title"), "date_+_title.json");
    }

    // ── defaults ──

    #[test]
    fn seeding_is_idempotent() {
        let (_tmp, store) = store();
        assert_eq!(store.seed_defaults().unwrap(), 4);
        assert_eq!(store.seed_defaults().unwrap(), 0);

        let templates = store.get_templates();
        assert_eq!(templates.len(), 2);
        let portrait = &templates["Portrait Template"];
        assert_eq!(portrait.exif["Artist"], Value::text("Photographer Name"));
        assert_eq!(portrait.xmp["creator"], Value::text("Photographer Name"));
        assert_eq!(portrait.xmp["Headline"], Value::text("Portrait Session"));
        assert_eq!(
            templates["Travel Log"].xmp["keywords"],
            Value::list(["travel", "adventure", "documentation"])
        );

        let namings = store.get_naming_conventions();
        assert_eq!(namings["Date + Title"].pattern, "{date}_{title}_{sequence:03d}");
        assert_eq!(
            namings["Timestamp + Camera"].pattern,
            "{datetime:%Y%m%d_%H%M%S}_{camera_model}"
        );
    }

    #[test]
    fn seeding_keeps_user_edits() {
        let (_tmp, store) = store();
        store.seed_defaults().unwrap();
        let path = store.naming_dir().join("date_title.json");
        fs::write(&path, r#"{"name": "Date + Title", "pattern": "{date}"}"#).unwrap();
        store.seed_defaults().unwrap();
        assert_eq!(store.naming("Date + Title").unwrap().pattern, "{date}");
    }

    // ── templates ──

    #[test]
    fn save_list_delete_template() {
        let (_tmp, store) = store();
        let exif = map(&[("Artist", Value::text("Ann"))]);
        let xmp = map(&[("subject", Value::list(["a", "b"]))]);
        assert!(store.save_template("My Trip", &exif, &xmp));
        assert!(store.templates_dir().join("my_trip.json").exists());

        let t = store.template("My Trip").unwrap();
        assert_eq!(t.exif, exif);
        assert_eq!(t.xmp, xmp);

        assert!(store.delete_template("My Trip"));
        assert!(store.template("My Trip").is_none());
        assert!(!store.delete_template("My Trip"));
    }

    #[test]
    fn saving_same_name_overwrites() {
        let (_tmp, store) = store();
        store.save_template("T", &map(&[("Artist", Value::text("A"))]), &BTreeMap::new());
        store.save_template("T", &map(&[("Artist", Value::text("B"))]), &BTreeMap::new());
        assert_eq!(store.get_templates().len(), 1);
        assert_eq!(store.template("T").unwrap().exif["Artist"], Value::text("B"));
    }

    #[test]
    fn empty_name_is_rejected() {
        let (_tmp, store) = store();
        assert!(!store.save_template(" ", &BTreeMap::new(), &BTreeMap::new()));
        assert!(!store.save_naming("", "{date}"));
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let (_tmp, store) = store();
        fs::write(store.templates_dir().join("broken.json"), "{not json").unwrap();
        fs::write(store.templates_dir().join("notes.txt"), "ignored").unwrap();
        store.save_template("Good", &map(&[("Artist", Value::text("A"))]), &BTreeMap::new());
        let templates = store.get_templates();
        assert_eq!(templates.len(), 1);
        assert!(templates.contains_key("Good"));
    }

    #[test]
    fn nameless_file_is_keyed_by_stem() {
        let (_tmp, store) = store();
        fs::write(store.templates_dir().join("loose.json"), r#"{"exif": {"Model": "X"}}"#).unwrap();
        assert!(store.get_templates().contains_key("loose"));
    }

    // ── import / export ──

    #[test]
    fn import_accepts_uppercase_keys_and_strips_prefixes() {
        let (_tmp, store) = store();
        let json = r#"{
            "Name": "Studio",
            "EXIF": {"Artist": "Ann", "Rating": 5},
            "XMP": {"dc:creator": ["Ann", "Bob"], "photoshop:Headline": "Hi"}
        }"#;
        assert_eq!(store.import_template(json).unwrap(), "Studio");
        let t = store.template("Studio").unwrap();
        assert_eq!(t.exif["Rating"], Value::Integer(5));
        assert_eq!(t.xmp["creator"], Value::list(["Ann", "Bob"]));
        assert_eq!(t.xmp["Headline"], Value::text("Hi"));
        assert!(!t.xmp.contains_key("dc:creator"));
    }

    #[test]
    fn import_requires_name() {
        let (_tmp, store) = store();
        assert!(matches!(
            store.import_template(r#"{"exif": {}}"#),
            Err(MetaError::Store(_))
        ));
        assert!(matches!(store.import_template("nope"), Err(MetaError::Json(_))));
    }

    #[test]
    fn import_naming_requires_name_and_pattern() {
        let (_tmp, store) = store();
        assert!(store.import_naming(r#"{"name": "N"}"#).is_err());
        assert!(store.import_naming(r#"{"pattern": "{date}"}"#).is_err());
        assert_eq!(
            store.import_naming(r#"{"name": "N", "pattern": "{date}"}"#).unwrap(),
            "N"
        );
        assert_eq!(store.naming("N").unwrap().pattern, "{date}");
    }

    #[test]
    fn export_then_import_elsewhere() {
        let (_tmp, store) = store();
        store.seed_defaults().unwrap();
        let exported = store.export_template("Travel Log").unwrap();
        let naming = store.export_naming("Date + Title").unwrap();

        let (_tmp2, other) = self::store();
        other.import_template(&exported).unwrap();
        other.import_naming(&naming).unwrap();
        assert_eq!(other.template("Travel Log"), store.template("Travel Log"));
        assert_eq!(other.naming("Date + Title"), store.naming("Date + Title"));
    }

    #[test]
    fn export_unknown_name() {
        let (_tmp, store) = store();
        assert!(matches!(store.export_template("x"), Err(MetaError::Store(_))));
        assert!(matches!(store.export_naming("x"), Err(MetaError::Store(_))));
    }

    // ── naming conventions ──

    #[test]
    fn save_list_delete_naming() {
        let (_tmp, store) = store();
        assert!(store.save_naming("Short", "{original_name}_{sequence:02d}"));
        assert_eq!(store.get_naming_conventions().len(), 1);
        assert!(store.delete_naming("Short"));
        assert!(store.get_naming_conventions().is_empty());
    }
}
