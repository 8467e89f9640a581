//! Filename generation from `{token}` patterns.
//!
//! Tokens:
//! - `{datetime:<strftime>}`: current time with a custom format
//! - `{sequence:<printf>}`: the sequence number, e.g. `{sequence:03d}`
//! - `{date}`: today as `YYYY-MM-DD`
//! - `{datetime}`: now in ISO-8601
//! - `{title}`: XMP `title`, else EXIF `ImageDescription`
//! - `{camera_model}`: EXIF `Model`, else `Unknown`
//! - `{original_name}`: file stem
//! - `{userid}`: current OS user
//!
//! Unknown tokens are left in place. The original extension is appended.

mod printf;

pub use printf::format_int;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDateTime, Timelike};
use regex::Regex;
use std::fmt::Write;
use std::path::Path;
use std::sync::LazyLock;

use crate::manager::MetadataRecord;
use crate::value::Value;

static DATETIME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{datetime:([^}]+)\}").expect("static regex"));
static SEQUENCE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{sequence:([^}]+)\}").expect("static regex"));

/// Bare tokens, substituted in this order after the parametrized ones.
pub const BARE_TOKENS: &[&str] =
    &["date", "datetime", "title", "camera_model", "original_name", "userid"];

#[derive(Debug, Clone, Default)]
pub struct NamingEngine {
    fixed_now: Option<NaiveDateTime>,
}

impl NamingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose clock always reads `now`.
    pub fn fixed(now: NaiveDateTime) -> Self {
        Self { fixed_now: Some(now) }
    }

    fn now(&self) -> NaiveDateTime {
        self.fixed_now.unwrap_or_else(|| Local::now().naive_local())
    }

    /// Render `pattern` for `file_path` and append the file's extension.
    pub fn generate_filename(
        &self,
        pattern: &str,
        file_path: &Path,
        metadata: &MetadataRecord,
        sequence: i64,
    ) -> String {
        let now = self.now();
        let mut result = pattern.to_string();

        if let Some((placeholder, fmt)) = first_capture(&DATETIME_TOKEN, &result) {
            let value = strftime(&now, &fmt).unwrap_or_else(|| {
                log::warn!("Invalid datetime format {fmt:?}, using ISO-8601");
                isoformat(&now)
            });
            result = result.replace(&placeholder, &value);
        }

        if let Some((placeholder, fmt)) = first_capture(&SEQUENCE_TOKEN, &result) {
            let value = format_int(&fmt, sequence).unwrap_or_else(|| {
                log::warn!("Invalid sequence format {fmt:?}, using plain number");
                sequence.to_string()
            });
            result = result.replace(&placeholder, &value);
        }

        for token in BARE_TOKENS {
            let placeholder = format!("{{{token}}}");
            if result.contains(&placeholder) {
                let value = self.resolve(token, &now, file_path, metadata);
                result = result.replace(&placeholder, &value);
            }
        }

        if let Some(ext) = file_path.extension() {
            result.push('.');
            result.push_str(&ext.to_string_lossy());
        }
        result
    }

    fn resolve(&self, token: &str, now: &NaiveDateTime, path: &Path, meta: &MetadataRecord) -> String {
        match token {
            "date" => now.format("%Y-%m-%d").to_string(),
            "datetime" => isoformat(now),
            "title" => first_text(&[meta.xmp.get("title"), meta.exif.get("ImageDescription")])
                .unwrap_or_default(),
            "camera_model" => {
                first_text(&[meta.exif.get("Model")]).unwrap_or_else(|| "Unknown".to_string())
            }
            "original_name" => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            "userid" => current_user(),
            _ => String::new(),
        }
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<(String, String)> {
    let caps = re.captures(text)?;
    Some((caps.get(0)?.as_str().to_string(), caps.get(1)?.as_str().to_string()))
}

fn first_text(candidates: &[Option<&Value>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|v| v.to_string())
        .find(|s| !s.is_empty())
}

/// Format with strftime directives; `None` if any is invalid or cannot be
/// rendered for a naive time (offset directives such as `%z`).
fn strftime(now: &NaiveDateTime, fmt: &str) -> Option<String> {
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", now.format(fmt)).ok()?;
    Some(out)
}

/// ISO-8601 with microseconds only when non-zero.
fn isoformat(now: &NaiveDateTime) -> String {
    let micros = now.nanosecond() / 1_000;
    if micros == 0 {
        now.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        format!("{}.{micros:06}", now.format("%Y-%m-%dT%H:%M:%S"))
    }
}

fn current_user() -> String {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "user".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, micro: u32) -> NamingEngine {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(h, m, s, micro)
            .unwrap();
        NamingEngine::fixed(now)
    }

    fn exif(pairs: &[(&str, &str)]) -> MetadataRecord {
        let mut record = MetadataRecord::default();
        for (k, v) in pairs {
            record.exif.insert(k.to_string(), Value::text(*v));
        }
        record
    }

    // ── documented scenarios ──

    #[test]
    fn date_title_sequence() {
        let meta = exif(&[("ImageDescription", "Test Image")]);
        let name = at(10, 0, 0, 0).generate_filename(
            "{date}_{title}_{sequence:03d}",
            Path::new("test.jpg"),
            &meta,
            5,
        );
        assert_eq!(name, "2024-03-09_Test Image_005.jpg");
    }

    #[test]
    fn datetime_format_and_camera() {
        let meta = exif(&[("Model", "Canon EOS 5D")]);
        let name = at(10, 0, 0, 0).generate_filename(
            "{datetime:%Y%m%d}_{camera_model}",
            Path::new("test.jpg"),
            &meta,
            1,
        );
        assert_eq!(name, "20240309_Canon EOS 5D.jpg");
    }

    #[test]
    fn original_name() {
        let name = NamingEngine::new().generate_filename(
            "{original_name}_edited",
            Path::new("/tmp/test.jpg"),
            &MetadataRecord::default(),
            1,
        );
        assert_eq!(name, "test_edited.jpg");
    }

    #[test]
    fn unknown_token_is_left_alone() {
        let name = at(1, 2, 3, 0).generate_filename(
            "{nope}_{date}",
            Path::new("a.JPG"),
            &MetadataRecord::default(),
            1,
        );
        assert_eq!(name, "{nope}_2024-03-09.JPG");
    }

    #[test]
    fn real_clock_date() {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let name = NamingEngine::new().generate_filename(
            "{date}",
            Path::new("x.png"),
            &MetadataRecord::default(),
            1,
        );
        // tolerate a midnight rollover between the two clock reads
        let tomorrow = (Local::now() + chrono::Duration::days(1)).format("%Y-%m-%d").to_string();
        assert!(name == format!("{today}.png") || name == format!("{tomorrow}.png"), "{name}");
    }

    // ── fallbacks ──

    #[test]
    fn title_prefers_xmp() {
        let mut meta = exif(&[("ImageDescription", "exif title")]);
        meta.xmp.insert("title".into(), Value::text("xmp title"));
        let name = at(0, 0, 0, 0).generate_filename("{title}", Path::new("a.jpg"), &meta, 1);
        assert_eq!(name, "xmp title.jpg");
    }

    #[test]
    fn empty_metadata_defaults() {
        let name = at(0, 0, 0, 0).generate_filename(
            "{title}-{camera_model}",
            Path::new("a.jpg"),
            &MetadataRecord::default(),
            1,
        );
        assert_eq!(name, "-Unknown.jpg");
    }

    #[test]
    fn bad_sequence_spec_uses_plain_number() {
        let name = at(0, 0, 0, 0).generate_filename(
            "n{sequence:zz}",
            Path::new("a.jpg"),
            &MetadataRecord::default(),
            42,
        );
        assert_eq!(name, "n42.jpg");
    }

    #[test]
    fn bad_datetime_spec_uses_isoformat() {
        let name = at(8, 5, 1, 0).generate_filename(
            "{datetime:%Q}",
            Path::new("a.jpg"),
            &MetadataRecord::default(),
            1,
        );
        assert_eq!(name, "2024-03-09T08:05:01.jpg");
    }

    #[test]
    fn offset_directives_use_isoformat() {
        let engine = at(8, 5, 1, 0);
        for pattern in ["{datetime:%Y%z}", "{datetime:%Z}", "{datetime:%Y%m%d%:z}"] {
            let name =
                engine.generate_filename(pattern, Path::new("a.jpg"), &MetadataRecord::default(), 1);
            assert_eq!(name, "2024-03-09T08:05:01.jpg", "{pattern}");
        }
    }

    #[test]
    fn bare_datetime_is_iso() {
        let name = at(8, 5, 1, 250).generate_filename(
            "{datetime}",
            Path::new("a"),
            &MetadataRecord::default(),
            1,
        );
        assert_eq!(name, "2024-03-09T08:05:01.000250");
    }

    #[test]
    fn only_first_parametrized_spec_is_used() {
        let name = at(0, 0, 0, 0).generate_filename(
            "{sequence:02d}-{sequence:02d}-{sequence:04d}",
            Path::new("a.jpg"),
            &MetadataRecord::default(),
            3,
        );
        assert_eq!(name, "03-03-{sequence:04d}.jpg");
    }

    #[test]
    fn userid_is_never_empty() {
        let name = at(0, 0, 0, 0).generate_filename(
            "{userid}",
            Path::new("a"),
            &MetadataRecord::default(),
            1,
        );
        assert!(!name.is_empty());
        assert_ne!(name, "{userid}");
    }
}
