//! File-type, size and date classification plus the filter engine that
//! runs over a registry snapshot.
//!
//! Classification is a total function: every record lands in exactly one
//! category, with `Other` as the strict catch-all.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub const MIB: u64 = 1024 * 1024;

/// One backed-up file as reported by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

// Extension fallbacks for records whose MIME type is missing or generic.
const DOCUMENT_EXTS: &[&str] = &[
    "pdf", "txt", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "md", "log",
];
const ARCHIVE_EXTS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2"];

const DOCUMENT_MIME_HINTS: &[&str] = &[
    "pdf",
    "msword",
    "officedocument.wordprocessingml",
    "ms-excel",
    "officedocument.spreadsheetml",
    "ms-powerpoint",
    "officedocument.presentationml",
    "csv",
];
const ARCHIVE_MIME_HINTS: &[&str] = &["zip", "x-rar-compressed", "gzip", "x-tar", "x-bzip2", "x-7z-compressed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Other,
}

impl TypeCategory {
    pub fn name(&self) -> &'static str {
        match self {
            TypeCategory::Image => "image",
            TypeCategory::Video => "video",
            TypeCategory::Audio => "audio",
            TypeCategory::Document => "document",
            TypeCategory::Archive => "archive",
            TypeCategory::Other => "other",
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(TypeCategory::Image),
            "video" => Ok(TypeCategory::Video),
            "audio" => Ok(TypeCategory::Audio),
            "document" => Ok(TypeCategory::Document),
            "archive" => Ok(TypeCategory::Archive),
            "other" => Ok(TypeCategory::Other),
            _ => Err(format!(
                "unknown file type '{}' (expected image, video, audio, document, archive or other)",
                s
            )),
        }
    }
}

/// Classify a record into exactly one category.
///
/// MIME top-level category wins; document/archive fall back to MIME
/// keyword hints and then the filename extension.
pub fn classify(record: &FileRecord) -> TypeCategory {
    let mime = record.mime_type.to_ascii_lowercase();

    if mime.starts_with("image/") {
        return TypeCategory::Image;
    }
    if mime.starts_with("video/") {
        return TypeCategory::Video;
    }
    if mime.starts_with("audio/") {
        return TypeCategory::Audio;
    }

    let ext = extension(&record.name);
    if is_document(&mime, &ext) {
        return TypeCategory::Document;
    }
    if is_archive(&mime, &ext) {
        return TypeCategory::Archive;
    }

    TypeCategory::Other
}

fn extension(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_document(mime: &str, ext: &str) -> bool {
    mime.starts_with("text/")
        || DOCUMENT_MIME_HINTS.iter().any(|hint| mime.contains(hint))
        || DOCUMENT_EXTS.contains(&ext)
}

fn is_archive(mime: &str, ext: &str) -> bool {
    ARCHIVE_MIME_HINTS.iter().any(|hint| mime.contains(hint)) || ARCHIVE_EXTS.contains(&ext)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    /// Small < 1 MiB, Medium [1 MiB, 10 MiB), Large >= 10 MiB.
    pub fn of(size_bytes: u64) -> SizeClass {
        if size_bytes < MIB {
            SizeClass::Small
        } else if size_bytes < 10 * MIB {
            SizeClass::Medium
        } else {
            SizeClass::Large
        }
    }
}

impl FromStr for SizeClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(SizeClass::Small),
            "medium" => Ok(SizeClass::Medium),
            "large" => Ok(SizeClass::Large),
            _ => Err(format!(
                "unknown size class '{}' (expected small, medium or large)",
                s
            )),
        }
    }
}

/// Active predicates are ANDed together; an empty criteria set is the
/// identity over the snapshot.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub search_text: Option<String>,
    pub type_category: Option<TypeCategory>,
    pub size_class: Option<SizeClass>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl FilterCriteria {
    pub fn is_active(&self) -> bool {
        self.search_text.as_deref().is_some_and(|s| !s.trim().is_empty())
            || self.type_category.is_some()
            || self.size_class.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
    }

    /// Pure, order-preserving selection over a snapshot.
    pub fn apply<'a>(&self, files: &'a [FileRecord]) -> Vec<&'a FileRecord> {
        files.iter().filter(|f| self.matches(f)).collect()
    }

    fn matches(&self, file: &FileRecord) -> bool {
        self.matches_search(file)
            && self.matches_type(file)
            && self.matches_size(file)
            && self.matches_date(file)
    }

    fn matches_search(&self, file: &FileRecord) -> bool {
        let needle = match self.search_text.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_ascii_lowercase(),
            _ => return true,
        };
        file.name.to_ascii_lowercase().contains(&needle)
            || file.mime_type.to_ascii_lowercase().contains(&needle)
    }

    fn matches_type(&self, file: &FileRecord) -> bool {
        match self.type_category {
            Some(wanted) => classify(file) == wanted,
            None => true,
        }
    }

    fn matches_size(&self, file: &FileRecord) -> bool {
        match self.size_class {
            Some(wanted) => SizeClass::of(file.size_bytes) == wanted,
            None => true,
        }
    }

    // date_to is inclusive through the end of that day, so compare
    // against the start of the following day.
    fn matches_date(&self, file: &FileRecord) -> bool {
        if let Some(from) = self.date_from {
            if file.uploaded_at < from.and_time(NaiveTime::MIN).and_utc() {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if let Some(next_day) = to.succ_opt() {
                if file.uploaded_at >= next_day.and_time(NaiveTime::MIN).and_utc() {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(name: &str, mime: &str, size: u64) -> FileRecord {
        FileRecord {
            id: format!("id-{}", name),
            name: name.to_string(),
            size_bytes: size,
            mime_type: mime.to_string(),
            uploaded_at: Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
        }
    }

    fn record_at(name: &str, ts: DateTime<Utc>) -> FileRecord {
        FileRecord {
            id: format!("id-{}", name),
            name: name.to_string(),
            size_bytes: 100,
            mime_type: String::new(),
            uploaded_at: ts,
        }
    }

    #[test]
    fn classification_is_total_and_exclusive() {
        let samples = vec![
            (record("photo.png", "image/png", 10), TypeCategory::Image),
            (record("clip.mp4", "video/mp4", 10), TypeCategory::Video),
            (record("song.mp3", "audio/mpeg", 10), TypeCategory::Audio),
            (record("report.pdf", "application/pdf", 10), TypeCategory::Document),
            (record("notes.txt", "text/plain", 10), TypeCategory::Document),
            (record("sheet.xlsx", "", 10), TypeCategory::Document),
            (record("bundle.zip", "application/zip", 10), TypeCategory::Archive),
            (record("backup.tar", "", 10), TypeCategory::Archive),
            (record("blob.bin", "application/octet-stream", 10), TypeCategory::Other),
            (record("no-extension", "", 10), TypeCategory::Other),
        ];
        for (rec, expected) in samples {
            assert_eq!(classify(&rec), expected, "record {}", rec.name);
        }
    }

    #[test]
    fn mime_category_wins_over_extension() {
        // A PNG named like an archive is still an image.
        let rec = record("screenshot.zip", "image/png", 10);
        assert_eq!(classify(&rec), TypeCategory::Image);
    }

    #[test]
    fn other_excludes_every_named_category() {
        let named = [
            record("a.png", "image/png", 1),
            record("b.mp4", "video/mp4", 1),
            record("c.mp3", "audio/ogg", 1),
            record("d.pdf", "application/pdf", 1),
            record("e.zip", "application/zip", 1),
        ];
        for rec in &named {
            assert_ne!(classify(rec), TypeCategory::Other);
        }
    }

    #[test]
    fn size_class_boundaries() {
        assert_eq!(SizeClass::of(0), SizeClass::Small);
        assert_eq!(SizeClass::of(MIB - 1), SizeClass::Small);
        assert_eq!(SizeClass::of(1_048_576), SizeClass::Medium);
        assert_eq!(SizeClass::of(10_485_760 - 1), SizeClass::Medium);
        assert_eq!(SizeClass::of(10_485_760), SizeClass::Large);
    }

    #[test]
    fn search_is_case_insensitive_over_name_and_mime() {
        let files = vec![
            record("Holiday-Photo.PNG", "image/png", 10),
            record("budget.xlsx", "application/vnd.ms-excel", 10),
        ];
        let by_name = FilterCriteria {
            search_text: Some("holiday".into()),
            ..Default::default()
        };
        assert_eq!(by_name.apply(&files).len(), 1);

        let by_mime = FilterCriteria {
            search_text: Some("MS-EXCEL".into()),
            ..Default::default()
        };
        let hits = by_mime.apply(&files);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "budget.xlsx");
    }

    #[test]
    fn date_range_is_inclusive_through_end_of_day() {
        let late = record_at("late.txt", Utc.with_ymd_and_hms(2025, 6, 20, 23, 59, 0).unwrap());
        let next = record_at("next.txt", Utc.with_ymd_and_hms(2025, 6, 21, 0, 1, 0).unwrap());
        let files = vec![late, next];

        let criteria = FilterCriteria {
            date_from: NaiveDate::from_ymd_opt(2025, 6, 20),
            date_to: NaiveDate::from_ymd_opt(2025, 6, 20),
            ..Default::default()
        };
        let hits = criteria.apply(&files);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "late.txt");
    }

    #[test]
    fn inactive_criteria_is_identity() {
        let files = vec![
            record("a.png", "image/png", 10),
            record("b.zip", "application/zip", 10),
            record("c.bin", "", 10),
        ];
        let criteria = FilterCriteria::default();
        assert!(!criteria.is_active());
        let hits = criteria.apply(&files);
        assert_eq!(hits.len(), files.len());
        let names: Vec<_> = hits.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.zip", "c.bin"]);
    }

    #[test]
    fn apply_is_idempotent() {
        let files = vec![
            record("a.png", "image/png", 2 * MIB),
            record("b.png", "image/png", 20 * MIB),
            record("c.zip", "application/zip", 2 * MIB),
        ];
        let criteria = FilterCriteria {
            type_category: Some(TypeCategory::Image),
            size_class: Some(SizeClass::Medium),
            ..Default::default()
        };
        let first: Vec<String> = criteria.apply(&files).iter().map(|f| f.id.clone()).collect();
        let second: Vec<String> = criteria.apply(&files).iter().map(|f| f.id.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["id-a.png"]);
    }

    #[test]
    fn predicates_compose_with_and() {
        let files = vec![
            record("cat.png", "image/png", 2 * MIB),
            record("cat.zip", "application/zip", 2 * MIB),
            record("dog.png", "image/png", 2 * MIB),
        ];
        let criteria = FilterCriteria {
            search_text: Some("cat".into()),
            type_category: Some(TypeCategory::Image),
            ..Default::default()
        };
        let hits = criteria.apply(&files);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "cat.png");
    }
}
