//! Dump file name conventions shared by every chain.

use chrono::NaiveDateTime;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::domain::models::FileKind;

/// Classifies a dump file by name. First match wins: store, price, promo.
pub fn detect_file_type(filename: &str) -> FileKind {
    let lower = filename.to_lowercase();
    if lower.contains("store") {
        FileKind::Stores
    } else if lower.contains("price") {
        FileKind::Prices
    } else if lower.contains("promo") {
        FileKind::Promotions
    } else {
        FileKind::Unknown
    }
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-(\d{12})\.xml$").expect("timestamp pattern is valid"))
}

/// Reads the `-YYYYMMDDHHMM.xml` suffix of a dump file name.
pub fn extract_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let digits = timestamp_pattern().captures(filename)?.get(1)?.as_str();
    NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M").ok()
}

pub fn file_timestamp(path: &Path) -> Option<NaiveDateTime> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(extract_timestamp)
}
