//! Deterministic storage key layout.
//!
//! Primary: `{owner_id}/{timestamp}_{random}_{sanitized_name}.{ext}`.
//! Variants: `{item_prefix}/{kind_segment}.{ext}` where `item_prefix` is
//! the primary key without its extension. Backups: `backup/{region}/{key}`.
//! The shared prefix lets the lifecycle manager list and purge everything
//! belonging to one item in a single prefix operation.

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

const RANDOM_SUFFIX_LEN: usize = 8;
const MAX_FILENAME_LEN: usize = 255;

/// Replace anything outside `[A-Za-z0-9._-]`, strip directories, and cap
/// length. Dot-dot sequences collapse to a placeholder name.
pub fn sanitize_filename(filename: &str) -> String {
    let base = std::path::Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    if base.contains("..") {
        return "file".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim_matches(['_', '.']).is_empty() {
        "file".to_string()
    } else {
        s
    }
}

/// Key for a primary object.
pub fn primary_key(owner_id: Uuid, uploaded_at: DateTime<Utc>, filename: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!(
        "{}/{}_{}_{}",
        owner_id,
        uploaded_at.timestamp(),
        suffix,
        sanitize_filename(filename)
    )
}

/// Prefix under which an item's derived artifacts live: the primary key
/// minus its extension.
pub fn item_prefix(primary_key: &str) -> &str {
    match primary_key.rsplit_once('.') {
        // Only strip if the dot is in the final path segment.
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => primary_key,
    }
}

/// Key for a derived variant, e.g. `{prefix}/video/720p.mp4`.
pub fn variant_key(primary_key: &str, kind_segment: &str, ext: &str) -> String {
    format!("{}/{}.{}", item_prefix(primary_key), kind_segment, ext)
}

/// Key for a backup copy in a secondary region.
pub fn backup_key(region: &str, primary_key: &str) -> String {
    format!("backup/{}/{}", region, primary_key)
}
