//! Region-to-path mapping for per-record YAML files.

use std::path::{Path, PathBuf};

use crate::models::{EpdRecord, PathScheme};
use crate::utils::path_segment;

/// Directory used when a record has no category display name.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Segment used when a postal code or region is missing or unusable.
pub const UNKNOWN: &str = "unknown";

fn segment_or(name: &str, fallback: &str) -> String {
    path_segment(name).unwrap_or_else(|| fallback.to_string())
}

impl PathScheme {
    /// Output directory for a record of `category` pulled for `region`.
    ///
    /// Deterministic: identical inputs always give identical paths, and
    /// every segment stays below `root`.
    pub fn path_for(
        &self,
        root: &Path,
        region: &str,
        postal_code: Option<&str>,
        category: &str,
    ) -> PathBuf {
        let category = segment_or(category, UNCATEGORIZED);
        match self {
            Self::Flat => {
                let country = if region.starts_with("US-") { "US" } else { region };
                root.join(segment_or(country, UNKNOWN)).join(category)
            }
            Self::ZipBucketed => {
                let mut dir = root.join(segment_or(region, UNKNOWN));
                match postal_code.map(str::trim).and_then(zip_buckets) {
                    Some((prefix, suffix)) => {
                        dir.push(prefix);
                        dir.push(suffix);
                    }
                    None => dir.push(UNKNOWN),
                }
                dir.join(category)
            }
        }
    }

    /// Output directory for `record`, using its category and postal code.
    pub fn record_dir(&self, root: &Path, region: &str, record: &EpdRecord) -> PathBuf {
        let category = record.category_display_name().unwrap_or(UNCATEGORIZED);
        self.path_for(root, region, record.postal_code(), category)
    }
}

/// First two characters and the rest of a postal code of 3+ characters.
fn zip_buckets(zip: &str) -> Option<(String, String)> {
    if zip.chars().count() < 3 {
        return None;
    }
    let split = zip.char_indices().nth(2).map_or(zip.len(), |(i, _)| i);
    let (prefix, suffix) = zip.split_at(split);
    Some((path_segment(prefix)?, path_segment(suffix)?))
}
