use std::path::{Path, PathBuf};

use url::Url;

use crate::{InventoryKey, ListingEntry};

/// One concrete url -> local file download unit derived from a listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub dir: PathBuf,
    pub file_name: String,
    pub category: String,
}

/// Derive targets for one page of entries. Entries without a usable category
/// (or outside `category_filter`), without an asset URL, or whose URL yields
/// no file name are skipped.
pub fn build_download_targets(
    entries: &[ListingEntry],
    category_filter: Option<&str>,
    output_root: &Path,
) -> Vec<DownloadTarget> {
    entries
        .iter()
        .filter_map(|entry| {
            let category = entry.category_name()?;
            if let Some(filter) = category_filter {
                if category != filter {
                    return None;
                }
            }
            let url = entry.image_url.trim();
            if url.is_empty() {
                return None;
            }
            let file_name = asset_file_name(url);
            if file_name.trim().is_empty() || file_name == "." {
                return None;
            }
            Some(DownloadTarget {
                url: url.to_string(),
                dir: output_root.join(category),
                file_name,
                category: category.to_string(),
            })
        })
        .collect()
}

/// File name taken from the URL's final path segment, percent-decoded.
pub fn asset_file_name(raw_url: &str) -> String {
    let path = match Url::parse(raw_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => raw_url.to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

/// The unique addressable identity of a mirrored asset.
pub fn inventory_key(category: &str, file_name: &str) -> InventoryKey {
    format!("{category}/{file_name}")
}

/// `name.ext` for attempt 0, then `name-1.ext`, `name-2.ext`, ...
pub fn numbered_file_name(original: &str, attempt: usize) -> String {
    if attempt == 0 {
        return original.to_string();
    }
    match original.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{attempt}.{ext}"),
        _ => format!("{original}-{attempt}"),
    }
}
