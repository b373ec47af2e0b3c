use std::path::Path;

use walkdir::WalkDir;

use crate::InventoryKey;

/// All existing relative file paths under the mirror root, in the
/// `<category>/<fileName>` form used for de-duplication. Hidden files and
/// directories are skipped, so the metadata file at the root never counts as
/// a mirrored asset. A missing root is an empty inventory, not an error.
pub fn list_inventory(root: &Path) -> Vec<InventoryKey> {
    if !root.is_dir() {
        return Vec::new();
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let parts = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            if parts.is_empty() || parts.iter().any(|part| part.starts_with('.')) {
                return None;
            }
            Some(parts.join("/"))
        })
        .collect()
}

/// Create a directory and any missing parents.
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}
