use crate::entry::{is_supported_image, ImageEntry};
use std::path::Path;
use tracing::{debug, error};
use walkdir::WalkDir;

/// List the supported images directly inside `dir`, sorted by path.
///
/// A missing path or a non-directory yields an empty list rather than an
/// error, so a stale or mistyped directory simply shows nothing.
pub fn scan_directory(dir: &Path) -> Vec<ImageEntry> {
    collect_images(dir, || false).unwrap_or_default()
}

/// Same listing as [`scan_directory`], but checks `should_abort` before each
/// directory entry and returns `None` as soon as it reports `true`.
pub fn collect_images<F>(dir: &Path, should_abort: F) -> Option<Vec<ImageEntry>>
where
    F: Fn() -> bool,
{
    if !dir.is_dir() {
        debug!("Not a directory, nothing to scan: {}", dir.display());
        return Some(Vec::new());
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        if should_abort() {
            debug!("Scan of {} aborted", dir.display());
            return None;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                error!("Error reading entry in directory {}: {}", dir.display(), err);
                continue;
            }
        };

        let path = entry.path();
        if path.is_file() && is_supported_image(path) {
            images.push(ImageEntry::new(path));
        }
    }

    images.sort();
    debug!("Found {} images in {}", images.len(), dir.display());
    Some(images)
}
