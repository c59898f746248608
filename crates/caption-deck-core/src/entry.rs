use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extensions (lowercase) the scanner and worker accept.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

pub const CAPTION_EXTENSION: &str = "txt";
pub const FAVORITE_SUFFIX: &str = ".fav";
pub const THUMBNAIL_DIR: &str = ".thumbnails";
pub const THUMBNAIL_SUFFIX: &str = ".tbn";

/// Case-insensitive check against [`IMAGE_EXTENSIONS`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// One source image. Every sidecar location is derived from the image path
/// alone, so an entry is cheap to build and never stale.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageEntry {
    path: PathBuf,
}

impl ImageEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `foo.png` -> `foo.txt`
    pub fn caption_path(&self) -> PathBuf {
        self.path.with_extension(CAPTION_EXTENSION)
    }

    /// `foo.png` -> `foo.png.fav`
    pub fn favorite_path(&self) -> PathBuf {
        append_to_file_name(&self.path, FAVORITE_SUFFIX)
    }

    /// `dir/foo.png` -> `dir/.thumbnails/foo.png.tbn`
    pub fn thumbnail_path(&self) -> PathBuf {
        let parent = self.path.parent().unwrap_or_else(|| Path::new(""));
        let mut name = self
            .path
            .file_name()
            .map(|f| f.to_os_string())
            .unwrap_or_default();
        name.push(THUMBNAIL_SUFFIX);
        parent.join(THUMBNAIL_DIR).join(name)
    }

    pub fn has_caption(&self) -> bool {
        self.caption_path().exists()
    }

    /// `Ok(None)` when the entry has not been captioned yet.
    pub fn read_caption(&self) -> io::Result<Option<String>> {
        let caption_path = self.caption_path();
        if !caption_path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&caption_path).map(Some)
    }

    /// Write `caption` verbatim to the sidecar, replacing any previous text.
    pub fn write_caption(&self, caption: &str) -> io::Result<()> {
        fs::write(self.caption_path(), caption)
    }

    /// Save an edited caption. The text is trimmed first; blank text leaves
    /// the sidecar untouched and returns `false`.
    pub fn save_caption(&self, caption: &str) -> io::Result<bool> {
        let caption = caption.trim();
        if caption.is_empty() {
            return Ok(false);
        }
        self.write_caption(caption)?;
        debug!("Saved caption for {}", self.path.display());
        Ok(true)
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite_path().exists()
    }

    /// Flip the favorite marker and return the new state.
    pub fn toggle_favorite(&self) -> io::Result<bool> {
        let marker = self.favorite_path();
        if marker.exists() {
            fs::remove_file(&marker)?;
            Ok(false)
        } else {
            fs::File::create(&marker)?;
            Ok(true)
        }
    }

    /// Remove the image and every sidecar that exists.
    ///
    /// Each artifact is attempted even if an earlier one failed; nothing is
    /// restored on failure.
    pub fn delete(&self) -> DeleteReport {
        let mut report = DeleteReport::default();

        for artifact in [
            self.path.clone(),
            self.caption_path(),
            self.favorite_path(),
            self.thumbnail_path(),
        ] {
            if !artifact.exists() {
                continue;
            }
            match fs::remove_file(&artifact) {
                Ok(()) => report.removed.push(artifact),
                Err(e) => {
                    warn!("Error deleting {}: {}", artifact.display(), e);
                    report.failures.push((artifact, e));
                }
            }
        }

        info!(
            "Deleted {} ({} artifacts removed, {} failures)",
            self.path.display(),
            report.removed.len(),
            report.failures.len()
        );
        report
    }
}

impl From<PathBuf> for ImageEntry {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl AsRef<Path> for ImageEntry {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Default)]
pub struct DeleteReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary for a status bar.
    pub fn status_message(&self) -> String {
        match self.failures.first() {
            None => format!("Deleted {} files.", self.removed.len()),
            Some((path, err)) => format!(
                "Deleted {} files, {} failed ({}: {})",
                self.removed.len(),
                self.failures.len(),
                path.display(),
                err
            ),
        }
    }
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
