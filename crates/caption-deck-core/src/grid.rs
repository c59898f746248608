use crate::entry::{DeleteReport, ImageEntry};
use crate::metadata;
use crate::thumbnail;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Entries turned into grid items per tick.
pub const GRID_BATCH_SIZE: usize = 3;

/// How often the host UI should call [`GridLoader::tick`].
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// One cell of the review grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridItem {
    pub entry: ImageEntry,
    /// Cached preview, or the source image when no preview could be made.
    pub thumbnail: PathBuf,
    pub caption: Option<String>,
    pub favorite: bool,
}

impl GridItem {
    pub fn load(entry: ImageEntry) -> Self {
        let thumbnail = thumbnail::ensure_thumbnail(entry.path());
        let caption = match entry.read_caption() {
            Ok(caption) => caption,
            Err(e) => {
                warn!("Error reading caption for {}: {}", entry.path().display(), e);
                None
            }
        };
        let favorite = entry.is_favorite();
        Self {
            entry,
            thumbnail,
            caption,
            favorite,
        }
    }

    pub fn is_captioned(&self) -> bool {
        self.caption.is_some()
    }
}

/// Feeds a scan result into the grid a few items at a time so thumbnail
/// generation never blocks the UI for long.
#[derive(Debug)]
pub struct GridLoader {
    pending: VecDeque<ImageEntry>,
    batch_size: usize,
    loaded: usize,
}

impl GridLoader {
    pub fn new() -> Self {
        Self::with_batch_size(GRID_BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            batch_size: batch_size.max(1),
            loaded: 0,
        }
    }

    /// Replace whatever is still pending with a fresh scan result.
    pub fn load(&mut self, entries: Vec<ImageEntry>) {
        if !self.pending.is_empty() {
            debug!("Dropping {} pending grid items", self.pending.len());
        }
        self.pending = entries.into();
        self.loaded = 0;
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.loaded = 0;
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Build up to one batch of grid items from the front of the queue.
    pub fn tick(&mut self) -> Vec<GridItem> {
        let take = self.batch_size.min(self.pending.len());
        let items: Vec<GridItem> = self.pending.drain(..take).map(GridItem::load).collect();
        self.loaded += items.len();
        items
    }

    /// Tick every `interval` until the queue is empty, handing each batch to
    /// `on_batch`. For hosts without their own timer.
    pub fn run_to_completion<F>(&mut self, interval: Duration, mut on_batch: F)
    where
        F: FnMut(Vec<GridItem>),
    {
        while !self.is_idle() {
            on_batch(self.tick());
            if !self.is_idle() {
                thread::sleep(interval);
            }
        }
    }
}

impl Default for GridLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridSort {
    #[default]
    NameAsc,
    NameDesc,
    CaptionedFirst,
    FavoritesFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridView {
    #[default]
    All,
    Favorites,
    Captioned,
    Uncaptioned,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridFilter {
    pub view: GridView,
    /// Case-insensitive match against file name and caption.
    pub search: String,
}

impl GridFilter {
    pub fn matches(&self, item: &GridItem) -> bool {
        let in_view = match self.view {
            GridView::All => true,
            GridView::Favorites => item.favorite,
            GridView::Captioned => item.is_captioned(),
            GridView::Uncaptioned => !item.is_captioned(),
        };
        if !in_view {
            return false;
        }

        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        item.entry.file_name().to_lowercase().contains(&needle)
            || item
                .caption
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&needle))
    }
}

/// In-memory model behind the review grid. Every mutation goes to disk
/// first and the item is only updated once that succeeded.
#[derive(Debug, Default)]
pub struct ReviewGrid {
    items: Vec<GridItem>,
    pub sort: GridSort,
    pub filter: GridFilter,
}

impl ReviewGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, items: Vec<GridItem>) {
        self.items.extend(items);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, image_path: &Path) -> Option<&GridItem> {
        self.items.iter().find(|item| item.entry.path() == image_path)
    }

    fn get_mut(&mut self, image_path: &Path) -> Option<&mut GridItem> {
        self.items
            .iter_mut()
            .find(|item| item.entry.path() == image_path)
    }

    /// Items passing the filter, in sort order.
    pub fn visible(&self) -> Vec<&GridItem> {
        let mut items: Vec<&GridItem> = self
            .items
            .iter()
            .filter(|item| self.filter.matches(item))
            .collect();

        match self.sort {
            GridSort::NameAsc => items.sort_by(|a, b| a.entry.cmp(&b.entry)),
            GridSort::NameDesc => items.sort_by(|a, b| b.entry.cmp(&a.entry)),
            GridSort::CaptionedFirst => items.sort_by(|a, b| {
                b.is_captioned()
                    .cmp(&a.is_captioned())
                    .then_with(|| a.entry.cmp(&b.entry))
            }),
            GridSort::FavoritesFirst => items.sort_by(|a, b| {
                b.favorite
                    .cmp(&a.favorite)
                    .then_with(|| a.entry.cmp(&b.entry))
            }),
        }
        items
    }

    pub fn toggle_favorite(&mut self, image_path: &Path) -> io::Result<bool> {
        let favorite = ImageEntry::new(image_path).toggle_favorite()?;
        if let Some(item) = self.get_mut(image_path) {
            item.favorite = favorite;
        }
        Ok(favorite)
    }

    /// Persist an edited caption. Blank text is ignored and returns `false`.
    pub fn save_caption(&mut self, image_path: &Path, caption: &str) -> io::Result<bool> {
        let saved = ImageEntry::new(image_path).save_caption(caption)?;
        if saved {
            if let Some(item) = self.get_mut(image_path) {
                item.caption = Some(caption.trim().to_string());
            }
        }
        Ok(saved)
    }

    /// Replace the caption with the prompt embedded in the image, if any.
    pub fn apply_extracted_prompt(&mut self, image_path: &Path) -> io::Result<Option<String>> {
        let Some(prompt) = metadata::extract_prompt(image_path) else {
            return Ok(None);
        };
        self.save_caption(image_path, &prompt)?;
        Ok(Some(prompt))
    }

    /// Delete the image and its sidecars, dropping the item from the grid.
    /// The item stays when the image file itself could not be removed.
    pub fn delete(&mut self, image_path: &Path) -> DeleteReport {
        let report = ImageEntry::new(image_path).delete();
        if !image_path.exists() {
            self.items.retain(|item| item.entry.path() != image_path);
        }
        report
    }
}
