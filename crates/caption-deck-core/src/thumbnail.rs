use crate::entry::ImageEntry;
use crate::error::Error;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bounding box for grid previews.
pub const THUMBNAIL_WIDTH: u32 = 250;
pub const THUMBNAIL_HEIGHT: u32 = 200;
pub const THUMBNAIL_QUALITY: u8 = 85;

/// Cache location for `image_path`, creating the hidden `.thumbnails`
/// directory next to it when missing.
pub fn get_thumbnail_path(image_path: &Path) -> std::io::Result<PathBuf> {
    let thumbnail_path = ImageEntry::new(image_path).thumbnail_path();
    if let Some(dir) = thumbnail_path.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(thumbnail_path)
}

/// Return something displayable for `image_path`.
///
/// An existing cache file is returned as-is, with no freshness check against
/// the source. On a miss the preview is generated and written. If anything
/// fails the source path itself is returned so the caller can still try to
/// show the original.
pub fn ensure_thumbnail(image_path: &Path) -> PathBuf {
    match try_ensure_thumbnail(image_path) {
        Ok(path) => path,
        Err(e) => {
            warn!("Thumbnail error for {}: {}", image_path.display(), e);
            image_path.to_path_buf()
        }
    }
}

fn try_ensure_thumbnail(image_path: &Path) -> Result<PathBuf, Error> {
    let thumbnail_path = get_thumbnail_path(image_path)?;
    if thumbnail_path.exists() {
        return Ok(thumbnail_path);
    }

    if let Err(e) = generate_thumbnail(image_path, &thumbnail_path) {
        // A half-written file would otherwise be served forever
        let _ = fs::remove_file(&thumbnail_path);
        return Err(e);
    }

    debug!("Generated thumbnail: {}", thumbnail_path.display());
    Ok(thumbnail_path)
}

fn generate_thumbnail(image_path: &Path, thumbnail_path: &Path) -> Result<(), Error> {
    let img = ImageReader::open(image_path)?
        .with_guessed_format()?
        .decode()?;

    let thumbnail = shrink_to_fit(img, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT);
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(thumbnail.to_rgb8());

    let mut writer = BufWriter::new(File::create(thumbnail_path)?);
    let encoder = JpegEncoder::new_with_quality(&mut writer, THUMBNAIL_QUALITY);
    rgb.write_with_encoder(encoder)?;
    writer.flush()?;
    Ok(())
}

/// Downscale to fit inside `max_width`x`max_height`, keeping aspect ratio.
/// Images already inside the box are left alone.
fn shrink_to_fit(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

/// Drop the cached preview for `image_path`, if any. Returns whether a file
/// was removed.
pub fn clear_thumbnail(image_path: &Path) -> std::io::Result<bool> {
    let thumbnail_path = ImageEntry::new(image_path).thumbnail_path();
    if thumbnail_path.exists() {
        fs::remove_file(&thumbnail_path)?;
        return Ok(true);
    }
    Ok(false)
}
