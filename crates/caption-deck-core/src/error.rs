use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PNG decode error: {0}")]
    Png(#[from] png::DecodingError),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure values returned by the caption client.
///
/// These never escape as panics or `Error`s; the batch worker surfaces the
/// rendered text (always prefixed with `[ERROR]`) in place of a caption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptionError {
    #[error("[ERROR] Image encoding failed: {0}")]
    Encoding(String),

    #[error("[ERROR] {0}")]
    Transport(String),

    #[error("[ERROR] Model returned empty caption")]
    EmptyCaption,
}

/// Prefix carried by every rendered caption failure.
pub const ERROR_PREFIX: &str = "[ERROR]";
