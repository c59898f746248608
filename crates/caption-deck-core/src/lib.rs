pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod grid;
pub mod metadata;
pub mod progress;
pub mod queue;
pub mod scanner;
pub mod thumbnail;
pub mod worker;

pub use client::{Captioner, OllamaCaptioner};
pub use config::{AppConfig, JobConfig};
pub use entry::{DeleteReport, ImageEntry};
pub use error::{CaptionError, Error};
pub use grid::{GridItem, GridLoader, ReviewGrid};
pub use progress::{BatchEvent, ChannelReporter, ProgressReporter, SilentReporter};
pub use scanner::{DirectoryScanner, ScanMessage};
pub use worker::{BatchHandle, BatchState, BatchStatus, BatchSummary, BatchWorker};
