use crate::client::Captioner;
use crate::config::JobConfig;
use crate::entry::ImageEntry;
use crate::error::{Error, ERROR_PREFIX};
use crate::progress::{BatchEvent, ChannelReporter, ProgressReporter};
use crate::scanner;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Scanning,
    Running,
    Completed,
    Stopped,
}

/// How a batch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Complete,
    Stopped,
    NoImages,
}

impl BatchStatus {
    pub fn message(&self) -> &'static str {
        match self {
            BatchStatus::Complete => "Processing Complete!",
            BatchStatus::Stopped => "Processing Stopped.",
            BatchStatus::NoImages => "No images found.",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub status: BatchStatus,
    pub total: usize,
    /// Captions produced by the model and written to disk.
    pub generated: usize,
    /// Existing captions reused without a model call.
    pub reused: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn new(total: usize) -> Self {
        Self {
            status: BatchStatus::Complete,
            total,
            generated: 0,
            reused: 0,
            failed: 0,
        }
    }
}

/// `floor(index / total * 100)`, computed in integers.
pub fn progress_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (index.min(total) * 100 / total) as u8
}

/// Captions every image of one directory, in sorted order, one request at a
/// time.
///
/// Existing captions are reused unless the job asks for overwrite, which
/// makes repeated runs over the same directory resumable. Cancellation is
/// checked between images only; a request in flight always runs to
/// completion.
pub struct BatchWorker<C: Captioner> {
    job: JobConfig,
    captioner: C,
    cancel_token: Arc<AtomicBool>,
    state: BatchState,
}

impl<C: Captioner> BatchWorker<C> {
    pub fn new(job: JobConfig, captioner: C) -> Self {
        Self {
            job,
            captioner,
            cancel_token: Arc::new(AtomicBool::new(false)),
            state: BatchState::Idle,
        }
    }

    pub fn job(&self) -> &JobConfig {
        &self.job
    }

    /// Shared flag; storing `true` stops the run at the next image boundary.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_token)
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token.load(Ordering::Relaxed)
    }

    fn set_state(&mut self, state: BatchState, reporter: &dyn ProgressReporter) {
        debug!("Batch state {:?} -> {:?}", self.state, state);
        self.state = state;
        reporter.on_state(state);
    }

    pub fn run(&mut self, reporter: &dyn ProgressReporter) -> BatchSummary {
        let start = Instant::now();

        self.set_state(BatchState::Scanning, reporter);
        let images = scanner::scan_directory(&self.job.directory);
        let total = images.len();
        let mut summary = BatchSummary::new(total);

        if total == 0 {
            info!("No images found in {}", self.job.directory.display());
            summary.status = BatchStatus::NoImages;
            self.set_state(BatchState::Completed, reporter);
            reporter.on_finished(summary.status);
            return summary;
        }

        info!(
            "Captioning {} images in {} with {}",
            total,
            self.job.directory.display(),
            self.job.model
        );
        self.set_state(BatchState::Running, reporter);

        for (index, entry) in images.iter().enumerate() {
            if self.is_cancelled() {
                break;
            }

            let message = format!("Processing {}/{}: {}", index + 1, total, entry.file_name());
            reporter.on_progress(&message, progress_percent(index, total));
            reporter.on_image_processing(entry.path());

            let caption = self.caption_entry(entry, &mut summary);
            reporter.on_image_finished(entry.path(), &caption);
        }

        if self.is_cancelled() {
            summary.status = BatchStatus::Stopped;
            self.set_state(BatchState::Stopped, reporter);
        } else {
            summary.status = BatchStatus::Complete;
            reporter.on_progress(summary.status.message(), 100);
            self.set_state(BatchState::Completed, reporter);
        }

        info!(
            "{} {} generated, {} reused, {} failed in {:.2}s",
            summary.status,
            summary.generated,
            summary.reused,
            summary.failed,
            start.elapsed().as_secs_f64()
        );
        reporter.on_finished(summary.status);
        summary
    }

    /// Produce the caption shown for `entry`. Failures come back as their
    /// `[ERROR]` text and are never written to disk.
    fn caption_entry(&self, entry: &ImageEntry, summary: &mut BatchSummary) -> String {
        if !self.job.overwrite && entry.has_caption() {
            match entry.read_caption() {
                Ok(Some(existing)) => {
                    debug!("Reusing existing caption for {}", entry.path().display());
                    summary.reused += 1;
                    return existing;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Error reading caption for {}: {}", entry.path().display(), e);
                    summary.failed += 1;
                    return format!("{} Could not read existing caption: {}", ERROR_PREFIX, e);
                }
            }
        }

        match self.captioner.caption(entry.path()) {
            Ok(caption) => {
                match entry.write_caption(&caption) {
                    Ok(()) => summary.generated += 1,
                    Err(e) => {
                        error!(
                            "Failed to write caption file for {}: {}",
                            entry.file_name(),
                            e
                        );
                        summary.failed += 1;
                    }
                }
                caption
            }
            Err(e) => {
                warn!("Caption failed for {}: {}", entry.file_name(), e);
                summary.failed += 1;
                e.to_string()
            }
        }
    }
}

impl<C: Captioner + 'static> BatchWorker<C> {
    /// Run on a background thread, reporting through a [`BatchEvent`]
    /// channel.
    pub fn spawn(mut self) -> BatchHandle {
        let (tx, rx) = mpsc::channel();
        let cancel_token = self.cancel_token();

        let join = thread::spawn(move || {
            let reporter = ChannelReporter::new(tx);
            self.run(&reporter)
        });

        BatchHandle {
            cancel_token,
            events: rx,
            join,
        }
    }
}

/// Owner's side of a background batch run.
pub struct BatchHandle {
    cancel_token: Arc<AtomicBool>,
    events: Receiver<BatchEvent>,
    join: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    pub fn stop(&self) {
        self.cancel_token.store(true, Ordering::Relaxed);
    }

    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Everything emitted since the last call, without blocking.
    pub fn drain_events(&self) -> Vec<BatchEvent> {
        self.events.try_iter().collect()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn join(self) -> Result<BatchSummary, Error> {
        self.join
            .join()
            .map_err(|_| Error::Other("batch worker panicked".to_string()))
    }
}
