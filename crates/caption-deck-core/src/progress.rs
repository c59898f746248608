use crate::worker::{BatchState, BatchStatus};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

/// Trait for reporting batch progress.
///
/// CLI implements with tracing/indicatif, UIs use [`ChannelReporter`] to hand
/// events to their own thread. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_state(&self, _state: BatchState) {}
    fn on_progress(&self, _message: &str, _percent: u8) {}
    fn on_image_processing(&self, _image_path: &Path) {}
    fn on_image_finished(&self, _image_path: &Path, _caption: &str) {}
    fn on_finished(&self, _status: BatchStatus) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Everything a batch run tells its observer, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    State(BatchState),
    Progress { message: String, percent: u8 },
    ImageProcessing(PathBuf),
    ImageFinished { image_path: PathBuf, caption: String },
    Finished(BatchStatus),
}

/// Forwards every callback as a [`BatchEvent`]. The worker never touches
/// the receiving side's state directly.
pub struct ChannelReporter {
    tx: Mutex<Sender<BatchEvent>>,
}

impl ChannelReporter {
    pub fn new(tx: Sender<BatchEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }

    fn send(&self, event: BatchEvent) {
        if let Ok(tx) = self.tx.lock() {
            // Receiver gone means nobody is watching any more
            let _ = tx.send(event);
        }
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_state(&self, state: BatchState) {
        self.send(BatchEvent::State(state));
    }

    fn on_progress(&self, message: &str, percent: u8) {
        self.send(BatchEvent::Progress {
            message: message.to_string(),
            percent,
        });
    }

    fn on_image_processing(&self, image_path: &Path) {
        self.send(BatchEvent::ImageProcessing(image_path.to_path_buf()));
    }

    fn on_image_finished(&self, image_path: &Path, caption: &str) {
        self.send(BatchEvent::ImageFinished {
            image_path: image_path.to_path_buf(),
            caption: caption.to_string(),
        });
    }

    fn on_finished(&self, status: BatchStatus) {
        self.send(BatchEvent::Finished(status));
    }
}
