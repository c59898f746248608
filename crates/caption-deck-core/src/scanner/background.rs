use super::walk::collect_images;
use crate::entry::ImageEntry;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Full result of one background scan, delivered once.
#[derive(Debug, Clone)]
pub struct ScanMessage {
    pub generation: u64,
    pub directory: PathBuf,
    pub entries: Vec<ImageEntry>,
}

/// Runs directory scans off the UI thread, one at a time.
///
/// Every `start` bumps the generation counter. A scan whose generation is no
/// longer current stops at its next entry and never delivers its result, and
/// any stale message already queued is dropped on receive.
pub struct DirectoryScanner {
    generation: Arc<AtomicU64>,
    tx: Sender<ScanMessage>,
    rx: Receiver<ScanMessage>,
    worker: Option<JoinHandle<()>>,
}

impl DirectoryScanner {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            tx,
            rx,
            worker: None,
        }
    }

    /// Start scanning `directory`, superseding any scan in flight.
    pub fn start(&mut self, directory: impl Into<PathBuf>) -> u64 {
        let directory = directory.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // The superseded thread is left to notice the new generation on its own.
        if let Some(previous) = self.worker.take() {
            if !previous.is_finished() {
                debug!("Superseding in-flight scan with generation {}", generation);
            }
        }

        let current = Arc::clone(&self.generation);
        let tx = self.tx.clone();
        info!("Scanning {} (generation {})", directory.display(), generation);

        self.worker = Some(thread::spawn(move || {
            let is_stale = || current.load(Ordering::SeqCst) != generation;
            let Some(entries) = collect_images(&directory, is_stale) else {
                return;
            };
            if is_stale() {
                return;
            }
            let _ = tx.send(ScanMessage {
                generation,
                directory,
                entries,
            });
        }));

        generation
    }

    /// Abort the in-flight scan without starting another.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_scanning(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Non-blocking poll for the current scan's result.
    pub fn try_recv(&self) -> Option<ScanMessage> {
        while let Ok(message) = self.rx.try_recv() {
            if message.generation == self.current_generation() {
                return Some(message);
            }
            debug!("Discarding stale scan result (generation {})", message.generation);
        }
        None
    }

    /// Wait up to `timeout` for the current scan's result.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ScanMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(message) if message.generation == self.current_generation() => {
                    return Some(message)
                }
                Ok(message) => {
                    debug!("Discarding stale scan result (generation {})", message.generation);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new()
    }
}
