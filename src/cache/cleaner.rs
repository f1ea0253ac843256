use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

/// Deletes consumed cache files some time after they were delivered.
///
/// `add_file` never blocks and never fails the caller; the deletion happens
/// on a background task.
#[derive(Debug, Clone)]
pub struct FileCleaner {
    sender: mpsc::UnboundedSender<PathBuf>,
}

impl FileCleaner {
    /// Starts the deletion worker on the current runtime.
    pub fn spawn(delay: Duration) -> Self {
        let (cleaner, receiver) = Self::detached();
        tokio::spawn(run_worker(receiver, delay));
        info!("File cleaner started, consumed files are removed after {:?}", delay);
        cleaner
    }

    /// A cleaner whose registrations are handed to the returned receiver
    /// instead of a worker.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn add_file(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!("Registering {} for cleanup", path.display());
        if let Err(e) = self.sender.send(path) {
            warn!("File cleaner is gone, {} will not be removed", e.0.display());
        }
    }
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<PathBuf>, delay: Duration) {
    while let Some(path) = receiver.recv().await {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        });
    }
}
