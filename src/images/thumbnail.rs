use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::cache::{is_ready, SingleFlight};
use crate::images::tools::{ResizeError, Resizer};
use crate::render::FallbackProvider;

pub const DEFAULT_MAX_WIDTH: u32 = 2048;

/// Lazily derived, width-specific variants of cached screenshots.
///
/// A variant lives next to its source as `<stem>_<width>.jpg` and is reused
/// once written. Callers only get a variant path back after the file is on
/// disk and non-empty; on any resize failure they get the source back.
pub struct ThumbnailCache {
    resizer: Arc<dyn Resizer>,
    fallback: FallbackProvider,
    max_width: u32,
    flights: SingleFlight<PathBuf, Result<(), ResizeError>>,
}

impl ThumbnailCache {
    pub fn new(resizer: Arc<dyn Resizer>, fallback: FallbackProvider) -> Self {
        Self {
            resizer,
            fallback,
            max_width: DEFAULT_MAX_WIDTH,
            flights: SingleFlight::new(),
        }
    }

    /// Widths above `max_width` are never resized; the original is served.
    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width;
        self
    }

    pub async fn thumbnail_for(&self, location: &Path, width: u32) -> PathBuf {
        if self.fallback.is_placeholder(location) {
            return location.to_path_buf();
        }
        if width > self.max_width {
            warn!(
                "Thumbnail width {} exceeds the limit of {}. Serving original",
                width, self.max_width
            );
            return location.to_path_buf();
        }

        let derived = derived_path(location, width);
        if is_ready(&derived).await {
            debug!("{} exists", derived.display());
            return derived;
        }

        let resizer = Arc::clone(&self.resizer);
        let source = location.to_path_buf();
        let target = derived.clone();
        let outcome = self
            .flights
            .run(derived.clone(), move || produce(resizer, source, target, width))
            .await;

        match outcome {
            Some(Ok(())) => derived,
            Some(Err(e)) => {
                warn!("Failed to resize {} to width {}: {}. Serving original", location.display(), width, e);
                location.to_path_buf()
            }
            None => {
                error!("Resize task for {} panicked. Serving original", location.display());
                location.to_path_buf()
            }
        }
    }
}

/// `cache/screenshot_ab.jpg` at width 120 becomes `cache/screenshot_ab_120.jpg`.
pub fn derived_path(source: &Path, width: u32) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{}_{}.jpg", stem, width))
}

async fn produce(
    resizer: Arc<dyn Resizer>,
    source: PathBuf,
    target: PathBuf,
    width: u32,
) -> Result<(), ResizeError> {
    // Another flight may have finished between the caller's check and ours
    if is_ready(&target).await {
        return Ok(());
    }

    let temp = target.with_file_name(format!(
        ".{}.{:08x}.tmp",
        target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        rand::random::<u32>()
    ));

    let result = write_variant(resizer, &source, &temp, &target, width).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp).await;
    }
    result
}

async fn write_variant(
    resizer: Arc<dyn Resizer>,
    source: &Path,
    temp: &Path,
    target: &Path,
    width: u32,
) -> Result<(), ResizeError> {
    let (src, dst) = (source.to_path_buf(), temp.to_path_buf());
    tokio::task::spawn_blocking(move || resizer.resize(&src, &dst, width))
        .await
        .map_err(|e| ResizeError::Join(e.to_string()))??;

    if !is_ready(temp).await {
        return Err(ResizeError::Empty);
    }
    tokio::fs::rename(temp, target).await?;
    info!("Resized {} to width {}", source.display(), width);
    Ok(())
}
