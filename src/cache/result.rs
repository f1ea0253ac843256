use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::cache::fingerprint::Fingerprint;

/// Disk-resident screenshot cache. A fingerprint maps to one file name in
/// `dir`; presence of a non-empty file is a hit.
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(fingerprint.file_name())
    }

    /// Unique scratch location for a render in progress. Never matches
    /// `path_for`, so a half-written file can't be taken for a hit.
    pub fn temp_path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!(
            ".{}.{:08x}.tmp",
            fingerprint.file_name(),
            rand::random::<u32>()
        ))
    }

    pub async fn lookup(&self, fingerprint: &Fingerprint) -> bool {
        is_ready(&self.path_for(fingerprint)).await
    }

    /// Moves a finished render into place.
    pub async fn commit(&self, temp: &Path, fingerprint: &Fingerprint) -> io::Result<PathBuf> {
        let path = self.path_for(fingerprint);
        tokio::fs::rename(temp, &path).await?;
        debug!("Cached {} at {}", fingerprint, path.display());
        Ok(path)
    }
}

/// True when `path` is a regular, non-empty file.
pub async fn is_ready(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() > 0)
}
