use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use log::{error, info};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use url::Url;

use crate::cache::FileCleaner;
use crate::images::detect_image_type;
use crate::render::FallbackProvider;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("File does not exist: {0}")]
    Missing(PathBuf),

    #[error("Error while reading file: {0}")]
    Io(#[from] io::Error),

    #[error("Error while streaming screenshot: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Callback responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// An opened result file, positioned at its start, ready to be streamed.
#[derive(Debug)]
pub struct ImagePayload {
    pub file: File,
    pub len: u64,
    pub content_type: &'static str,
    /// Validator over the file's name, size and modification time
    pub etag: String,
}

impl ImagePayload {
    async fn open(path: &Path) -> Result<Self, DeliveryError> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!("File does not exist! {}", path.display());
                return Err(DeliveryError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata().await?;
        let len = metadata.len();
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();

        let mut signature = [0u8; 12];
        let mut filled = 0;
        while filled < signature.len() {
            let n = file.read(&mut signature[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        file.seek(SeekFrom::Start(0)).await?;

        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let etag = format!(
            "\"{:x}\"",
            md5::compute(format!("{}:{}:{}", name, len, modified.as_nanos()))
        );

        Ok(Self {
            file,
            len,
            content_type: detect_image_type(&signature[..filled]),
            etag,
        })
    }

    #[cfg(test)]
    pub async fn into_bytes(mut self) -> Vec<u8> {
        let mut data = Vec::new();
        self.file.read_to_end(&mut data).await.unwrap();
        data
    }
}

/// Hands a finished result to its destination and then to the cleaner.
///
/// The placeholder is never registered for cleanup. Files are opened before
/// they are registered and the cleaner waits `cleanup_delay`, so a transfer
/// in progress keeps its data.
pub struct DeliveryDispatcher {
    client: Client,
    cleaner: FileCleaner,
    fallback: FallbackProvider,
}

impl DeliveryDispatcher {
    pub fn new(
        timeout: Duration,
        cleaner: FileCleaner,
        fallback: FallbackProvider,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            cleaner,
            fallback,
        })
    }

    /// Opens `served` to be streamed as the response body. `origin` is the
    /// cache entry it was derived from, which may be the same file.
    pub async fn load_inline(&self, served: &Path, origin: &Path) -> Result<ImagePayload, DeliveryError> {
        info!("Sending image in response");
        let payload = ImagePayload::open(served).await?;

        self.reclaim(served);
        if origin != served {
            self.reclaim(origin);
        }

        Ok(payload)
    }

    pub async fn post_to_callback(&self, location: &Path, callback: &Url) -> Result<(), DeliveryError> {
        info!("Streaming image to {}", callback);
        let payload = ImagePayload::open(location).await?;

        let sent = self
            .client
            .post(callback.clone())
            .header(CONTENT_TYPE, payload.content_type)
            .header(CONTENT_LENGTH, payload.len)
            .body(Body::from(payload.file))
            .send()
            .await;
        // The file has been consumed whatever the callback made of it
        self.reclaim(location);

        let status = sent?.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status));
        }
        info!("Posted screenshot to {}", callback);
        Ok(())
    }

    fn reclaim(&self, path: &Path) {
        if !self.fallback.is_placeholder(path) {
            self.cleaner.add_file(path);
        }
    }
}
