pub mod fallback;
pub mod http;
pub mod supervisor;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{error, info};
use regex::Regex;
use thiserror::Error;

use crate::cache::{Fingerprint, ResultCache};
use crate::models::RenderRequest;

pub use fallback::FallbackProvider;
pub use http::HttpRasterizer;
pub use supervisor::{BackendSupervisor, CommandSupervisor};

lazy_static! {
    // The rasterizer reports its own failures in the body, sometimes with a 200
    static ref ERROR_MARKER: Regex = Regex::new(r"Error:").unwrap();
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Rasterizer reported an error: {0}")]
    ErrorMarker(String),

    #[error("Rasterizer responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Rasterizer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Rasterizer returned an empty body")]
    EmptyBody,

    #[error("Cache write error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Whether the failure points at the rasterizer itself rather than at
    /// local storage.
    pub fn is_backend_failure(&self) -> bool {
        !matches!(self, RenderError::Io(_))
    }
}

/// Transport to the rendering backend. Returns the raw response body.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, request: &RenderRequest, filename: &str)
        -> Result<Vec<u8>, RenderError>;
}

pub struct RenderClient {
    rasterizer: Arc<dyn Rasterizer>,
    supervisor: Arc<dyn BackendSupervisor>,
    cache: ResultCache,
    timeout: Duration,
}

impl RenderClient {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        supervisor: Arc<dyn BackendSupervisor>,
        cache: ResultCache,
        timeout: Duration,
    ) -> Self {
        Self {
            rasterizer,
            supervisor,
            cache,
            timeout,
        }
    }

    /// Renders `request` into the cache slot for `fingerprint`.
    ///
    /// The slot is only filled on success. Any backend failure signals the
    /// supervisor before it is returned.
    pub async fn render(
        &self,
        request: &RenderRequest,
        fingerprint: &Fingerprint,
    ) -> Result<PathBuf, RenderError> {
        info!("Rasterizing {} as {}", request.url, fingerprint);

        let result = match self.call_backend(request, fingerprint).await {
            Ok(image) => self.store(&image, fingerprint).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            error!("Error while requesting the rasterizer for {}: {}", request.url, e);
            if e.is_backend_failure() {
                self.supervisor.restart();
            }
        }

        result
    }

    async fn call_backend(
        &self,
        request: &RenderRequest,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<u8>, RenderError> {
        let filename = fingerprint.file_name();
        let body = tokio::time::timeout(self.timeout, self.rasterizer.rasterize(request, &filename))
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))??;
        check_body(body)
    }

    async fn store(&self, image: &[u8], fingerprint: &Fingerprint) -> Result<PathBuf, RenderError> {
        let temp = self.cache.temp_path_for(fingerprint);
        if let Err(e) = tokio::fs::write(&temp, image).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        match self.cache.commit(&temp, fingerprint).await {
            Ok(path) => Ok(path),
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                Err(e.into())
            }
        }
    }
}

fn check_body(body: Vec<u8>) -> Result<Vec<u8>, RenderError> {
    if body.is_empty() {
        return Err(RenderError::EmptyBody);
    }
    // Image bytes are almost never valid UTF-8; only text bodies carry the marker
    if let Ok(text) = std::str::from_utf8(&body) {
        if ERROR_MARKER.is_match(text) {
            return Err(RenderError::ErrorMarker(text.trim().to_string()));
        }
    }
    Ok(body)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub enum Behavior {
        Image(Vec<u8>),
        Fail(fn() -> RenderError),
        Hang,
    }

    /// Rasterizer double that counts calls and records what it was asked.
    pub struct FakeRasterizer {
        pub behavior: Behavior,
        pub delay: Duration,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl FakeRasterizer {
        pub fn returning(image: &[u8]) -> Self {
            Self::with(Behavior::Image(image.to_vec()))
        }

        pub fn with(behavior: Behavior) -> Self {
            Self {
                behavior,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn rasterize(
            &self,
            request: &RenderRequest,
            _filename: &str,
        ) -> Result<Vec<u8>, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push((
                request.url.clone(),
                request
                    .options
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect(),
            ));
            tokio::time::sleep(self.delay).await;
            match &self.behavior {
                Behavior::Image(bytes) => Ok(bytes.clone()),
                Behavior::Fail(make) => Err(make()),
                Behavior::Hang => futures::future::pending().await,
            }
        }
    }

    #[derive(Default)]
    pub struct CountingSupervisor {
        pub restarts: AtomicUsize,
    }

    impl CountingSupervisor {
        pub fn restarts(&self) -> usize {
            self.restarts.load(Ordering::SeqCst)
        }
    }

    impl BackendSupervisor for CountingSupervisor {
        fn restart(&self) {
            self.restarts.fetch_add(1, Ordering::SeqCst);
        }
    }
}
