use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

use crate::cache::{FileCleaner, ResultCache};
use crate::config::AppConfig;
use crate::delivery::{DeliveryDispatcher, DeliveryError, ImagePayload};
use crate::images::{JpegResizer, ThumbnailCache};
use crate::models::RequestContext;
use crate::pipeline::ScreenshotPipeline;
use crate::render::{CommandSupervisor, FallbackProvider, HttpRasterizer, RenderClient};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Failed to prepare cache directory: {0}")]
    CacheDir(#[from] std::io::Error),
}

/// Everything a request handler needs: resolve, optionally thumbnail, deliver.
pub struct ScreenshotService {
    pipeline: ScreenshotPipeline,
    dispatcher: DeliveryDispatcher,
    thumbnails: ThumbnailCache,
}

impl ScreenshotService {
    pub fn new(
        pipeline: ScreenshotPipeline,
        dispatcher: DeliveryDispatcher,
        thumbnails: ThumbnailCache,
    ) -> Self {
        Self {
            pipeline,
            dispatcher,
            thumbnails,
        }
    }

    /// Wires the production collaborators from configuration. Must run
    /// inside the Tokio runtime, the file cleaner spawns its worker here.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let cache = ResultCache::new(&config.cache_dir);
        cache.ensure_dir().await?;

        let fallback = FallbackProvider::new(&config.placeholder);
        if !fallback.placeholder().is_file() {
            error!("Placeholder image {} is missing", fallback.placeholder().display());
        }

        let render_timeout = Duration::from_secs(config.render_timeout);
        let rasterizer = HttpRasterizer::new(&config.rasterizer_url, render_timeout)?;
        info!("Rasterizer endpoint: {}", rasterizer.endpoint());

        let supervisor = CommandSupervisor::new(config.rasterizer_restart_command.as_deref());
        if !supervisor.is_configured() {
            info!("No rasterizer restart command configured");
        }

        let renderer = RenderClient::new(
            Arc::new(rasterizer),
            Arc::new(supervisor),
            cache.clone(),
            render_timeout,
        );
        let pipeline = ScreenshotPipeline::new(cache, renderer, fallback.clone());

        let cleaner = FileCleaner::spawn(Duration::from_secs(config.cleanup_delay));
        let dispatcher = DeliveryDispatcher::new(
            Duration::from_secs(config.callback_timeout),
            cleaner,
            fallback.clone(),
        )?;
        let thumbnails = ThumbnailCache::new(Arc::new(JpegResizer::default()), fallback)
            .with_max_width(config.max_thumbnail_width);

        Ok(Self::new(pipeline, dispatcher, thumbnails))
    }

    pub fn pipeline(&self) -> &ScreenshotPipeline {
        &self.pipeline
    }

    /// Resolves, thumbnails when a size hint was given, and loads the bytes
    /// for the response.
    pub async fn serve_inline(&self, context: &RequestContext) -> Result<ImagePayload, DeliveryError> {
        let resolved = self.pipeline.resolve(context).await;
        let served = match context.size_hint {
            Some(width) => self.thumbnails.thumbnail_for(&resolved.location, width).await,
            None => resolved.location.clone(),
        };
        self.dispatcher.load_inline(&served, &resolved.location).await
    }

    /// Runs resolution and the callback POST in the background. The caller
    /// answers its own request without waiting on the handle.
    pub fn spawn_callback(self: &Arc<Self>, context: RequestContext, callback: Url) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let resolved = service.pipeline.resolve(&context).await;
            if let Err(e) = service
                .dispatcher
                .post_to_callback(&resolved.location, &callback)
                .await
            {
                error!("Delivery to {} failed: {}", callback, e);
            }
        })
    }
}
