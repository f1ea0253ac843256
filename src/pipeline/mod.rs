pub mod service;

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};

use crate::cache::{Fingerprint, ResultCache, SingleFlight};
use crate::models::RequestContext;
use crate::render::{FallbackProvider, RenderClient};

pub use service::{ScreenshotService, StartupError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    CacheHit,
    Rendered,
    Placeholder,
}

/// The single location a request will be served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub location: PathBuf,
    pub source: Source,
}

/// Cache lookup, coalesced rendering and placeholder substitution.
pub struct ScreenshotPipeline {
    cache: ResultCache,
    renderer: Arc<RenderClient>,
    fallback: FallbackProvider,
    flights: SingleFlight<Fingerprint, Option<PathBuf>>,
}

impl ScreenshotPipeline {
    pub fn new(cache: ResultCache, renderer: RenderClient, fallback: FallbackProvider) -> Self {
        Self {
            cache,
            renderer: Arc::new(renderer),
            fallback,
            flights: SingleFlight::new(),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn fallback(&self) -> &FallbackProvider {
        &self.fallback
    }

    pub async fn resolve(&self, context: &RequestContext) -> Resolved {
        let url = &context.request.url;
        let fingerprint = &context.fingerprint;

        if self.cache.lookup(fingerprint).await {
            info!("Request for {} - Found in cache", url);
            return Resolved {
                location: self.cache.path_for(fingerprint),
                source: Source::CacheHit,
            };
        }

        info!("Request for {} - Rasterizing it", url);
        let renderer = Arc::clone(&self.renderer);
        let cache = self.cache.clone();
        let request = context.request.clone();
        let key = fingerprint.clone();
        let rendered = self
            .flights
            .run(fingerprint.clone(), move || async move {
                if cache.lookup(&key).await {
                    return Some(cache.path_for(&key));
                }
                renderer.render(&request, &key).await.ok()
            })
            .await;

        match rendered {
            Some(Some(location)) => Resolved {
                location,
                source: Source::Rendered,
            },
            Some(None) => self.placeholder(),
            None => {
                error!("Render task for {} panicked", url);
                self.placeholder()
            }
        }
    }

    fn placeholder(&self) -> Resolved {
        Resolved {
            location: self.fallback.placeholder().to_path_buf(),
            source: Source::Placeholder,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::render::testing::{CountingSupervisor, FakeRasterizer};
    use std::path::Path;
    use std::time::Duration;

    pub const PLACEHOLDER_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0xAA];

    pub struct Harness {
        pub dir: tempfile::TempDir,
        pub rasterizer: Arc<FakeRasterizer>,
        pub supervisor: Arc<CountingSupervisor>,
        pub cache: ResultCache,
        pub fallback: FallbackProvider,
    }

    impl Harness {
        pub fn new(rasterizer: FakeRasterizer) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let placeholder = dir.path().join("preview-unavailable.png");
            std::fs::write(&placeholder, PLACEHOLDER_BYTES).unwrap();
            let cache_dir = dir.path().join("cache");
            std::fs::create_dir(&cache_dir).unwrap();
            Self {
                rasterizer: Arc::new(rasterizer),
                supervisor: Arc::new(CountingSupervisor::default()),
                cache: ResultCache::new(cache_dir),
                fallback: FallbackProvider::new(placeholder),
                dir,
            }
        }

        pub fn root(&self) -> &Path {
            self.dir.path()
        }

        pub fn pipeline(&self) -> ScreenshotPipeline {
            let renderer = RenderClient::new(
                self.rasterizer.clone(),
                self.supervisor.clone(),
                self.cache.clone(),
                Duration::from_millis(500),
            );
            ScreenshotPipeline::new(self.cache.clone(), renderer, self.fallback.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::{DeliveryTarget, RenderOptions, RenderRequest};
    use crate::render::testing::{Behavior, FakeRasterizer};
    use crate::render::RenderError;
    use std::time::Duration;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x42];

    fn context(width: &str) -> RequestContext {
        RequestContext::new(
            RenderRequest::new("http://example.com", RenderOptions::from_pairs([("width", width)])),
            DeliveryTarget::Inline,
        )
    }

    #[tokio::test]
    async fn cache_hit_bypasses_the_renderer() {
        let harness = Harness::new(FakeRasterizer::returning(JPEG));
        let pipeline = harness.pipeline();
        let ctx = context("320");
        std::fs::write(harness.cache.path_for(&ctx.fingerprint), JPEG).unwrap();

        let resolved = pipeline.resolve(&ctx).await;

        assert_eq!(resolved.source, Source::CacheHit);
        assert_eq!(resolved.location, harness.cache.path_for(&ctx.fingerprint));
        assert_eq!(harness.rasterizer.calls(), 0);
    }

    #[tokio::test]
    async fn miss_renders_then_hits() {
        let harness = Harness::new(FakeRasterizer::returning(JPEG));
        let pipeline = harness.pipeline();
        let ctx = context("320");

        let first = pipeline.resolve(&ctx).await;
        let second = pipeline.resolve(&ctx).await;

        assert_eq!(first.source, Source::Rendered);
        assert_eq!(second.source, Source::CacheHit);
        assert_eq!(first.location, second.location);
        assert_eq!(harness.rasterizer.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_render_once() {
        let harness =
            Harness::new(FakeRasterizer::returning(JPEG).delayed(Duration::from_millis(100)));
        let pipeline = harness.pipeline();
        let (a, b) = (context("320"), context("320"));
        assert_eq!(a.fingerprint, b.fingerprint);

        let (ra, rb) = tokio::join!(pipeline.resolve(&a), pipeline.resolve(&b));

        assert_eq!(harness.rasterizer.calls(), 1);
        assert_eq!(ra, rb);
        assert_eq!(std::fs::read(&ra.location).unwrap(), JPEG);
    }

    #[tokio::test]
    async fn different_options_render_separately() {
        let harness = Harness::new(FakeRasterizer::returning(JPEG));
        let pipeline = harness.pipeline();

        let r320 = pipeline.resolve(&context("320")).await;
        let r640 = pipeline.resolve(&context("640")).await;

        assert_ne!(r320.location, r640.location);
        assert_eq!(harness.rasterizer.calls(), 2);
    }

    #[tokio::test]
    async fn backend_failure_resolves_to_placeholder() {
        let harness = Harness::new(FakeRasterizer::with(Behavior::Fail(|| {
            RenderError::ErrorMarker("Error: boom".into())
        })));
        let pipeline = harness.pipeline();
        let ctx = context("320");

        let resolved = pipeline.resolve(&ctx).await;

        assert_eq!(resolved.source, Source::Placeholder);
        assert_eq!(resolved.location, harness.fallback.placeholder());
        assert!(!harness.cache.lookup(&ctx.fingerprint).await);
        assert_eq!(harness.supervisor.restarts(), 1);
    }

    #[tokio::test]
    async fn failed_render_is_retried_by_next_request() {
        let harness = Harness::new(FakeRasterizer::with(Behavior::Fail(|| RenderError::EmptyBody)));
        let pipeline = harness.pipeline();
        let ctx = context("320");

        pipeline.resolve(&ctx).await;
        pipeline.resolve(&ctx).await;

        assert_eq!(harness.rasterizer.calls(), 2);
        assert!(harness.root().join("cache").read_dir().unwrap().next().is_none());
    }
}
