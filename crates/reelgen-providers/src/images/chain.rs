use reelgen_media::{copy_file, render_placeholder};
use reelgen_resilience::ResilienceMonitor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::ImageCache;
use super::download::download_image;
use super::local::list_local_images;
use super::{AcquiredImage, ImageRequest, ImageSearchProvider, ImageSource};
use crate::error::{ChainError, ChainResult};
use crate::http::{is_usable_url, HttpTransport};

/// Remote search, then local examples, then generated placeholders.
pub struct ImageChain {
    providers: Vec<Arc<dyn ImageSearchProvider>>,
    http: Option<HttpTransport>,
    cache: Arc<ImageCache>,
    local_dir: Option<PathBuf>,
    monitor: Option<ResilienceMonitor>,
}

impl std::fmt::Debug for ImageChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageChain")
            .field("providers", &self.providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>())
            .field("local_dir", &self.local_dir)
            .finish()
    }
}

impl Default for ImageChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageChain {
    /// A chain that only generates placeholders.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            http: None,
            cache: Arc::new(ImageCache::default()),
            local_dir: None,
            monitor: None,
        }
    }

    /// Stock providers, tried in order, and the transport used for downloads.
    pub fn with_remote(mut self, providers: Vec<Arc<dyn ImageSearchProvider>>, http: HttpTransport) -> Self {
        self.providers = providers;
        self.http = Some(http);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ImageCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    pub fn with_monitor(mut self, monitor: ResilienceMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    fn ordered_providers(&self) -> Vec<&Arc<dyn ImageSearchProvider>> {
        let mut providers: Vec<_> = self.providers.iter().collect();
        if let Some(monitor) = &self.monitor {
            providers.sort_by_key(|p| monitor.is_degraded(p.name()));
        }
        providers
    }

    /// Acquire exactly `request.count` images into `workspace`.
    pub async fn acquire(&self, request: &ImageRequest, workspace: &Path) -> ChainResult<Vec<AcquiredImage>> {
        let wanted = request.count;
        let mut images = Vec::with_capacity(wanted);
        if wanted == 0 {
            return Ok(images);
        }

        if let Some((provider, urls)) = self.remote_urls(request).await {
            self.download_all(&provider, &urls, workspace, &mut images).await;
        }

        if images.len() < wanted {
            self.fill_local(wanted, workspace, &mut images).await?;
        }

        let mut generated = 0;
        while images.len() < wanted {
            let index = images.len();
            let path = workspace.join(format!("image_{index:02}.png"));
            let path = render_placeholder(&path, index, request.resolution).await?;
            images.push(AcquiredImage {
                path,
                source: ImageSource::Generated,
            });
            generated += 1;
        }

        info!(
            query = %request.query,
            count = wanted,
            generated,
            "Images acquired"
        );
        Ok(images)
    }

    /// First N URLs from the cache or the first provider with enough results.
    async fn remote_urls(&self, request: &ImageRequest) -> Option<(String, Vec<String>)> {
        let wanted = request.count;

        if let Some(key) = &request.cache_key {
            if let Some((provider, mut urls)) = self.cache.get(key, wanted) {
                debug!(key = %key, "Image search cache hit");
                urls.truncate(wanted);
                return Some((provider, urls));
            }
        }

        self.http.as_ref()?;

        for provider in self.ordered_providers() {
            match provider.search(&request.query, wanted, request.orientation()).await {
                Ok(urls) => {
                    let usable: Vec<String> = urls.into_iter().filter(|u| is_usable_url(u)).collect();
                    if usable.len() >= wanted {
                        if let Some(key) = &request.cache_key {
                            self.cache.put(key.clone(), provider.name(), usable.clone());
                        }
                        return Some((provider.name().to_string(), usable.into_iter().take(wanted).collect()));
                    }
                    debug!(
                        provider = provider.name(),
                        usable = usable.len(),
                        wanted,
                        "Not enough search results"
                    );
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Image search failed");
                    metrics::counter!("reelgen_provider_failures_total", "provider" => provider.name().to_string())
                        .increment(1);
                    if let Some(monitor) = &self.monitor {
                        monitor.handle_service_error(provider.name(), &e.to_string(), e.error_type());
                    }
                }
            }
        }
        None
    }

    async fn download_all(&self, provider: &str, urls: &[String], workspace: &Path, images: &mut Vec<AcquiredImage>) {
        let Some(http) = &self.http else {
            return;
        };
        for url in urls {
            let stem = format!("image_{:02}", images.len());
            match download_image(http, url, workspace, &stem).await {
                Ok(path) => images.push(AcquiredImage {
                    path,
                    source: ImageSource::Remote {
                        provider: provider.to_string(),
                    },
                }),
                Err(e) => warn!(url = %url, error = %e, "Image download failed"),
            }
        }
    }

    async fn fill_local(&self, wanted: usize, workspace: &Path, images: &mut Vec<AcquiredImage>) -> ChainResult<()> {
        let Some(dir) = &self.local_dir else {
            return Ok(());
        };
        let local = match list_local_images(dir).await {
            Ok(local) => local,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Local images unreadable");
                return Ok(());
            }
        };

        for source in local.into_iter().take(wanted - images.len()) {
            let ext = source
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase)
                .unwrap_or_else(|| "jpg".to_string());
            let dest = workspace.join(format!("image_{:02}.{ext}", images.len()));
            match copy_file(&source, &dest).await {
                Ok(()) => images.push(AcquiredImage {
                    path: dest,
                    source: ImageSource::Local,
                }),
                Err(e) => warn!(source = %source.display(), error = %e, "Local image copy failed"),
            }
        }
        Ok(())
    }
}
