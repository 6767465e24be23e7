//! Pexels photo search.

use async_trait::async_trait;
use reelgen_models::Orientation;
use serde::Deserialize;

use super::ImageSearchProvider;
use crate::error::ProviderResult;
use crate::http::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.pexels.com";
const MAX_PER_PAGE: usize = 80;

#[derive(Debug, Clone)]
pub struct PexelsConfig {
    pub api_key: String,
    pub base_url: String,
}

impl PexelsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// `PEXELS_API_KEY` (required), `PEXELS_BASE_URL`.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("PEXELS_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("PEXELS_BASE_URL") {
            config.base_url = base_url;
        }
        Some(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    src: PhotoSources,
}

#[derive(Debug, Deserialize)]
struct PhotoSources {
    original: Option<String>,
    large2x: Option<String>,
    portrait: Option<String>,
    landscape: Option<String>,
}

impl PhotoSources {
    fn for_orientation(self, orientation: Orientation) -> Option<String> {
        let preferred = match orientation {
            Orientation::Portrait => self.portrait,
            Orientation::Landscape => self.landscape,
            Orientation::Square => None,
        };
        preferred.or(self.large2x).or(self.original)
    }
}

pub struct PexelsProvider {
    config: PexelsConfig,
    http: HttpTransport,
}

impl PexelsProvider {
    pub fn new(config: PexelsConfig, http: HttpTransport) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl ImageSearchProvider for PexelsProvider {
    fn name(&self) -> &str {
        "pexels"
    }

    async fn search(&self, query: &str, count: usize, orientation: Orientation) -> ProviderResult<Vec<String>> {
        let url = format!("{}/v1/search", self.config.base_url.trim_end_matches('/'));
        let per_page = count.clamp(1, MAX_PER_PAGE).to_string();

        let response: SearchResponse = self
            .http
            .fetch_json(self.name(), |client| {
                client
                    .get(&url)
                    .header("Authorization", &self.config.api_key)
                    .query(&[
                        ("query", query),
                        ("per_page", per_page.as_str()),
                        ("orientation", orientation.as_str()),
                    ])
            })
            .await?;

        Ok(response
            .photos
            .into_iter()
            .filter_map(|p| p.src.for_orientation(orientation))
            .collect())
    }
}
