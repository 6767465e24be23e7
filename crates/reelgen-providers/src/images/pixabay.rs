//! Pixabay photo search.

use async_trait::async_trait;
use reelgen_models::Orientation;
use serde::Deserialize;

use super::ImageSearchProvider;
use crate::error::ProviderResult;
use crate::http::HttpTransport;

pub const DEFAULT_BASE_URL: &str = "https://pixabay.com";
/// Pixabay rejects `per_page` outside 3..=200.
const PER_PAGE_RANGE: (usize, usize) = (3, 200);

#[derive(Debug, Clone)]
pub struct PixabayConfig {
    pub api_key: String,
    pub base_url: String,
}

impl PixabayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// `PIXABAY_API_KEY` (required), `PIXABAY_BASE_URL`.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("PIXABAY_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("PIXABAY_BASE_URL") {
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
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "largeImageURL")]
    large_image_url: Option<String>,
    #[serde(rename = "webformatURL")]
    webformat_url: Option<String>,
}

fn orientation_param(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Portrait => "vertical",
        Orientation::Landscape => "horizontal",
        Orientation::Square => "all",
    }
}

pub struct PixabayProvider {
    config: PixabayConfig,
    http: HttpTransport,
}

impl PixabayProvider {
    pub fn new(config: PixabayConfig, http: HttpTransport) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl ImageSearchProvider for PixabayProvider {
    fn name(&self) -> &str {
        "pixabay"
    }

    async fn search(&self, query: &str, count: usize, orientation: Orientation) -> ProviderResult<Vec<String>> {
        let url = format!("{}/api/", self.config.base_url.trim_end_matches('/'));
        let per_page = count.clamp(PER_PAGE_RANGE.0, PER_PAGE_RANGE.1).to_string();

        let response: SearchResponse = self
            .http
            .fetch_json(self.name(), |client| {
                client.get(&url).query(&[
                    ("key", self.config.api_key.as_str()),
                    ("q", query),
                    ("image_type", "photo"),
                    ("orientation", orientation_param(orientation)),
                    ("per_page", per_page.as_str()),
                    ("safesearch", "true"),
                ])
            })
            .await?;

        Ok(response
            .hits
            .into_iter()
            .filter_map(|h| h.large_image_url.or(h.webformat_url))
            .take(count)
            .collect())
    }
}
