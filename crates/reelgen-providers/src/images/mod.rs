//! Background image acquisition: stock search, local assets, placeholders.

mod cache;
mod chain;
mod download;
mod local;
mod pexels;
mod pixabay;

pub use cache::{ImageCache, DEFAULT_CACHE_TTL};
pub use chain::ImageChain;
pub use download::{download_image, extension_for_url};
pub use local::{list_local_images, IMAGE_EXTENSIONS};
pub use pexels::{PexelsConfig, PexelsProvider};
pub use pixabay::{PixabayConfig, PixabayProvider};

use async_trait::async_trait;
use reelgen_models::{Orientation, Resolution};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ProviderResult;

/// A stock photo search backend.
#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    /// Service name used for breakers and health records.
    fn name(&self) -> &str;

    /// Up to `count` image URLs for `query`, sized for `orientation`.
    async fn search(&self, query: &str, count: usize, orientation: Orientation) -> ProviderResult<Vec<String>>;
}

/// Where an acquired image came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ImageSource {
    Remote { provider: String },
    Local,
    Generated,
}

/// One image file in the job workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquiredImage {
    pub path: PathBuf,
    pub source: ImageSource,
}

/// What the image chain is asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub query: String,
    pub count: usize,
    pub resolution: Resolution,
    /// Reuse a prior search result stored under this key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

impl ImageRequest {
    pub fn new(query: impl Into<String>, count: usize, resolution: Resolution) -> Self {
        Self {
            query: query.into(),
            count,
            resolution,
            cache_key: None,
        }
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn orientation(&self) -> Orientation {
        self.resolution.orientation()
    }
}
