use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::http::HttpTransport;

use super::local::IMAGE_EXTENSIONS;

/// Breaker key shared by all image downloads.
pub const DOWNLOAD_SERVICE: &str = "image_download";

/// File extension implied by the URL path, `jpg` when unknown.
pub fn extension_for_url(url: &str) -> &'static str {
    let ext = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase)
        })
        .unwrap_or_default();

    IMAGE_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .copied()
        .unwrap_or("jpg")
}

/// Download `url` to `dir/<stem>.<ext>`.
pub async fn download_image(http: &HttpTransport, url: &str, dir: &Path, stem: &str) -> ProviderResult<PathBuf> {
    let bytes = http
        .fetch_bytes(DOWNLOAD_SERVICE, |client| client.get(url))
        .await?;
    if bytes.is_empty() {
        return Err(ProviderError::invalid_response(DOWNLOAD_SERVICE, format!("empty body from {url}")));
    }

    let path = dir.join(format!("{stem}.{}", extension_for_url(url)));
    tokio::fs::write(&path, &bytes).await?;
    debug!(url, path = %path.display(), bytes = bytes.len(), "Image downloaded");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_url() {
        assert_eq!(extension_for_url("https://x.test/a/photo.PNG?w=100"), "png");
        assert_eq!(extension_for_url("https://x.test/a/photo.webp"), "webp");
        assert_eq!(extension_for_url("https://x.test/a/photo"), "jpg");
        assert_eq!(extension_for_url("https://x.test/a/photo.gif"), "jpg");
    }
}
