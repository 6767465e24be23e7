//! Shared HTTP transport routed through the breaker client.

use reqwest::{Client, RequestBuilder, Response};
use reelgen_resilience::ResilientClient;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{ProviderError, ProviderResult};

const USER_AGENT: &str = concat!("reelgen/", env!("CARGO_PKG_VERSION"));

/// reqwest client plus the per-service breakers every request goes through.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    resilience: Arc<ResilientClient>,
}

impl HttpTransport {
    pub fn new(resilience: Arc<ResilientClient>) -> Self {
        // Per-attempt timeouts come from the service policy; this is a backstop.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build HTTP client, using default client");
                Client::new()
            });
        Self { client, resilience }
    }

    pub fn with_client(client: Client, resilience: Arc<ResilientClient>) -> Self {
        Self { client, resilience }
    }

    pub fn resilience(&self) -> &ResilientClient {
        &self.resilience
    }

    /// Send the request built by `build` and return the response body.
    pub async fn fetch_bytes<F>(&self, service: &str, build: F) -> ProviderResult<Vec<u8>>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let client = &self.client;
        self.resilience
            .call_if(
                service,
                || {
                    let request = build(client);
                    async move {
                        let response = execute(service, request).await?;
                        let body = response
                            .bytes()
                            .await
                            .map_err(|e| ProviderError::from_reqwest(service, e))?;
                        Ok(body.to_vec())
                    }
                },
                ProviderError::is_retryable,
            )
            .await
            .map_err(|e| ProviderError::from_call(service, e))
    }

    /// Send the request built by `build` and decode a JSON body.
    pub async fn fetch_json<T, F>(&self, service: &str, build: F) -> ProviderResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let body = self.fetch_bytes(service, build).await?;
        serde_json::from_slice(&body)
            .map_err(|e| ProviderError::invalid_response(service, format!("JSON decode: {e}")))
    }
}

async fn execute(service: &str, request: RequestBuilder) -> ProviderResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(service, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(service, status = status.as_u16(), "Upstream returned error status");
    Err(ProviderError::from_status(service, status.as_u16(), &body))
}

/// `true` for absolute http(s) URLs.
pub fn is_usable_url(candidate: &str) -> bool {
    url::Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_urls() {
        assert!(is_usable_url("https://images.pexels.com/photos/1/a.jpeg"));
        assert!(is_usable_url("http://127.0.0.1:8080/a.png"));
        assert!(!is_usable_url("ftp://example.com/a.png"));
        assert!(!is_usable_url("/relative/a.png"));
        assert!(!is_usable_url(""));
    }
}
