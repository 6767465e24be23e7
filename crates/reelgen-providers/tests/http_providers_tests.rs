//! HTTP providers against a mock server.

use reelgen_models::{Orientation, Resolution, ServiceErrorType};
use reelgen_providers::images::{PexelsConfig, PexelsProvider, PixabayConfig, PixabayProvider};
use reelgen_providers::speech::{
    ElevenLabsConfig, ElevenLabsProvider, GoogleTtsConfig, GoogleTtsProvider, OpenAiTtsConfig,
    OpenAiTtsProvider,
};
use reelgen_providers::{
    HttpTransport, ImageChain, ImageRequest, ImageSearchProvider, ImageSource, ProviderError,
    SpeechProvider,
};
use reelgen_resilience::{PolicySet, ResilientClient, ServicePolicy};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(max_retries: u32, failure_threshold: u32) -> HttpTransport {
    let policy = ServicePolicy {
        timeout: Duration::from_secs(5),
        max_retries,
        initial_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        failure_threshold,
        reset_timeout: Duration::from_secs(60),
    };
    HttpTransport::new(Arc::new(ResilientClient::new(PolicySet::new(policy))))
}

#[tokio::test]
async fn openai_returns_audio_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90]))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiTtsProvider::new(
        OpenAiTtsConfig::new("sk-test").with_base_url(server.uri()),
        transport(0, 5),
    );
    let voice = provider.resolve_voice("narrator");
    let audio = provider.synthesize("Hello there.", voice).await.unwrap();

    assert_eq!(voice, "fable");
    assert_eq!(audio, vec![0xFF, 0xFB, 0x90]);
}

#[tokio::test]
async fn authentication_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM"))
        .and(header("xi-api-key", "bad-key"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ElevenLabsProvider::new(
        ElevenLabsConfig::new("bad-key").with_base_url(server.uri()),
        transport(3, 5),
    );
    let err = provider
        .synthesize("Hi", provider.resolve_voice("default"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Authentication { status: 401, .. }));
    assert_eq!(err.error_type(), ServiceErrorType::Authentication);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/translate_tts"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/translate_tts"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let http = transport(2, 5);
    let provider = GoogleTtsProvider::new(GoogleTtsConfig::default().with_base_url(server.uri()), http.clone());
    let audio = provider.synthesize("Hi", "en").await.unwrap();

    assert_eq!(audio, b"mp3");
    assert_eq!(http.resilience().breaker("google_tts").failure_count(), 0);
}

#[tokio::test]
async fn open_breaker_stops_calling_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/translate_tts"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let provider = GoogleTtsProvider::new(
        GoogleTtsConfig::default().with_base_url(server.uri()),
        transport(0, 2),
    );
    for _ in 0..2 {
        let err = provider.synthesize("Hi", "en").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
    }

    let err = provider.synthesize("Hi", "en").await.unwrap_err();
    assert!(matches!(err, ProviderError::CircuitOpen { .. }));
}

#[tokio::test]
async fn google_tts_sends_language_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/translate_tts"))
        .and(query_param("tl", "en-GB"))
        .and(query_param("q", "Good morning."))
        .and(query_param("client", "tw-ob"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleTtsProvider::new(
        GoogleTtsConfig::default().with_base_url(server.uri()),
        transport(0, 5),
    );
    let audio = provider
        .synthesize("Good morning.", provider.resolve_voice("male"))
        .await
        .unwrap();
    assert_eq!(audio, b"abc");
}

#[tokio::test]
async fn pexels_picks_orientation_sized_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(header("authorization", "px-key"))
        .and(query_param("orientation", "portrait"))
        .and(query_param("per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "photos": [
                {"src": {"original": "https://img.test/1.jpeg", "portrait": "https://img.test/1-p.jpeg"}},
                {"src": {"original": "https://img.test/2.jpeg"}}
            ]
        })))
        .mount(&server)
        .await;

    let provider = PexelsProvider::new(PexelsConfig::new("px-key").with_base_url(server.uri()), transport(0, 5));
    let urls = provider.search("forest", 2, Orientation::Portrait).await.unwrap();

    assert_eq!(urls, vec!["https://img.test/1-p.jpeg", "https://img.test/2.jpeg"]);
}

#[tokio::test]
async fn pixabay_parses_hits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/"))
        .and(query_param("key", "pb-key"))
        .and(query_param("orientation", "horizontal"))
        .and(query_param("per_page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [
                {"largeImageURL": "https://img.test/a.jpg", "webformatURL": "https://img.test/a_small.jpg"},
                {"webformatURL": "https://img.test/b_small.jpg"},
                {}
            ]
        })))
        .mount(&server)
        .await;

    let provider = PixabayProvider::new(PixabayConfig::new("pb-key").with_base_url(server.uri()), transport(0, 5));
    let urls = provider.search("ocean", 1, Orientation::Landscape).await.unwrap();

    assert_eq!(urls, vec!["https://img.test/a.jpg"]);
}

#[tokio::test]
async fn malformed_search_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let provider = PexelsProvider::new(PexelsConfig::new("k").with_base_url(server.uri()), transport(0, 5));
    let err = provider.search("x", 1, Orientation::Square).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse { .. }));
}

#[tokio::test]
async fn image_chain_downloads_and_reuses_cached_search() {
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "photos": [
                {"src": {"portrait": format!("{uri}/files/1.png")}},
                {"src": {"portrait": format!("{uri}/files/2.png")}},
                {"src": {"portrait": "not a url"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"one".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/2.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let http = transport(0, 5);
    let pexels: Arc<dyn ImageSearchProvider> =
        Arc::new(PexelsProvider::new(PexelsConfig::new("k").with_base_url(uri.clone()), http.clone()));
    let chain = ImageChain::new().with_remote(vec![pexels], http);
    let request = ImageRequest::new("city", 2, Resolution::new(64, 96)).with_cache_key("city");

    let first = TempDir::new().unwrap();
    let images = chain.acquire(&request, first.path()).await.unwrap();

    assert_eq!(images.len(), 2);
    assert_eq!(
        images[0].source,
        ImageSource::Remote {
            provider: "pexels".to_string()
        }
    );
    assert_eq!(std::fs::read(&images[0].path).unwrap(), b"one");
    assert_eq!(images[1].source, ImageSource::Generated);

    // Served from the cache: the search mock expects a single call
    let second = TempDir::new().unwrap();
    let again = chain.acquire(&request, second.path()).await.unwrap();
    assert_eq!(again.len(), 2);
    assert_eq!(chain.cache().len(), 1);
}
