//! Video generation worker binary.
//!
//! ```text
//! reelgen-worker generate <title> <script-file> [stock-query]   generate one video
//! reelgen-worker soak <service>                                repeat a health test until it holds
//! reelgen-worker stats [report.json]                           print (or save) health statistics
//! ```

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelgen_media::{check_ffmpeg, check_ffprobe, FfmpegCompositor};
use reelgen_models::{JobOptions, JobStatus, TestResult};
use reelgen_providers::health::{image_search_test, speech_chain_test, speech_provider_test};
use reelgen_providers::images::{PexelsConfig, PexelsProvider, PixabayConfig, PixabayProvider};
use reelgen_providers::speech::{
    ElevenLabsConfig, ElevenLabsProvider, EspeakProvider, GoogleTtsConfig, GoogleTtsProvider, OpenAiTtsConfig,
    OpenAiTtsProvider,
};
use reelgen_providers::{HttpTransport, ImageChain, ImageSearchProvider, SpeechChain, SpeechProvider};
use reelgen_resilience::{
    health_test_fn, soak, JsonLinesHealthStore, MonitorConfig, PolicySet, ResilienceMonitor, ResilientClient,
    SoakConfig,
};
use reelgen_worker::{Orchestrator, WorkerConfig};

/// Upstreams with their own breaker policy overrides.
const SERVICES: &[&str] = &[
    "elevenlabs",
    "openai_tts",
    "google_tts",
    "pexels",
    "pixabay",
    "image_download",
];

const POLL_INTERVAL: Duration = Duration::from_secs(1);

const USAGE: &str =
    "usage: reelgen-worker generate <title> <script-file> [stock-query] | soak <service> | stats [report.json]";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Generate {
        title: &'a str,
        script_path: &'a str,
        stock_query: Option<&'a str>,
    },
    Soak(&'a str),
    Stats(Option<&'a str>),
}

fn parse_command<'a>(args: &[&'a str]) -> Option<Command<'a>> {
    match *args {
        ["generate", title, script_path] => Some(Command::Generate {
            title,
            script_path,
            stock_query: None,
        }),
        ["generate", title, script_path, query] => Some(Command::Generate {
            title,
            script_path,
            stock_query: Some(query),
        }),
        ["soak", service] => Some(Command::Soak(service)),
        ["stats"] => Some(Command::Stats(None)),
        ["stats", path] => Some(Command::Stats(Some(path))),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let result = match parse_command(&args) {
        Some(Command::Generate {
            title,
            script_path,
            stock_query,
        }) => run_generate(title, script_path, stock_query).await,
        Some(Command::Soak(service)) => run_soak(service).await,
        Some(Command::Stats(path)) => run_stats(path).await,
        None => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("Worker error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Process-wide collaborators.
struct Services {
    monitor: ResilienceMonitor,
    speech: Arc<SpeechChain>,
    images: Arc<ImageChain>,
}

fn build_services(config: &WorkerConfig) -> Services {
    let history_path = std::env::var("HEALTH_HISTORY_PATH").unwrap_or_else(|_| "health_history.jsonl".to_string());
    let monitor = ResilienceMonitor::new(
        MonitorConfig::from_env(),
        Arc::new(JsonLinesHealthStore::new(history_path)),
    );

    let resilience = Arc::new(ResilientClient::new(PolicySet::from_env(SERVICES)));
    let http = HttpTransport::new(resilience);

    let mut speakers: Vec<Arc<dyn SpeechProvider>> = Vec::new();
    if let Some(cfg) = ElevenLabsConfig::from_env() {
        speakers.push(Arc::new(ElevenLabsProvider::new(cfg, http.clone())));
    }
    if let Some(cfg) = OpenAiTtsConfig::from_env() {
        speakers.push(Arc::new(OpenAiTtsProvider::new(cfg, http.clone())));
    }
    speakers.push(Arc::new(GoogleTtsProvider::new(GoogleTtsConfig::from_env(), http.clone())));
    let espeak = EspeakProvider::new();
    if espeak.is_available() {
        speakers.push(Arc::new(espeak));
    }
    for speaker in &speakers {
        monitor.register_test(speaker.name(), speech_provider_test(speaker.clone()));
    }
    let speech = Arc::new(SpeechChain::new(speakers).with_monitor(monitor.clone()));
    monitor.register_test("speech_chain", speech_chain_test(speech.clone()));

    let mut searchers: Vec<Arc<dyn ImageSearchProvider>> = Vec::new();
    if let Some(cfg) = PexelsConfig::from_env() {
        searchers.push(Arc::new(PexelsProvider::new(cfg, http.clone())));
    }
    if let Some(cfg) = PixabayConfig::from_env() {
        searchers.push(Arc::new(PixabayProvider::new(cfg, http.clone())));
    }
    for searcher in &searchers {
        monitor.register_test(searcher.name(), image_search_test(searcher.clone()));
    }
    let mut images = ImageChain::new()
        .with_remote(searchers, http)
        .with_monitor(monitor.clone());
    if let Some(dir) = &config.examples_dir {
        images = images.with_local_dir(dir);
    }

    monitor.register_test(
        "ffmpeg",
        health_test_fn(|_| async {
            Ok(match check_ffmpeg().and_then(|_| check_ffprobe()) {
                Ok(_) => TestResult::success(),
                Err(e) => TestResult::failure(e.to_string()),
            })
        }),
    );

    Services {
        monitor,
        speech,
        images: Arc::new(images),
    }
}

async fn run_generate(title: &str, script_path: &str, stock_query: Option<&str>) -> anyhow::Result<()> {
    info!("Starting reelgen-worker");

    let script = tokio::fs::read_to_string(script_path)
        .await
        .with_context(|| format!("reading script {script_path}"))?;

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let services = build_services(&config);
    services.monitor.start(services.monitor.config().test_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let compositor = Arc::new(
        FfmpegCompositor::with_timeout(config.encoder_timeout.as_secs()).with_cancel(shutdown_rx),
    );
    let orchestrator = Orchestrator::new(config, services.speech, services.images, compositor);

    let mut options = JobOptions::new(title, script);
    if let Some(query) = stock_query {
        options = options.with_stock_query(query);
    }
    let job = orchestrator.submit(options).await?;
    info!(job_id = %job.id, "Waiting for job");

    let job = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                let _ = shutdown_tx.send(true);
                orchestrator.shutdown().await;
                break orchestrator.get(&job.id).await;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                let current = orchestrator.get(&job.id).await;
                if current.as_ref().map_or(true, |j| j.is_terminal()) {
                    break current;
                }
            }
        }
    };

    services.monitor.shutdown();
    orchestrator.shutdown().await;

    let job = job.context("job record disappeared")?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    match job.status {
        JobStatus::Completed => Ok(()),
        _ => anyhow::bail!(job.error_message.unwrap_or_else(|| "job did not complete".to_string())),
    }
}

async fn run_soak(service: &str) -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    let services = build_services(&config);
    if !services.monitor.registered_tests().iter().any(|s| s == service) {
        anyhow::bail!(
            "no health test for {service}; known: {}",
            services.monitor.registered_tests().join(", ")
        );
    }

    let report = soak(&services.monitor, service, None, &SoakConfig::default()).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.passed {
        anyhow::bail!("{service} did not reach the required success streak");
    }
    Ok(())
}

async fn run_stats(path: Option<&str>) -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    let services = build_services(&config);
    let report = services.monitor.statistics().await;
    match path {
        Some(path) => {
            report.write_json(Path::new(path)).await?;
            info!(path, "Statistics report written");
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_accepts_any_title() {
        for title in ["stats", "soak", "Ocean facts"] {
            assert_eq!(
                parse_command(&["generate", title, "script.txt"]),
                Some(Command::Generate {
                    title,
                    script_path: "script.txt",
                    stock_query: None,
                })
            );
        }
        assert_eq!(
            parse_command(&["generate", "Forest", "s.txt", "pine trees"]),
            Some(Command::Generate {
                title: "Forest",
                script_path: "s.txt",
                stock_query: Some("pine trees"),
            })
        );
    }

    #[test]
    fn test_other_subcommands() {
        assert_eq!(parse_command(&["soak", "pexels"]), Some(Command::Soak("pexels")));
        assert_eq!(parse_command(&["stats"]), Some(Command::Stats(None)));
        assert_eq!(parse_command(&["stats", "r.json"]), Some(Command::Stats(Some("r.json"))));
    }

    #[test]
    fn test_bare_title_is_rejected() {
        assert_eq!(parse_command(&["My title", "script.txt"]), None);
        assert_eq!(parse_command(&[]), None);
    }
}
