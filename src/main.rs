//! Company News Radar: Binary Entrypoint
//! Boots the Axum HTTP server and the periodic ingest pipeline.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use company_news_radar::api::{create_router, AppState};
use company_news_radar::classify::backend::build_backend;
use company_news_radar::classify::Classifier;
use company_news_radar::config::AppConfig;
use company_news_radar::dedup::ChatDuplicateJudge;
use company_news_radar::ingest::providers::newsapi::NewsApiProvider;
use company_news_radar::ingest::providers::rss::RssProvider;
use company_news_radar::ingest::scheduler::{spawn_scheduler, IngestSchedulerCfg};
use company_news_radar::ingest::types::SourceProvider;
use company_news_radar::ingest::Pipeline;
use company_news_radar::metrics::Metrics;
use company_news_radar::notify::email::DigestMailer;
use company_news_radar::notify::load_subscribers_default;
use company_news_radar::scrape::ArticleScraper;
use company_news_radar::store::json_file::JsonFileStore;
use company_news_radar::store::RadarStore;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - RADAR_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("RADAR_DEV_LOG").ok().is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ingest=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let cfg = AppConfig::load_from_file("config/radar.json").expect("Failed to load radar config");

    let backend = build_backend(&cfg.chat);

    let mut providers: Vec<Box<dyn SourceProvider>> = Vec::new();
    for feed in &cfg.feeds {
        providers.push(Box::new(RssProvider::from_url(
            feed.name.clone(),
            feed.url.clone(),
        )));
    }
    if let Some(search) = &cfg.search {
        for query in &search.queries {
            providers.push(Box::new(NewsApiProvider::new(
                search.api_key.clone(),
                query.clone(),
            )));
        }
    }

    let store: Arc<dyn RadarStore> =
        Arc::new(JsonFileStore::new(&cfg.store_dir).expect("Failed to open store dir"));

    let pipeline = Arc::new(Pipeline::new(
        providers,
        Classifier::new(backend.clone()),
        Box::new(ArticleScraper::new(backend.clone()).with_max_chars(cfg.scrape_max_chars)),
        Box::new(ChatDuplicateJudge::new(backend)),
        store.clone(),
    ));

    // Digest wiring is optional: without SMTP config the pipeline still runs,
    // records are persisted, nothing is mailed.
    let mailer = match &cfg.smtp {
        Some(smtp) => Some(Arc::new(
            DigestMailer::new(smtp).expect("Failed to build SMTP mailer"),
        )),
        None => None,
    };
    let subscribers = load_subscribers_default().unwrap_or_else(|e| {
        tracing::warn!(error = ?e, "subscribers not loaded, digests disabled");
        Vec::new()
    });

    if cfg.ingest_interval_secs > 0 {
        spawn_scheduler(
            pipeline.clone(),
            mailer,
            subscribers,
            IngestSchedulerCfg {
                interval_secs: cfg.ingest_interval_secs,
            },
        );
    }

    let metrics = Metrics::init(cfg.scrape_max_chars);
    let router = create_router(AppState { pipeline, store }).merge(metrics.router());

    Ok(router.into())
}
