// Main entry point for the recommendation service

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::domains::analysis::{AnalyzerConfig, BackgroundAnalyzer};
use server_core::kernel::pg_stores::PgAnalysisStore;
use server_core::kernel::{
    ApiKeyRegistry, CacheStore, InMemoryCacheStore, LlmService, RateLimitConfig, RateLimiter,
    RedisCacheStore, ServerDeps,
};
use server_core::server::build_app;
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvest::embed::FastembedEmbedder;
use harvest::scrape::{Scraper, ScraperConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lodestar recommendation service");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    // Cache: Redis, or in-memory when it is unreachable (degraded)
    let cache: Arc<dyn CacheStore> = match RedisCacheStore::connect(&config.redis_url).await {
        Ok(store) => {
            tracing::info!("Cache connected");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unreachable, using in-process cache");
            Arc::new(InMemoryCacheStore::new())
        }
    };

    // Services
    let scraper = Arc::new(Scraper::new(ScraperConfig::default()).context("scraper init")?);
    let embedder = Arc::new(FastembedEmbedder::new());
    let limiter = RateLimiter::new(RateLimitConfig::default()).with_cache(cache.clone());
    let api_keys = Arc::new(ApiKeyRegistry::new(
        pool.clone(),
        &config.secret_key,
        limiter,
    ));
    let llm = Arc::new(
        LlmService::new(api_keys.clone(), config.gemini_api_key.clone())
            .context("LLM service init")?,
    );

    let deps = ServerDeps::new(pool.clone(), cache.clone(), scraper, embedder, llm.clone(), api_keys);

    // Embedded background analyzer; deployments can scale it out with
    // the analyzer_worker binary instead
    let shutdown = CancellationToken::new();
    let analyzer = BackgroundAnalyzer::new(
        Arc::new(PgAnalysisStore::new(pool.clone())),
        llm,
        cache,
        AnalyzerConfig::default(),
    );
    let analyzer_token = shutdown.clone();
    tokio::spawn(async move { analyzer.run(analyzer_token).await });

    // Serve
    let app = build_app(deps, &config.cors_origins);
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    Ok(())
}
