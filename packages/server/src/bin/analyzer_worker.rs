// Standalone background analyzer worker.
//
// Runs the same analysis loop the server embeds, as its own process so
// deployments can scale analysis independently of request serving. The
// cache-lease claim keeps any number of instances from double-working a
// bookmark.

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::domains::analysis::{AnalyzerConfig, BackgroundAnalyzer};
use server_core::kernel::pg_stores::PgAnalysisStore;
use server_core::kernel::{
    ApiKeyRegistry, CacheStore, InMemoryCacheStore, LlmService, RateLimitConfig, RateLimiter,
    RedisCacheStore,
};
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting analyzer worker");

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let cache: Arc<dyn CacheStore> = match RedisCacheStore::connect(&config.redis_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unreachable, using in-process cache");
            Arc::new(InMemoryCacheStore::new())
        }
    };

    let limiter = RateLimiter::new(RateLimitConfig::default()).with_cache(cache.clone());
    let api_keys = Arc::new(ApiKeyRegistry::new(
        pool.clone(),
        &config.secret_key,
        limiter,
    ));
    let llm = Arc::new(
        LlmService::new(api_keys, config.gemini_api_key.clone()).context("LLM service init")?,
    );

    let analyzer = BackgroundAnalyzer::new(
        Arc::new(PgAnalysisStore::new(pool)),
        llm,
        cache,
        AnalyzerConfig::default(),
    );

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown requested");
        signal_token.cancel();
    });

    analyzer.run(token).await;
    Ok(())
}
