//! Server dependency container.
//!
//! All external services sit behind Arc'd trait objects so domain
//! actions stay testable; construction order is explicit and owned by
//! the process entry points (no module-level state anywhere).

use std::sync::Arc;

use harvest::scrape::Scraper;
use harvest::TextEmbedder;
use sqlx::PgPool;

use crate::domains::feedback::learner::FeedbackLearner;
use crate::domains::projects::intent::IntentAnalyzer;
use crate::domains::recommend::explain::Explainer;
use crate::domains::recommend::orchestrator::Orchestrator;
use crate::kernel::api_keys::ApiKeyRegistry;
use crate::kernel::cache::CacheStore;
use crate::kernel::llm_service::LlmService;
use crate::kernel::pg_stores::{PgFeedbackStore, PgProjectStore, PgRecommendationStore};
use crate::kernel::progress::ProgressStreams;
use crate::kernel::stream_hub::StreamHub;

/// Quality floor for accepting scraped content into the library.
pub const INGEST_QUALITY_FLOOR: u8 = 5;

/// Dependencies accessible to domain actions.
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub cache: Arc<dyn CacheStore>,
    pub scraper: Arc<Scraper>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub llm: Arc<LlmService>,
    pub api_keys: Arc<ApiKeyRegistry>,
    /// In-process pub/sub for live progress delivery
    pub stream_hub: StreamHub,
    /// Progress publishing/replay over hub + cache
    pub progress: ProgressStreams,
    /// The recommendation pipeline entry point
    pub recommender: Arc<Orchestrator>,
    /// Scraped content below this quality is rejected at ingestion
    pub ingest_quality_floor: u8,
}

impl ServerDeps {
    /// Wire up production dependencies. The orchestrator and learner are
    /// built here from their Postgres-backed stores.
    pub fn new(
        db_pool: PgPool,
        cache: Arc<dyn CacheStore>,
        scraper: Arc<Scraper>,
        embedder: Arc<dyn TextEmbedder>,
        llm: Arc<LlmService>,
        api_keys: Arc<ApiKeyRegistry>,
    ) -> Self {
        let stream_hub = StreamHub::new();
        let progress = ProgressStreams::new(stream_hub.clone(), cache.clone());

        let rec_store = Arc::new(PgRecommendationStore::new(db_pool.clone()));
        let feedback_store = Arc::new(PgFeedbackStore::new(db_pool.clone()));
        let project_store = Arc::new(PgProjectStore::new(db_pool.clone()));

        let intent_analyzer =
            IntentAnalyzer::new(llm.clone(), project_store, cache.clone());
        let learner = FeedbackLearner::new(feedback_store, rec_store.clone(), cache.clone());
        let explainer = Explainer::new(llm.clone());

        let recommender = Arc::new(Orchestrator::new(
            rec_store,
            cache.clone(),
            embedder.clone(),
            intent_analyzer,
            learner,
            explainer,
        ));

        Self {
            db_pool,
            cache,
            scraper,
            embedder,
            llm,
            api_keys,
            stream_hub,
            progress,
            recommender,
            ingest_quality_floor: INGEST_QUALITY_FLOOR,
        }
    }
}
