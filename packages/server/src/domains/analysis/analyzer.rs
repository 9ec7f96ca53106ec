//! Background content analysis worker.
//!
//! Long-running loop: claim a batch of unanalyzed bookmarks, run the
//! content-analysis prompt for each, persist the result. One item's
//! failure never touches the rest; failures put the item on a cooldown
//! instead of retrying forever. A cache lease per bookmark keeps
//! horizontally scaled workers from double-claiming. Runs embedded in
//! the server or as the standalone `analyzer_worker` binary.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use harvest::llm::{prompts, schemas};
use harvest::{AnalysisRequest, ContentAnalysis, ContentType, Difficulty};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::errors::{AppError, AppResult};
use crate::domains::content::models::bookmark::UnanalyzedContent;
use crate::kernel::cache::{self, CacheStore};
use crate::kernel::llm_service::LlmService;
use crate::kernel::traits::BaseAnalysisStore;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Pause between polls when the queue is empty
    pub poll_interval: Duration,
    /// Bookmarks claimed per cycle
    pub batch_size: i64,
    /// Pause between items, keeps within the LLM budget
    pub per_item_delay: Duration,
    /// This worker's identity, recorded in claim leases
    pub worker_id: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(180),
            batch_size: 5,
            per_item_delay: Duration::from_secs(2),
            worker_id: format!("analyzer-{}", Uuid::new_v4()),
        }
    }
}

/// What the LLM returns for one bookmark.
#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    technologies: Vec<String>,
    content_type: ContentType,
    difficulty: Difficulty,
    key_concepts: Vec<String>,
    relevance_score: u8,
    #[serde(default)]
    learning_path: Option<String>,
    #[serde(default)]
    project_applicability: Option<String>,
    #[serde(default)]
    skill_development: Option<String>,
}

pub struct BackgroundAnalyzer {
    store: Arc<dyn BaseAnalysisStore>,
    llm: Arc<LlmService>,
    cache: Arc<dyn CacheStore>,
    config: AnalyzerConfig,
}

impl BackgroundAnalyzer {
    pub fn new(
        store: Arc<dyn BaseAnalysisStore>,
        llm: Arc<LlmService>,
        cache: Arc<dyn CacheStore>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            store,
            llm,
            cache,
            config,
        }
    }

    /// Run until cancelled. In-flight items finish; the token is only
    /// checked between items.
    pub async fn run(&self, token: CancellationToken) {
        info!(worker = %self.config.worker_id, "background analyzer started");

        loop {
            if token.is_cancelled() {
                break;
            }

            match self.process_batch(&token).await {
                Ok(0) => {}
                Ok(n) => debug!(analyzed = n, "analysis batch complete"),
                Err(e) => warn!(error = %e, "analysis batch failed"),
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(worker = %self.config.worker_id, "background analyzer stopped");
    }

    /// Process up to one batch. Returns how many items were analyzed.
    pub async fn process_batch(&self, token: &CancellationToken) -> AppResult<usize> {
        let pending = self.store.list_unanalyzed(self.config.batch_size).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut analyzed = 0;
        for item in pending {
            if token.is_cancelled() {
                break;
            }

            if !self.claim(item.id).await {
                debug!(content = %item.id, "already claimed by another worker");
                continue;
            }

            match self.analyze_one(&item).await {
                Ok(()) => analyzed += 1,
                Err(e) if e.is_recoverable() => {
                    warn!(content = %item.id, kind = e.kind(), "analysis deferred, cooling down");
                    self.store.mark_analysis_failed(item.id).await?;
                }
                Err(e) => {
                    warn!(content = %item.id, error = %e, "analysis failed, cooling down");
                    self.store.mark_analysis_failed(item.id).await?;
                }
            }

            self.release(item.id).await;
            tokio::time::sleep(self.config.per_item_delay).await;
        }

        Ok(analyzed)
    }

    async fn analyze_one(&self, item: &UnanalyzedContent) -> AppResult<()> {
        let body = item.extracted_text.clone().unwrap_or_default();
        let request = AnalysisRequest {
            url: item.url.clone(),
            title: item.title.clone(),
            body,
        };

        // Dispatched on behalf of the bookmark's owner: their key, their
        // budget
        let value = self
            .llm
            .call(
                item.user_id,
                &prompts::content_analysis(&request),
                &schemas::content_analysis(),
            )
            .await?;

        let payload: AnalysisPayload =
            serde_json::from_value(value).map_err(|_| AppError::LlmUnstructured)?;

        let analysis = ContentAnalysis {
            technologies: payload.technologies,
            content_type: payload.content_type,
            difficulty: payload.difficulty,
            key_concepts: payload.key_concepts,
            relevance_score: payload.relevance_score,
            learning_path: payload.learning_path,
            project_applicability: payload.project_applicability,
            skill_development: payload.skill_development,
            analyzed_at: Utc::now(),
        }
        .normalized();

        self.store.upsert_analysis(item.id, &analysis).await?;
        let _ = self.cache.delete(&cache::keys::analysis(item.id)).await;

        info!(content = %item.id, "bookmark analyzed");
        Ok(())
    }

    /// Take the per-bookmark lease. A cache outage fails open — with no
    /// shared cache there is no second worker to race against.
    async fn claim(&self, content: Uuid) -> bool {
        match self
            .cache
            .set_if_absent(
                &cache::keys::analysis_claim(content),
                self.config.worker_id.as_bytes(),
                Some(cache::keys::TTL_ANALYSIS_CLAIM),
            )
            .await
        {
            Ok(won) => won,
            Err(_) => true,
        }
    }

    async fn release(&self, content: Uuid) {
        let _ = self.cache.delete(&cache::keys::analysis_claim(content)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::llm_service::{LlmService, PermissiveGate};
    use crate::kernel::test_dependencies::InMemoryAnalysisStore;
    use crate::kernel::InMemoryCacheStore;
    use harvest::testing::{MockLlm, MockLlmFailure};
    use serde_json::json;

    fn pending(user: Uuid) -> UnanalyzedContent {
        UnanalyzedContent {
            id: Uuid::new_v4(),
            user_id: user,
            url: "https://flask.palletsprojects.com/".into(),
            title: Some("Flask Docs".into()),
            extracted_text: Some("Flask is a lightweight web framework".into()),
        }
    }

    fn analysis_json() -> serde_json::Value {
        json!({
            "technologies": ["Python", "Flask"],
            "content_type": "documentation",
            "difficulty": "intermediate",
            "key_concepts": ["routing", "templates"],
            "relevance_score": 85,
        })
    }

    fn analyzer(store: Arc<InMemoryAnalysisStore>, llm: MockLlm) -> BackgroundAnalyzer {
        let config = AnalyzerConfig {
            per_item_delay: Duration::from_millis(1),
            ..Default::default()
        };
        BackgroundAnalyzer::new(
            store,
            Arc::new(LlmService::with_client(Arc::new(PermissiveGate), Arc::new(llm))),
            Arc::new(InMemoryCacheStore::new()),
            config,
        )
    }

    #[tokio::test]
    async fn analyzes_pending_items() {
        let store = Arc::new(InMemoryAnalysisStore::new());
        let item = pending(Uuid::new_v4());
        let id = item.id;
        store.push_pending(item);

        let worker = analyzer(store.clone(), MockLlm::new().with_default(analysis_json()));
        let analyzed = worker.process_batch(&CancellationToken::new()).await.unwrap();

        assert_eq!(analyzed, 1);
        let stored = store.analysis(id).unwrap();
        assert_eq!(stored.technologies, vec!["python", "flask"]);
        assert_eq!(stored.relevance_score, 85);
    }

    #[tokio::test]
    async fn rate_limited_items_cool_down_and_are_skipped() {
        let store = Arc::new(InMemoryAnalysisStore::new());
        store.push_pending(pending(Uuid::new_v4()));

        let worker = analyzer(
            store.clone(),
            MockLlm::new().with_failure(MockLlmFailure::RateLimited { retry_after_secs: 60 }),
        );

        let analyzed = worker.process_batch(&CancellationToken::new()).await.unwrap();
        assert_eq!(analyzed, 0);
        assert_eq!(store.failed_count(), 1);

        // Item is now inside its cooldown: next batch sees nothing
        let analyzed = worker.process_batch(&CancellationToken::new()).await.unwrap();
        assert_eq!(analyzed, 0);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let store = Arc::new(InMemoryAnalysisStore::new());
        let user = Uuid::new_v4();
        let bad = UnanalyzedContent {
            id: Uuid::new_v4(),
            user_id: user,
            url: "https://bad.example.com/".into(),
            title: None,
            extracted_text: Some("opaque".into()),
        };
        let good = pending(user);
        let good_id = good.id;
        store.push_pending(bad.clone());
        store.push_pending(good);

        // First call (for `bad`) yields garbage, second is valid
        let llm = MockLlm::new()
            .with_queued(json!({"unexpected": true}))
            .with_queued(analysis_json());
        let worker = analyzer(store.clone(), llm);

        let analyzed = worker.process_batch(&CancellationToken::new()).await.unwrap();
        assert_eq!(analyzed, 1);
        assert!(store.analysis(good_id).is_some());
        assert_eq!(store.failed_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_between_items() {
        let store = Arc::new(InMemoryAnalysisStore::new());
        for _ in 0..5 {
            store.push_pending(pending(Uuid::new_v4()));
        }

        let token = CancellationToken::new();
        token.cancel();
        let worker = analyzer(store.clone(), MockLlm::new().with_default(analysis_json()));

        let analyzed = worker.process_batch(&token).await.unwrap();
        assert_eq!(analyzed, 0);
    }
}
