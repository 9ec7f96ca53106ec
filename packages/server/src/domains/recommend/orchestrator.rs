//! The recommendation orchestrator.
//!
//! Single entry point composing the pipeline: result cache → intent →
//! candidate fetch → engine scoring → preference personalization →
//! skill-gap boost → explanation → cache store. Recoverable failures
//! (LLM, embedder, cache) degrade individual stages and are reported in
//! the response metrics; only an unavailable store is fatal.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::common::errors::AppResult;
use crate::domains::projects::intent::{IntentAnalyzer, IntentSource};
use crate::domains::recommend::engines::{EngineRegistry, ScoringContext};
use crate::domains::recommend::explain::Explainer;
use crate::domains::recommend::skill_gap::SkillGapAnalyzer;
use crate::domains::recommend::types::{
    PerformanceMetrics, RecommendRequest, RecommendationItem, RecommendationResult,
    ScoredCandidate,
};
use crate::domains::feedback::learner::FeedbackLearner;
use crate::kernel::cache::{self, cache_get_json, cache_set_json, CacheStore};
use crate::kernel::traits::BaseRecommendationStore;
use harvest::TextEmbedder;

/// How many candidates the store is asked for.
const CANDIDATE_CAP: i64 = 100;

pub struct Orchestrator {
    store: Arc<dyn BaseRecommendationStore>,
    cache: Arc<dyn CacheStore>,
    embedder: Arc<dyn TextEmbedder>,
    intent_analyzer: IntentAnalyzer,
    learner: FeedbackLearner,
    explainer: Explainer,
    engines: EngineRegistry,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn BaseRecommendationStore>,
        cache: Arc<dyn CacheStore>,
        embedder: Arc<dyn TextEmbedder>,
        intent_analyzer: IntentAnalyzer,
        learner: FeedbackLearner,
        explainer: Explainer,
    ) -> Self {
        Self {
            store,
            cache,
            embedder,
            intent_analyzer,
            learner,
            explainer,
            engines: EngineRegistry::new(),
        }
    }

    /// Produce recommendations under a deadline. The deadline bounds the
    /// whole pipeline; exceeding it returns a typed `Timeout` instead of
    /// hanging.
    pub async fn get_recommendations_with_deadline(
        &self,
        request: &RecommendRequest,
        deadline: std::time::Duration,
    ) -> AppResult<RecommendationResult> {
        tokio::time::timeout(deadline, self.get_recommendations(request))
            .await
            .map_err(|_| crate::common::errors::AppError::Timeout)?
    }

    /// Produce recommendations for one request.
    pub async fn get_recommendations(
        &self,
        request: &RecommendRequest,
    ) -> AppResult<RecommendationResult> {
        let started = Instant::now();
        let mut metrics = PerformanceMetrics::default();

        // 1. Result cache
        let cache_key = cache::keys::recommendations(request.user, &request.cache_hash());
        if let Some(mut cached) =
            cache_get_json::<RecommendationResult>(self.cache.as_ref(), &cache_key).await
        {
            debug!(user = %request.user, "recommendation cache hit");
            cached.performance_metrics.cache_hit = true;
            cached.performance_metrics.total_ms = started.elapsed().as_millis() as u64;
            return Ok(cached);
        }

        // 2. Intent
        let context_text = request.context_text();
        let intent = if context_text.is_empty() {
            None
        } else {
            let outcome = self
                .intent_analyzer
                .analyze_intent(request.user, &context_text, request.project_id, false)
                .await?;
            if outcome.source == IntentSource::RuleFallback {
                metrics.mark_skipped("intent_llm");
            }
            Some(outcome.intent)
        };

        // 3. Candidates — the one fatal dependency
        let candidates = self
            .store
            .ordered_content_for_user(request.user, CANDIDATE_CAP)
            .await?;
        metrics.candidate_count = candidates.len();

        if candidates.is_empty() {
            metrics.total_ms = started.elapsed().as_millis() as u64;
            return Ok(RecommendationResult {
                items: vec![],
                engine_used: "none".to_string(),
                total_count: 0,
                performance_metrics: metrics,
            });
        }

        // 4. Request embedding; a dead embedder zeroes the semantic
        //    component instead of failing the request
        let query_embedding = if context_text.is_empty() {
            None
        } else {
            match self.embedder.embed(&context_text).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!(error = %e, "embedder unavailable, skipping semantic component");
                    metrics.mark_skipped("semantic");
                    None
                }
            }
        };

        // 5. Engine scoring
        let ctx = ScoringContext {
            user: request.user,
            technologies: request.normalized_technologies(),
            intent: intent.clone(),
            query_embedding,
            min_quality: request.min_quality,
        };
        let engine = self
            .engines
            .select(request.engine_preference, candidates.len());
        let engine_used = engine.kind().as_str().to_string();
        let scored = engine.score(&ctx, &candidates);

        // 6. Personalization; cache trouble inside degrades silently
        let scored = match self.learner.personalize(request.user, scored.clone()).await {
            Ok(personalized) => personalized,
            Err(e) if e.is_recoverable() => {
                metrics.mark_skipped("personalization");
                scored
            }
            Err(e) => return Err(e),
        };

        // 7. Skill-gap boost
        let targets = intent
            .as_ref()
            .map(|i| i.specific_technologies.clone())
            .unwrap_or_default();
        let report = SkillGapAnalyzer::analyze(&candidates, &targets);
        let mut scored = SkillGapAnalyzer::boost(&report, scored);

        // 8. The only min-score filter and truncation in the pipeline:
        //    they run here so the re-rankers above could still promote
        //    candidates from outside the provisional top-N
        scored.retain(|c| c.score >= request.min_score);
        scored.truncate(request.max_recommendations);

        // 9. Explanations
        let goal = intent.as_ref().map(|i| i.primary_goal);
        let project_type = intent.as_ref().map(|i| i.project_type.as_str());
        for candidate in &mut scored {
            let explanation = self
                .explainer
                .explain(request.user, candidate, goal, project_type)
                .await;
            if !explanation.from_llm {
                metrics.mark_skipped("llm_explanation");
            }
            candidate.reason = Some(explanation.reason);
        }

        let items: Vec<RecommendationItem> = scored.iter().map(Self::to_item).collect();
        metrics.total_ms = started.elapsed().as_millis() as u64;

        let result = RecommendationResult {
            total_count: items.len(),
            items,
            engine_used,
            performance_metrics: metrics,
        };

        // 10. Cache the result
        cache_set_json(
            self.cache.as_ref(),
            &cache_key,
            &result,
            Some(cache::keys::TTL_RECOMMENDATIONS),
        )
        .await;

        info!(
            user = %request.user,
            engine = %result.engine_used,
            count = result.total_count,
            degraded = result.performance_metrics.degraded,
            "recommendations computed"
        );
        Ok(result)
    }

    fn to_item(candidate: &ScoredCandidate) -> RecommendationItem {
        RecommendationItem {
            id: candidate.content.content.id,
            title: candidate
                .content
                .content
                .title
                .clone()
                .unwrap_or_else(|| candidate.content.content.url.clone()),
            url: candidate.content.content.url.clone(),
            score: candidate.score,
            reason: candidate.reason.clone().unwrap_or_default(),
            content_type: candidate.content.content_type.clone(),
            difficulty: candidate.content.difficulty_level.clone(),
            technologies: candidate.technologies(),
            key_concepts: candidate.content.key_concepts.clone().unwrap_or_default(),
            quality_score: candidate.content.content.quality_score,
            confidence: candidate.confidence,
        }
    }
}
