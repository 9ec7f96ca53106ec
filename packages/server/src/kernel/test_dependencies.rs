//! In-memory store doubles for tests.
//!
//! These back the `Base*` store traits without a database so the
//! orchestrator, learner, intent analyzer, and background worker can be
//! exercised end-to-end in unit and integration tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest::{ContentAnalysis, Intent};
use pgvector::Vector;
use uuid::Uuid;

use crate::common::entity_ids::{ContentId, ProjectId, UserId};
use crate::common::errors::{AppError, AppResult};
use crate::domains::content::models::bookmark::{
    ContentWithAnalysis, SavedContent, UnanalyzedContent,
};
use crate::domains::feedback::models::feedback::{FeedbackEvent, NewFeedback};
use crate::kernel::traits::{
    BaseAnalysisStore, BaseFeedbackStore, BaseProjectStore, BaseRecommendationStore,
    ProjectContext,
};

/// Build a candidate row for tests. Embeddings are padded to the model
/// dimension and normalized, mirroring what ingestion stores.
pub fn make_candidate(
    user: UserId,
    url: &str,
    title: &str,
    quality: i16,
    embedding: Option<Vec<f32>>,
) -> ContentWithAnalysis {
    let embedding = embedding.map(|mut v| {
        v.resize(harvest::embed::DIMENSION, 0.0);
        harvest::embed::l2_normalize(v)
    });
    ContentWithAnalysis {
        content: SavedContent {
            id: Uuid::new_v4(),
            user_id: user,
            url: url.to_string(),
            title: Some(title.to_string()),
            notes: None,
            extracted_text: Some(format!("{} body text", title)),
            embedding: embedding.map(Vector::from),
            quality_score: quality,
            category: None,
            tags: vec![],
            analysis_failed_at: None,
            saved_at: Utc::now(),
        },
        content_type: None,
        difficulty_level: None,
        technology_tags: None,
        key_concepts: None,
        relevance_score: None,
    }
}

/// Attach analysis columns to a candidate.
pub fn with_analysis(
    mut candidate: ContentWithAnalysis,
    content_type: &str,
    difficulty: &str,
    technologies: &[&str],
    relevance: i16,
) -> ContentWithAnalysis {
    candidate.content_type = Some(content_type.to_string());
    candidate.difficulty_level = Some(difficulty.to_string());
    candidate.technology_tags = Some(technologies.iter().map(|t| t.to_string()).collect());
    candidate.key_concepts = Some(vec![]);
    candidate.relevance_score = Some(relevance);
    candidate
}

// ============================================================================
// Recommendation store double
// ============================================================================

#[derive(Default)]
pub struct InMemoryRecommendationStore {
    rows: RwLock<Vec<ContentWithAnalysis>>,
    fail: RwLock<bool>,
    delay: RwLock<Option<std::time::Duration>>,
}

impl InMemoryRecommendationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, row: ContentWithAnalysis) {
        self.rows.write().unwrap().push(row);
    }

    /// Make every read fail (simulates store outage).
    pub fn set_failing(&self, failing: bool) {
        *self.fail.write().unwrap() = failing;
    }

    /// Make every read take this long (simulates a slow store).
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.write().unwrap() = Some(delay);
    }
}

#[async_trait]
impl BaseRecommendationStore for InMemoryRecommendationStore {
    async fn ordered_content_for_user(
        &self,
        user: UserId,
        cap: i64,
    ) -> AppResult<Vec<ContentWithAnalysis>> {
        let delay = *self.delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.read().unwrap() {
            return Err(AppError::StoreUnavailable("test outage".into()));
        }
        let mut rows: Vec<ContentWithAnalysis> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.content.user_id == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.content
                .quality_score
                .cmp(&a.content.quality_score)
                .then(b.content.saved_at.cmp(&a.content.saved_at))
        });
        rows.truncate(cap as usize);
        Ok(rows)
    }
}

// ============================================================================
// Feedback store double
// ============================================================================

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    events: RwLock<Vec<FeedbackEvent>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseFeedbackStore for InMemoryFeedbackStore {
    async fn record(&self, event: &NewFeedback) -> AppResult<FeedbackEvent> {
        let stored = FeedbackEvent {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            content_id: event.content_id,
            recommendation_id: event.recommendation_id,
            feedback_type: event.feedback_type.as_str().to_string(),
            context_data: event.context_data.clone(),
            created_at: Utc::now(),
        };
        self.events.write().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn list_for_user(
        &self,
        user: UserId,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<FeedbackEvent>> {
        let mut events: Vec<FeedbackEvent> = self
            .events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user)
            .filter(|e| since.map(|s| e.created_at >= s).unwrap_or(true))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }
}

// ============================================================================
// Project store double
// ============================================================================

#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<(UserId, ProjectId), ProjectContext>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_project(&self, user: UserId, project: ProjectId, context_text: &str) {
        self.projects.write().unwrap().insert(
            (user, project),
            ProjectContext {
                context_text: context_text.to_string(),
                intent: None,
            },
        );
    }
}

#[async_trait]
impl BaseProjectStore for InMemoryProjectStore {
    async fn project_context(
        &self,
        user: UserId,
        project: ProjectId,
    ) -> AppResult<Option<ProjectContext>> {
        Ok(self.projects.read().unwrap().get(&(user, project)).cloned())
    }

    async fn store_intent(
        &self,
        user: UserId,
        project: ProjectId,
        intent: &Intent,
    ) -> AppResult<()> {
        let mut projects = self.projects.write().unwrap();
        match projects.get_mut(&(user, project)) {
            Some(ctx) => {
                ctx.intent = Some(intent.clone());
                Ok(())
            }
            None => Err(AppError::NotFound("project")),
        }
    }
}

// ============================================================================
// Analysis store double
// ============================================================================

#[derive(Default)]
pub struct InMemoryAnalysisStore {
    pending: RwLock<Vec<UnanalyzedContent>>,
    analyses: RwLock<HashMap<ContentId, ContentAnalysis>>,
    failed: RwLock<HashMap<ContentId, DateTime<Utc>>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pending(&self, content: UnanalyzedContent) {
        self.pending.write().unwrap().push(content);
    }

    pub fn analysis(&self, content: ContentId) -> Option<ContentAnalysis> {
        self.analyses.read().unwrap().get(&content).cloned()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.read().unwrap().len()
    }
}

#[async_trait]
impl BaseAnalysisStore for InMemoryAnalysisStore {
    async fn list_unanalyzed(&self, limit: i64) -> AppResult<Vec<UnanalyzedContent>> {
        let analyses = self.analyses.read().unwrap();
        let failed = self.failed.read().unwrap();
        let cooldown = Utc::now() - chrono::Duration::hours(1);

        Ok(self
            .pending
            .read()
            .unwrap()
            .iter()
            .filter(|c| !analyses.contains_key(&c.id))
            .filter(|c| failed.get(&c.id).map(|t| *t < cooldown).unwrap_or(true))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn upsert_analysis(
        &self,
        content: ContentId,
        analysis: &ContentAnalysis,
    ) -> AppResult<()> {
        self.analyses.write().unwrap().insert(content, analysis.clone());
        self.failed.write().unwrap().remove(&content);
        Ok(())
    }

    async fn mark_analysis_failed(&self, content: ContentId) -> AppResult<()> {
        self.failed.write().unwrap().insert(content, Utc::now());
        Ok(())
    }
}
