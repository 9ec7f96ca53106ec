//! Postgres implementations of the kernel store traits.
//!
//! Thin adapters: all SQL lives on the domain models; these structs just
//! carry the pool and satisfy the trait objects `ServerDeps` hands out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest::{ContentAnalysis, Intent};
use sqlx::PgPool;

use crate::common::entity_ids::{ContentId, ProjectId, UserId};
use crate::common::errors::AppResult;
use crate::domains::analysis::models::analysis::ContentAnalysisRow;
use crate::domains::content::models::bookmark::{
    ContentWithAnalysis, SavedContent, UnanalyzedContent,
};
use crate::domains::feedback::models::feedback::{FeedbackEvent, NewFeedback};
use crate::domains::projects::models::project::Project;
use crate::kernel::traits::{
    BaseAnalysisStore, BaseFeedbackStore, BaseProjectStore, BaseRecommendationStore,
    ProjectContext,
};

#[derive(Clone)]
pub struct PgRecommendationStore {
    pool: PgPool,
}

impl PgRecommendationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseRecommendationStore for PgRecommendationStore {
    async fn ordered_content_for_user(
        &self,
        user: UserId,
        cap: i64,
    ) -> AppResult<Vec<ContentWithAnalysis>> {
        SavedContent::ordered_for_user(user, cap, &self.pool).await
    }
}

#[derive(Clone)]
pub struct PgFeedbackStore {
    pool: PgPool,
}

impl PgFeedbackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseFeedbackStore for PgFeedbackStore {
    async fn record(&self, event: &NewFeedback) -> AppResult<FeedbackEvent> {
        FeedbackEvent::record(event, &self.pool).await
    }

    async fn list_for_user(
        &self,
        user: UserId,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<FeedbackEvent>> {
        FeedbackEvent::list_for_user(user, since, &self.pool).await
    }
}

#[derive(Clone)]
pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseProjectStore for PgProjectStore {
    async fn project_context(
        &self,
        user: UserId,
        project: ProjectId,
    ) -> AppResult<Option<ProjectContext>> {
        let project = Project::find_by_id(user, project, &self.pool).await?;
        Ok(project.map(|p| ProjectContext {
            context_text: p.context_text(),
            intent: p.intent(),
        }))
    }

    async fn store_intent(
        &self,
        user: UserId,
        project: ProjectId,
        intent: &Intent,
    ) -> AppResult<()> {
        Project::store_intent(user, project, intent, &self.pool).await
    }
}

#[derive(Clone)]
pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseAnalysisStore for PgAnalysisStore {
    async fn list_unanalyzed(&self, limit: i64) -> AppResult<Vec<UnanalyzedContent>> {
        SavedContent::list_unanalyzed(limit, &self.pool).await
    }

    async fn upsert_analysis(
        &self,
        content: ContentId,
        analysis: &ContentAnalysis,
    ) -> AppResult<()> {
        ContentAnalysisRow::upsert(content, analysis, &self.pool).await?;
        Ok(())
    }

    async fn mark_analysis_failed(&self, content: ContentId) -> AppResult<()> {
        SavedContent::mark_analysis_failed(content, &self.pool).await
    }
}
