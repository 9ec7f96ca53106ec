// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. They exist
// so the recommendation pipeline, learner, intent analyzer, and the
// background worker can run against in-memory doubles in tests.
//
// Naming convention: Base* for trait names.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest::{ContentAnalysis, Intent};

use crate::common::entity_ids::{ContentId, ProjectId, UserId};
use crate::common::errors::AppResult;
use crate::domains::content::models::bookmark::{ContentWithAnalysis, UnanalyzedContent};
use crate::domains::feedback::models::feedback::{FeedbackEvent, NewFeedback};

// =============================================================================
// Recommendation candidate feed
// =============================================================================

#[async_trait]
pub trait BaseRecommendationStore: Send + Sync {
    /// A user's bookmarks joined with analysis, best first, capped.
    async fn ordered_content_for_user(
        &self,
        user: UserId,
        cap: i64,
    ) -> AppResult<Vec<ContentWithAnalysis>>;
}

// =============================================================================
// Feedback events
// =============================================================================

#[async_trait]
pub trait BaseFeedbackStore: Send + Sync {
    /// Append one event.
    async fn record(&self, event: &NewFeedback) -> AppResult<FeedbackEvent>;

    /// A user's events, newest first, optionally bounded by time.
    async fn list_for_user(
        &self,
        user: UserId,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<FeedbackEvent>>;
}

// =============================================================================
// Project context + cached intent
// =============================================================================

/// What the intent analyzer needs from a project.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Title, description, and technologies, space-joined
    pub context_text: String,
    /// Previously stored intent, if any
    pub intent: Option<Intent>,
}

#[async_trait]
pub trait BaseProjectStore: Send + Sync {
    /// Context text and cached intent for a project, owner-scoped.
    async fn project_context(
        &self,
        user: UserId,
        project: ProjectId,
    ) -> AppResult<Option<ProjectContext>>;

    /// Persist a freshly computed intent on the project.
    async fn store_intent(
        &self,
        user: UserId,
        project: ProjectId,
        intent: &Intent,
    ) -> AppResult<()>;
}

// =============================================================================
// Background analysis
// =============================================================================

#[async_trait]
pub trait BaseAnalysisStore: Send + Sync {
    /// Bookmarks with no analysis and no recent failure, oldest first.
    async fn list_unanalyzed(&self, limit: i64) -> AppResult<Vec<UnanalyzedContent>>;

    /// Write (or replace) the analysis for a bookmark.
    async fn upsert_analysis(
        &self,
        content: ContentId,
        analysis: &ContentAnalysis,
    ) -> AppResult<()>;

    /// Record a failure so the bookmark cools down before retry.
    async fn mark_analysis_failed(&self, content: ContentId) -> AppResult<()>;
}
