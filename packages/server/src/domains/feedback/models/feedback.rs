//! UserFeedback model — append-only interaction events.
//!
//! Events are never updated; they disappear only with the user.
//! `recommendation_id` is opaque (no FK) and may dangle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::entity_ids::{ContentId, UserId};
use crate::common::errors::{AppError, AppResult};
use crate::domains::content::models::bookmark::with_store_retry;

/// What the user did with a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Clicked,
    Saved,
    Dismissed,
    NotRelevant,
    Helpful,
    Completed,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Clicked => "clicked",
            FeedbackType::Saved => "saved",
            FeedbackType::Dismissed => "dismissed",
            FeedbackType::NotRelevant => "not_relevant",
            FeedbackType::Helpful => "helpful",
            FeedbackType::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clicked" => Some(FeedbackType::Clicked),
            "saved" => Some(FeedbackType::Saved),
            "dismissed" => Some(FeedbackType::Dismissed),
            "not_relevant" => Some(FeedbackType::NotRelevant),
            "helpful" => Some(FeedbackType::Helpful),
            "completed" => Some(FeedbackType::Completed),
            _ => None,
        }
    }

    /// Positive signals reinforce a preference; negative ones suppress it.
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            FeedbackType::Clicked
                | FeedbackType::Saved
                | FeedbackType::Helpful
                | FeedbackType::Completed
        )
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct FeedbackEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_id: Uuid,
    pub recommendation_id: Option<Uuid>,
    pub feedback_type: String,
    pub context_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl FeedbackEvent {
    pub fn feedback_type(&self) -> Option<FeedbackType> {
        FeedbackType::parse(&self.feedback_type)
    }
}

/// Write shape for one event.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub recommendation_id: Option<Uuid>,
    pub feedback_type: FeedbackType,
    pub context_data: serde_json::Value,
}

impl FeedbackEvent {
    /// Append one event. The content must belong to the user — enforced
    /// here rather than trusted from the caller.
    pub async fn record(new: &NewFeedback, pool: &PgPool) -> AppResult<Self> {
        let owned: Option<(Uuid,)> = with_store_retry(|| async {
            sqlx::query_as("SELECT id FROM saved_content WHERE id = $1 AND user_id = $2")
                .bind(new.content_id)
                .bind(new.user_id)
                .fetch_optional(pool)
                .await
        })
        .await?;

        if owned.is_none() {
            return Err(AppError::Unauthorized);
        }

        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "INSERT INTO user_feedback
                     (user_id, content_id, recommendation_id, feedback_type, context_data)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING *",
            )
            .bind(new.user_id)
            .bind(new.content_id)
            .bind(new.recommendation_id)
            .bind(new.feedback_type.as_str())
            .bind(&new.context_data)
            .fetch_one(pool)
            .await
        })
        .await
    }

    /// A user's events, newest first, optionally bounded by time.
    pub async fn list_for_user(
        user: UserId,
        since: Option<DateTime<Utc>>,
        pool: &PgPool,
    ) -> AppResult<Vec<Self>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "SELECT * FROM user_feedback
                 WHERE user_id = $1
                   AND ($2::timestamptz IS NULL OR created_at >= $2)
                 ORDER BY created_at DESC",
            )
            .bind(user)
            .bind(since)
            .fetch_all(pool)
            .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_type_roundtrip() {
        for t in [
            FeedbackType::Clicked,
            FeedbackType::Saved,
            FeedbackType::Dismissed,
            FeedbackType::NotRelevant,
            FeedbackType::Helpful,
            FeedbackType::Completed,
        ] {
            assert_eq!(FeedbackType::parse(t.as_str()), Some(t));
        }
        assert!(FeedbackType::parse("liked").is_none());
    }

    #[test]
    fn polarity_split() {
        assert!(FeedbackType::Clicked.is_positive());
        assert!(FeedbackType::Completed.is_positive());
        assert!(!FeedbackType::Dismissed.is_positive());
        assert!(!FeedbackType::NotRelevant.is_positive());
    }
}
