//! ContentAnalysis model — one row per analyzed bookmark.
//!
//! `analysis_data` holds the full structured summary as JSON; the
//! filter columns (`content_type`, `difficulty_level`, `technology_tags`,
//! `relevance_score`) are denormalized from it for indexed access.

use chrono::{DateTime, Utc};
use harvest::ContentAnalysis;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::entity_ids::ContentId;
use crate::common::errors::{AppError, AppResult};
use crate::domains::content::models::bookmark::with_store_retry;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct ContentAnalysisRow {
    pub id: Uuid,
    pub content_id: Uuid,
    pub analysis_data: serde_json::Value,
    pub key_concepts: Vec<String>,
    pub content_type: String,
    pub difficulty_level: String,
    pub technology_tags: Vec<String>,
    pub relevance_score: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentAnalysisRow {
    /// Insert or replace the analysis for a bookmark (1:1).
    pub async fn upsert(
        content_id: ContentId,
        analysis: &ContentAnalysis,
        pool: &PgPool,
    ) -> AppResult<Self> {
        let data = serde_json::to_value(analysis)
            .map_err(|e| AppError::Internal(format!("analysis serialization failed: {}", e)))?;

        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "INSERT INTO content_analysis
                     (content_id, analysis_data, key_concepts, content_type,
                      difficulty_level, technology_tags, relevance_score)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (content_id) DO UPDATE SET
                     analysis_data = EXCLUDED.analysis_data,
                     key_concepts = EXCLUDED.key_concepts,
                     content_type = EXCLUDED.content_type,
                     difficulty_level = EXCLUDED.difficulty_level,
                     technology_tags = EXCLUDED.technology_tags,
                     relevance_score = EXCLUDED.relevance_score,
                     updated_at = now()
                 RETURNING *",
            )
            .bind(content_id)
            .bind(&data)
            .bind(&analysis.key_concepts)
            .bind(analysis.content_type.as_str())
            .bind(analysis.difficulty.as_str())
            .bind(&analysis.technologies)
            .bind(analysis.relevance_score as i16)
            .fetch_one(pool)
            .await
        })
        .await
    }

    /// Analysis for one bookmark, if it exists.
    pub async fn find_by_content(content_id: ContentId, pool: &PgPool) -> AppResult<Option<Self>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>("SELECT * FROM content_analysis WHERE content_id = $1")
                .bind(content_id)
                .fetch_optional(pool)
                .await
        })
        .await
    }

    /// Drop the analysis for a bookmark (re-scrape path: the background
    /// worker will produce a fresh one).
    pub async fn delete_for_content(content_id: ContentId, pool: &PgPool) -> AppResult<()> {
        with_store_retry(|| async {
            sqlx::query("DELETE FROM content_analysis WHERE content_id = $1")
                .bind(content_id)
                .execute(pool)
                .await
        })
        .await?;
        Ok(())
    }
}
