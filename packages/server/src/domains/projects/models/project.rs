//! Project and Task models.
//!
//! A project caches its Intent as JSON. The invariant maintained here:
//! `intent_analysis_updated` is set exactly when `intent_analysis` is
//! non-null — the two are always written together.

use chrono::{DateTime, Utc};
use harvest::Intent;
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::entity_ids::{ProjectId, TaskId, UserId};
use crate::common::errors::{AppError, AppResult};
use crate::domains::content::models::bookmark::with_store_retry;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub intent_analysis: Option<serde_json::Value>,
    pub intent_analysis_updated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub async fn find_by_id(
        user: UserId,
        id: ProjectId,
        pool: &PgPool,
    ) -> AppResult<Option<Self>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>("SELECT * FROM projects WHERE user_id = $1 AND id = $2")
                .bind(user)
                .bind(id)
                .fetch_optional(pool)
                .await
        })
        .await
    }

    pub async fn insert(
        user: UserId,
        title: &str,
        description: &str,
        technologies: &[String],
        pool: &PgPool,
    ) -> AppResult<Self> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "INSERT INTO projects (user_id, title, description, technologies)
                 VALUES ($1, $2, $3, $4)
                 RETURNING *",
            )
            .bind(user)
            .bind(title)
            .bind(description)
            .bind(technologies)
            .fetch_one(pool)
            .await
        })
        .await
    }

    /// Update the descriptive fields. Clears the cached intent — it was
    /// computed against the old context text.
    pub async fn update(
        user: UserId,
        id: ProjectId,
        title: &str,
        description: &str,
        technologies: &[String],
        pool: &PgPool,
    ) -> AppResult<Self> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "UPDATE projects
                 SET title = $3, description = $4, technologies = $5,
                     intent_analysis = NULL, intent_analysis_updated = NULL,
                     updated_at = now()
                 WHERE user_id = $1 AND id = $2
                 RETURNING *",
            )
            .bind(user)
            .bind(id)
            .bind(title)
            .bind(description)
            .bind(technologies)
            .fetch_one(pool)
            .await
        })
        .await
    }

    /// Store a freshly computed intent. Sets both JSON and timestamp.
    pub async fn store_intent(
        user: UserId,
        id: ProjectId,
        intent: &Intent,
        pool: &PgPool,
    ) -> AppResult<()> {
        let data = serde_json::to_value(intent)
            .map_err(|e| AppError::Internal(format!("intent serialization failed: {}", e)))?;

        with_store_retry(|| async {
            sqlx::query(
                "UPDATE projects
                 SET intent_analysis = $3, intent_analysis_updated = now()
                 WHERE user_id = $1 AND id = $2",
            )
            .bind(user)
            .bind(id)
            .bind(&data)
            .execute(pool)
            .await
        })
        .await?;
        Ok(())
    }

    /// The text the intent analyzer fingerprints: title, description,
    /// technologies, space-joined.
    pub fn context_text(&self) -> String {
        format!(
            "{} {} {}",
            self.title,
            self.description,
            self.technologies.join(" ")
        )
    }

    /// Deserialize the cached intent, if any.
    pub fn intent(&self) -> Option<Intent> {
        self.intent_analysis
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    /// Optional refined sub-context; no engine consumes it today
    pub embedding: Option<Vector>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub async fn insert(
        project: ProjectId,
        title: &str,
        description: &str,
        embedding: Option<Vec<f32>>,
        pool: &PgPool,
    ) -> AppResult<Self> {
        let vector = embedding.map(Vector::from);
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "INSERT INTO tasks (project_id, title, description, embedding)
                 VALUES ($1, $2, $3, $4)
                 RETURNING *",
            )
            .bind(project)
            .bind(title)
            .bind(description)
            .bind(vector.clone())
            .fetch_one(pool)
            .await
        })
        .await
    }

    pub async fn list_for_project(project: ProjectId, pool: &PgPool) -> AppResult<Vec<Self>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "SELECT * FROM tasks WHERE project_id = $1 ORDER BY created_at ASC",
            )
            .bind(project)
            .fetch_all(pool)
            .await
        })
        .await
    }

    pub async fn delete(id: TaskId, pool: &PgPool) -> AppResult<bool> {
        let result = with_store_retry(|| async {
            sqlx::query("DELETE FROM tasks WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
