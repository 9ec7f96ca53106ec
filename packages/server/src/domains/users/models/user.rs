//! User model. Credential handling lives in the session layer (out of
//! scope here); this model only carries what the pipeline needs.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::entity_ids::UserId;
use crate::common::errors::AppResult;
use crate::domains::content::models::bookmark::with_store_retry;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// Feeds the rule-based intent fallback vocabulary
    pub technology_interests: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub async fn find_by_id(id: UserId, pool: &PgPool) -> AppResult<Option<Self>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
        })
        .await
    }

    /// Explicit account deletion; cascades to everything the user owns.
    pub async fn delete(id: UserId, pool: &PgPool) -> AppResult<bool> {
        let result = with_store_retry(|| async {
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
