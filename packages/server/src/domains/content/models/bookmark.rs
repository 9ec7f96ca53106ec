//! SavedContent model — SQL persistence for bookmarks.
//!
//! Every read is scoped by `user_id`; there is no unscoped accessor.
//! `(user_id, url)` is unique and enforced in the write path: saving a
//! URL twice merges instead of erroring. Embeddings arrive already
//! L2-normalized; this layer never renormalizes.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::common::entity_ids::{ContentId, UserId};
use crate::common::errors::{AppError, AppResult};
use crate::common::pagination::{Page, PageArgs};

/// How many times a transient store failure is retried before it
/// surfaces as `StoreUnavailable`.
const STORE_RETRIES: u32 = 2;

/// Retry a query a bounded number of times on transient failures.
pub(crate) async fn with_store_retry<T, F, Fut>(mut run: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < STORE_RETRIES && is_transient(&e) => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt - 1))).await;
            }
            Err(e) => return Err(AppError::from(e)),
        }
    }
}

fn is_transient(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}

/// A user's saved bookmark.
#[derive(FromRow, Debug, Clone)]
pub struct SavedContent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub extracted_text: Option<String>,
    pub embedding: Option<Vector>,
    pub quality_score: i16,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub analysis_failed_at: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
}

/// Write shape for an upsert. `None` scrape fields mean "keep what is
/// stored" (merge without re-scrape).
#[derive(Debug, Clone)]
pub struct NewBookmark {
    pub user_id: UserId,
    pub url: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub extracted_text: Option<String>,
    pub quality_score: i16,
    pub embedding: Option<Vec<f32>>,
}

/// List filter: substring match over title/notes/url, category equality,
/// tag inclusion. All optional, AND-combined.
#[derive(Debug, Clone, Default)]
pub struct BookmarkFilter {
    pub query: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

/// Running counts for a batch upsert, reported to the progress sink
/// after every item.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkUpsertOutcome {
    pub processed: u64,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub created: u64,
    pub updated: u64,
}

/// A bookmark joined with its analysis columns (if analyzed).
#[derive(FromRow, Debug, Clone)]
pub struct ContentWithAnalysis {
    #[sqlx(flatten)]
    pub content: SavedContent,
    pub content_type: Option<String>,
    pub difficulty_level: Option<String>,
    pub technology_tags: Option<Vec<String>>,
    pub key_concepts: Option<Vec<String>>,
    pub relevance_score: Option<i16>,
}

/// A bookmark the background analyzer still has to process.
#[derive(FromRow, Debug, Clone)]
pub struct UnanalyzedContent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub extracted_text: Option<String>,
}

const SELECT_COLUMNS: &str = "id, user_id, url, title, notes, extracted_text, embedding, \
     quality_score, category, tags, analysis_failed_at, saved_at";

impl SavedContent {
    /// Find one bookmark by id, scoped to its owner.
    pub async fn find_by_id(
        user: UserId,
        id: ContentId,
        pool: &PgPool,
    ) -> AppResult<Option<Self>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "SELECT * FROM saved_content WHERE user_id = $1 AND id = $2",
            )
            .bind(user)
            .bind(id)
            .fetch_optional(pool)
            .await
        })
        .await
    }

    /// Find one bookmark by URL, scoped to its owner.
    pub async fn find_by_url(user: UserId, url: &str, pool: &PgPool) -> AppResult<Option<Self>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "SELECT * FROM saved_content WHERE user_id = $1 AND url = $2",
            )
            .bind(user)
            .bind(url)
            .fetch_optional(pool)
            .await
        })
        .await
    }

    /// List a user's bookmarks with filter and stable paging
    /// (`saved_at DESC, id DESC`). Returns the page plus unpaged total.
    pub async fn list(
        user: UserId,
        filter: &BookmarkFilter,
        page: PageArgs,
        pool: &PgPool,
    ) -> AppResult<Page<Self>> {
        let items = with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "SELECT * FROM saved_content
                 WHERE user_id = $1
                   AND ($2::text IS NULL
                        OR title ILIKE '%' || $2 || '%'
                        OR notes ILIKE '%' || $2 || '%'
                        OR url ILIKE '%' || $2 || '%')
                   AND ($3::text IS NULL OR category = $3)
                   AND ($4::text IS NULL OR $4 = ANY(tags))
                 ORDER BY saved_at DESC, id DESC
                 LIMIT $5 OFFSET $6",
            )
            .bind(user)
            .bind(&filter.query)
            .bind(&filter.category)
            .bind(&filter.tag)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await
        })
        .await?;

        let total: i64 = with_store_retry(|| async {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM saved_content
                 WHERE user_id = $1
                   AND ($2::text IS NULL
                        OR title ILIKE '%' || $2 || '%'
                        OR notes ILIKE '%' || $2 || '%'
                        OR url ILIKE '%' || $2 || '%')
                   AND ($3::text IS NULL OR category = $3)
                   AND ($4::text IS NULL OR $4 = ANY(tags))",
            )
            .bind(user)
            .bind(&filter.query)
            .bind(&filter.category)
            .bind(&filter.tag)
            .fetch_one(pool)
            .await
        })
        .await?;

        Ok(Page { items, total })
    }

    /// Insert or merge on `(user_id, url)`.
    ///
    /// Merge rules: non-empty incoming title/notes replace, scrape fields
    /// (`extracted_text`, `quality_score`, `embedding`) only replace when
    /// provided, `saved_at` is never touched on update. Returns the final
    /// row and whether it was created.
    pub async fn upsert(new: &NewBookmark, pool: &PgPool) -> AppResult<(Self, bool)> {
        let embedding = new.embedding.clone().map(Vector::from);

        let row = with_store_retry(|| async {
            sqlx::query(
                "INSERT INTO saved_content
                     (user_id, url, title, notes, category, tags,
                      extracted_text, quality_score, embedding)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (user_id, url) DO UPDATE SET
                     title = COALESCE(NULLIF(EXCLUDED.title, ''), saved_content.title),
                     notes = COALESCE(NULLIF(EXCLUDED.notes, ''), saved_content.notes),
                     category = COALESCE(EXCLUDED.category, saved_content.category),
                     tags = CASE WHEN cardinality(EXCLUDED.tags) > 0
                                 THEN EXCLUDED.tags ELSE saved_content.tags END,
                     extracted_text = COALESCE(EXCLUDED.extracted_text,
                                               saved_content.extracted_text),
                     quality_score = CASE WHEN EXCLUDED.extracted_text IS NULL
                                          THEN saved_content.quality_score
                                          ELSE EXCLUDED.quality_score END,
                     embedding = COALESCE(EXCLUDED.embedding, saved_content.embedding),
                     analysis_failed_at = CASE WHEN EXCLUDED.extracted_text IS NULL
                                               THEN saved_content.analysis_failed_at
                                               ELSE NULL END
                 RETURNING *, (xmax = 0) AS inserted",
            )
            .bind(new.user_id)
            .bind(&new.url)
            .bind(&new.title)
            .bind(&new.notes)
            .bind(&new.category)
            .bind(&new.tags)
            .bind(&new.extracted_text)
            .bind(new.quality_score)
            .bind(embedding.clone())
            .fetch_one(pool)
            .await
        })
        .await?;

        let created: bool = row.try_get("inserted").map_err(AppError::from)?;
        let content = Self::from_row(&row).map_err(AppError::from)?;
        Ok((content, created))
    }

    /// Process a batch of upserts, reporting progress after every item.
    ///
    /// Partial failure is tolerated — the batch never fails atomically;
    /// per-item errors are counted and the loop continues.
    pub async fn bulk_upsert<F>(
        items: &[NewBookmark],
        pool: &PgPool,
        mut sink: F,
    ) -> AppResult<BulkUpsertOutcome>
    where
        F: FnMut(&BulkUpsertOutcome),
    {
        let mut outcome = BulkUpsertOutcome {
            total: items.len() as u64,
            ..Default::default()
        };

        for item in items {
            match Self::upsert(item, pool).await {
                Ok((_, true)) => {
                    outcome.succeeded += 1;
                    outcome.created += 1;
                }
                Ok((_, false)) => {
                    outcome.succeeded += 1;
                    outcome.updated += 1;
                }
                Err(AppError::StoreUnavailable(m)) => {
                    return Err(AppError::StoreUnavailable(m));
                }
                Err(_) => outcome.failed += 1,
            }
            outcome.processed += 1;
            sink(&outcome);
        }

        Ok(outcome)
    }

    /// Delete by id, scoped. Returns whether a row was removed.
    pub async fn delete(user: UserId, id: ContentId, pool: &PgPool) -> AppResult<bool> {
        let result = with_store_retry(|| async {
            sqlx::query("DELETE FROM saved_content WHERE user_id = $1 AND id = $2")
                .bind(user)
                .bind(id)
                .execute(pool)
                .await
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete by URL, scoped.
    pub async fn delete_by_url(user: UserId, url: &str, pool: &PgPool) -> AppResult<bool> {
        let result = with_store_retry(|| async {
            sqlx::query("DELETE FROM saved_content WHERE user_id = $1 AND url = $2")
                .bind(user)
                .bind(url)
                .execute(pool)
                .await
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All of a user's bookmarks joined with analysis, best first
    /// (`quality_score DESC, saved_at DESC`), capped. The engines' feed.
    pub async fn ordered_for_user(
        user: UserId,
        cap: i64,
        pool: &PgPool,
    ) -> AppResult<Vec<ContentWithAnalysis>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, ContentWithAnalysis>(&format!(
                "SELECT {columns},
                        ca.content_type, ca.difficulty_level, ca.technology_tags,
                        ca.key_concepts, ca.relevance_score
                 FROM saved_content sc
                 LEFT JOIN content_analysis ca ON ca.content_id = sc.id
                 WHERE sc.user_id = $1
                 ORDER BY sc.quality_score DESC, sc.saved_at DESC
                 LIMIT $2",
                columns = SELECT_COLUMNS
                    .split(", ")
                    .map(|c| format!("sc.{}", c))
                    .collect::<Vec<_>>()
                    .join(", "),
            ))
            .bind(user)
            .bind(cap)
            .fetch_all(pool)
            .await
        })
        .await
    }

    /// Vector search over a user's embedded bookmarks, cosine distance
    /// ascending.
    pub async fn semantic_search(
        user: UserId,
        query_vector: &[f32],
        k: i64,
        pool: &PgPool,
    ) -> AppResult<Vec<(Self, f64)>> {
        let vector = Vector::from(query_vector.to_vec());

        let rows = with_store_retry(|| async {
            sqlx::query(
                "SELECT *, (embedding <=> $2) AS distance
                 FROM saved_content
                 WHERE user_id = $1 AND embedding IS NOT NULL
                 ORDER BY embedding <=> $2 ASC
                 LIMIT $3",
            )
            .bind(user)
            .bind(vector.clone())
            .bind(k)
            .fetch_all(pool)
            .await
        })
        .await?;

        rows.into_iter()
            .map(|row| {
                let distance: f64 = row.try_get("distance").map_err(AppError::from)?;
                let content = Self::from_row(&row).map_err(AppError::from)?;
                Ok((content, distance))
            })
            .collect()
    }

    /// Lexical fallback when no query embedding is available: substring
    /// match ranked by title hits then quality.
    pub async fn lexical_search(
        user: UserId,
        query: &str,
        k: i64,
        pool: &PgPool,
    ) -> AppResult<Vec<Self>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, Self>(
                "SELECT * FROM saved_content
                 WHERE user_id = $1
                   AND (title ILIKE '%' || $2 || '%'
                        OR notes ILIKE '%' || $2 || '%'
                        OR extracted_text ILIKE '%' || $2 || '%')
                 ORDER BY (title ILIKE '%' || $2 || '%') DESC,
                          quality_score DESC, saved_at DESC
                 LIMIT $3",
            )
            .bind(user)
            .bind(query)
            .bind(k)
            .fetch_all(pool)
            .await
        })
        .await
    }

    /// Bookmarks with no analysis row and no recent failure, oldest
    /// first. The background worker's feed; cooldown is one hour.
    pub async fn list_unanalyzed(limit: i64, pool: &PgPool) -> AppResult<Vec<UnanalyzedContent>> {
        with_store_retry(|| async {
            sqlx::query_as::<_, UnanalyzedContent>(
                "SELECT sc.id, sc.user_id, sc.url, sc.title, sc.extracted_text
                 FROM saved_content sc
                 LEFT JOIN content_analysis ca ON ca.content_id = sc.id
                 WHERE ca.id IS NULL
                   AND sc.extracted_text IS NOT NULL
                   AND (sc.analysis_failed_at IS NULL
                        OR sc.analysis_failed_at < now() - interval '1 hour')
                 ORDER BY sc.saved_at ASC
                 LIMIT $1",
            )
            .bind(limit)
            .fetch_all(pool)
            .await
        })
        .await
    }

    /// Record an analysis failure; the row is skipped until the cooldown
    /// elapses.
    pub async fn mark_analysis_failed(id: ContentId, pool: &PgPool) -> AppResult<()> {
        with_store_retry(|| async {
            sqlx::query("UPDATE saved_content SET analysis_failed_at = now() WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
        })
        .await?;
        Ok(())
    }

    /// Embedding as a plain slice, if present.
    pub fn embedding_slice(&self) -> Option<&[f32]> {
        self.embedding.as_ref().map(|v| v.as_slice())
    }
}
