//! Single-bookmark ingestion: dedup → scrape → quality gate → embed →
//! persist → invalidate caches.
//!
//! AI analysis is never part of this path; the background worker picks
//! the bookmark up later. A dead embedder stores the bookmark without an
//! embedding (semantic scoring degrades) rather than failing the save.

use harvest::embed::{embedding_text, EmbeddingSource};
use harvest::{ScrapeError, ScrapedPage};
use tracing::{debug, info, warn};
use url::Url;

use crate::common::entity_ids::UserId;
use crate::common::errors::{AppError, AppResult};
use crate::domains::analysis::models::analysis::ContentAnalysisRow;
use crate::domains::content::models::bookmark::{NewBookmark, SavedContent};
use crate::kernel::cache;
use crate::kernel::deps::ServerDeps;

#[derive(Debug, Clone)]
pub struct SaveBookmarkInput {
    pub user: UserId,
    pub url: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Re-scrape even when the URL is already saved
    pub force_rescrape: bool,
}

impl SaveBookmarkInput {
    pub fn new(user: UserId, url: impl Into<String>) -> Self {
        Self {
            user,
            url: url.into(),
            title: None,
            notes: None,
            category: None,
            tags: vec![],
            force_rescrape: false,
        }
    }
}

#[derive(Debug)]
pub struct SaveOutcome {
    pub content: SavedContent,
    pub created: bool,
    /// False when an existing bookmark was merged without scraping
    pub scraped: bool,
}

/// Save one bookmark for a user.
pub async fn save_bookmark(input: &SaveBookmarkInput, deps: &ServerDeps) -> AppResult<SaveOutcome> {
    let url = validate_url(&input.url)?;

    // Dedup: merging metadata onto an existing bookmark never re-scrapes
    // unless forced
    let existing = SavedContent::find_by_url(input.user, &url, &deps.db_pool).await?;
    if let Some(existing) = &existing {
        if !input.force_rescrape {
            debug!(user = %input.user, url = %url, "bookmark exists, merging metadata");
            let (content, created) = SavedContent::upsert(
                &NewBookmark {
                    user_id: input.user,
                    url: url.clone(),
                    title: input.title.clone(),
                    notes: input.notes.clone(),
                    category: input.category.clone(),
                    tags: input.tags.clone(),
                    extracted_text: None,
                    quality_score: existing.quality_score,
                    embedding: None,
                },
                &deps.db_pool,
            )
            .await?;
            invalidate_caches(input.user, deps).await;
            return Ok(SaveOutcome {
                content,
                created,
                scraped: false,
            });
        }
    }

    // Scrape
    let page = match deps.scraper.scrape(&url).await {
        Ok(page) => page,
        Err(ScrapeError::RateLimited { retry_after_secs }) => {
            return Err(AppError::RateLimited { retry_after_secs });
        }
        Err(ScrapeError::InvalidUrl { url }) => {
            return Err(AppError::InvalidInput(format!("invalid URL: {}", url)));
        }
        Err(e) => {
            warn!(url = %url, error = %e, "scrape failed");
            return Err(AppError::ScrapeFailed { url, quality: 0 });
        }
    };

    // Quality gate (degraded best-effort results land below it)
    if page.quality_score < deps.ingest_quality_floor {
        return Err(AppError::ScrapeFailed {
            url,
            quality: page.quality_score,
        });
    }

    // Embed the canonical recipe; embedder trouble degrades, not fails
    let embedding = embed_page(&page, input.notes.as_deref(), deps).await;

    let (content, created) = SavedContent::upsert(
        &NewBookmark {
            user_id: input.user,
            url: url.clone(),
            title: input.title.clone().or(page.title.clone()),
            notes: input.notes.clone(),
            category: input.category.clone(),
            tags: input.tags.clone(),
            extracted_text: Some(page.extracted_text.clone()),
            quality_score: page.quality_score as i16,
            embedding,
        },
        &deps.db_pool,
    )
    .await?;

    // A re-scrape invalidates the old analysis; the worker redoes it
    if existing.is_some() && input.force_rescrape {
        ContentAnalysisRow::delete_for_content(content.id, &deps.db_pool).await?;
        let _ = deps
            .cache
            .delete(&cache::keys::analysis(content.id))
            .await;
    }

    invalidate_caches(input.user, deps).await;

    info!(
        user = %input.user,
        url = %url,
        quality = page.quality_score,
        created = created,
        "bookmark saved"
    );
    Ok(SaveOutcome {
        content,
        created,
        scraped: true,
    })
}

async fn embed_page(
    page: &ScrapedPage,
    notes: Option<&str>,
    deps: &ServerDeps,
) -> Option<Vec<f32>> {
    let text = embedding_text(&EmbeddingSource {
        title: page.title.as_deref(),
        meta_description: page.meta_description.as_deref(),
        headings: &page.headings,
        user_notes: notes,
        body: &page.extracted_text,
    });

    match deps.embedder.embed(&text).await {
        Ok(vector) => Some(vector),
        Err(e) => {
            warn!(url = %page.url, error = %e, "embedding failed, storing without vector");
            None
        }
    }
}

async fn invalidate_caches(user: UserId, deps: &ServerDeps) {
    let _ = deps
        .cache
        .delete_pattern(&cache::keys::recommendations_pattern(user))
        .await;
    let _ = deps.cache.delete(&cache::keys::bookmark_list(user)).await;
}

fn validate_url(raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::InvalidInput("URL must not be empty".into()));
    }
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let parsed = Url::parse(&with_scheme)
        .map_err(|_| AppError::InvalidInput(format!("invalid URL: {}", raw)))?;
    if parsed.host_str().is_none() {
        return Err(AppError::InvalidInput(format!("URL has no host: {}", raw)));
    }
    Ok(with_scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_url_adds_scheme_and_rejects_garbage() {
        assert_eq!(
            validate_url("flask.palletsprojects.com/en/latest/").unwrap(),
            "https://flask.palletsprojects.com/en/latest/"
        );
        assert!(validate_url("").is_err());
        assert!(validate_url("https://").is_err());
    }
}
