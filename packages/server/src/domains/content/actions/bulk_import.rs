//! Bulk bookmark import with streamed progress and cancellation.
//!
//! Items run sequentially through the single-bookmark flow. Partial
//! failure is expected — the batch never fails atomically. After every
//! item a progress event goes out; the cancellation flag is checked
//! between items and in-flight work is never interrupted.

use std::time::Duration;

use tracing::{info, warn};

use crate::common::entity_ids::{JobId, UserId};
use crate::common::errors::AppResult;
use crate::domains::content::actions::save_bookmark::{save_bookmark, SaveBookmarkInput};
use crate::kernel::deps::ServerDeps;
use crate::kernel::progress::ProgressStatus;

/// Per-item time estimate used to size the progress log's TTL.
const ESTIMATED_SECS_PER_ITEM: u64 = 15;

#[derive(Debug, Clone)]
pub struct BulkImportItem {
    pub url: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BulkImportSummary {
    pub job: JobId,
    pub total: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub created: u64,
    pub updated: u64,
    pub cancelled: bool,
}

/// Mint a job and run the import on a background task. Returns the job
/// id immediately so callers can subscribe to its progress stream or
/// request cancellation.
pub fn spawn_bulk_import(user: UserId, items: Vec<BulkImportItem>, deps: ServerDeps) -> JobId {
    let tracker = deps.progress.start_job(
        user,
        Duration::from_secs(ESTIMATED_SECS_PER_ITEM * (items.len() as u64).max(1)),
    );
    let job = tracker.job_id();
    tokio::spawn(async move {
        if let Err(e) = run_bulk_import(tracker, user, items, &deps).await {
            warn!(user = %user, job = %job, error = %e, "bulk import aborted");
        }
    });
    job
}

/// Run a bulk import to completion (or cancellation) on a pre-minted
/// tracker.
pub async fn run_bulk_import(
    tracker: crate::kernel::progress::ProgressTracker,
    user: UserId,
    items: Vec<BulkImportItem>,
    deps: &ServerDeps,
) -> AppResult<BulkImportSummary> {
    let total = items.len() as u64;
    let job = tracker.job_id();

    info!(user = %user, job = %job, total = total, "bulk import started");
    tracker
        .publish(ProgressStatus::Running, 0, total, 0, 0, None, None)
        .await;

    let mut processed = 0u64;
    let mut succeeded = 0u64;
    let mut failed = 0u64;
    let mut created = 0u64;
    let mut updated = 0u64;
    let mut cancelled = false;
    let mut last_error: Option<String> = None;

    for item in items {
        if deps.progress.is_cancelled(user, job).await {
            cancelled = true;
            break;
        }

        let input = SaveBookmarkInput {
            user,
            url: item.url.clone(),
            title: item.title,
            notes: item.notes,
            category: item.category,
            tags: item.tags,
            force_rescrape: false,
        };

        match save_bookmark(&input, deps).await {
            Ok(outcome) => {
                succeeded += 1;
                if outcome.created {
                    created += 1;
                } else {
                    updated += 1;
                }
            }
            Err(e) => {
                warn!(user = %user, url = %item.url, kind = e.kind(), "import item failed");
                failed += 1;
                last_error = Some(e.kind().to_string());
            }
        }
        processed += 1;

        tracker
            .publish(
                ProgressStatus::Running,
                processed,
                total,
                succeeded,
                failed,
                Some(item.url),
                None,
            )
            .await;
    }

    let status = if cancelled {
        ProgressStatus::Cancelled
    } else {
        ProgressStatus::Done
    };
    tracker
        .publish(status, processed, total, succeeded, failed, None, last_error)
        .await;

    info!(
        user = %user,
        job = %job,
        processed = processed,
        succeeded = succeeded,
        failed = failed,
        cancelled = cancelled,
        "bulk import finished"
    );

    Ok(BulkImportSummary {
        job,
        total,
        processed,
        succeeded,
        failed,
        created,
        updated,
        cancelled,
    })
}
