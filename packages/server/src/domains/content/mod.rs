//! Saved content (bookmarks): persistence and the ingestion pipeline.

pub mod actions;
pub mod models;

pub use models::bookmark::{
    BookmarkFilter, BulkUpsertOutcome, ContentWithAnalysis, NewBookmark, SavedContent,
    UnanalyzedContent,
};
