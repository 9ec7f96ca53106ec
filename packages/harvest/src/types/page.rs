//! Page types — raw fetched documents and extracted scrape results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body text is truncated to this many characters before embedding and
/// analysis. Changing it invalidates stored embeddings.
pub const MAX_BODY_CHARS: usize = 100_000;

/// A raw HTML document as returned by a [`crate::traits::PageFetcher`].
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Final URL after redirects
    pub url: String,

    /// Raw HTML body
    pub html: String,

    /// HTTP status code
    pub status: u16,
}

/// The extracted, readable result of scraping one URL.
///
/// This is what ingestion persists: the readable body, the signals the
/// quality heuristic used, and the deterministic 0–10 quality score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// Canonical URL of the page
    pub url: String,

    /// Page title if the document had one
    pub title: Option<String>,

    /// Meta description if the document had one
    pub meta_description: Option<String>,

    /// Heading texts (h1–h3), document order
    pub headings: Vec<String>,

    /// Extracted readable body (markdown), capped at [`MAX_BODY_CHARS`]
    pub extracted_text: String,

    /// Deterministic content quality, 0–10
    pub quality_score: u8,

    /// Set when the scraper fell back to its best failing attempt
    /// (quality forced to 3); ingestion decides whether to accept it
    pub degraded: bool,

    /// Which strategy produced the winning attempt
    pub strategy: String,

    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

impl ScrapedPage {
    /// Truncate the body to the ingestion cap. Idempotent.
    pub fn truncate_body(&mut self) {
        if self.extracted_text.chars().count() > MAX_BODY_CHARS {
            self.extracted_text = self.extracted_text.chars().take(MAX_BODY_CHARS).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_caps_at_limit() {
        let mut page = ScrapedPage {
            url: "https://example.com".into(),
            title: None,
            meta_description: None,
            headings: vec![],
            extracted_text: "x".repeat(MAX_BODY_CHARS + 500),
            quality_score: 7,
            degraded: false,
            strategy: "http".into(),
            fetched_at: Utc::now(),
        };
        page.truncate_body();
        assert_eq!(page.extracted_text.chars().count(), MAX_BODY_CHARS);

        // Idempotent
        page.truncate_body();
        assert_eq!(page.extracted_text.chars().count(), MAX_BODY_CHARS);
    }

    #[test]
    fn truncate_body_leaves_short_text_alone() {
        let mut page = ScrapedPage {
            url: "https://example.com".into(),
            title: Some("t".into()),
            meta_description: None,
            headings: vec![],
            extracted_text: "short body".into(),
            quality_score: 5,
            degraded: false,
            strategy: "http".into(),
            fetched_at: Utc::now(),
        };
        page.truncate_body();
        assert_eq!(page.extracted_text, "short body");
    }
}
