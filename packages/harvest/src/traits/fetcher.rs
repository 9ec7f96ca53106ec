//! Page fetch trait — one strategy for getting raw HTML.

use async_trait::async_trait;

use crate::error::ScrapeResult;
use crate::types::page::FetchedDocument;

/// A single fetch strategy (plain HTTP, stealth headers, ...).
///
/// The [`crate::scrape::Scraper`] tries fetchers in a fixed order per
/// host and extracts content from the first document whose quality
/// clears the floor.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Strategy name, used in logs and [`crate::types::page::ScrapedPage::strategy`].
    fn name(&self) -> &'static str;

    /// Fetch the raw HTML document at `url`.
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedDocument>;
}
