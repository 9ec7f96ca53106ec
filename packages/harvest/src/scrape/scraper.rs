//! Strategy-ordered scraper with host policies and politeness limits.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::extract::extract;
use super::http::HttpFetcher;
use super::quality::quality_score;
use super::stealth::StealthFetcher;
use crate::error::{ScrapeError, ScrapeResult};
use crate::traits::PageFetcher;
use crate::types::page::ScrapedPage;

/// Quality a degraded best-effort result is reported as.
const DEGRADED_QUALITY: u8 = 3;

/// Scraper behavior knobs.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Hosts that get the stealth strategy first (JS-heavy or bot-hostile)
    pub hostile_domains: Vec<String>,
    /// Per-process politeness budget
    pub max_requests_per_hour: u32,
    /// Minimum quality for a strategy's result to win outright
    pub quality_floor: u8,
    /// Fetch attempts per strategy before moving on
    pub attempts_per_strategy: u32,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            hostile_domains: vec![
                "github.com".to_string(),
                "leetcode.com".to_string(),
                "medium.com".to_string(),
                "dev.to".to_string(),
                "stackoverflow.com".to_string(),
            ],
            max_requests_per_hour: 30,
            quality_floor: 5,
            attempts_per_strategy: 2,
        }
    }
}

/// Fetch a URL and extract its readable content.
///
/// Strategy order is chosen per host; the first attempt whose quality
/// clears the floor wins. If every strategy falls short, the best attempt
/// is returned with its quality forced to [`DEGRADED_QUALITY`] and the
/// `degraded` flag set — callers decide whether that is acceptable.
pub struct Scraper {
    http: Arc<dyn PageFetcher>,
    stealth: Arc<dyn PageFetcher>,
    config: ScraperConfig,
    request_log: Mutex<VecDeque<Instant>>,
}

impl Scraper {
    pub fn new(config: ScraperConfig) -> ScrapeResult<Self> {
        Ok(Self {
            http: Arc::new(HttpFetcher::new()?),
            stealth: Arc::new(StealthFetcher::new()?),
            config,
            request_log: Mutex::new(VecDeque::new()),
        })
    }

    /// Build a scraper with injected fetch strategies (tests).
    pub fn with_fetchers(
        http: Arc<dyn PageFetcher>,
        stealth: Arc<dyn PageFetcher>,
        config: ScraperConfig,
    ) -> Self {
        Self {
            http,
            stealth,
            config,
            request_log: Mutex::new(VecDeque::new()),
        }
    }

    /// Scrape one URL.
    pub async fn scrape(&self, url: &str) -> ScrapeResult<ScrapedPage> {
        let url = normalize_url(url);
        let parsed = Url::parse(&url).map_err(|_| ScrapeError::InvalidUrl { url: url.clone() })?;

        self.acquire_slot().await?;

        let strategies = self.strategy_order(parsed.host_str().unwrap_or(""));

        let mut best: Option<ScrapedPage> = None;
        let mut last_err: Option<ScrapeError> = None;

        for fetcher in strategies {
            match self.try_strategy(fetcher.as_ref(), &url).await {
                Ok(page) => {
                    debug!(url = %url, strategy = page.strategy, quality = page.quality_score, "strategy attempt scored");
                    if page.quality_score >= self.config.quality_floor {
                        info!(url = %url, strategy = page.strategy, quality = page.quality_score, "scrape succeeded");
                        return Ok(page);
                    }
                    let better = best
                        .as_ref()
                        .map(|b| page.quality_score > b.quality_score)
                        .unwrap_or(true);
                    if better {
                        best = Some(page);
                    }
                }
                Err(e) => {
                    warn!(url = %url, strategy = fetcher.name(), error = %e, "strategy failed");
                    last_err = Some(e);
                }
            }
        }

        if let Some(mut page) = best {
            warn!(url = %url, "all strategies below quality floor, returning degraded result");
            page.quality_score = DEGRADED_QUALITY;
            page.degraded = true;
            return Ok(page);
        }

        Err(last_err.unwrap_or(ScrapeError::QualityFloor {
            url,
            quality: 0,
            partial: None,
        }))
    }

    /// Run one strategy with bounded retries and exponential backoff.
    async fn try_strategy(
        &self,
        fetcher: &dyn PageFetcher,
        url: &str,
    ) -> ScrapeResult<ScrapedPage> {
        let mut last_err = None;

        for attempt in 0..self.config.attempts_per_strategy {
            if attempt > 0 {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            match fetcher.fetch(url).await {
                Ok(doc) => {
                    let content = extract(&doc.html);
                    let quality = quality_score(&content);
                    let mut page = ScrapedPage {
                        url: doc.url,
                        title: content.title,
                        meta_description: content.meta_description,
                        headings: content.headings,
                        extracted_text: content.markdown,
                        quality_score: quality,
                        degraded: false,
                        strategy: fetcher.name().to_string(),
                        fetched_at: Utc::now(),
                    };
                    page.truncate_body();
                    return Ok(page);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or(ScrapeError::Http {
            url: url.to_string(),
            message: "no attempts made".to_string(),
        }))
    }

    fn strategy_order(&self, host: &str) -> Vec<Arc<dyn PageFetcher>> {
        let hostile = self
            .config
            .hostile_domains
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{}", d)));

        if hostile {
            vec![self.stealth.clone(), self.http.clone()]
        } else {
            vec![self.http.clone(), self.stealth.clone()]
        }
    }

    /// Reserve a slot in the hourly politeness budget.
    async fn acquire_slot(&self) -> ScrapeResult<()> {
        let mut log = self.request_log.lock().await;
        let window = Duration::from_secs(3600);
        let now = Instant::now();

        while let Some(front) = log.front() {
            if now.duration_since(*front) > window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.config.max_requests_per_hour as usize {
            let retry_after = log
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            return Err(ScrapeError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        log.push_back(now);
        Ok(())
    }
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    fn rich_html() -> String {
        format!(
            "<html><head><title>Guide</title></head><body><main><h1>A</h1><h2>B</h2>\
             <pre>code</pre><p>{}</p></main></body></html>",
            "content word ".repeat(1_000)
        )
    }

    fn thin_html() -> &'static str {
        "<html><head><title>Thin</title></head><body><p>tiny</p></body></html>"
    }

    fn config() -> ScraperConfig {
        ScraperConfig {
            attempts_per_strategy: 1,
            ..ScraperConfig::default()
        }
    }

    #[tokio::test]
    async fn fast_path_wins_when_quality_clears_floor() {
        let http = Arc::new(MockFetcher::new("http").with_page("https://example.com/a", &rich_html()));
        let stealth = Arc::new(MockFetcher::new("stealth"));
        let scraper = Scraper::with_fetchers(http.clone(), stealth.clone(), config());

        let page = scraper.scrape("https://example.com/a").await.unwrap();
        assert_eq!(page.strategy, "http");
        assert!(page.quality_score >= 5);
        assert!(!page.degraded);
        assert_eq!(stealth.fetch_count(), 0);
    }

    #[tokio::test]
    async fn hostile_host_tries_stealth_first() {
        let http = Arc::new(MockFetcher::new("http"));
        let stealth =
            Arc::new(MockFetcher::new("stealth").with_page("https://github.com/r/r", &rich_html()));
        let scraper = Scraper::with_fetchers(http.clone(), stealth, config());

        let page = scraper.scrape("https://github.com/r/r").await.unwrap();
        assert_eq!(page.strategy, "stealth");
        assert_eq!(http.fetch_count(), 0);
    }

    #[tokio::test]
    async fn falls_back_to_degraded_best_attempt() {
        let http = Arc::new(MockFetcher::new("http").with_page("https://example.com/t", thin_html()));
        let stealth =
            Arc::new(MockFetcher::new("stealth").with_page("https://example.com/t", thin_html()));
        let scraper = Scraper::with_fetchers(http, stealth, config());

        let page = scraper.scrape("https://example.com/t").await.unwrap();
        assert!(page.degraded);
        assert_eq!(page.quality_score, 3);
    }

    #[tokio::test]
    async fn all_fetch_failures_surface_an_error() {
        let http = Arc::new(MockFetcher::new("http"));
        let stealth = Arc::new(MockFetcher::new("stealth"));
        let scraper = Scraper::with_fetchers(http, stealth, config());

        let err = scraper.scrape("https://example.com/missing").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Http { .. } | ScrapeError::Status { .. }));
    }

    #[tokio::test]
    async fn politeness_budget_is_enforced() {
        let http = Arc::new(MockFetcher::new("http").with_page("https://example.com/a", &rich_html()));
        let stealth = Arc::new(MockFetcher::new("stealth"));
        let scraper = Scraper::with_fetchers(
            http,
            stealth,
            ScraperConfig {
                max_requests_per_hour: 2,
                attempts_per_strategy: 1,
                ..ScraperConfig::default()
            },
        );

        scraper.scrape("https://example.com/a").await.unwrap();
        scraper.scrape("https://example.com/a").await.unwrap();
        let err = scraper.scrape("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, ScrapeError::RateLimited { .. }));
    }

    #[test]
    fn normalize_url_adds_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }
}
