//! Stealth fetcher for bot-hostile hosts.
//!
//! Rotates through a pool of realistic user agents, sends a full
//! browser-like header set, and waits a random 2–8 s before each request.
//! Slower than the fast path; only used for hosts on the hostile list or
//! as a last resort.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::{ScrapeError, ScrapeResult};
use crate::traits::PageFetcher;
use crate::types::page::FetchedDocument;

/// Realistic desktop user agents, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
];

/// Pre-request delay bounds (seconds).
const MIN_DELAY_SECS: u64 = 2;
const MAX_DELAY_SECS: u64 = 8;

/// Fetcher with anti-detection posture for JS-heavy or hostile domains.
pub struct StealthFetcher {
    client: reqwest::Client,
    /// Skip the politeness delay (tests only)
    skip_delay: bool,
}

impl StealthFetcher {
    pub fn new() -> ScrapeResult<Self> {
        // UA is set per request; the client only carries shared settings
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ScrapeError::Http {
                url: String::new(),
                message: format!("failed to build stealth client: {}", e),
            })?;

        Ok(Self {
            client,
            skip_delay: false,
        })
    }

    #[doc(hidden)]
    pub fn without_delay() -> ScrapeResult<Self> {
        let mut fetcher = Self::new()?;
        fetcher.skip_delay = true;
        Ok(fetcher)
    }

    fn pick_user_agent() -> &'static str {
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }

    fn random_delay() -> Duration {
        let millis =
            rand::thread_rng().gen_range((MIN_DELAY_SECS * 1000)..=(MAX_DELAY_SECS * 1000));
        Duration::from_millis(millis)
    }
}

#[async_trait]
impl PageFetcher for StealthFetcher {
    fn name(&self) -> &'static str {
        "stealth"
    }

    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedDocument> {
        if !self.skip_delay {
            let delay = Self::random_delay();
            debug!(url = %url, delay_ms = delay.as_millis() as u64, "stealth pre-request delay");
            tokio::time::sleep(delay).await;
        }

        let user_agent = Self::pick_user_agent();

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::ACCEPT_ENCODING, "gzip, deflate, br")
            .header(reqwest::header::CONNECTION, "keep-alive")
            .header(reqwest::header::UPGRADE_INSECURE_REQUESTS, "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScrapeError::Timeout { url: url.to_string() }
                } else {
                    ScrapeError::Http {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| ScrapeError::Http {
            url: url.to_string(),
            message: format!("failed to read body: {}", e),
        })?;

        Ok(FetchedDocument {
            url: final_url,
            html,
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_pool_is_realistic() {
        for _ in 0..20 {
            let ua = StealthFetcher::pick_user_agent();
            assert!(ua.starts_with("Mozilla/5.0"));
            assert!(USER_AGENTS.contains(&ua));
        }
    }

    #[test]
    fn delay_stays_in_bounds() {
        for _ in 0..50 {
            let delay = StealthFetcher::random_delay();
            assert!(delay >= Duration::from_secs(MIN_DELAY_SECS));
            assert!(delay <= Duration::from_secs(MAX_DELAY_SECS));
        }
    }
}
