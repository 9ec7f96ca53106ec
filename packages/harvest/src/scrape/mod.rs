//! Scraping — fetch a URL, extract the readable body, score its quality.
//!
//! Two fetch strategies exist: a plain-HTTP fast path and a stealth mode
//! with rotating user agents and politeness delays for bot-hostile hosts.
//! The [`Scraper`] picks the strategy order per host, takes the first
//! attempt whose quality clears the floor, and otherwise hands back the
//! best failing attempt marked as degraded.

mod extract;
mod http;
mod quality;
mod scraper;
mod stealth;

pub use extract::ExtractedContent;
pub use http::HttpFetcher;
pub use quality::quality_score;
pub use scraper::{Scraper, ScraperConfig};
pub use stealth::StealthFetcher;
