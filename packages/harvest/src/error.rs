//! Typed errors for content acquisition and AI calls.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can branch
//! on the failure kind — the recommendation pipeline downgrades most of
//! these to deterministic fallbacks instead of surfacing them.

use thiserror::Error;

/// Errors that can occur in the harvest library.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Scraping a URL failed
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),

    /// LLM call failed
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Errors that can occur while scraping a page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// HTTP request failed
    #[error("HTTP error fetching {url}: {message}")]
    Http { url: String, message: String },

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Connection or read timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Per-process politeness rate limit exhausted
    #[error("scrape rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Every strategy failed or produced content below the floor.
    /// Carries the best attempt so ingestion can decide what to do with it.
    #[error("all scrape strategies failed for {url} (best quality {quality})")]
    QualityFloor {
        url: String,
        quality: u8,
        partial: Option<Box<crate::types::page::ScrapedPage>>,
    },
}

/// Errors that can occur calling the LLM.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure after retries
    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    /// The provider rate-limited the call
    #[error("LLM rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Response did not match the requested schema, even after a retry
    #[error("LLM returned unstructured output: {0}")]
    Unstructured(String),

    /// Per-call deadline exceeded
    #[error("LLM call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// No usable credential for the call
    #[error("no API key available")]
    MissingKey,
}

/// Errors that can occur generating embeddings.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Model failed to load
    #[error("embedding model failed to load: {0}")]
    ModelLoad(String),

    /// Inference failed
    #[error("embedding inference failed: {0}")]
    Inference(String),
}

/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for scrape operations.
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for LLM operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Result type alias for embedding operations.
pub type EmbedResult<T> = std::result::Result<T, EmbedError>;
