//! Application error taxonomy.
//!
//! Every component returns a typed kind; the orchestrator is the single
//! place that turns kinds into user-facing messages. Recoverable kinds
//! (LLM, cache, embedder) are absorbed by fallbacks and surface only in
//! response metrics; `StoreUnavailable` and `InvalidInput` reach callers.

use thiserror::Error;

/// Typed error kinds for the whole service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation failure at the boundary; never retried
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Entity absent (distinct from an empty list)
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness or optimistic-lock violation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Auth/ownership failure
    #[error("unauthorized")]
    Unauthorized,

    /// Per-user LLM budget exhausted
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// LLM returned output that failed schema validation twice
    #[error("LLM returned unstructured output")]
    LlmUnstructured,

    /// LLM per-call deadline exceeded
    #[error("LLM call timed out")]
    LlmTimeout,

    /// LLM transport failure after retries
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    /// Scrape produced content below the acceptance floor
    #[error("scrape failed for {url} (quality {quality})")]
    ScrapeFailed { url: String, quality: u8 },

    /// Store failed after bounded retries — the only fatal infra error
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Cache failure; always swallowed to a miss by consumers
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Generic deadline exceeded
    #[error("operation timed out")]
    Timeout,

    /// Unexpected failure; logged with context, safe message out
    #[error("internal error")]
    Internal(String),
}

impl AppError {
    /// Stable kind label, used in logs and degradation metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized => "unauthorized",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::LlmUnstructured => "llm_unstructured",
            AppError::LlmTimeout => "llm_timeout",
            AppError::LlmUnavailable(_) => "llm_unavailable",
            AppError::ScrapeFailed { .. } => "scrape_failed",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::CacheUnavailable(_) => "cache_unavailable",
            AppError::Timeout => "timeout",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether the pipeline has a deterministic fallback for this kind.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. }
                | AppError::LlmUnstructured
                | AppError::LlmTimeout
                | AppError::LlmUnavailable(_)
                | AppError::CacheUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(db.to_string())
            }
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<harvest::LlmError> for AppError {
    fn from(e: harvest::LlmError) -> Self {
        use harvest::LlmError;
        match e {
            LlmError::RateLimited { retry_after_secs } => {
                AppError::RateLimited { retry_after_secs }
            }
            LlmError::Unstructured(_) => AppError::LlmUnstructured,
            LlmError::Timeout { .. } => AppError::LlmTimeout,
            LlmError::Unavailable(m) => AppError::LlmUnavailable(m),
            LlmError::MissingKey => AppError::LlmUnavailable("no API key".to_string()),
        }
    }
}

impl From<harvest::EmbedError> for AppError {
    fn from(e: harvest::EmbedError) -> Self {
        AppError::Internal(e.to_string())
    }
}

/// Result type alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds_are_the_fallback_ones() {
        assert!(AppError::LlmUnstructured.is_recoverable());
        assert!(AppError::RateLimited { retry_after_secs: 5 }.is_recoverable());
        assert!(AppError::CacheUnavailable("down".into()).is_recoverable());
        assert!(!AppError::StoreUnavailable("down".into()).is_recoverable());
        assert!(!AppError::InvalidInput("bad".into()).is_recoverable());
    }

    #[test]
    fn llm_errors_map_to_matching_kinds() {
        let err: AppError = harvest::LlmError::RateLimited { retry_after_secs: 9 }.into();
        assert_eq!(err.kind(), "rate_limited");

        let err: AppError = harvest::LlmError::Unstructured("x".into()).into();
        assert_eq!(err.kind(), "llm_unstructured");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), "not_found");
    }
}
