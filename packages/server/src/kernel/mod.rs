//! Infrastructure: cache, API keys, LLM dispatch, streaming, DI container.

pub mod api_keys;
pub mod cache;
pub mod deps;
pub mod llm_service;
pub mod pg_stores;
pub mod progress;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use api_keys::{ApiKeyRegistry, RateLimitConfig, RateLimiter, Reservation, UsageSnapshot};
pub use cache::{cache_get_json, cache_set_json, CacheStore, InMemoryCacheStore, RedisCacheStore};
pub use deps::ServerDeps;
pub use llm_service::{BaseLlmGate, LlmService, PermissiveGate};
pub use progress::{
    ProgressEvent, ProgressStatus, ProgressStreams, ProgressSubscription, ProgressTracker,
};
pub use stream_hub::StreamHub;
pub use traits::{
    BaseAnalysisStore, BaseFeedbackStore, BaseProjectStore, BaseRecommendationStore,
    ProjectContext,
};
