//! Testing utilities — mock implementations of the service traits.
//!
//! Useful for exercising the recommendation pipeline without network,
//! model files, or an LLM credential. All mocks are deterministic,
//! configurable through builder methods, and track their calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::embed::{l2_normalize, DIMENSION};
use crate::error::{EmbedError, EmbedResult, LlmError, LlmResult, ScrapeError, ScrapeResult};
use crate::traits::{Llm, PageFetcher, TextEmbedder};
use crate::types::page::FetchedDocument;

// ============================================================================
// MockFetcher
// ============================================================================

/// A fetch strategy backed by a fixed URL → HTML map.
///
/// Unknown URLs answer HTTP 404.
pub struct MockFetcher {
    name: &'static str,
    pages: RwLock<HashMap<String, String>>,
    fetches: AtomicUsize,
}

impl MockFetcher {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pages: RwLock::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Register a page the fetcher will serve.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), html.into());
        self
    }

    /// How many fetches have been attempted.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedDocument> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.read().unwrap();
        match pages.get(url) {
            Some(html) => Ok(FetchedDocument {
                url: url.to_string(),
                html: html.clone(),
                status: 200,
            }),
            None => Err(ScrapeError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

// ============================================================================
// MockLlm
// ============================================================================

/// Failure modes the mock LLM can be pinned to.
#[derive(Debug, Clone, Copy)]
pub enum MockLlmFailure {
    RateLimited { retry_after_secs: u64 },
    Unavailable,
    Unstructured,
    Timeout,
}

impl MockLlmFailure {
    fn to_error(self) -> LlmError {
        match self {
            MockLlmFailure::RateLimited { retry_after_secs } => {
                LlmError::RateLimited { retry_after_secs }
            }
            MockLlmFailure::Unavailable => LlmError::Unavailable("mock unavailable".to_string()),
            MockLlmFailure::Unstructured => {
                LlmError::Unstructured("mock unstructured".to_string())
            }
            MockLlmFailure::Timeout => LlmError::Timeout { timeout_secs: 30 },
        }
    }
}

/// A structured-output LLM with canned responses.
///
/// Responses can be keyed by a substring of the prompt, queued in order,
/// or left to a default; a pinned failure mode overrides everything.
#[derive(Default)]
pub struct MockLlm {
    by_prompt_fragment: RwLock<Vec<(String, Value)>>,
    queued: RwLock<Vec<Value>>,
    default_response: RwLock<Option<Value>>,
    failure: RwLock<Option<MockLlmFailure>>,
    calls: AtomicUsize,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `response` whenever the prompt contains `fragment`.
    pub fn with_response_for(self, fragment: impl Into<String>, response: Value) -> Self {
        self.by_prompt_fragment
            .write()
            .unwrap()
            .push((fragment.into(), response));
        self
    }

    /// Queue a response consumed by the next unmatched call.
    pub fn with_queued(self, response: Value) -> Self {
        self.queued.write().unwrap().push(response);
        self
    }

    /// Fallback response for calls nothing else matches.
    pub fn with_default(self, response: Value) -> Self {
        *self.default_response.write().unwrap() = Some(response);
        self
    }

    /// Pin every call to a failure.
    pub fn with_failure(self, failure: MockLlmFailure) -> Self {
        *self.failure.write().unwrap() = Some(failure);
        self
    }

    /// Change the failure mode after construction.
    pub fn set_failure(&self, failure: Option<MockLlmFailure>) {
        *self.failure.write().unwrap() = failure;
    }

    /// How many calls were made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn generate_structured(
        &self,
        prompt: &str,
        _response_schema: &Value,
    ) -> LlmResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = *self.failure.read().unwrap() {
            return Err(failure.to_error());
        }

        for (fragment, response) in self.by_prompt_fragment.read().unwrap().iter() {
            if prompt.contains(fragment.as_str()) {
                return Ok(response.clone());
            }
        }

        if let Some(response) = {
            let mut queued = self.queued.write().unwrap();
            if queued.is_empty() {
                None
            } else {
                Some(queued.remove(0))
            }
        } {
            return Ok(response);
        }

        self.default_response
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| LlmError::Unstructured("mock has no response configured".to_string()))
    }
}

// ============================================================================
// MockEmbedder
// ============================================================================

/// A deterministic embedder.
///
/// Unknown texts get a hash-derived unit vector, so identical texts embed
/// identically and distinct texts differ. Tests needing controlled
/// geometry register explicit vectors.
#[derive(Default)]
pub struct MockEmbedder {
    fixed: RwLock<HashMap<String, Vec<f32>>>,
    fail: RwLock<bool>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exact vector for a text. Normalized on insertion.
    pub fn with_embedding(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        let mut padded = vector;
        padded.resize(DIMENSION, 0.0);
        self.fixed
            .write()
            .unwrap()
            .insert(text.into(), l2_normalize(padded));
        self
    }

    /// Make every call fail (simulates embedder outage).
    pub fn with_failures(self) -> Self {
        *self.fail.write().unwrap() = true;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.write().unwrap() = failing;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn derive(text: &str) -> Vec<f32> {
        // Stable, spread-out pseudo-vector from the text bytes
        let mut v = vec![0.0f32; DIMENSION];
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            state ^= byte as u64;
            state = state.wrapping_mul(0x100_0000_01b3);
        }
        for (i, slot) in v.iter_mut().enumerate() {
            let mut s = state.wrapping_add(i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
            s ^= s >> 33;
            *slot = ((s % 2_000) as f32 / 1_000.0) - 1.0;
        }
        l2_normalize(v)
    }
}

#[async_trait]
impl TextEmbedder for MockEmbedder {
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail.read().unwrap() {
            return Err(EmbedError::Inference("mock embedder down".to_string()));
        }

        if let Some(vector) = self.fixed.read().unwrap().get(text) {
            return Ok(vector.clone());
        }

        Ok(Self::derive(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_fetcher_serves_registered_pages() {
        let fetcher = MockFetcher::new("http").with_page("https://a", "<html></html>");
        assert!(fetcher.fetch("https://a").await.is_ok());
        assert!(fetcher.fetch("https://b").await.is_err());
        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[tokio::test]
    async fn mock_llm_matches_prompt_fragments() {
        let llm = MockLlm::new()
            .with_response_for("intent", json!({"primary_goal": "learn"}))
            .with_default(json!({"ok": true}));

        let schema = json!({});
        let hit = llm.generate_structured("analyze intent now", &schema).await.unwrap();
        assert_eq!(hit["primary_goal"], "learn");

        let fallback = llm.generate_structured("something else", &schema).await.unwrap();
        assert_eq!(fallback["ok"], true);
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_llm_failure_overrides_responses() {
        let llm = MockLlm::new()
            .with_default(json!({}))
            .with_failure(MockLlmFailure::RateLimited { retry_after_secs: 7 });

        let err = llm.generate_structured("p", &json!({})).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn mock_embedder_is_deterministic_and_normalized() {
        let embedder = MockEmbedder::new();
        let a1 = embedder.embed("hello").await.unwrap();
        let a2 = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("different").await.unwrap();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.len(), DIMENSION);
        let norm: f32 = a1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
