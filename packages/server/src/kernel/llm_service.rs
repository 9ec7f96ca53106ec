//! Server-side LLM dispatch.
//!
//! Wraps the harvest Gemini client with the concerns the library can't
//! own: reserve-before-dispatch against the per-user budget, per-user
//! key override with a small cached client per key, and the process-wide
//! default credential. No network call happens once a reservation is
//! denied.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use harvest::llm::{GeminiClient, GeminiConfig};
use harvest::Llm;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use crate::common::entity_ids::UserId;
use crate::common::errors::{AppError, AppResult};
use crate::kernel::api_keys::{ApiKeyRegistry, Reservation};

/// Per-user client cache bound; evicted wholesale when exceeded.
const CLIENT_CACHE_MAX: usize = 100;

/// Gate the LLM service consults before every dispatch.
///
/// Implemented by [`ApiKeyRegistry`]; tests substitute a permissive gate.
#[async_trait]
pub trait BaseLlmGate: Send + Sync {
    /// Reserve one call slot for the user.
    async fn reserve(&self, user: UserId) -> AppResult<Reservation>;

    /// The user's own API key, if stored.
    async fn user_key(&self, user: UserId) -> AppResult<Option<String>>;
}

#[async_trait]
impl BaseLlmGate for ApiKeyRegistry {
    async fn reserve(&self, user: UserId) -> AppResult<Reservation> {
        self.check_and_reserve(user).await
    }

    async fn user_key(&self, user: UserId) -> AppResult<Option<String>> {
        self.get_key(user).await
    }
}

/// A gate that always admits and never has user keys (tests).
pub struct PermissiveGate;

#[async_trait]
impl BaseLlmGate for PermissiveGate {
    async fn reserve(&self, _user: UserId) -> AppResult<Reservation> {
        Ok(Reservation::Ok)
    }

    async fn user_key(&self, _user: UserId) -> AppResult<Option<String>> {
        Ok(None)
    }
}

enum ClientSource {
    /// Build real Gemini clients; per-user keys get their own cached one
    Real { default: Option<Arc<GeminiClient>> },
    /// One injected client for everyone (tests)
    Injected(Arc<dyn Llm>),
}

/// Rate-gated, key-aware LLM dispatch for every structured call in the
/// pipeline (intent, content analysis, explanations).
pub struct LlmService {
    gate: Arc<dyn BaseLlmGate>,
    source: ClientSource,
    /// user -> (key fingerprint, client); entry replaced on key change
    per_user: RwLock<HashMap<UserId, (String, Arc<GeminiClient>)>>,
}

impl LlmService {
    /// Production construction. `default_key` is the process credential
    /// (`GEMINI_API_KEY`); without it, users without their own key get
    /// `LlmUnavailable` and callers fall back.
    pub fn new(gate: Arc<dyn BaseLlmGate>, default_key: Option<String>) -> AppResult<Self> {
        let default = match default_key {
            Some(key) => Some(Arc::new(
                GeminiClient::new(GeminiConfig::new(key)).map_err(AppError::from)?,
            )),
            None => None,
        };
        Ok(Self {
            gate,
            source: ClientSource::Real { default },
            per_user: RwLock::new(HashMap::new()),
        })
    }

    /// Test construction with an injected client.
    pub fn with_client(gate: Arc<dyn BaseLlmGate>, client: Arc<dyn Llm>) -> Self {
        Self {
            gate,
            source: ClientSource::Injected(client),
            per_user: RwLock::new(HashMap::new()),
        }
    }

    /// Dispatch one structured call on behalf of a user.
    pub async fn call(
        &self,
        user: UserId,
        prompt: &str,
        response_schema: &Value,
    ) -> AppResult<Value> {
        match self.gate.reserve(user).await? {
            Reservation::Ok => {}
            Reservation::Wait { wait, reason } => {
                debug!(user = %user, reason = reason, "LLM call denied by rate gate");
                return Err(AppError::RateLimited {
                    retry_after_secs: wait.as_secs().max(1),
                });
            }
        }

        let client = self.client_for(user).await?;
        client
            .generate_structured(prompt, response_schema)
            .await
            .map_err(AppError::from)
    }

    async fn client_for(&self, user: UserId) -> AppResult<Arc<dyn Llm>> {
        match &self.source {
            ClientSource::Injected(client) => Ok(client.clone()),
            ClientSource::Real { default } => {
                if let Some(key) = self.gate.user_key(user).await? {
                    return Ok(self.user_client(user, &key).await?);
                }
                default
                    .clone()
                    .map(|c| c as Arc<dyn Llm>)
                    .ok_or_else(|| AppError::LlmUnavailable("no credential configured".into()))
            }
        }
    }

    /// Cached per-user client, rebuilt when the stored key changes.
    async fn user_client(&self, user: UserId, key: &str) -> AppResult<Arc<dyn Llm>> {
        let fingerprint = hex::encode(Sha256::digest(key.as_bytes()));

        {
            let cache = self.per_user.read().await;
            if let Some((cached_fp, client)) = cache.get(&user) {
                if *cached_fp == fingerprint {
                    return Ok(client.clone() as Arc<dyn Llm>);
                }
            }
        }

        let client = Arc::new(
            GeminiClient::new(GeminiConfig::new(key.to_string())).map_err(AppError::from)?,
        );

        let mut cache = self.per_user.write().await;
        if cache.len() >= CLIENT_CACHE_MAX {
            cache.clear();
        }
        cache.insert(user, (fingerprint, client.clone()));
        Ok(client as Arc<dyn Llm>)
    }
}
