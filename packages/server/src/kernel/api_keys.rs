//! Per-user API key storage and LLM rate accounting.
//!
//! Keys are encrypted at rest with AES-256-GCM under a key derived from
//! the process `SECRET_KEY`; only the ciphertext, its nonce, and a stable
//! SHA-256 hash (for equality checks) are persisted. Plaintext leaves
//! this module solely for dispatch.
//!
//! Rate accounting uses fixed windows — minute/day/month counters that
//! reset at their window boundaries, not sliding windows. Reservations
//! are linearizable per user: each user's counters sit behind their own
//! mutex, so two concurrent reservations can never both take the last
//! slot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::common::entity_ids::UserId;
use crate::common::errors::{AppError, AppResult};
use crate::kernel::cache::{self, CacheStore};

// ============================================================================
// Rate limiting
// ============================================================================

/// Per-user request budget, fixed windows.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_day: u32,
    pub per_month: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 15,
            per_day: 1_500,
            per_month: 45_000,
        }
    }
}

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Counter state for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UsageWindows {
    requests_this_minute: u32,
    requests_today: u32,
    requests_this_month: u32,
    minute_started_at: DateTime<Utc>,
    day_started_at: DateTime<Utc>,
    month_started_at: DateTime<Utc>,
}

impl UsageWindows {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            requests_this_minute: 0,
            requests_today: 0,
            requests_this_month: 0,
            minute_started_at: now,
            day_started_at: now,
            month_started_at: now,
        }
    }

    /// Zero any window whose boundary has passed.
    fn roll(&mut self, now: DateTime<Utc>) {
        if now - self.minute_started_at >= chrono::Duration::seconds(60) {
            self.requests_this_minute = 0;
            self.minute_started_at = now;
        }
        if now - self.day_started_at >= chrono::Duration::hours(24) {
            self.requests_today = 0;
            self.day_started_at = now;
        }
        if now - self.month_started_at >= chrono::Duration::days(30) {
            self.requests_this_month = 0;
            self.month_started_at = now;
        }
    }
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reservation {
    /// Slot taken; counters already incremented
    Ok,
    /// Budget exhausted; try again after `wait`
    Wait { wait: Duration, reason: &'static str },
}

/// Read-only view of a user's current usage.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub requests_this_minute: u32,
    pub requests_today: u32,
    pub requests_this_month: u32,
    pub per_minute_limit: u32,
    pub per_day_limit: u32,
    pub per_month_limit: u32,
}

/// Fixed-window rate limiter, linearizable per user.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: RwLock<HashMap<UserId, Arc<Mutex<UsageWindows>>>>,
    /// Counters are mirrored here for observability; never read back
    cache: Option<Arc<dyn CacheStore>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn user_entry(&self, user: UserId) -> Arc<Mutex<UsageWindows>> {
        {
            let windows = self.windows.read().await;
            if let Some(entry) = windows.get(&user) {
                return entry.clone();
            }
        }
        let mut windows = self.windows.write().await;
        windows
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(UsageWindows::new(Utc::now()))))
            .clone()
    }

    /// Atomically check every window and, if all have room, take a slot.
    pub async fn check_and_reserve(&self, user: UserId) -> AppResult<Reservation> {
        let entry = self.user_entry(user).await;
        let mut state = entry.lock().await;
        let now = Utc::now();
        state.roll(now);

        let reservation = if state.requests_this_minute >= self.config.per_minute {
            let elapsed = (now - state.minute_started_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            Reservation::Wait {
                wait: MINUTE.saturating_sub(elapsed),
                reason: "per-minute budget exhausted",
            }
        } else if state.requests_today >= self.config.per_day {
            let elapsed = (now - state.day_started_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            Reservation::Wait {
                wait: DAY.saturating_sub(elapsed),
                reason: "daily budget exhausted",
            }
        } else if state.requests_this_month >= self.config.per_month {
            let elapsed = (now - state.month_started_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            Reservation::Wait {
                wait: MONTH.saturating_sub(elapsed),
                reason: "monthly budget exhausted",
            }
        } else {
            state.requests_this_minute += 1;
            state.requests_today += 1;
            state.requests_this_month += 1;
            Reservation::Ok
        };

        let mirror = state.clone();
        drop(state);

        if let Some(cache) = &self.cache {
            cache::cache_set_json(cache.as_ref(), &cache::keys::ratelimit(user), &mirror, None)
                .await;
        }

        Ok(reservation)
    }

    /// Current usage without reserving anything.
    pub async fn usage(&self, user: UserId) -> UsageSnapshot {
        let entry = self.user_entry(user).await;
        let mut state = entry.lock().await;
        state.roll(Utc::now());
        UsageSnapshot {
            requests_this_minute: state.requests_this_minute,
            requests_today: state.requests_today,
            requests_this_month: state.requests_this_month,
            per_minute_limit: self.config.per_minute,
            per_day_limit: self.config.per_day,
            per_month_limit: self.config.per_month,
        }
    }
}

// ============================================================================
// Key encryption
// ============================================================================

/// AES-256-GCM over a key derived from the process secret.
struct KeyCipher {
    cipher: Aes256Gcm,
}

impl KeyCipher {
    fn new(secret: &str) -> Self {
        let derived = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&derived);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt; returns (nonce_hex, ciphertext_hex).
    fn encrypt(&self, plaintext: &str) -> AppResult<(String, String)> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| AppError::Internal("key encryption failed".to_string()))?;

        Ok((hex::encode(nonce_bytes), hex::encode(ciphertext)))
    }

    fn decrypt(&self, nonce_hex: &str, ciphertext_hex: &str) -> AppResult<String> {
        let nonce_bytes = hex::decode(nonce_hex)
            .map_err(|_| AppError::Internal("stored nonce is not hex".to_string()))?;
        if nonce_bytes.len() != 12 {
            return Err(AppError::Internal("stored nonce has wrong length".to_string()));
        }
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|_| AppError::Internal("stored ciphertext is not hex".to_string()))?;

        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| AppError::Internal("key decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::Internal("decrypted key is not utf-8".to_string()))
    }
}

/// Stable non-reversible fingerprint of a key, for equality checks.
fn key_hash(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// Shape check for incoming keys. Google AI keys are 39 chars starting
/// with `AIza`; accept that or any credential-looking token of length
/// 30+ without whitespace.
fn validate_key_shape(key: &str) -> AppResult<()> {
    let key = key.trim();
    if key.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidInput("API key must not contain whitespace".into()));
    }
    if key.starts_with("AIza") && key.len() >= 35 {
        return Ok(());
    }
    if key.len() >= 30 {
        return Ok(());
    }
    Err(AppError::InvalidInput("API key does not look like a valid credential".into()))
}

// ============================================================================
// Registry
// ============================================================================

/// Per-user encrypted key storage plus rate accounting.
pub struct ApiKeyRegistry {
    pool: PgPool,
    cipher: KeyCipher,
    limiter: RateLimiter,
}

#[derive(sqlx::FromRow)]
struct KeyRow {
    key_nonce: String,
    key_ciphertext: String,
}

impl ApiKeyRegistry {
    pub fn new(pool: PgPool, secret_key: &str, limiter: RateLimiter) -> Self {
        Self {
            pool,
            cipher: KeyCipher::new(secret_key),
            limiter,
        }
    }

    /// Store (or replace) a user's key.
    pub async fn set_key(&self, user: UserId, plaintext: &str, name: &str) -> AppResult<()> {
        let plaintext = plaintext.trim();
        validate_key_shape(plaintext)?;

        let (nonce, ciphertext) = self.cipher.encrypt(plaintext)?;
        let hash = key_hash(plaintext);

        sqlx::query(
            "INSERT INTO user_api_keys (user_id, key_name, key_nonce, key_ciphertext, key_hash)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id) DO UPDATE
             SET key_name = $2, key_nonce = $3, key_ciphertext = $4, key_hash = $5,
                 updated_at = now()",
        )
        .bind(user)
        .bind(name)
        .bind(&nonce)
        .bind(&ciphertext)
        .bind(&hash)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        info!(user = %user, "user API key stored");
        Ok(())
    }

    /// Remove a user's key.
    pub async fn clear_key(&self, user: UserId) -> AppResult<()> {
        sqlx::query("DELETE FROM user_api_keys WHERE user_id = $1")
            .bind(user)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        debug!(user = %user, "user API key cleared");
        Ok(())
    }

    pub async fn has_key(&self, user: UserId) -> AppResult<bool> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM user_api_keys WHERE user_id = $1")
                .bind(user)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(row.is_some())
    }

    /// Decrypt a user's key for dispatch. Never returned to clients.
    pub async fn get_key(&self, user: UserId) -> AppResult<Option<String>> {
        let row: Option<KeyRow> = sqlx::query_as(
            "SELECT key_nonce, key_ciphertext FROM user_api_keys WHERE user_id = $1",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(Some(self.cipher.decrypt(&row.key_nonce, &row.key_ciphertext)?)),
            None => Ok(None),
        }
    }

    /// Reserve one LLM call slot for the user.
    pub async fn check_and_reserve(&self, user: UserId) -> AppResult<Reservation> {
        self.limiter.check_and_reserve(user).await
    }

    pub async fn usage(&self, user: UserId) -> UsageSnapshot {
        self.limiter.usage(user).await
    }
}
