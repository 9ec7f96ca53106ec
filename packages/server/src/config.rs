use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables.
///
/// Variable names are preserved from the existing deployment. Scoring
/// weights and the embedding recipe are code-level constants — changing
/// them invalidates persisted embeddings and analyses.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    /// Process secret; API-key encryption derives from it
    pub secret_key: String,
    /// Reserved for the session layer (out of scope here, name kept)
    pub jwt_secret_key: Option<String>,
    /// Process-wide default LLM credential
    pub gemini_api_key: Option<String>,
    pub cors_origins: Vec<String>,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            secret_key: env::var("SECRET_KEY").context("SECRET_KEY must be set")?,
            jwt_secret_key: env::var("JWT_SECRET_KEY").ok(),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
        })
    }
}
