//! Gemini structured-JSON client.
//!
//! One capability: prompt in, schema-conforming JSON out. Transient
//! failures are retried with exponential backoff; schema mismatches get
//! exactly one corrective re-ask before surfacing as `Unstructured`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::traits::Llm;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini client settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Retries for transient failures (429/5xx/transport)
    pub max_retries: u32,
    /// Per-call deadline, independent of any request deadline
    pub call_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.0-flash".to_string(),
            max_retries: 3,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Client for the Gemini `generateContent` API with JSON response mode.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.call_timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(format!("failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn dispatch(&self, prompt: &str, response_schema: &Value) -> LlmResult<Value> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.config.model, self.config.api_key
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "response_schema": response_schema,
                "temperature": 0.2,
            },
        });

        let mut last_err = LlmError::Unavailable("no attempts made".to_string());

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let sent = self.client.post(&url).json(&body).send().await;

            let response = match sent {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout {
                        timeout_secs: self.config.call_timeout.as_secs(),
                    });
                }
                Err(e) => {
                    last_err = LlmError::Unavailable(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30);
                last_err = LlmError::RateLimited { retry_after_secs };
                continue;
            }
            if status.is_server_error() {
                last_err = LlmError::Unavailable(format!("HTTP {}", status));
                continue;
            }
            if !status.is_success() {
                return Err(LlmError::Unavailable(format!("HTTP {}", status)));
            }

            let envelope: Value = response
                .json()
                .await
                .map_err(|e| LlmError::Unavailable(format!("bad response body: {}", e)))?;

            let text = envelope["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .ok_or_else(|| {
                    LlmError::Unstructured("response carried no candidate text".to_string())
                })?;

            return serde_json::from_str(text)
                .map_err(|e| LlmError::Unstructured(format!("candidate is not JSON: {}", e)));
        }

        Err(last_err)
    }
}

#[async_trait]
impl Llm for GeminiClient {
    async fn generate_structured(&self, prompt: &str, response_schema: &Value) -> LlmResult<Value> {
        let value = self.dispatch(prompt, response_schema).await?;

        match validate_against_schema(&value, response_schema) {
            Ok(()) => Ok(value),
            Err(missing) => {
                warn!(missing = %missing, "LLM response failed schema validation, re-asking once");
                let corrective = format!(
                    "{}\n\nYour previous answer was missing required fields ({}). \
                     Respond again with ONLY a JSON object containing every required field.",
                    prompt, missing
                );
                let retry = self.dispatch(&corrective, response_schema).await?;
                validate_against_schema(&retry, response_schema)
                    .map_err(|m| LlmError::Unstructured(format!("missing fields: {}", m)))?;
                debug!("corrective re-ask produced a valid response");
                Ok(retry)
            }
        }
    }
}

/// Check a response against the schema's top-level required fields.
///
/// Returns the comma-joined list of missing fields on failure.
pub fn validate_against_schema(value: &Value, schema: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !value.is_object() {
        return Err("(not an object)".to_string());
    }

    let required = match schema.get("required").and_then(Value::as_array) {
        Some(fields) => fields,
        None => return Ok(()),
    };

    let missing: Vec<&str> = required
        .iter()
        .filter_map(Value::as_str)
        .filter(|field| value.get(field).is_none())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_passes_when_required_fields_present() {
        let schema = json!({
            "type": "object",
            "required": ["a", "b"],
        });
        let value = json!({"a": 1, "b": "x", "c": true});
        assert!(validate_against_schema(&value, &schema).is_ok());
    }

    #[test]
    fn validation_reports_missing_fields() {
        let schema = json!({"type": "object", "required": ["a", "b"]});
        let value = json!({"a": 1});
        assert_eq!(validate_against_schema(&value, &schema).unwrap_err(), "b");
    }

    #[test]
    fn validation_rejects_non_objects() {
        let schema = json!({"type": "object", "required": []});
        assert!(validate_against_schema(&json!([1, 2]), &schema).is_err());
    }

    #[test]
    fn validation_without_required_accepts_anything() {
        let schema = json!({"type": "object"});
        assert!(validate_against_schema(&json!({}), &schema).is_ok());
    }
}
