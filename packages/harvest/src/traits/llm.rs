//! LLM trait for structured-JSON generation.

use async_trait::async_trait;

use crate::error::LlmResult;

/// A structured-output LLM capability.
///
/// Implementations wrap a specific provider and handle prompting,
/// retries, and schema validation. The contract is deliberately narrow:
/// one prompt in, one schema-conforming JSON value out. Callers own the
/// prompts and deserialize the value into their own types.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Run a prompt and return JSON conforming to `response_schema`.
    ///
    /// `response_schema` is an OpenAPI-style schema object the provider
    /// is asked to honor. Implementations validate the response against
    /// the schema's required fields, retry once on mismatch, and return
    /// [`crate::error::LlmError::Unstructured`] on the second failure.
    async fn generate_structured(
        &self,
        prompt: &str,
        response_schema: &serde_json::Value,
    ) -> LlmResult<serde_json::Value>;
}
