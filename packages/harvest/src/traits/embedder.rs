//! Embedding trait.

use async_trait::async_trait;

use crate::error::EmbedResult;

/// Dense-vector embedding capability.
///
/// Vectors are L2-normalized, fixed-dimension
/// ([`crate::embed::DIMENSION`] = 384). The model loads once per process
/// behind a lazy initializer; calls after the first reuse it.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;

    /// Embed a batch of texts. More efficient than repeated `embed` on
    /// the hot path; callers must not assume a specific batch size.
    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
