//! fastembed-backed embedder (AllMiniLML6V2, 384 dims, local ONNX).

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use super::{l2_normalize, DIMENSION};
use crate::error::{EmbedError, EmbedResult};
use crate::traits::TextEmbedder;

/// Inference batch size. Callers must not depend on it.
const BATCH_SIZE: usize = 64;

/// Model input cap in characters; MiniLM truncates at 256 tokens anyway.
const MAX_INPUT_CHARS: usize = 8_192;

/// One-shot model holder, shared with the blocking-pool closures.
///
/// The fastembed session requires exclusive access, so inference
/// serializes on the inner lock.
struct ModelCell {
    model: OnceLock<Result<Mutex<TextEmbedding>, String>>,
}

impl ModelCell {
    fn new() -> Self {
        Self {
            model: OnceLock::new(),
        }
    }

    fn guard(&self) -> EmbedResult<MutexGuard<'_, TextEmbedding>> {
        let result = self.model.get_or_init(|| {
            info!(model = "all-MiniLM-L6-v2", dimension = DIMENSION, "loading embedding model");
            let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(false);
            TextEmbedding::try_new(options)
                .map(Mutex::new)
                .map_err(|e| format!("failed to initialize all-MiniLM-L6-v2: {}", e))
        });

        match result {
            Ok(model) => model
                .lock()
                .map_err(|e| EmbedError::ModelLoad(format!("model lock poisoned: {}", e))),
            Err(e) => Err(EmbedError::ModelLoad(e.clone())),
        }
    }

    /// Synchronous inference; runs on the blocking pool.
    fn run_batch(&self, texts: Vec<String>) -> EmbedResult<Vec<Vec<f32>>> {
        let mut model = self.guard()?;
        let mut out = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let inputs: Vec<String> = chunk
                .iter()
                .map(|t| t.chars().take(MAX_INPUT_CHARS).collect())
                .collect();

            let embeddings = model
                .embed(inputs, None)
                .map_err(|e| EmbedError::Inference(e.to_string()))?;

            for embedding in embeddings {
                if embedding.len() != DIMENSION {
                    return Err(EmbedError::Inference(format!(
                        "model produced {} dims, expected {}",
                        embedding.len(),
                        DIMENSION
                    )));
                }
                out.push(l2_normalize(embedding));
            }
        }

        Ok(out)
    }
}

/// Local embedding service over AllMiniLML6V2.
///
/// Construction is cheap; the ONNX model loads on first use behind a
/// one-shot initializer and is shared for the process lifetime.
/// Inference is CPU-bound and runs under `spawn_blocking` so it never
/// ties up an async worker thread.
pub struct FastembedEmbedder {
    cell: Arc<ModelCell>,
}

impl FastembedEmbedder {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(ModelCell::new()),
        }
    }

    async fn offload(&self, texts: Vec<String>) -> EmbedResult<Vec<Vec<f32>>> {
        let cell = self.cell.clone();
        tokio::task::spawn_blocking(move || cell.run_batch(texts))
            .await
            .map_err(|e| EmbedError::Inference(format!("embedding task failed: {}", e)))?
    }
}

impl Default for FastembedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEmbedder for FastembedEmbedder {
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let mut vectors = self.offload(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Inference("model produced no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.offload(texts.to_vec()).await
    }
}
