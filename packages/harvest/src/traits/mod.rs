//! Service traits — the seams where the server injects real or mock impls.

pub mod embedder;
pub mod fetcher;
pub mod llm;

pub use embedder::TextEmbedder;
pub use fetcher::PageFetcher;
pub use llm::Llm;
