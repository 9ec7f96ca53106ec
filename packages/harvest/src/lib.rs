//! Content acquisition and AI plumbing for the recommendation service.
//!
//! This crate owns everything between a raw URL and a scored candidate's
//! raw material:
//!
//! - [`scrape`]: fetch a page, extract the readable body, score its quality
//! - [`embed`]: turn text into L2-normalized 384-dim vectors (local ONNX)
//! - [`llm`]: structured-JSON calls to Gemini with retries and validation
//! - [`types`]: the shared shapes (scraped pages, content analysis, intent)
//!
//! Service seams are async traits ([`traits`]) so the server can inject
//! mocks ([`testing`]) everywhere a network or model call would happen.

pub mod embed;
pub mod error;
pub mod llm;
pub mod scrape;
pub mod testing;
pub mod traits;
pub mod types;

pub use error::{EmbedError, HarvestError, LlmError, Result, ScrapeError};
pub use traits::{Llm, PageFetcher, TextEmbedder};
pub use types::{
    analysis::{AnalysisRequest, ContentAnalysis, ContentType, Difficulty},
    intent::{ComplexityPreference, Intent, LearningStage, PrimaryGoal, TimeConstraint, UrgencyLevel},
    page::{FetchedDocument, ScrapedPage},
};
