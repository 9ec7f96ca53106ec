//! AI content analysis: persistence and the background worker.

pub mod analyzer;
pub mod models;

pub use analyzer::{AnalyzerConfig, BackgroundAnalyzer};
pub use models::analysis::ContentAnalysisRow;
