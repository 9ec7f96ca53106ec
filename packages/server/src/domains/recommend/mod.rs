//! Recommendations: scoring engines, personalization, skill-gap boosts,
//! explanations, and the orchestrator that composes them.

pub mod engines;
pub mod explain;
pub mod orchestrator;
pub mod skill_gap;
pub mod types;

pub use engines::{EngineKind, EngineRegistry, Scorer, ScoringContext};
pub use explain::Explainer;
pub use orchestrator::Orchestrator;
pub use skill_gap::{SkillGapAnalyzer, SkillGapReport};
pub use types::{
    PerformanceMetrics, RecommendRequest, RecommendationItem, RecommendationResult,
    ScoreComponents, ScoredCandidate,
};
