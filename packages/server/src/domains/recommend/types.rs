//! Shared shapes for the recommendation pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::entity_ids::{ProjectId, UserId};
use crate::common::utils::context_hash;
use crate::domains::content::models::bookmark::ContentWithAnalysis;
use crate::domains::recommend::engines::EngineKind;

/// A recommendation request as the orchestrator consumes it.
#[derive(Debug, Clone)]
pub struct RecommendRequest {
    pub user: UserId,
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
    /// Use this project's cached intent when present
    pub project_id: Option<ProjectId>,
    /// Forced engine choice; `None` lets the orchestrator pick
    pub engine_preference: Option<EngineKind>,
    pub max_recommendations: usize,
    /// Results under this score are dropped
    pub min_score: f32,
    /// Candidates under this quality are skipped
    pub min_quality: i16,
}

impl RecommendRequest {
    pub fn new(user: UserId, title: impl Into<String>) -> Self {
        Self {
            user,
            title: title.into(),
            description: String::new(),
            technologies: vec![],
            project_id: None,
            engine_preference: None,
            max_recommendations: 10,
            min_score: crate::domains::recommend::engines::DEFAULT_MIN_SCORE,
            min_quality: 0,
        }
    }

    /// The free text the intent analyzer and the embedder see.
    pub fn context_text(&self) -> String {
        format!(
            "{} {} {}",
            self.title,
            self.description,
            self.technologies.join(" ")
        )
        .trim()
        .to_string()
    }

    /// Stable fingerprint for the result cache: context plus every knob
    /// that changes the output.
    pub fn cache_hash(&self) -> String {
        context_hash(&format!(
            "{}|{}|{:?}|{}|{}|{}",
            self.context_text(),
            self.project_id.map(|p| p.to_string()).unwrap_or_default(),
            self.engine_preference,
            self.max_recommendations,
            self.min_score,
            self.min_quality,
        ))
    }

    /// Lowercased technology list for matching.
    pub fn normalized_technologies(&self) -> Vec<String> {
        self.technologies
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Per-signal breakdown, each component in [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub technology_overlap: f32,
    pub semantic_similarity: f32,
    pub content_type_match: f32,
    pub difficulty_match: f32,
    pub quality: f32,
    pub intent_alignment: f32,
}

impl ScoreComponents {
    fn named(&self) -> [(&'static str, f32); 6] {
        [
            ("technology_overlap", self.technology_overlap),
            ("semantic_similarity", self.semantic_similarity),
            ("content_type_match", self.content_type_match),
            ("difficulty_match", self.difficulty_match),
            ("quality", self.quality),
            ("intent_alignment", self.intent_alignment),
        ]
    }

    /// Components strongest first.
    pub fn ranked(&self) -> Vec<(&'static str, f32)> {
        let mut named = self.named().to_vec();
        named.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        named
    }

    /// The single strongest signal.
    pub fn dominant(&self) -> (&'static str, f32) {
        self.ranked()[0]
    }
}

/// A candidate with its final score and breakdown.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub content: ContentWithAnalysis,
    /// Final score in [0, 100]
    pub score: f32,
    pub components: ScoreComponents,
    /// How much signal backed the score, [0, 1]
    pub confidence: f32,
    /// Natural-language justification, filled by the explainer
    pub reason: Option<String>,
}

impl ScoredCandidate {
    /// Candidate technologies: analysis tags when present, otherwise
    /// the bookmark's own tags.
    pub fn technologies(&self) -> Vec<String> {
        self.content
            .technology_tags
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.content.content.tags.clone())
    }
}

/// One item of the response shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationItem {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub score: f32,
    pub reason: String,
    pub content_type: Option<String>,
    pub difficulty: Option<String>,
    pub technologies: Vec<String>,
    pub key_concepts: Vec<String>,
    pub quality_score: i16,
    pub confidence: f32,
}

/// What the pipeline skipped or degraded, plus timings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub degraded: bool,
    /// Stable labels: "intent_llm", "llm_explanation", "semantic", "cache"
    pub skipped: Vec<String>,
    pub total_ms: u64,
    pub candidate_count: usize,
    pub cache_hit: bool,
}

impl PerformanceMetrics {
    pub fn mark_skipped(&mut self, label: &str) {
        if !self.skipped.iter().any(|s| s == label) {
            self.skipped.push(label.to_string());
            self.degraded = true;
        }
    }
}

/// Full response of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub items: Vec<RecommendationItem>,
    pub engine_used: String,
    pub total_count: usize,
    pub performance_metrics: PerformanceMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hash_is_stable_and_knob_sensitive() {
        let user = Uuid::new_v4();
        let mut a = RecommendRequest::new(user, "Build an API");
        a.technologies = vec!["python".into()];
        let mut b = a.clone();

        assert_eq!(a.cache_hash(), b.cache_hash());

        b.max_recommendations = 5;
        assert_ne!(a.cache_hash(), b.cache_hash());
    }

    #[test]
    fn dominant_component_wins() {
        let components = ScoreComponents {
            technology_overlap: 0.2,
            semantic_similarity: 0.9,
            ..Default::default()
        };
        assert_eq!(components.dominant().0, "semantic_similarity");
    }

    #[test]
    fn mark_skipped_dedupes_and_sets_degraded() {
        let mut metrics = PerformanceMetrics::default();
        assert!(!metrics.degraded);
        metrics.mark_skipped("intent_llm");
        metrics.mark_skipped("intent_llm");
        assert!(metrics.degraded);
        assert_eq!(metrics.skipped, vec!["intent_llm"]);
    }

    #[test]
    fn normalized_technologies_lowercase_and_trim() {
        let mut request = RecommendRequest::new(Uuid::new_v4(), "t");
        request.technologies = vec![" Python ".into(), "".into(), "FLASK".into()];
        assert_eq!(request.normalized_technologies(), vec!["python", "flask"]);
    }
}
