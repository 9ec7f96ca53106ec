//! Scoring engines.
//!
//! Both engines implement the same contract — candidates in, scored
//! candidates out — over the same component math; they differ in how
//! intent conditions the weights. Engines are pure: candidates and the
//! pre-computed request embedding are inputs, nothing here touches the
//! network. A missing embedding or analysis degrades the corresponding
//! component to neutral instead of failing.

mod context_aware;
mod fast_semantic;

use harvest::{Intent, PrimaryGoal};
use serde::{Deserialize, Serialize};

use crate::common::entity_ids::UserId;
use crate::domains::content::models::bookmark::ContentWithAnalysis;
use crate::domains::recommend::types::{ScoreComponents, ScoredCandidate};

pub use context_aware::ContextAwareEngine;
pub use fast_semantic::FastSemanticEngine;

/// Default request floor: the orchestrator drops results under this
/// score after re-ranking.
pub const DEFAULT_MIN_SCORE: f32 = 25.0;

/// Which engine scored a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    FastSemantic,
    ContextAware,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::FastSemantic => "fast_semantic",
            EngineKind::ContextAware => "context_aware",
        }
    }
}

/// Everything an engine needs about the request, resolved upstream.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub user: UserId,
    /// Lowercased technologies from the request
    pub technologies: Vec<String>,
    pub intent: Option<Intent>,
    /// Request text embedded once by the orchestrator; `None` when the
    /// embedder is down (semantic component degrades to zero)
    pub query_embedding: Option<Vec<f32>>,
    /// Candidates under this quality are skipped outright
    pub min_quality: i16,
}

/// The scoring contract both engines implement.
pub trait Scorer: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Score candidates; output is sorted descending over the whole
    /// pool. The min-score filter and result cap are applied by the
    /// orchestrator only after personalization and skill-gap boosts
    /// have re-ranked the list — an engine must never shrink the pool
    /// those boosts draw from.
    fn score(&self, ctx: &ScoringContext, candidates: &[ContentWithAnalysis])
        -> Vec<ScoredCandidate>;
}

/// Fixed registry of the two engines.
///
/// Selection: the fast path runs when it is asked for or when the
/// candidate set is small (≤ 50); everything else goes context-aware.
/// Small sets always take the fast path, preference or not.
pub struct EngineRegistry {
    fast: FastSemanticEngine,
    context: ContextAwareEngine,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            fast: FastSemanticEngine,
            context: ContextAwareEngine,
        }
    }

    pub fn get(&self, kind: EngineKind) -> &dyn Scorer {
        match kind {
            EngineKind::FastSemantic => &self.fast,
            EngineKind::ContextAware => &self.context,
        }
    }

    pub fn select(&self, preference: Option<EngineKind>, candidate_count: usize) -> &dyn Scorer {
        if preference == Some(EngineKind::FastSemantic) || candidate_count <= 50 {
            &self.fast
        } else {
            &self.context
        }
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Shared component math
// ============================================================================

/// Technologies a candidate is about: analysis tags when available,
/// otherwise inferred from its own tags, title, and URL.
pub(crate) fn candidate_technologies(candidate: &ContentWithAnalysis) -> Vec<String> {
    if let Some(tags) = &candidate.technology_tags {
        if !tags.is_empty() {
            return tags.iter().map(|t| t.to_lowercase()).collect();
        }
    }
    candidate
        .content
        .tags
        .iter()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Fraction of requested technologies the candidate covers. Falls back
/// to substring checks over title/URL when the candidate has no tags yet
/// (unanalyzed content still matches "flask" in its URL).
pub(crate) fn technology_overlap(requested: &[String], candidate: &ContentWithAnalysis) -> f32 {
    if requested.is_empty() {
        return 0.0;
    }

    let tags = candidate_technologies(candidate);
    let haystack = format!(
        "{} {}",
        candidate.content.title.as_deref().unwrap_or(""),
        candidate.content.url
    )
    .to_lowercase();

    let matched = requested
        .iter()
        .filter(|tech| tags.iter().any(|t| t == *tech) || haystack.contains(tech.as_str()))
        .count();

    matched as f32 / requested.len() as f32
}

/// Cosine similarity mapped from [-1, 1] to [0, 1]. Zero when either
/// side has no embedding.
pub(crate) fn semantic_similarity(
    query: Option<&[f32]>,
    candidate: &ContentWithAnalysis,
) -> f32 {
    match (query, candidate.content.embedding_slice()) {
        (Some(q), Some(c)) => (harvest::embed::cosine_similarity(q, c) + 1.0) / 2.0,
        _ => 0.0,
    }
}

/// Content types that serve each goal best.
pub(crate) fn preferred_types(goal: PrimaryGoal) -> &'static [&'static str] {
    match goal {
        PrimaryGoal::Learn => &["tutorial", "course", "guide"],
        PrimaryGoal::Build => &["documentation", "reference", "guide"],
        PrimaryGoal::Solve => &["article", "reference", "documentation"],
        PrimaryGoal::Optimize => &["guide", "article", "documentation"],
    }
}

/// 1.0 for a preferred type, 0.3 for a known-but-unpreferred one,
/// 0.5 neutral when the candidate is unanalyzed or there is no intent.
pub(crate) fn content_type_match(intent: Option<&Intent>, candidate: &ContentWithAnalysis) -> f32 {
    let content_type = match &candidate.content_type {
        Some(t) => t.as_str(),
        None => return 0.5,
    };
    match intent {
        Some(intent) if preferred_types(intent.primary_goal).contains(&content_type) => 1.0,
        Some(_) => 0.3,
        None => 0.5,
    }
}

/// 1.0 exact stage match, 0.6 adjacent, 0.2 opposite; 0.5 neutral when
/// either side is unknown.
pub(crate) fn difficulty_match(intent: Option<&Intent>, candidate: &ContentWithAnalysis) -> f32 {
    use harvest::LearningStage;

    let stage = match intent {
        Some(i) => i.learning_stage,
        None => return 0.5,
    };
    let difficulty = match candidate.difficulty_level.as_deref() {
        Some(d) => d,
        None => return 0.5,
    };

    let stage_rank = match stage {
        LearningStage::Beginner => 0i32,
        LearningStage::Intermediate => 1,
        LearningStage::Advanced => 2,
    };
    let difficulty_rank = match difficulty {
        "beginner" => 0i32,
        "intermediate" => 1,
        "advanced" => 2,
        _ => return 0.5,
    };

    match (stage_rank - difficulty_rank).abs() {
        0 => 1.0,
        1 => 0.6,
        _ => 0.2,
    }
}

/// How well the candidate lines up with the intent's technology and
/// content-type reading. 0.5 neutral without an intent.
pub(crate) fn intent_alignment(intent: Option<&Intent>, candidate: &ContentWithAnalysis) -> f32 {
    let intent = match intent {
        Some(i) => i,
        None => return 0.5,
    };

    let tech_part = technology_overlap(
        &intent
            .specific_technologies
            .iter()
            .map(|t| t.to_lowercase())
            .collect::<Vec<_>>(),
        candidate,
    );
    let type_part = if content_type_match(Some(intent), candidate) >= 1.0 {
        1.0
    } else {
        0.3
    };

    (tech_part * 0.6 + type_part * 0.4).clamp(0.0, 1.0)
}

/// Confidence grows with the amount of signal behind the score.
pub(crate) fn confidence_for(
    candidate: &ContentWithAnalysis,
    ctx: &ScoringContext,
) -> f32 {
    let mut confidence: f32 = 0.5;
    if candidate.content_type.is_some() {
        confidence += 0.2;
    }
    if candidate.content.embedding.is_some() && ctx.query_embedding.is_some() {
        confidence += 0.2;
    }
    if ctx.intent.is_some() {
        confidence += 0.1;
    }
    confidence.min(1.0)
}

/// Compute the shared component breakdown for one candidate.
pub(crate) fn components_for(
    ctx: &ScoringContext,
    candidate: &ContentWithAnalysis,
) -> ScoreComponents {
    ScoreComponents {
        technology_overlap: technology_overlap(&ctx.technologies, candidate),
        semantic_similarity: semantic_similarity(ctx.query_embedding.as_deref(), candidate),
        content_type_match: content_type_match(ctx.intent.as_ref(), candidate),
        difficulty_match: difficulty_match(ctx.intent.as_ref(), candidate),
        quality: (candidate.content.quality_score.clamp(0, 10) as f32) / 10.0,
        intent_alignment: intent_alignment(ctx.intent.as_ref(), candidate),
    }
}

/// Shared post-processing: min-quality filter and tie-broken descending
/// sort. Quality is a candidate property no later boost can change, so
/// filtering on it here is safe; score filtering and truncation are not
/// (they happen downstream, after re-ranking).
pub(crate) fn finalize(
    mut scored: Vec<ScoredCandidate>,
    ctx: &ScoringContext,
) -> Vec<ScoredCandidate> {
    scored.retain(|c| c.content.content.quality_score >= ctx.min_quality);
    sort_scored(&mut scored);
    scored
}

/// Descending by score; ties break on quality desc, recency desc, id asc.
pub(crate) fn sort_scored(scored: &mut [ScoredCandidate]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.content.content.quality_score.cmp(&a.content.content.quality_score))
            .then(b.content.content.saved_at.cmp(&a.content.content.saved_at))
            .then(a.content.content.id.cmp(&b.content.content.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{make_candidate, with_analysis};
    use harvest::{
        ComplexityPreference, LearningStage, TimeConstraint, UrgencyLevel,
    };
    use uuid::Uuid;

    fn intent(goal: PrimaryGoal, stage: LearningStage, techs: &[&str]) -> Intent {
        Intent {
            primary_goal: goal,
            learning_stage: stage,
            project_type: "api".into(),
            urgency_level: UrgencyLevel::Medium,
            specific_technologies: techs.iter().map(|t| t.to_string()).collect(),
            complexity_preference: ComplexityPreference::Moderate,
            time_constraint: TimeConstraint::DeepDive,
            focus_areas: vec![],
            context_hash: "h".into(),
            confidence_score: 0.9,
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn technology_overlap_uses_analysis_tags() {
        let user = Uuid::new_v4();
        let candidate = with_analysis(
            make_candidate(user, "https://example.com/x", "Some Guide", 7, None),
            "guide",
            "intermediate",
            &["python", "flask"],
            80,
        );
        let overlap = technology_overlap(&["python".into(), "flask".into()], &candidate);
        assert!((overlap - 1.0).abs() < 1e-6);
    }

    #[test]
    fn technology_overlap_falls_back_to_url_and_title() {
        let user = Uuid::new_v4();
        let candidate = make_candidate(
            user,
            "https://flask.palletsprojects.com/en/latest/",
            "Flask Documentation",
            8,
            None,
        );
        // Unanalyzed, no tags: "flask" still matches via URL/title
        let overlap = technology_overlap(&["python".into(), "flask".into()], &candidate);
        assert!((overlap - 0.5).abs() < 1e-6);
    }

    #[test]
    fn semantic_similarity_degrades_to_zero_without_embeddings() {
        let user = Uuid::new_v4();
        let candidate = make_candidate(user, "https://a", "A", 5, None);
        assert_eq!(semantic_similarity(Some(&[1.0, 0.0]), &candidate), 0.0);
        assert_eq!(semantic_similarity(None, &candidate), 0.0);
    }

    #[test]
    fn content_type_match_prefers_tutorials_for_learning() {
        let user = Uuid::new_v4();
        let tutorial = with_analysis(
            make_candidate(user, "https://a", "A", 5, None),
            "tutorial",
            "beginner",
            &[],
            50,
        );
        let reference = with_analysis(
            make_candidate(user, "https://b", "B", 5, None),
            "reference",
            "beginner",
            &[],
            50,
        );
        let learn = intent(PrimaryGoal::Learn, LearningStage::Beginner, &[]);
        assert!(content_type_match(Some(&learn), &tutorial) > content_type_match(Some(&learn), &reference));
    }

    #[test]
    fn difficulty_match_rewards_adjacency() {
        let user = Uuid::new_v4();
        let beginner = with_analysis(
            make_candidate(user, "https://a", "A", 5, None),
            "tutorial",
            "beginner",
            &[],
            50,
        );
        let advanced = with_analysis(
            make_candidate(user, "https://b", "B", 5, None),
            "tutorial",
            "advanced",
            &[],
            50,
        );
        let i = intent(PrimaryGoal::Learn, LearningStage::Beginner, &[]);
        assert_eq!(difficulty_match(Some(&i), &beginner), 1.0);
        assert_eq!(difficulty_match(Some(&i), &advanced), 0.2);
    }

    #[test]
    fn sort_breaks_ties_on_quality_then_recency() {
        let user = Uuid::new_v4();
        let low_quality = make_candidate(user, "https://a", "A", 4, None);
        let high_quality = make_candidate(user, "https://b", "B", 9, None);

        let mut scored = vec![
            ScoredCandidate {
                content: low_quality,
                score: 50.0,
                components: ScoreComponents::default(),
                confidence: 0.5,
                reason: None,
            },
            ScoredCandidate {
                content: high_quality,
                score: 50.0,
                components: ScoreComponents::default(),
                confidence: 0.5,
                reason: None,
            },
        ];
        sort_scored(&mut scored);
        assert_eq!(scored[0].content.content.quality_score, 9);
    }

    #[test]
    fn registry_selects_fast_for_small_sets() {
        let registry = EngineRegistry::new();
        assert_eq!(registry.select(None, 10).kind(), EngineKind::FastSemantic);
        assert_eq!(registry.select(None, 200).kind(), EngineKind::ContextAware);
        // A fast preference wins at any size; small sets are fast even
        // when context-aware was asked for
        assert_eq!(
            registry.select(Some(EngineKind::FastSemantic), 200).kind(),
            EngineKind::FastSemantic
        );
        assert_eq!(
            registry.select(Some(EngineKind::ContextAware), 10).kind(),
            EngineKind::FastSemantic
        );
        assert_eq!(
            registry.select(Some(EngineKind::ContextAware), 200).kind(),
            EngineKind::ContextAware
        );
    }
}
