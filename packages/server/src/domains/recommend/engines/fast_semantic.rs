//! Fast semantic engine — the latency-tight path.
//!
//! Fixed weights over the shared components, no intent-conditional
//! boosts. Meant for small candidate sets (≤ 50) or when the caller
//! asked for the fast path.

use crate::domains::content::models::bookmark::ContentWithAnalysis;
use crate::domains::recommend::types::ScoredCandidate;

use super::{components_for, confidence_for, finalize, EngineKind, Scorer, ScoringContext};

/// Component weights. They sum to 1.0 so the raw score lands in [0, 1]
/// before scaling to 0–100.
const W_TECHNOLOGY: f32 = 0.35;
const W_SEMANTIC: f32 = 0.25;
const W_CONTENT_TYPE: f32 = 0.15;
const W_DIFFICULTY: f32 = 0.10;
const W_QUALITY: f32 = 0.05;
const W_INTENT: f32 = 0.10;

pub struct FastSemanticEngine;

impl Scorer for FastSemanticEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::FastSemantic
    }

    fn score(
        &self,
        ctx: &ScoringContext,
        candidates: &[ContentWithAnalysis],
    ) -> Vec<ScoredCandidate> {
        let scored = candidates
            .iter()
            .map(|candidate| {
                let components = components_for(ctx, candidate);
                let raw = components.technology_overlap * W_TECHNOLOGY
                    + components.semantic_similarity * W_SEMANTIC
                    + components.content_type_match * W_CONTENT_TYPE
                    + components.difficulty_match * W_DIFFICULTY
                    + components.quality * W_QUALITY
                    + components.intent_alignment * W_INTENT;

                ScoredCandidate {
                    score: (raw * 100.0).clamp(0.0, 100.0),
                    confidence: confidence_for(candidate, ctx),
                    components,
                    content: candidate.clone(),
                    reason: None,
                }
            })
            .collect();

        finalize(scored, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{make_candidate, with_analysis};
    use uuid::Uuid;

    fn ctx(user: Uuid) -> ScoringContext {
        ScoringContext {
            user,
            technologies: vec!["python".into(), "flask".into()],
            intent: None,
            query_embedding: Some(vec![1.0, 0.0, 0.0]),
            min_quality: 0,
        }
    }

    #[test]
    fn matching_candidate_clears_the_floor() {
        let user = Uuid::new_v4();
        let candidate = with_analysis(
            make_candidate(
                user,
                "https://flask.palletsprojects.com/",
                "Flask Documentation",
                8,
                Some(vec![1.0, 0.0, 0.0]),
            ),
            "documentation",
            "intermediate",
            &["python", "flask"],
            85,
        );

        let scored = FastSemanticEngine.score(&ctx(user), &[candidate]);
        assert_eq!(scored.len(), 1);
        assert!(scored[0].score >= 40.0, "score was {}", scored[0].score);
        assert!(scored[0].score <= 100.0);
    }

    #[test]
    fn unrelated_candidates_score_low_but_stay_in_the_pool() {
        let user = Uuid::new_v4();
        // Orthogonal embedding, no tech overlap, low quality
        let candidate = make_candidate(
            user,
            "https://knitting.example.com/",
            "Knitting Patterns",
            1,
            Some(vec![0.0, 1.0, 0.0]),
        );

        // Engines never drop by score; the orchestrator filters after
        // re-ranking. The weak candidate stays, scored under the floor.
        let scored = FastSemanticEngine.score(&ctx(user), &[candidate]);
        assert_eq!(scored.len(), 1);
        assert!(scored[0].score < 25.0, "score was {}", scored[0].score);
    }

    #[test]
    fn output_is_sorted_descending_over_the_full_pool() {
        let user = Uuid::new_v4();
        let candidates: Vec<_> = (0..5)
            .map(|i| {
                with_analysis(
                    make_candidate(
                        user,
                        &format!("https://flask.example.com/{}", i),
                        "Flask Guide",
                        (i + 3) as i16,
                        Some(vec![1.0, 0.0, 0.0]),
                    ),
                    "guide",
                    "intermediate",
                    &["python", "flask"],
                    60,
                )
            })
            .collect();

        let scored = FastSemanticEngine.score(&ctx(user), &candidates);
        assert_eq!(scored.len(), 5);
        for window in scored.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }

    #[test]
    fn min_quality_filters_candidates_outright() {
        let user = Uuid::new_v4();
        let mut context = ctx(user);
        context.min_quality = 5;

        let low = make_candidate(user, "https://flask.example.com/low", "Flask Guide", 3, None);
        let high = make_candidate(user, "https://flask.example.com/high", "Flask Guide", 8, None);

        let scored = FastSemanticEngine.score(&context, &[low, high]);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].content.content.quality_score, 8);
    }

    #[test]
    fn missing_embedding_still_produces_a_score() {
        let user = Uuid::new_v4();
        let mut context = ctx(user);
        context.query_embedding = None;

        let candidate = with_analysis(
            make_candidate(user, "https://flask.example.com/", "Flask Guide", 9, None),
            "guide",
            "intermediate",
            &["python", "flask"],
            70,
        );

        let scored = FastSemanticEngine.score(&context, &[candidate]);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].components.semantic_similarity, 0.0);
        assert!(scored[0].score > 0.0);
    }
}
