//! Context-aware engine — the same scoring skeleton with intent-driven
//! boosts layered on.
//!
//! - technology overlap is amplified by the goal (+10% for learning,
//!   +20% for build/solve/optimize)
//! - content types that serve the goal score higher through the shared
//!   preference table
//! - every candidate is the user's own content: flat +0.1 ownership bonus
//! - analyzed candidates carry their relevance as `relevance × 0.15`

use harvest::PrimaryGoal;

use crate::domains::content::models::bookmark::ContentWithAnalysis;
use crate::domains::recommend::types::ScoredCandidate;

use super::{components_for, confidence_for, finalize, EngineKind, Scorer, ScoringContext};

const W_TECHNOLOGY: f32 = 0.35;
const W_SEMANTIC: f32 = 0.25;
const W_CONTENT_TYPE: f32 = 0.15;
const W_DIFFICULTY: f32 = 0.10;
const W_QUALITY: f32 = 0.05;
const W_INTENT: f32 = 0.10;

/// All candidates come from the user's own library.
const OWNERSHIP_BONUS: f32 = 0.1;

/// How much a perfect analysis relevance adds.
const RELEVANCE_WEIGHT: f32 = 0.15;

pub struct ContextAwareEngine;

impl ContextAwareEngine {
    fn goal_boost(goal: Option<PrimaryGoal>) -> f32 {
        match goal {
            Some(PrimaryGoal::Learn) => 1.10,
            Some(PrimaryGoal::Build) | Some(PrimaryGoal::Solve) | Some(PrimaryGoal::Optimize) => {
                1.20
            }
            None => 1.0,
        }
    }

    fn relevance_boost(candidate: &ContentWithAnalysis) -> f32 {
        candidate
            .relevance_score
            .map(|r| (r.clamp(0, 100) as f32 / 100.0) * RELEVANCE_WEIGHT)
            .unwrap_or(0.0)
    }
}

impl Scorer for ContextAwareEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::ContextAware
    }

    fn score(
        &self,
        ctx: &ScoringContext,
        candidates: &[ContentWithAnalysis],
    ) -> Vec<ScoredCandidate> {
        let goal = ctx.intent.as_ref().map(|i| i.primary_goal);
        let boost = Self::goal_boost(goal);

        let scored = candidates
            .iter()
            .map(|candidate| {
                let components = components_for(ctx, candidate);

                let technology = (components.technology_overlap * boost).min(1.0);
                let raw = technology * W_TECHNOLOGY
                    + components.semantic_similarity * W_SEMANTIC
                    + components.content_type_match * W_CONTENT_TYPE
                    + components.difficulty_match * W_DIFFICULTY
                    + components.quality * W_QUALITY
                    + components.intent_alignment * W_INTENT;

                let raw = (raw + OWNERSHIP_BONUS + Self::relevance_boost(candidate)).min(1.0);

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
    use harvest::{
        ComplexityPreference, Intent, LearningStage, TimeConstraint, UrgencyLevel,
    };
    use uuid::Uuid;

    fn build_intent() -> Intent {
        Intent {
            primary_goal: PrimaryGoal::Build,
            learning_stage: LearningStage::Intermediate,
            project_type: "api".into(),
            urgency_level: UrgencyLevel::Medium,
            specific_technologies: vec!["python".into()],
            complexity_preference: ComplexityPreference::Moderate,
            time_constraint: TimeConstraint::DeepDive,
            focus_areas: vec![],
            context_hash: "h".into(),
            confidence_score: 0.9,
            updated_at: chrono::Utc::now(),
        }
    }

    fn ctx(user: Uuid, intent: Option<Intent>) -> ScoringContext {
        ScoringContext {
            user,
            technologies: vec!["python".into()],
            intent,
            query_embedding: None,
            min_quality: 0,
        }
    }

    #[test]
    fn ownership_bonus_lifts_every_candidate() {
        let user = Uuid::new_v4();
        let candidate = make_candidate(user, "https://python.example.com/", "Python Notes", 5, None);

        let fast = super::super::FastSemanticEngine.score(&ctx(user, None), &[candidate.clone()]);
        let context = ContextAwareEngine.score(&ctx(user, None), &[candidate]);

        assert!(context[0].score > fast[0].score);
        assert!((context[0].score - fast[0].score - OWNERSHIP_BONUS * 100.0).abs() < 1.0);
    }

    #[test]
    fn relevance_score_adds_boost() {
        let user = Uuid::new_v4();
        let plain = with_analysis(
            make_candidate(user, "https://a.example.com/python", "Python Guide", 5, None),
            "guide",
            "intermediate",
            &["python"],
            0,
        );
        let relevant = with_analysis(
            make_candidate(user, "https://b.example.com/python", "Python Guide", 5, None),
            "guide",
            "intermediate",
            &["python"],
            100,
        );

        let scored = ContextAwareEngine.score(&ctx(user, None), &[plain, relevant]);
        assert_eq!(scored[0].content.relevance_score, Some(100));
        assert!(scored[0].score > scored[1].score);
    }

    #[test]
    fn build_goal_amplifies_technology_overlap() {
        let user = Uuid::new_v4();
        let candidate = with_analysis(
            make_candidate(user, "https://x.example.com/", "Guide", 5, None),
            "documentation",
            "intermediate",
            &["python"],
            0,
        );

        let without = ContextAwareEngine.score(&ctx(user, None), &[candidate.clone()]);
        let with = ContextAwareEngine.score(&ctx(user, Some(build_intent())), &[candidate]);

        assert!(with[0].score > without[0].score);
    }

    #[test]
    fn scores_stay_in_bounds() {
        let user = Uuid::new_v4();
        let candidate = with_analysis(
            make_candidate(
                user,
                "https://python.example.com/",
                "Python",
                10,
                Some(vec![1.0, 0.0]),
            ),
            "documentation",
            "intermediate",
            &["python"],
            100,
        );
        let mut context = ctx(user, Some(build_intent()));
        context.query_embedding = Some(vec![1.0, 0.0]);

        let scored = ContextAwareEngine.score(&context, &[candidate]);
        assert!(scored[0].score <= 100.0);
        assert!(scored[0].score >= 0.0);
    }
}
