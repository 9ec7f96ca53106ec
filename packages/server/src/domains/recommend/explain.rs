//! Explanation generation for one recommendation.
//!
//! LLM first, deterministic template second. The contract either way:
//! never empty, at most 200 characters, and no raw scores in the text.

use std::sync::Arc;

use harvest::llm::{prompts, schemas};
use harvest::PrimaryGoal;
use tracing::debug;

use crate::common::entity_ids::UserId;
use crate::domains::recommend::types::ScoredCandidate;
use crate::kernel::llm_service::LlmService;

/// Hard cap on user-facing reasons.
const MAX_REASON_CHARS: usize = 200;

/// Outcome of one explanation attempt.
pub struct Explanation {
    pub reason: String,
    /// False when the deterministic template was used
    pub from_llm: bool,
}

pub struct Explainer {
    llm: Arc<LlmService>,
}

impl Explainer {
    pub fn new(llm: Arc<LlmService>) -> Self {
        Self { llm }
    }

    /// Produce a short justification for one scored candidate.
    ///
    /// Recoverable LLM failures (rate limit, unstructured, unavailable)
    /// silently fall back to the template; the caller learns which path
    /// ran through [`Explanation::from_llm`].
    pub async fn explain(
        &self,
        user: UserId,
        candidate: &ScoredCandidate,
        goal: Option<PrimaryGoal>,
        project_type: Option<&str>,
    ) -> Explanation {
        let goal_str = goal.map(|g| g.as_str()).unwrap_or("work with their saved resources");
        let technologies = candidate.technologies();
        let ranked = candidate.components.ranked();
        let top: Vec<(&str, f32)> = ranked.into_iter().take(3).collect();

        let prompt = prompts::explanation(
            goal_str,
            candidate.content.content.title.as_deref().unwrap_or("this bookmark"),
            &technologies,
            candidate.content.difficulty_level.as_deref(),
            &top,
        );

        match self.llm.call(user, &prompt, &schemas::explanation()).await {
            Ok(value) => {
                if let Some(reason) = value["reason"].as_str() {
                    let reason = clamp_reason(reason);
                    if !reason.is_empty() {
                        return Explanation {
                            reason,
                            from_llm: true,
                        };
                    }
                }
                debug!("explanation response had no usable reason, using template");
            }
            Err(e) if e.is_recoverable() => {
                debug!(kind = e.kind(), "LLM explanation unavailable, using template");
            }
            Err(_) => {}
        }

        Explanation {
            reason: template_reason(candidate, goal, project_type),
            from_llm: false,
        }
    }
}

/// Deterministic fallback keyed on the dominant score component and the
/// intent goal.
pub fn template_reason(
    candidate: &ScoredCandidate,
    goal: Option<PrimaryGoal>,
    project_type: Option<&str>,
) -> String {
    let technologies = candidate.technologies();
    let tech = technologies
        .first()
        .cloned()
        .unwrap_or_else(|| "your".to_string());
    let difficulty = candidate
        .content
        .difficulty_level
        .clone()
        .unwrap_or_else(|| "your".to_string());
    let work = project_type.unwrap_or("current").replace('_', " ");

    let (dominant, _) = candidate.components.dominant();
    let body = match dominant {
        "technology_overlap" => format!(
            "Matches your {} stack at {} level; relevant for your {} work.",
            tech, difficulty, work
        ),
        "semantic_similarity" => format!(
            "Closely related to what you described; fits your {} work.",
            work
        ),
        "content_type_match" => match goal {
            Some(PrimaryGoal::Learn) => {
                format!("A {}-friendly resource for learning {}.", difficulty, tech)
            }
            Some(PrimaryGoal::Build) => {
                format!("Practical {} material you can apply while building.", tech)
            }
            _ => format!("The kind of resource that fits your {} work.", work),
        },
        "quality" => "One of the strongest resources in your library for this.".to_string(),
        "intent_alignment" => format!(
            "Lines up with what you're trying to do in your {} work.",
            work
        ),
        _ => format!("A solid match from your saved {} resources.", tech),
    };

    clamp_reason(&body)
}

fn clamp_reason(reason: &str) -> String {
    let trimmed = reason.trim();
    if trimmed.chars().count() <= MAX_REASON_CHARS {
        return trimmed.to_string();
    }
    let mut clamped: String = trimmed.chars().take(MAX_REASON_CHARS - 1).collect();
    clamped.push('…');
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::recommend::types::ScoreComponents;
    use crate::kernel::llm_service::PermissiveGate;
    use crate::kernel::test_dependencies::{make_candidate, with_analysis};
    use harvest::testing::{MockLlm, MockLlmFailure};
    use serde_json::json;
    use uuid::Uuid;

    fn candidate(dominant_tech: bool) -> ScoredCandidate {
        let user = Uuid::new_v4();
        let components = if dominant_tech {
            ScoreComponents {
                technology_overlap: 0.9,
                semantic_similarity: 0.3,
                ..Default::default()
            }
        } else {
            ScoreComponents {
                technology_overlap: 0.1,
                semantic_similarity: 0.9,
                ..Default::default()
            }
        };
        ScoredCandidate {
            content: with_analysis(
                make_candidate(user, "https://a", "Flask Docs", 8, None),
                "documentation",
                "intermediate",
                &["flask"],
                80,
            ),
            score: 70.0,
            components,
            confidence: 0.8,
            reason: None,
        }
    }

    #[test]
    fn templates_are_bounded_and_non_empty() {
        for dominant_tech in [true, false] {
            for goal in [None, Some(PrimaryGoal::Learn), Some(PrimaryGoal::Build)] {
                let reason = template_reason(&candidate(dominant_tech), goal, Some("web_app"));
                assert!(!reason.is_empty());
                assert!(reason.chars().count() <= MAX_REASON_CHARS);
                // No raw scores leak into user-facing text
                assert!(!reason.contains("0."));
            }
        }
    }

    #[test]
    fn clamp_reason_truncates_long_text() {
        let long = "word ".repeat(100);
        let clamped = clamp_reason(&long);
        assert!(clamped.chars().count() <= MAX_REASON_CHARS);
        assert!(clamped.ends_with('…'));
    }

    #[tokio::test]
    async fn llm_reason_is_used_when_available() {
        let mock = Arc::new(MockLlm::new().with_default(json!({"reason": "Fits your flask work."})));
        let llm = Arc::new(LlmService::with_client(Arc::new(PermissiveGate), mock));
        let explainer = Explainer::new(llm);

        let out = explainer
            .explain(Uuid::new_v4(), &candidate(true), Some(PrimaryGoal::Build), None)
            .await;
        assert!(out.from_llm);
        assert_eq!(out.reason, "Fits your flask work.");
    }

    #[tokio::test]
    async fn rate_limited_llm_falls_back_to_template() {
        let mock = Arc::new(
            MockLlm::new().with_failure(MockLlmFailure::RateLimited { retry_after_secs: 60 }),
        );
        let llm = Arc::new(LlmService::with_client(Arc::new(PermissiveGate), mock));
        let explainer = Explainer::new(llm);

        let out = explainer
            .explain(Uuid::new_v4(), &candidate(true), Some(PrimaryGoal::Learn), Some("api"))
            .await;
        assert!(!out.from_llm);
        assert!(!out.reason.is_empty());
        assert!(out.reason.chars().count() <= MAX_REASON_CHARS);
    }
}
