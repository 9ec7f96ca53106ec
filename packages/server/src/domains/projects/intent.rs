//! Intent analysis — structured reading of what the user is doing.
//!
//! Resolution order: the project's stored intent (hash-validated), the
//! intent cache, the LLM, and finally a deterministic rule-based
//! analyzer. The rule-based path always succeeds, so recommendation
//! requests never fail for lack of an intent; its results are not cached
//! so the LLM gets another chance on the next uncached call.

use std::sync::Arc;

use chrono::Utc;
use harvest::llm::{prompts, schemas};
use harvest::{
    ComplexityPreference, Intent, LearningStage, PrimaryGoal, TimeConstraint, UrgencyLevel,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::common::entity_ids::{ProjectId, UserId};
use crate::common::errors::{AppError, AppResult};
use crate::common::utils::context_hash;
use crate::kernel::cache::{self, cache_get_json, cache_set_json, CacheStore};
use crate::kernel::llm_service::LlmService;
use crate::kernel::traits::BaseProjectStore;

/// Where a returned intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    ProjectCache,
    Cache,
    Llm,
    RuleFallback,
}

/// An intent plus how it was obtained (the orchestrator folds the
/// source into its degradation metrics).
#[derive(Debug, Clone)]
pub struct IntentOutcome {
    pub intent: Intent,
    pub source: IntentSource,
}

/// What the LLM returns; hash and timestamp are attached locally.
#[derive(Debug, Deserialize)]
struct IntentPayload {
    primary_goal: PrimaryGoal,
    learning_stage: LearningStage,
    project_type: String,
    urgency_level: UrgencyLevel,
    specific_technologies: Vec<String>,
    complexity_preference: ComplexityPreference,
    time_constraint: TimeConstraint,
    focus_areas: Vec<String>,
    confidence_score: f32,
}

impl IntentPayload {
    fn into_intent(self, context_hash: String) -> Intent {
        Intent {
            primary_goal: self.primary_goal,
            learning_stage: self.learning_stage,
            project_type: self.project_type,
            urgency_level: self.urgency_level,
            specific_technologies: self
                .specific_technologies
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            complexity_preference: self.complexity_preference,
            time_constraint: self.time_constraint,
            focus_areas: self.focus_areas,
            context_hash,
            confidence_score: self.confidence_score.clamp(0.0, 1.0),
            updated_at: Utc::now(),
        }
    }
}

pub struct IntentAnalyzer {
    llm: Arc<LlmService>,
    projects: Arc<dyn BaseProjectStore>,
    cache: Arc<dyn CacheStore>,
    fallback: RuleBasedIntentAnalyzer,
}

impl IntentAnalyzer {
    pub fn new(
        llm: Arc<LlmService>,
        projects: Arc<dyn BaseProjectStore>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            llm,
            projects,
            cache,
            fallback: RuleBasedIntentAnalyzer::new(),
        }
    }

    /// Analyze the user's context text.
    ///
    /// With a project id, its stored intent is returned when still valid
    /// for the text; `force` skips every cached layer.
    pub async fn analyze_intent(
        &self,
        user: UserId,
        text: &str,
        project_id: Option<ProjectId>,
        force: bool,
    ) -> AppResult<IntentOutcome> {
        let hash = context_hash(text);

        if let (Some(project), false) = (project_id, force) {
            if let Some(ctx) = self.projects.project_context(user, project).await? {
                if let Some(intent) = ctx.intent {
                    if intent.matches(&hash) {
                        return Ok(IntentOutcome {
                            intent,
                            source: IntentSource::ProjectCache,
                        });
                    }
                }
            }
        }

        let cache_key = cache::keys::intent(&hash);
        if !force {
            if let Some(intent) = cache_get_json::<Intent>(self.cache.as_ref(), &cache_key).await {
                if intent.matches(&hash) {
                    return Ok(IntentOutcome {
                        intent,
                        source: IntentSource::Cache,
                    });
                }
            }
        }

        match self.analyze_with_llm(user, text, &hash).await {
            Ok(intent) => {
                if let Some(project) = project_id {
                    if let Err(e) = self.projects.store_intent(user, project, &intent).await {
                        warn!(project = %project, error = %e, "failed to store intent on project");
                    }
                }
                cache_set_json(
                    self.cache.as_ref(),
                    &cache_key,
                    &intent,
                    Some(cache::keys::TTL_INTENT),
                )
                .await;
                Ok(IntentOutcome {
                    intent,
                    source: IntentSource::Llm,
                })
            }
            Err(e) if e.is_recoverable() => {
                debug!(kind = e.kind(), "intent LLM unavailable, using rule-based fallback");
                Ok(IntentOutcome {
                    intent: self.fallback.analyze(text, &hash),
                    source: IntentSource::RuleFallback,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn analyze_with_llm(&self, user: UserId, text: &str, hash: &str) -> AppResult<Intent> {
        let value = self
            .llm
            .call(user, &prompts::intent(text), &schemas::intent())
            .await?;
        let payload: IntentPayload =
            serde_json::from_value(value).map_err(|_| AppError::LlmUnstructured)?;
        Ok(payload.into_intent(hash.to_string()))
    }
}

// ============================================================================
// Rule-based fallback
// ============================================================================

/// Technologies the dictionary matcher recognizes.
const TECH_VOCABULARY: &[&str] = &[
    "python", "javascript", "typescript", "rust", "go", "java", "kotlin", "swift", "ruby", "php",
    "c++", "c#", "sql", "html", "css", "react", "vue", "angular", "svelte", "nextjs", "django",
    "flask", "fastapi", "rails", "spring", "express", "nodejs", "axum", "tokio", "pandas",
    "numpy", "pytorch", "tensorflow", "scikit-learn", "docker", "kubernetes", "terraform", "aws",
    "gcp", "azure", "postgres", "postgresql", "mysql", "redis", "mongodb", "graphql", "grpc",
    "kafka", "android", "ios", "flutter", "react native",
];

/// Keyword buckets for inferring a project type.
const PROJECT_TYPE_BUCKETS: &[(&str, &[&str])] = &[
    ("web_app", &["website", "web app", "webapp", "frontend", "react", "vue", "angular", "web"]),
    ("mobile_app", &["mobile", "android", "ios", "flutter", "react native", "app store"]),
    ("api", &["api", "rest", "endpoint", "backend", "microservice", "grpc", "graphql"]),
    ("data_science", &["data", "machine learning", "ml", "model", "pandas", "dataset", "analytics"]),
    ("automation", &["automate", "automation", "script", "pipeline", "cron", "workflow"]),
    ("cli", &["cli", "command line", "terminal"]),
];

const BEGINNER_MARKERS: &[&str] = &["beginner", "new to", "first time", "getting started", "learn the basics", "intro"];
const ADVANCED_MARKERS: &[&str] = &["advanced", "expert", "deep dive", "internals", "performance tuning", "scale"];

const LEARN_MARKERS: &[&str] = &["learn", "study", "understand", "tutorial", "course"];
const BUILD_MARKERS: &[&str] = &["build", "create", "implement", "develop", "make", "ship"];
const SOLVE_MARKERS: &[&str] = &["fix", "debug", "solve", "error", "issue", "broken", "troubleshoot"];
const OPTIMIZE_MARKERS: &[&str] = &["optimize", "speed up", "faster", "refactor", "improve", "performance"];

/// Deterministic intent analyzer — dictionary and keyword matching only.
/// Confidence is fixed at 0.4 to signal the weaker read.
pub struct RuleBasedIntentAnalyzer {
    vocabulary: Vec<String>,
}

impl RuleBasedIntentAnalyzer {
    pub fn new() -> Self {
        Self {
            vocabulary: TECH_VOCABULARY.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Extend the dictionary (e.g. with the user's technology interests).
    pub fn with_vocabulary(mut self, extra: &[String]) -> Self {
        for tech in extra {
            let tech = tech.trim().to_lowercase();
            if !tech.is_empty() && !self.vocabulary.contains(&tech) {
                self.vocabulary.push(tech);
            }
        }
        self
    }

    pub fn analyze(&self, text: &str, hash: &str) -> Intent {
        let lower = text.to_lowercase();

        let technologies: Vec<String> = self
            .vocabulary
            .iter()
            .filter(|tech| lower.contains(tech.as_str()))
            .cloned()
            .collect();

        let project_type = PROJECT_TYPE_BUCKETS
            .iter()
            .max_by_key(|(_, keywords)| {
                keywords.iter().filter(|k| lower.contains(*k)).count()
            })
            .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(*k)))
            .map(|(bucket, _)| bucket.to_string())
            .unwrap_or_else(|| "general".to_string());

        let learning_stage = if BEGINNER_MARKERS.iter().any(|m| lower.contains(m)) {
            LearningStage::Beginner
        } else if ADVANCED_MARKERS.iter().any(|m| lower.contains(m)) {
            LearningStage::Advanced
        } else {
            LearningStage::Intermediate
        };

        let primary_goal = Self::pick_goal(&lower);

        Intent {
            primary_goal,
            learning_stage,
            project_type,
            urgency_level: UrgencyLevel::Medium,
            specific_technologies: technologies,
            complexity_preference: ComplexityPreference::Moderate,
            time_constraint: TimeConstraint::DeepDive,
            focus_areas: vec![],
            context_hash: hash.to_string(),
            confidence_score: 0.4,
            updated_at: Utc::now(),
        }
    }

    fn pick_goal(lower: &str) -> PrimaryGoal {
        let scores = [
            (PrimaryGoal::Solve, SOLVE_MARKERS),
            (PrimaryGoal::Optimize, OPTIMIZE_MARKERS),
            (PrimaryGoal::Build, BUILD_MARKERS),
            (PrimaryGoal::Learn, LEARN_MARKERS),
        ];
        scores
            .iter()
            .map(|(goal, markers)| {
                (*goal, markers.iter().filter(|m| lower.contains(*m)).count())
            })
            .max_by_key(|(_, count)| *count)
            .filter(|(_, count)| *count > 0)
            .map(|(goal, _)| goal)
            .unwrap_or(PrimaryGoal::Build)
    }
}

impl Default for RuleBasedIntentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::llm_service::PermissiveGate;
    use crate::kernel::test_dependencies::InMemoryProjectStore;
    use crate::kernel::InMemoryCacheStore;
    use harvest::testing::{MockLlm, MockLlmFailure};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn rule_based_detects_technologies_and_type() {
        let analyzer = RuleBasedIntentAnalyzer::new();
        let intent = analyzer.analyze("Build a REST API with python and flask", "h1");

        assert_eq!(intent.primary_goal, PrimaryGoal::Build);
        assert_eq!(intent.project_type, "api");
        assert!(intent.specific_technologies.contains(&"python".to_string()));
        assert!(intent.specific_technologies.contains(&"flask".to_string()));
        assert_eq!(intent.confidence_score, 0.4);
    }

    #[test]
    fn rule_based_reads_learning_stage_markers() {
        let analyzer = RuleBasedIntentAnalyzer::new();
        assert_eq!(
            analyzer.analyze("I'm new to rust, getting started", "h").learning_stage,
            LearningStage::Beginner
        );
        assert_eq!(
            analyzer.analyze("advanced tokio internals", "h").learning_stage,
            LearningStage::Advanced
        );
        assert_eq!(
            analyzer.analyze("a rust project", "h").learning_stage,
            LearningStage::Intermediate
        );
    }

    #[test]
    fn user_interests_extend_the_vocabulary() {
        let analyzer =
            RuleBasedIntentAnalyzer::new().with_vocabulary(&["htmx".to_string()]);
        let intent = analyzer.analyze("build a site with htmx", "h");
        assert!(intent.specific_technologies.contains(&"htmx".to_string()));

        // Unknown to the stock dictionary
        let stock = RuleBasedIntentAnalyzer::new().analyze("build a site with htmx", "h");
        assert!(!stock.specific_technologies.contains(&"htmx".to_string()));
    }

    #[test]
    fn rule_based_is_deterministic() {
        let analyzer = RuleBasedIntentAnalyzer::new();
        let a = analyzer.analyze("debug my react website", "h");
        let b = analyzer.analyze("debug my react website", "h");
        assert_eq!(a.primary_goal, b.primary_goal);
        assert_eq!(a.project_type, b.project_type);
        assert_eq!(a.specific_technologies, b.specific_technologies);
    }

    #[test]
    fn defaults_applied_when_nothing_matches() {
        let analyzer = RuleBasedIntentAnalyzer::new();
        let intent = analyzer.analyze("miscellaneous thoughts", "h");
        assert_eq!(intent.project_type, "general");
        assert_eq!(intent.urgency_level, UrgencyLevel::Medium);
        assert_eq!(intent.complexity_preference, ComplexityPreference::Moderate);
        assert_eq!(intent.time_constraint, TimeConstraint::DeepDive);
    }

    fn llm_intent_json() -> serde_json::Value {
        json!({
            "primary_goal": "learn",
            "learning_stage": "beginner",
            "project_type": "web_app",
            "urgency_level": "low",
            "specific_technologies": ["React"],
            "complexity_preference": "simple",
            "time_constraint": "quick_tutorial",
            "focus_areas": ["components"],
            "confidence_score": 0.92,
        })
    }

    fn analyzer_with(llm: MockLlm) -> (IntentAnalyzer, Arc<InMemoryProjectStore>) {
        let projects = Arc::new(InMemoryProjectStore::new());
        let service = Arc::new(LlmService::with_client(Arc::new(PermissiveGate), Arc::new(llm)));
        (
            IntentAnalyzer::new(service, projects.clone(), Arc::new(InMemoryCacheStore::new())),
            projects,
        )
    }

    #[tokio::test]
    async fn llm_path_parses_and_normalizes() {
        let (analyzer, _) = analyzer_with(MockLlm::new().with_default(llm_intent_json()));
        let outcome = analyzer
            .analyze_intent(Uuid::new_v4(), "learn react", None, false)
            .await
            .unwrap();

        assert_eq!(outcome.source, IntentSource::Llm);
        assert_eq!(outcome.intent.primary_goal, PrimaryGoal::Learn);
        assert_eq!(outcome.intent.specific_technologies, vec!["react"]);
        assert_eq!(outcome.intent.context_hash, context_hash("learn react"));
    }

    #[tokio::test]
    async fn second_call_hits_cache_without_llm() {
        let mock = MockLlm::new().with_default(llm_intent_json());
        let (analyzer, _) = analyzer_with(mock);
        let user = Uuid::new_v4();

        let first = analyzer.analyze_intent(user, "learn react", None, false).await.unwrap();
        assert_eq!(first.source, IntentSource::Llm);

        let second = analyzer.analyze_intent(user, "learn react", None, false).await.unwrap();
        assert_eq!(second.source, IntentSource::Cache);
    }

    #[tokio::test]
    async fn project_intent_is_reused_when_hash_matches() {
        let (analyzer, projects) = analyzer_with(MockLlm::new().with_default(llm_intent_json()));
        let user = Uuid::new_v4();
        let project = Uuid::new_v4();
        projects.insert_project(user, project, "learn react");

        let first = analyzer
            .analyze_intent(user, "learn react", Some(project), false)
            .await
            .unwrap();
        assert_eq!(first.source, IntentSource::Llm);

        // Stored on the project; a fresh analyzer (cold cache) still
        // resolves from there
        let second = analyzer
            .analyze_intent(user, "learn react", Some(project), false)
            .await
            .unwrap();
        assert_eq!(second.source, IntentSource::ProjectCache);
    }

    #[tokio::test]
    async fn rate_limited_llm_falls_back_to_rules() {
        let (analyzer, _) = analyzer_with(
            MockLlm::new().with_failure(MockLlmFailure::RateLimited { retry_after_secs: 30 }),
        );
        let outcome = analyzer
            .analyze_intent(Uuid::new_v4(), "build a flask api", None, false)
            .await
            .unwrap();

        assert_eq!(outcome.source, IntentSource::RuleFallback);
        assert_eq!(outcome.intent.confidence_score, 0.4);
        assert!(outcome.intent.specific_technologies.contains(&"flask".to_string()));
    }

    #[tokio::test]
    async fn unstructured_llm_falls_back_to_rules() {
        let (analyzer, _) =
            analyzer_with(MockLlm::new().with_failure(MockLlmFailure::Unstructured));
        let outcome = analyzer
            .analyze_intent(Uuid::new_v4(), "fix my django error", None, false)
            .await
            .unwrap();

        assert_eq!(outcome.source, IntentSource::RuleFallback);
        assert_eq!(outcome.intent.primary_goal, PrimaryGoal::Solve);
    }
}
