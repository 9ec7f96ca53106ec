//! Intent — the structured interpretation of what a user is trying to do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the user is fundamentally trying to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryGoal {
    Learn,
    Build,
    Solve,
    Optimize,
}

impl PrimaryGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryGoal::Learn => "learn",
            PrimaryGoal::Build => "build",
            PrimaryGoal::Solve => "solve",
            PrimaryGoal::Optimize => "optimize",
        }
    }
}

/// Where the user sits on the learning curve for this context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStage {
    Beginner,
    Intermediate,
    Advanced,
}

/// How urgent the work is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
}

/// How complex a solution the user wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityPreference {
    Simple,
    Moderate,
    Complex,
}

/// What shape of material fits the user's time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeConstraint {
    QuickTutorial,
    DeepDive,
    Reference,
}

/// Structured output of intent analysis for a project or free-text query.
///
/// An Intent is only valid against a matching `context_hash` — consumers
/// recompute the hash of the input text and discard stale intents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub primary_goal: PrimaryGoal,
    pub learning_stage: LearningStage,

    /// Open vocabulary: "web_app", "mobile_app", "api", "data_science", ...
    pub project_type: String,

    pub urgency_level: UrgencyLevel,

    /// Technologies the user named or implied
    pub specific_technologies: Vec<String>,

    pub complexity_preference: ComplexityPreference,
    pub time_constraint: TimeConstraint,

    /// Topical areas to weight ("testing", "deployment", ...)
    pub focus_areas: Vec<String>,

    /// Fingerprint of the normalized input text
    pub context_hash: String,

    /// Analyzer confidence in [0, 1]
    pub confidence_score: f32,

    pub updated_at: DateTime<Utc>,
}

impl Intent {
    /// Whether this intent still describes the given context fingerprint.
    pub fn matches(&self, context_hash: &str) -> bool {
        self.context_hash == context_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_serializes_with_snake_case_variants() {
        let intent = Intent {
            primary_goal: PrimaryGoal::Build,
            learning_stage: LearningStage::Intermediate,
            project_type: "web_app".into(),
            urgency_level: UrgencyLevel::Medium,
            specific_technologies: vec!["rust".into()],
            complexity_preference: ComplexityPreference::Moderate,
            time_constraint: TimeConstraint::DeepDive,
            focus_areas: vec![],
            context_hash: "abc".into(),
            confidence_score: 0.9,
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["primary_goal"], "build");
        assert_eq!(json["time_constraint"], "deep_dive");
    }

    #[test]
    fn matches_compares_hashes() {
        let intent = Intent {
            primary_goal: PrimaryGoal::Learn,
            learning_stage: LearningStage::Beginner,
            project_type: "api".into(),
            urgency_level: UrgencyLevel::Low,
            specific_technologies: vec![],
            complexity_preference: ComplexityPreference::Simple,
            time_constraint: TimeConstraint::QuickTutorial,
            focus_areas: vec![],
            context_hash: "h1".into(),
            confidence_score: 0.4,
            updated_at: Utc::now(),
        };
        assert!(intent.matches("h1"));
        assert!(!intent.matches("h2"));
    }
}
