//! Skill-gap analysis.
//!
//! Infers what a user already knows from their analyzed library, holds
//! a static technology prerequisite graph, and boosts candidates that
//! fill the gaps between the two. Applied after personalization.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domains::content::models::bookmark::ContentWithAnalysis;
use crate::domains::recommend::engines::candidate_technologies;
use crate::domains::recommend::types::ScoredCandidate;

/// A technology counts as known once it appears in this many analyses.
const KNOWN_MIN_OCCURRENCES: usize = 2;

/// Analyses under this relevance don't count toward knowing something.
const KNOWN_MIN_RELEVANCE: i16 = 40;

/// Gap-filling candidates get up to this much.
const GAP_BOOST: f32 = 0.15;

/// Prerequisites for common technologies. Order within a slice is the
/// suggested learning order.
fn prerequisites(tech: &str) -> &'static [&'static str] {
    match tech {
        "react" | "vue" | "angular" | "svelte" => &["javascript", "html", "css"],
        "nextjs" | "next.js" => &["react", "javascript"],
        "typescript" => &["javascript"],
        "django" | "flask" | "fastapi" => &["python"],
        "rails" => &["ruby"],
        "spring" => &["java"],
        "axum" | "actix" | "tokio" => &["rust"],
        "express" | "nestjs" => &["javascript", "nodejs"],
        "pytorch" | "tensorflow" | "scikit-learn" | "pandas" | "numpy" => &["python"],
        "kubernetes" => &["docker"],
        "terraform" => &["aws"],
        "graphql" => &["api design"],
        "sqlalchemy" => &["python", "sql"],
        _ => &[],
    }
}

/// What the analyzer inferred for one user against one target set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillGapReport {
    /// Technology -> dominant difficulty level seen in the library
    pub known: HashMap<String, String>,
    /// Prerequisites of the targets the user hasn't covered
    pub missing_prerequisites: Vec<String>,
    /// Target technologies not yet known
    pub recommended_next_steps: Vec<String>,
    /// Missing prerequisites first, then the targets, deduplicated
    pub learning_path: Vec<String>,
}

impl SkillGapReport {
    /// Technologies whose presence on a candidate earns the boost.
    fn boost_set(&self) -> HashSet<&str> {
        self.missing_prerequisites
            .iter()
            .chain(self.recommended_next_steps.iter())
            .map(String::as_str)
            .collect()
    }
}

pub struct SkillGapAnalyzer;

impl SkillGapAnalyzer {
    /// Build a report from the user's analyzed library and the intent's
    /// target technologies.
    pub fn analyze(library: &[ContentWithAnalysis], targets: &[String]) -> SkillGapReport {
        // Count technology occurrences across sufficiently relevant analyses
        let mut occurrences: HashMap<String, Vec<String>> = HashMap::new();
        for item in library {
            let relevant = item
                .relevance_score
                .map(|r| r >= KNOWN_MIN_RELEVANCE)
                .unwrap_or(false);
            if !relevant {
                continue;
            }
            let difficulty = item
                .difficulty_level
                .clone()
                .unwrap_or_else(|| "intermediate".to_string());
            for tech in candidate_technologies(item) {
                occurrences.entry(tech).or_default().push(difficulty.clone());
            }
        }

        let known: HashMap<String, String> = occurrences
            .into_iter()
            .filter(|(_, difficulties)| difficulties.len() >= KNOWN_MIN_OCCURRENCES)
            .map(|(tech, difficulties)| {
                let level = dominant_level(&difficulties);
                (tech, level)
            })
            .collect();

        let targets: Vec<String> = targets
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut missing_prerequisites = Vec::new();
        let mut recommended_next_steps = Vec::new();

        for target in &targets {
            if !known.contains_key(target) && !recommended_next_steps.contains(target) {
                recommended_next_steps.push(target.clone());
            }
            for prereq in prerequisites(target) {
                let prereq = prereq.to_string();
                if !known.contains_key(&prereq) && !missing_prerequisites.contains(&prereq) {
                    missing_prerequisites.push(prereq);
                }
            }
        }

        let mut learning_path = Vec::new();
        for tech in missing_prerequisites.iter().chain(recommended_next_steps.iter()) {
            if !learning_path.contains(tech) {
                learning_path.push(tech.clone());
            }
        }

        SkillGapReport {
            known,
            missing_prerequisites,
            recommended_next_steps,
            learning_path,
        }
    }

    /// Boost candidates that teach something from the gap, up to +15%.
    /// Scores stay within [0, 100]; ordering is re-derived afterwards.
    pub fn boost(report: &SkillGapReport, mut scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let boost_set = report.boost_set();
        if boost_set.is_empty() {
            return scored;
        }

        for candidate in &mut scored {
            let fills_gap = candidate_technologies(&candidate.content)
                .iter()
                .any(|t| boost_set.contains(t.as_str()));
            if fills_gap {
                candidate.score = (candidate.score * (1.0 + GAP_BOOST)).clamp(0.0, 100.0);
            }
        }
        crate::domains::recommend::engines::sort_scored(&mut scored);
        scored
    }
}

fn dominant_level(difficulties: &[String]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for d in difficulties {
        *counts.entry(d.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(level, count)| (count, level_rank(level)))
        .map(|(level, _)| level.to_string())
        .unwrap_or_else(|| "intermediate".to_string())
}

fn level_rank(level: &str) -> u8 {
    match level {
        "beginner" => 0,
        "intermediate" => 1,
        "advanced" => 2,
        _ => 1,
    }
}
