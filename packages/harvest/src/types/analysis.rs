//! AI content analysis — the structured summary attached to a bookmark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of resource a page is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Tutorial,
    Documentation,
    Article,
    Video,
    Course,
    Guide,
    Reference,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Tutorial => "tutorial",
            ContentType::Documentation => "documentation",
            ContentType::Article => "article",
            ContentType::Video => "video",
            ContentType::Course => "course",
            ContentType::Guide => "guide",
            ContentType::Reference => "reference",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tutorial" => Some(ContentType::Tutorial),
            "documentation" | "docs" => Some(ContentType::Documentation),
            "article" | "blog" => Some(ContentType::Article),
            "video" => Some(ContentType::Video),
            "course" => Some(ContentType::Course),
            "guide" => Some(ContentType::Guide),
            "reference" => Some(ContentType::Reference),
            _ => None,
        }
    }
}

/// Difficulty level of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

/// LLM-derived structured summary of one saved page.
///
/// Produced asynchronously by the background analyzer, at most once per
/// bookmark unless a re-analysis is forced. Downstream scoring degrades
/// gracefully when it is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentAnalysis {
    /// Technologies the page covers ("python", "react", ...)
    pub technologies: Vec<String>,

    /// Kind of resource
    pub content_type: ContentType,

    /// Difficulty level
    pub difficulty: Difficulty,

    /// Key concepts the page teaches or documents
    pub key_concepts: Vec<String>,

    /// How useful the page is as a learning/working resource, 0–100
    pub relevance_score: u8,

    /// Suggested position in a learning path, if the model offered one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_path: Option<String>,

    /// What kinds of projects this applies to, if offered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_applicability: Option<String>,

    /// Which skill this develops, if offered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_development: Option<String>,

    /// When the analysis was produced
    pub analyzed_at: DateTime<Utc>,
}

impl ContentAnalysis {
    /// Clamp fields the LLM may have exceeded into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.relevance_score = self.relevance_score.min(100);
        self.technologies = self
            .technologies
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }
}

/// Input to the content-analysis prompt.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub url: String,
    pub title: Option<String>,
    /// Body excerpt; callers cap this well below the model context
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_round_trips_known_values() {
        for s in [
            "tutorial",
            "documentation",
            "article",
            "video",
            "course",
            "guide",
            "reference",
        ] {
            let parsed = ContentType::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert!(ContentType::parse("podcast").is_none());
    }

    #[test]
    fn difficulty_parse_is_case_insensitive() {
        assert_eq!(Difficulty::parse("Beginner"), Some(Difficulty::Beginner));
        assert_eq!(Difficulty::parse("ADVANCED"), Some(Difficulty::Advanced));
        assert!(Difficulty::parse("expert").is_none());
    }

    #[test]
    fn normalized_clamps_and_lowercases() {
        let analysis = ContentAnalysis {
            technologies: vec!["Python ".into(), "".into(), "React".into()],
            content_type: ContentType::Tutorial,
            difficulty: Difficulty::Beginner,
            key_concepts: vec![],
            relevance_score: 140,
            learning_path: None,
            project_applicability: None,
            skill_development: None,
            analyzed_at: Utc::now(),
        }
        .normalized();

        assert_eq!(analysis.relevance_score, 100);
        assert_eq!(analysis.technologies, vec!["python", "react"]);
    }
}
