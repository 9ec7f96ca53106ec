//! Prompt builders for the three structured LLM calls.
//!
//! Prompts are plain functions of their inputs so they stay testable and
//! diffable. Body text is excerpted well below model context limits.

use crate::types::analysis::AnalysisRequest;

/// How much body text the analysis prompt includes.
const ANALYSIS_BODY_CHARS: usize = 12_000;

/// Build the content-analysis prompt for one saved page.
pub fn content_analysis(request: &AnalysisRequest) -> String {
    let body: String = request.body.chars().take(ANALYSIS_BODY_CHARS).collect();
    format!(
        "You are cataloguing a developer's saved bookmark.\n\
         Analyze the page below and return JSON describing it.\n\
         - technologies: lowercase names of languages/frameworks/tools it covers\n\
         - content_type: one of tutorial, documentation, article, video, course, guide, reference\n\
         - difficulty: beginner, intermediate, or advanced\n\
         - key_concepts: 3-8 short phrases\n\
         - relevance_score: 0-100, how useful this is as a working resource\n\
         Optionally: learning_path, project_applicability, skill_development.\n\n\
         URL: {}\n\
         Title: {}\n\n\
         Page content:\n{}",
        request.url,
        request.title.as_deref().unwrap_or("(none)"),
        body,
    )
}

/// Build the intent-analysis prompt for a project description or query.
pub fn intent(context_text: &str) -> String {
    format!(
        "A developer described what they are working on. Infer their intent \
         and return JSON.\n\
         - primary_goal: learn, build, solve, or optimize\n\
         - learning_stage: beginner, intermediate, or advanced\n\
         - project_type: short snake_case label (web_app, mobile_app, api, data_science, automation, ...)\n\
         - urgency_level: low, medium, or high\n\
         - specific_technologies: lowercase technology names they mentioned or implied\n\
         - complexity_preference: simple, moderate, or complex\n\
         - time_constraint: quick_tutorial, deep_dive, or reference\n\
         - focus_areas: topical areas to prioritize\n\
         - confidence_score: 0-1, your confidence in this reading\n\n\
         Their description:\n{}",
        context_text,
    )
}

/// Build the explanation prompt for one recommendation.
///
/// `top_components` are the dominant score components, strongest first.
pub fn explanation(
    goal: &str,
    candidate_title: &str,
    candidate_technologies: &[String],
    candidate_difficulty: Option<&str>,
    top_components: &[(&str, f32)],
) -> String {
    let components = top_components
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "In at most 40 words, tell a developer why this saved bookmark fits \
         what they are doing. Be conversational, no scores or percentages. \
         Return JSON with a single \"reason\" field.\n\n\
         Their goal: {}\n\
         Bookmark: {}\n\
         Technologies: {}\n\
         Difficulty: {}\n\
         Strongest signals: {}",
        goal,
        candidate_title,
        candidate_technologies.join(", "),
        candidate_difficulty.unwrap_or("unknown"),
        components,
    )
}
