//! Response schemas for the three structured LLM calls.
//!
//! OpenAPI-style schema objects passed as Gemini's `response_schema`.
//! Required-field lists drive client-side validation too.

use serde_json::{json, Value};

/// Schema for content analysis of a saved page.
pub fn content_analysis() -> Value {
    json!({
        "type": "object",
        "properties": {
            "technologies": { "type": "array", "items": { "type": "string" } },
            "content_type": {
                "type": "string",
                "enum": ["tutorial", "documentation", "article", "video", "course", "guide", "reference"],
            },
            "difficulty": {
                "type": "string",
                "enum": ["beginner", "intermediate", "advanced"],
            },
            "key_concepts": { "type": "array", "items": { "type": "string" } },
            "relevance_score": { "type": "integer", "minimum": 0, "maximum": 100 },
            "learning_path": { "type": "string" },
            "project_applicability": { "type": "string" },
            "skill_development": { "type": "string" },
        },
        "required": ["technologies", "content_type", "difficulty", "key_concepts", "relevance_score"],
    })
}

/// Schema for intent analysis of a project or free-text query.
pub fn intent() -> Value {
    json!({
        "type": "object",
        "properties": {
            "primary_goal": { "type": "string", "enum": ["learn", "build", "solve", "optimize"] },
            "learning_stage": { "type": "string", "enum": ["beginner", "intermediate", "advanced"] },
            "project_type": { "type": "string" },
            "urgency_level": { "type": "string", "enum": ["low", "medium", "high"] },
            "specific_technologies": { "type": "array", "items": { "type": "string" } },
            "complexity_preference": { "type": "string", "enum": ["simple", "moderate", "complex"] },
            "time_constraint": { "type": "string", "enum": ["quick_tutorial", "deep_dive", "reference"] },
            "focus_areas": { "type": "array", "items": { "type": "string" } },
            "confidence_score": { "type": "number", "minimum": 0, "maximum": 1 },
        },
        "required": [
            "primary_goal", "learning_stage", "project_type", "urgency_level",
            "specific_technologies", "complexity_preference", "time_constraint",
            "focus_areas", "confidence_score",
        ],
    })
}

/// Schema for a one-line recommendation explanation.
pub fn explanation() -> Value {
    json!({
        "type": "object",
        "properties": {
            "reason": { "type": "string" },
        },
        "required": ["reason"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemas_declare_required_fields() {
        for schema in [content_analysis(), intent(), explanation()] {
            assert_eq!(schema["type"], "object");
            assert!(schema["required"].as_array().map(|a| !a.is_empty()).unwrap_or(false));
        }
    }
}
