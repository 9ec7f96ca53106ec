//! The canonical embedding-text recipe.
//!
//! The same recipe is used when a bookmark is stored and when a query is
//! embedded against it; changing the recipe invalidates every stored
//! embedding and requires reprocessing.

/// How much leading body text the recipe includes.
const BODY_HEAD_CHARS: usize = 5_000;

/// How much trailing body text the recipe includes.
const BODY_TAIL_CHARS: usize = 1_000;

/// The fields the recipe draws from, in priority order.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingSource<'a> {
    pub title: Option<&'a str>,
    pub meta_description: Option<&'a str>,
    pub headings: &'a [String],
    pub user_notes: Option<&'a str>,
    pub body: &'a str,
}

/// Assemble the canonical text a bookmark (or query against it) is
/// embedded from: title, meta description, headings, user notes, then
/// the first 5k and last 1k characters of the body.
pub fn embedding_text(source: &EmbeddingSource<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(title) = source.title.map(str::trim).filter(|t| !t.is_empty()) {
        parts.push(title.to_string());
    }
    if let Some(meta) = source.meta_description.map(str::trim).filter(|m| !m.is_empty()) {
        parts.push(meta.to_string());
    }
    if !source.headings.is_empty() {
        parts.push(source.headings.join("\n"));
    }
    if let Some(notes) = source.user_notes.map(str::trim).filter(|n| !n.is_empty()) {
        parts.push(notes.to_string());
    }

    let body = source.body.trim();
    if !body.is_empty() {
        let chars: Vec<char> = body.chars().collect();
        let head: String = chars.iter().take(BODY_HEAD_CHARS).collect();
        parts.push(head);

        if chars.len() > BODY_HEAD_CHARS + BODY_TAIL_CHARS {
            let tail: String = chars[chars.len() - BODY_TAIL_CHARS..].iter().collect();
            parts.push(tail);
        }
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_orders_fields_by_priority() {
        let headings = vec!["Install".to_string(), "Usage".to_string()];
        let source = EmbeddingSource {
            title: Some("Flask Docs"),
            meta_description: Some("A web framework"),
            headings: &headings,
            user_notes: Some("for the API project"),
            body: "Flask is a lightweight framework.",
        };
        let text = embedding_text(&source);

        let title_pos = text.find("Flask Docs").unwrap();
        let meta_pos = text.find("A web framework").unwrap();
        let heading_pos = text.find("Install").unwrap();
        let notes_pos = text.find("for the API project").unwrap();
        let body_pos = text.find("lightweight framework").unwrap();

        assert!(title_pos < meta_pos);
        assert!(meta_pos < heading_pos);
        assert!(heading_pos < notes_pos);
        assert!(notes_pos < body_pos);
    }

    #[test]
    fn recipe_takes_head_and_tail_of_long_bodies() {
        let body = format!("{}{}{}", "A".repeat(BODY_HEAD_CHARS), "B".repeat(10_000), "Z".repeat(BODY_TAIL_CHARS));
        let source = EmbeddingSource {
            body: &body,
            ..Default::default()
        };
        let text = embedding_text(&source);

        assert!(text.contains(&"A".repeat(BODY_HEAD_CHARS)));
        assert!(text.contains(&"Z".repeat(BODY_TAIL_CHARS)));
        assert!(!text.contains(&"B".repeat(200)));
    }

    #[test]
    fn recipe_skips_empty_fields() {
        let source = EmbeddingSource {
            title: Some("  "),
            body: "only body",
            ..Default::default()
        };
        assert_eq!(embedding_text(&source), "only body");
    }

    #[test]
    fn recipe_is_deterministic() {
        let source = EmbeddingSource {
            title: Some("T"),
            body: "stable",
            ..Default::default()
        };
        assert_eq!(embedding_text(&source), embedding_text(&source));
    }
}
