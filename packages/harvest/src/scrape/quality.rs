//! Deterministic 0–10 content quality heuristic.
//!
//! Weights are part of the storage contract: cached quality scores are
//! only comparable across versions if this function is stable. Any change
//! here invalidates persisted scores.

use super::extract::ExtractedContent;

/// Markers that indicate an error page, bot wall, or paywall.
const ERROR_MARKERS: &[&str] = &[
    "access denied",
    "enable javascript",
    "please verify you are a human",
    "captcha",
    "404 not found",
    "page not found",
    "subscribe to continue",
    "sign in to continue",
    "paywall",
];

/// Score extracted content on a 0–10 scale.
///
/// Components:
/// - body length: up to 4 points
/// - headings: up to 2 points
/// - code blocks: up to 2 points
/// - content-to-markup ratio: up to 2 points
/// - error/paywall markers: −3 points
pub fn quality_score(content: &ExtractedContent) -> u8 {
    let text = content.markdown.trim();
    let mut score: i32 = 0;

    score += match text.chars().count() {
        n if n >= 8_000 => 4,
        n if n >= 3_000 => 3,
        n if n >= 1_000 => 2,
        n if n >= 300 => 1,
        _ => 0,
    };

    score += match content.headings.len() {
        n if n >= 5 => 2,
        n if n >= 1 => 1,
        _ => 0,
    };

    if has_code_blocks(text) {
        score += 2;
    }

    score += match content.content_ratio {
        r if r >= 0.25 => 2,
        r if r >= 0.10 => 1,
        _ => 0,
    };

    let lower = text.to_lowercase();
    if ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
        score -= 3;
    }

    score.clamp(0, 10) as u8
}

fn has_code_blocks(markdown: &str) -> bool {
    markdown.contains("```") || markdown.contains("<pre") || markdown.contains("    fn ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(markdown: &str, headings: usize, ratio: f32) -> ExtractedContent {
        ExtractedContent {
            title: None,
            meta_description: None,
            headings: (0..headings).map(|i| format!("H{}", i)).collect(),
            markdown: markdown.to_string(),
            content_ratio: ratio,
        }
    }

    #[test]
    fn empty_content_scores_zero() {
        assert_eq!(quality_score(&content("", 0, 0.0)), 0);
    }

    #[test]
    fn rich_content_scores_high() {
        let body = format!("Intro paragraph.\n```rust\nfn main() {{}}\n```\n{}", "word ".repeat(2_000));
        let score = quality_score(&content(&body, 6, 0.3));
        assert!(score >= 8, "expected >= 8, got {}", score);
    }

    #[test]
    fn error_markers_penalize() {
        let good = "word ".repeat(700);
        let bad = format!("{} please verify you are a human", good);
        let good_score = quality_score(&content(&good, 2, 0.2));
        let bad_score = quality_score(&content(&bad, 2, 0.2));
        assert!(bad_score < good_score);
    }

    #[test]
    fn score_is_monotonic_in_length() {
        let short = quality_score(&content(&"w ".repeat(200), 0, 0.15));
        let long = quality_score(&content(&"w ".repeat(5_000), 0, 0.15));
        assert!(long >= short);
    }

    #[test]
    fn score_never_exceeds_ten() {
        let body = format!("```code```{}", "x".repeat(20_000));
        assert!(quality_score(&content(&body, 20, 0.9)) <= 10);
    }

    #[test]
    fn score_is_deterministic() {
        let c = content(&"stable text ".repeat(300), 3, 0.2);
        assert_eq!(quality_score(&c), quality_score(&c));
    }
}
