use sha2::{Digest, Sha256};

/// Normalize free text before fingerprinting.
///
/// Rules:
/// - lowercase
/// - drop all non-alphanumeric characters (except spaces)
/// - collapse runs of whitespace into single spaces
/// - trim
///
/// This keeps the hash robust against formatting churn while still
/// changing when the meaning of the context changes.
pub fn normalize_context(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fingerprint of a user context (project description, query text).
///
/// Intents are valid only against a matching hash; recommendation cache
/// keys reuse it.
pub fn context_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_context(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_same_hash() {
        assert_eq!(
            context_hash("Build a REST API with Flask"),
            context_hash("Build a REST API with Flask")
        );
    }

    #[test]
    fn case_and_punctuation_insensitive() {
        let a = context_hash("Build a REST API, with Flask!");
        let b = context_hash("build a rest api with flask");
        assert_eq!(a, b);
    }

    #[test]
    fn whitespace_normalized() {
        let a = context_hash("  build   an api  ");
        let b = context_hash("build an api");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(context_hash("learn rust"), context_hash("learn go"));
    }

    #[test]
    fn word_order_matters() {
        assert_ne!(context_hash("flask rest api"), context_hash("api rest flask"));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let hash = context_hash("anything");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
