//! Query normalization and word-set similarity used for cache keys

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Normalize a query for keying: lowercase, strip punctuation, collapse whitespace
pub fn normalize_query(query: &str) -> String {
    let mut result = String::with_capacity(query.len());
    let mut last_was_space = true;

    for c in query.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
        } else if c.is_alphanumeric() {
            result.push(c);
            last_was_space = false;
        }
    }

    if result.ends_with(' ') {
        result.pop();
    }

    result
}

/// Intersection-over-union of the word sets of two normalized queries.
///
/// Returns 0.0 when both sides are empty.
pub fn word_set_similarity(a: &str, b: &str) -> f64 {
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    intersection as f64 / union as f64
}

/// Hash a normalized query into a short hex identifier
pub fn hash_query(normalized: &str) -> String {
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_query("  How many   RECIPES exist?! "),
            "how many recipes exist"
        );
    }

    #[test]
    fn test_normalize_keeps_polish_letters() {
        assert_eq!(
            normalize_query("Ile jest receptur w systemie? Żółć."),
            "ile jest receptur w systemie żółć"
        );
    }

    #[test]
    fn test_similarity_identical_after_normalization() {
        let a = normalize_query("How many recipes exist?");
        let b = normalize_query("how many recipes exist");
        assert!((word_set_similarity(&a, &b) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_partial_overlap() {
        // {a, b, c, d} vs {a, b, c, e}: 3 / 5
        let sim = word_set_similarity("a b c d", "a b c e");
        assert!((sim - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_empty() {
        assert_eq!(word_set_similarity("", ""), 0.0);
        assert_eq!(word_set_similarity("word", ""), 0.0);
    }

    #[test]
    fn test_hash_is_stable_within_process() {
        assert_eq!(hash_query("ile jest receptur"), hash_query("ile jest receptur"));
        assert_ne!(hash_query("ile jest receptur"), hash_query("ile jest zamówień"));
    }
}
