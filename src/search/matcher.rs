//! Fuzzy title matching.
//!
//! Both sides are normalized first (lowercase, any non-alphanumeric character
//! is a separator, whitespace collapsed), so punctuation, underscores and CJK
//! full-width commas never affect the score. A normalized query contained in
//! the normalized name scores exactly 1.0. Otherwise each query keyword
//! scores 1.0 when contained in the name, or its best normalized Levenshtein
//! similarity against the name's tokens; the mean is scaled below 1.0.

use crate::models::{Match, RawCandidate};

pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.5;

/// Fuzzy scores never reach the substring score.
const FUZZY_CEILING: f32 = 0.95;

/// Lowercase, replace every non-alphanumeric char with a space, collapse runs
/// of whitespace. Idempotent.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity of `raw_name` to `query` in `[0, 1]`.
pub fn score(raw_name: &str, query: &str) -> f32 {
    let name = normalize(raw_name);
    let query = normalize(query);
    if name.is_empty() || query.is_empty() {
        return 0.0;
    }
    if name.contains(&query) {
        return 1.0;
    }

    let tokens: Vec<&str> = name.split(' ').collect();
    let keywords: Vec<&str> = query.split(' ').collect();
    let total: f32 = keywords
        .iter()
        .map(|kw| keyword_similarity(kw, &name, &tokens))
        .sum();

    FUZZY_CEILING * total / keywords.len() as f32
}

fn keyword_similarity(keyword: &str, name: &str, tokens: &[&str]) -> f32 {
    if name.contains(keyword) {
        return 1.0;
    }
    tokens
        .iter()
        .map(|token| strsim::normalized_levenshtein(keyword, token) as f32)
        .fold(0.0, f32::max)
}

/// Scores candidates and keeps those at or above the acceptance threshold.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPTANCE_THRESHOLD)
    }
}

impl Matcher {
    pub fn new(threshold: f32) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_ACCEPTANCE_THRESHOLD
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Turn a candidate into a `Match`, or `None` if it scores too low.
    pub fn evaluate(
        &self,
        candidate: RawCandidate,
        query: &str,
        source_display_name: &str,
    ) -> Option<Match> {
        let score = score(&candidate.raw_name, query);
        if score < self.threshold || score <= 0.0 {
            return None;
        }
        Some(Match {
            candidate,
            score,
            matched_query: query.to_string(),
            source_display_name: source_display_name.to_string(),
            source_order: 0,
            listing_order: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str) -> RawCandidate {
        RawCandidate {
            source_id: "owner/repo".to_string(),
            path: format!("books/{name}"),
            raw_name: name.to_string(),
            download_url: format!("https://example.com/{name}"),
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Learning   Python.EPUB "), "learning python epub");
        assert_eq!(normalize("python_cookbook-3rd"), "python cookbook 3rd");
        assert_eq!(normalize("深入理解，计算机系统"), "深入理解 计算机系统");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in ["Learning Python.epub", "A  B\tC", "深入理解，计算机", "Ünïcödé-Title"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_substring_scores_one() {
        assert_eq!(score("Learning Python.epub", "Python"), 1.0);
        assert_eq!(score("python_cookbook.pdf", "PYTHON"), 1.0);
        assert_eq!(score("Learning_Python.epub", "learning   python"), 1.0);
        assert_eq!(score("深入理解计算机系统.epub", "计算机系统"), 1.0);
    }

    #[test]
    fn test_reordered_keywords_score_below_one() {
        let s = score("Learning Python.epub", "python learning");
        assert!(s < 1.0);
        assert!(s >= 0.9);
    }

    #[test]
    fn test_typo_still_accepted() {
        let s = score("Learning Python.epub", "pyhton");
        assert!(s < 1.0);
        assert!(s >= DEFAULT_ACCEPTANCE_THRESHOLD, "score was {s}");
    }

    #[test]
    fn test_unrelated_rejected() {
        let s = score("Learning Python.epub", "rust");
        assert!(s < DEFAULT_ACCEPTANCE_THRESHOLD, "score was {s}");
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(score("", "python"), 0.0);
        assert_eq!(score("python.epub", "  "), 0.0);
    }

    #[test]
    fn test_score_matches_score_of_normalized_inputs() {
        let pairs = [
            ("Learning Python.epub", "  PYTHON "),
            ("The_Rust-Programming_Language.pdf", "rust  programing"),
            ("深入理解计算机系统.epub", "深入，系统"),
            ("Clean Code.mobi", "cleen kode"),
        ];
        for (name, query) in pairs {
            assert_eq!(
                score(name, query),
                score(&normalize(name), &normalize(query)),
                "{name} / {query}"
            );
        }
    }

    #[test]
    fn test_score_in_unit_range() {
        for (name, query) in [("a.epub", "abcdefgh"), ("x", "x y z"), ("abc", "abd")] {
            let s = score(name, query);
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_matcher_threshold() {
        let matcher = Matcher::new(0.5);
        let m = matcher
            .evaluate(candidate("Learning Python.epub"), "Python", "iBook")
            .unwrap();
        assert_eq!(m.score, 1.0);
        assert_eq!(m.matched_query, "Python");
        assert_eq!(m.source_display_name, "iBook");
        assert!(matcher
            .evaluate(candidate("Learning Python.epub"), "rust", "iBook")
            .is_none());

        let strict = Matcher::new(1.0);
        assert!(strict
            .evaluate(candidate("Learning Python.epub"), "pyhton", "iBook")
            .is_none());
    }

    #[test]
    fn test_matcher_threshold_sanitized() {
        assert_eq!(Matcher::new(f32::NAN).threshold(), DEFAULT_ACCEPTANCE_THRESHOLD);
        assert_eq!(Matcher::new(-1.0).threshold(), 0.0);
    }

    #[test]
    fn test_zero_threshold_still_drops_zero_scores() {
        let matcher = Matcher::new(0.0);
        assert!(matcher.evaluate(candidate("---"), "python", "x").is_none());
    }
}
