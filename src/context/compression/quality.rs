//! Structural Quality Scoring
//!
//! Pure function of (original, compressed) text, 0-100:
//! - heading retention (35%)
//! - key-term retention, top 20 terms of the original (45%)
//! - cross-reference integrity: markdown links, `[[wiki]]` links, `§` refs (20%)
//!
//! A dimension with nothing to preserve scores as fully retained.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::constants::compression::{KEY_TERM_COUNT, MIN_TERM_LEN, weights};
use crate::types::{is_heading, term_frequencies, top_terms};

static CROSS_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[[^\]]+\]\]|\[[^\]]+\]\([^)]+\)|§\s*[\w.\-]+").unwrap()
});

/// Per-dimension retention (each 0.0-1.0) and the weighted score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub headings: f64,
    pub key_terms: f64,
    pub cross_references: f64,
    /// Weighted score, 0-100
    pub overall: f64,
}

fn retained<'a>(wanted: impl IntoIterator<Item = &'a str>, present: impl Fn(&str) -> bool) -> f64 {
    let wanted: Vec<&str> = wanted.into_iter().collect();
    if wanted.is_empty() {
        return 1.0;
    }
    wanted.iter().filter(|w| present(w)).count() as f64 / wanted.len() as f64
}

pub fn headings(text: &str) -> Vec<&str> {
    text.lines().filter(|l| is_heading(l)).map(str::trim).collect()
}

pub fn cross_references(text: &str) -> Vec<&str> {
    CROSS_REFERENCE.find_iter(text).map(|m| m.as_str()).collect()
}

pub fn breakdown(original: &str, compressed: &str) -> QualityBreakdown {
    let kept_headings: HashSet<&str> = headings(compressed).into_iter().collect();
    let headings_score = retained(headings(original), |h| kept_headings.contains(h));

    let kept_terms = term_frequencies(compressed, MIN_TERM_LEN);
    let terms = top_terms(original, MIN_TERM_LEN, KEY_TERM_COUNT);
    let key_terms_score = retained(terms.iter().map(String::as_str), |t| kept_terms.contains_key(t));

    let kept_refs: HashSet<&str> = cross_references(compressed).into_iter().collect();
    let refs_score = retained(cross_references(original), |r| kept_refs.contains(r));

    let overall = 100.0
        * (weights::HEADINGS * headings_score
            + weights::KEY_TERMS * key_terms_score
            + weights::CROSS_REFERENCES * refs_score);

    QualityBreakdown {
        headings: headings_score,
        key_terms: key_terms_score,
        cross_references: refs_score,
        overall: overall.clamp(0.0, 100.0),
    }
}

/// Weighted structural quality of `compressed` relative to `original` (0-100)
pub fn score_quality(original: &str, compressed: &str) -> f64 {
    breakdown(original, compressed).overall
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Charter\n\nThe sponsor approves the budget. See [scope](scope.md) and [[risk-register]].\n\n## Milestones\n\nKickoff per §4.2 of the contract.";

    #[test]
    fn test_identity_scores_full() {
        assert!((score_quality(DOC, DOC) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_compression_scores_low() {
        let b = breakdown(DOC, "");
        assert_eq!(b.headings, 0.0);
        assert_eq!(b.key_terms, 0.0);
        assert_eq!(b.cross_references, 0.0);
        assert_eq!(b.overall, 0.0);
    }

    #[test]
    fn test_cross_reference_detection() {
        let refs = cross_references(DOC);
        assert_eq!(refs, vec!["[scope](scope.md)", "[[risk-register]]", "§4.2"]);
    }

    #[test]
    fn test_partial_retention() {
        let compressed = "# Charter\n\n## Milestones\n";
        let b = breakdown(DOC, compressed);
        assert_eq!(b.headings, 1.0);
        assert_eq!(b.cross_references, 0.0);
        assert!(b.key_terms > 0.0 && b.key_terms < 1.0);
        assert!(b.overall > 35.0 && b.overall < 80.0);
    }

    #[test]
    fn test_plain_text_without_structure() {
        // No headings or references: only key terms matter
        let b = breakdown("alpha beta gamma delta", "alpha beta gamma delta");
        assert!((b.overall - 100.0).abs() < 1e-9);
        assert!(score_quality("alpha beta gamma delta", "alpha beta") < 100.0);
    }
}
