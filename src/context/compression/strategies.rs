//! Per-document compression strategies.
//!
//! Deterministic strategies (template, keyword, hybrid) are pure functions of
//! the content and the token target. Summarizer-backed strategies delegate
//! to the injected `Summarizer`.

use crate::ai::{Summarizer, TokenEstimator, fit_to_tokens};
use crate::constants::compression::MIN_TERM_LEN;
use crate::types::{Result, is_heading, split_sentences, term_frequencies};

/// Compressed text plus the summarizer's self-reported quality, if any
pub struct Compressed {
    pub text: String,
    pub summarizer_quality: Option<f64>,
}

impl Compressed {
    pub fn plain(text: String) -> Self {
        Self {
            text,
            summarizer_quality: None,
        }
    }
}

/// Headings plus the first sentence of each section.
///
/// The output does not depend on the target, so it either meets a ratio or
/// it does not.
pub fn template_based(content: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut need_sentence = true;
    for line in content.lines() {
        if is_heading(line) {
            out.push(line.trim());
            need_sentence = true;
        } else if need_sentence && !line.trim().is_empty() {
            if let Some(first) = split_sentences(line).into_iter().next() {
                out.push(first);
                need_sentence = false;
            }
        }
    }
    out.join("\n")
}

/// Lines ranked by the summed frequency of their terms, admitted as the
/// longest rank-order prefix that fits `target_tokens`, emitted in document
/// order.
///
/// A larger target never admits fewer lines, so output size is monotonic in
/// the target.
pub fn keyword_extraction(
    content: &str,
    estimator: &dyn TokenEstimator,
    target_tokens: u64,
) -> String {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    keyword_lines(&lines, content, estimator, target_tokens)
}

fn keyword_lines(
    lines: &[&str],
    scoring_text: &str,
    estimator: &dyn TokenEstimator,
    target_tokens: u64,
) -> String {
    if lines.is_empty() {
        return String::new();
    }

    let freq = term_frequencies(scoring_text, MIN_TERM_LEN);
    let mut ranked: Vec<(usize, usize)> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let score = line
                .split(|c: char| !c.is_alphanumeric())
                .filter_map(|w| freq.get(&w.to_lowercase()))
                .sum::<usize>();
            (i, score)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let ranked: Vec<usize> = ranked.into_iter().map(|(i, _)| i).collect();

    let render = |count: usize| -> String {
        let mut picked: Vec<usize> = ranked[..count].to_vec();
        picked.sort_unstable();
        picked.iter().map(|&i| lines[i]).collect::<Vec<_>>().join("\n")
    };

    // Largest prefix length whose rendering fits
    let (mut lo, mut hi) = (0usize, ranked.len());
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if estimator.estimate(&render(mid)) <= target_tokens {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    render(lo)
}

/// Summarize the whole document at `ratio`
pub async fn semantic_compression(
    content: &str,
    summarizer: &dyn Summarizer,
    ratio: f64,
) -> Result<Compressed> {
    let summary = summarizer.summarize(content, ratio).await?;
    Ok(Compressed {
        text: summary.text,
        summarizer_quality: Some(summary.quality_score),
    })
}

/// Two-level summary: each section at `sqrt(ratio)`, then the joined
/// section summaries at `sqrt(ratio)` again.
pub async fn hierarchical_summarization(
    content: &str,
    summarizer: &dyn Summarizer,
    ratio: f64,
) -> Result<Compressed> {
    let level_ratio = ratio.clamp(0.0, 1.0).sqrt();
    let mut quality = 100.0f64;
    let mut partials = Vec::new();
    for section in split_sections(content) {
        let summary = summarizer.summarize(section, level_ratio).await?;
        quality = quality.min(summary.quality_score);
        if !summary.text.trim().is_empty() {
            partials.push(summary.text);
        }
    }
    let top = summarizer.summarize(&partials.join("\n\n"), level_ratio).await?;
    quality = quality.min(top.quality_score);
    Ok(Compressed {
        text: top.text,
        summarizer_quality: Some(quality),
    })
}

/// Template skeleton, then keyword lines in the remaining budget, then a
/// boundary truncation to the target.
pub fn hybrid_compression(
    content: &str,
    estimator: &dyn TokenEstimator,
    target_tokens: u64,
) -> String {
    let skeleton = template_based(content);
    let used = estimator.estimate(&skeleton);
    let remaining = target_tokens.saturating_sub(used);

    let skeleton_lines: std::collections::HashSet<&str> = skeleton.lines().collect();
    let extra: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty() && !skeleton_lines.contains(l.trim()))
        .collect();
    let keywords = keyword_lines(&extra, content, estimator, remaining);

    let combined = if keywords.is_empty() {
        skeleton
    } else if skeleton.is_empty() {
        keywords
    } else {
        format!("{skeleton}\n{keywords}")
    };
    fit_to_tokens(estimator, &combined, target_tokens).to_string()
}

/// Sections starting at each heading; text before the first heading is its
/// own section
pub fn split_sections(content: &str) -> Vec<&str> {
    let mut starts = vec![0];
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if offset > 0 && is_heading(line) {
            starts.push(offset);
        }
        offset += line.len();
    }
    starts.push(content.len());
    starts
        .windows(2)
        .map(|w| content[w[0]..w[1]].trim())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CharRatioEstimator, ExtractiveSummarizer};

    const DOC: &str = "# Scope\nThe project delivers a portal. It has three phases.\nOut of scope: mobile.\n\n# Risks\nVendor delay is likely. Vendor lock-in is possible.\nBudget overrun from vendor delay.";

    #[test]
    fn test_template_keeps_headings_and_first_sentences() {
        let out = template_based(DOC);
        assert_eq!(
            out,
            "# Scope\nThe project delivers a portal.\n# Risks\nVendor delay is likely."
        );
    }

    #[test]
    fn test_keyword_extraction_respects_target() {
        let est = CharRatioEstimator::default();
        let out = keyword_extraction(DOC, &est, 20);
        assert!(est.estimate(&out) <= 20);
        assert!(out.contains("vendor") || out.contains("Vendor"));
    }

    #[test]
    fn test_keyword_extraction_monotonic() {
        let est = CharRatioEstimator::default();
        let content: String = (0..30)
            .map(|i| format!("line {:02} alpha beta gamma delta words.\n", i))
            .collect();
        let mut previous = 0;
        for target in (0..400).step_by(7) {
            let tokens = est.estimate(&keyword_extraction(&content, &est, target));
            assert!(tokens <= target);
            assert!(tokens >= previous);
            previous = tokens;
        }
    }

    #[test]
    fn test_hybrid_within_target() {
        let est = CharRatioEstimator::default();
        for target in [5, 15, 30, 60] {
            let out = hybrid_compression(DOC, &est, target);
            assert!(est.estimate(&out) <= target, "target {target}");
        }
        assert!(hybrid_compression(DOC, &est, 60).starts_with("# Scope"));
    }

    #[test]
    fn test_split_sections() {
        let sections = split_sections("intro\n# A\none\n# B\ntwo");
        assert_eq!(sections, vec!["intro", "# A\none", "# B\ntwo"]);
    }

    #[tokio::test]
    async fn test_summarizer_strategies_report_quality() {
        let semantic = semantic_compression(DOC, &ExtractiveSummarizer, 0.5)
            .await
            .unwrap();
        assert!(semantic.summarizer_quality.is_some());
        assert!(semantic.text.len() < DOC.len());

        let hierarchical = hierarchical_summarization(DOC, &ExtractiveSummarizer, 0.25)
            .await
            .unwrap();
        assert!(hierarchical.summarizer_quality.is_some());
        assert!(hierarchical.text.len() < DOC.len());
    }
}
