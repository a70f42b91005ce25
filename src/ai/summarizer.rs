//! Summarizer Abstraction
//!
//! The engine only depends on the `Summarizer` trait; an LLM-backed
//! implementation lives outside this crate. `ExtractiveSummarizer` is the
//! deterministic default used by the CLI and tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::constants::compression::MIN_TERM_LEN;
use crate::types::{Result, is_heading, split_sentences, term_frequencies};

/// Summary text with the summarizer's own quality estimate (0-100)
#[derive(Debug, Clone)]
pub struct Summary {
    pub text: String,
    pub quality_score: f64,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text` to roughly `target_ratio` of its length
    async fn summarize(&self, text: &str, target_ratio: f64) -> Result<Summary>;

    fn name(&self) -> &str;
}

pub type SharedSummarizer = Arc<dyn Summarizer>;

/// Extractive summarizer: keeps headings and the highest-scoring sentences.
///
/// Sentences are scored by the summed corpus frequency of their terms and
/// admitted greedily in score order until the character budget is spent, then
/// emitted in their original order. Self-reported quality is the share of
/// sections that kept at least one sentence.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveSummarizer;

struct Section<'a> {
    heading: Option<&'a str>,
    sentences: Vec<&'a str>,
}

fn sections(text: &str) -> Vec<Section<'_>> {
    let mut spans: Vec<(Option<&str>, Vec<&str>)> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut heading: Option<&str> = None;
    for line in text.lines() {
        if is_heading(line) {
            spans.push((heading, std::mem::take(&mut current)));
            heading = Some(line.trim());
        } else if !line.trim().is_empty() {
            current.push(line);
        }
    }
    spans.push((heading, current));

    spans
        .into_iter()
        .map(|(heading, lines)| Section {
            heading,
            sentences: lines.into_iter().flat_map(split_sentences).collect(),
        })
        .filter(|s| s.heading.is_some() || !s.sentences.is_empty())
        .collect()
}

impl ExtractiveSummarizer {
    fn extract(&self, text: &str, target_ratio: f64) -> Summary {
        let ratio = target_ratio.clamp(0.0, 1.0);
        let budget = (text.chars().count() as f64 * ratio).floor() as usize;
        let sections = sections(text);
        if sections.is_empty() {
            return Summary {
                text: String::new(),
                quality_score: 100.0,
            };
        }

        let freq = term_frequencies(text, MIN_TERM_LEN);
        let mut spent: usize = sections
            .iter()
            .filter_map(|s| s.heading)
            .map(|h| h.chars().count() + 1)
            .sum();

        // (section, sentence, score), best first; ties keep document order
        let mut candidates: Vec<(usize, usize, usize)> = sections
            .iter()
            .enumerate()
            .flat_map(|(si, s)| {
                let freq = &freq;
                s.sentences.iter().enumerate().map(move |(ji, sentence)| {
                    let score = sentence
                        .split(|c: char| !c.is_alphanumeric())
                        .filter_map(|w| freq.get(&w.to_lowercase()))
                        .sum::<usize>();
                    (si, ji, score)
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.2.cmp(&a.2));

        let mut keep = vec![Vec::new(); sections.len()];
        for (si, ji, _) in candidates {
            let cost = sections[si].sentences[ji].chars().count() + 1;
            if spent + cost <= budget {
                spent += cost;
                keep[si].push(ji);
            }
        }

        let mut out = Vec::new();
        let mut covered = 0usize;
        let mut with_body = 0usize;
        for (si, section) in sections.iter().enumerate() {
            if let Some(h) = section.heading {
                out.push(h.to_string());
            }
            if section.sentences.is_empty() {
                continue;
            }
            with_body += 1;
            let kept = &mut keep[si];
            if kept.is_empty() {
                continue;
            }
            covered += 1;
            kept.sort_unstable();
            let body: Vec<&str> = kept.iter().map(|&ji| section.sentences[ji]).collect();
            out.push(body.join(" "));
        }

        let quality_score = if with_body == 0 {
            100.0
        } else {
            covered as f64 / with_body as f64 * 100.0
        };
        Summary {
            text: out.join("\n"),
            quality_score,
        }
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str, target_ratio: f64) -> Result<Summary> {
        Ok(self.extract(text, target_ratio))
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "# Risks\n\nVendor delay threatens the schedule. Vendor contracts are signed. Weather is fine.\n\n# Budget\n\nBudget reserve covers vendor delay. Coffee is free.";

    #[tokio::test]
    async fn test_extractive_keeps_headings() {
        let summary = ExtractiveSummarizer.summarize(TEXT, 0.5).await.unwrap();
        assert!(summary.text.contains("# Risks"));
        assert!(summary.text.contains("# Budget"));
        assert!(summary.text.chars().count() <= TEXT.chars().count() / 2);
    }

    #[tokio::test]
    async fn test_extractive_prefers_frequent_terms() {
        let summary = ExtractiveSummarizer.summarize(TEXT, 0.5).await.unwrap();
        assert!(summary.text.contains("Budget reserve covers vendor delay."));
        assert!(!summary.text.contains("Coffee"));
    }

    #[tokio::test]
    async fn test_extractive_quality_reports_section_coverage() {
        let full = ExtractiveSummarizer.summarize(TEXT, 1.0).await.unwrap();
        assert_eq!(full.quality_score, 100.0);

        let tiny = ExtractiveSummarizer.summarize(TEXT, 0.1).await.unwrap();
        assert!(tiny.quality_score < 100.0);
    }

    #[tokio::test]
    async fn test_extractive_empty_text() {
        let summary = ExtractiveSummarizer.summarize("", 0.5).await.unwrap();
        assert!(summary.text.is_empty());
        assert_eq!(summary.quality_score, 100.0);
    }
}
