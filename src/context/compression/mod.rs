//! Compression Engine
//!
//! Tries strategies from least to most lossy and keeps the first whose
//! output meets both the target ratio and the quality threshold. When none
//! does, the best available attempt is returned and flagged.

pub mod quality;
pub mod strategies;

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::ai::{SharedEstimator, SharedSummarizer};
use crate::constants::compression::{COMPRESSION_WORKERS, DEFAULT_QUALITY_THRESHOLD};
use crate::types::{CompressionResult, CompressionStrategy, Document, Result};

pub use quality::{QualityBreakdown, breakdown, score_quality};
use strategies::Compressed;

/// Compressed document set with the winning (or best) attempt
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub result: CompressionResult,
    /// Documents with compressed content and re-estimated tokens
    pub documents: Vec<Document>,
    /// No strategy met both the ratio and the quality threshold
    pub below_threshold: bool,
}

#[derive(Clone)]
pub struct CompressionEngine {
    estimator: SharedEstimator,
    summarizer: SharedSummarizer,
    quality_threshold: f64,
    workers: usize,
}

impl CompressionEngine {
    pub fn new(estimator: SharedEstimator, summarizer: SharedSummarizer) -> Self {
        Self {
            estimator,
            summarizer,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            workers: COMPRESSION_WORKERS,
        }
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold.clamp(0.0, 100.0);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn quality_threshold(&self) -> f64 {
        self.quality_threshold
    }

    /// Compress `documents` toward `target_ratio` using `allowed` strategies
    /// in least-lossy-first order.
    pub async fn compress(
        &self,
        documents: &[Document],
        target_ratio: f64,
        allowed: &[CompressionStrategy],
    ) -> Result<CompressionOutcome> {
        let target_ratio = target_ratio.clamp(0.0, 1.0);
        let mut attempts: Vec<CompressionOutcome> = Vec::new();

        for strategy in CompressionStrategy::ORDERED {
            if !allowed.contains(&strategy) {
                continue;
            }
            let attempt = self.attempt(documents, target_ratio, strategy).await?;
            let meets_ratio = attempt.result.meets_ratio(target_ratio);
            let meets_quality = attempt.result.quality_score >= self.quality_threshold;
            debug!(
                strategy = %strategy,
                ratio = attempt.result.compression_ratio,
                quality = attempt.result.quality_score,
                meets_ratio,
                meets_quality,
                "Compression attempt"
            );
            if meets_ratio && meets_quality {
                return Ok(attempt);
            }
            attempts.push(attempt);
        }

        // Best ratio-meeting attempt by quality, else the smallest output
        let ratio_meeting = attempts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.result.meets_ratio(target_ratio))
            .max_by(|(ia, a), (ib, b)| {
                a.result
                    .quality_score
                    .total_cmp(&b.result.quality_score)
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(i, _)| i);
        let chosen = ratio_meeting.or_else(|| {
            attempts
                .iter()
                .enumerate()
                .min_by(|(ia, a), (ib, b)| {
                    a.result
                        .compressed_tokens
                        .cmp(&b.result.compressed_tokens)
                        .then_with(|| ia.cmp(ib))
                })
                .map(|(i, _)| i)
        });

        match chosen {
            Some(i) => {
                let mut best = attempts.swap_remove(i);
                best.below_threshold = true;
                warn!(
                    strategy = %best.result.strategy,
                    quality = best.result.quality_score,
                    threshold = self.quality_threshold,
                    "No compression strategy met ratio and quality"
                );
                Ok(best)
            }
            None => {
                // No strategy allowed: report the input unchanged
                let original = self.total_tokens(documents);
                Ok(CompressionOutcome {
                    result: CompressionResult::new(
                        original,
                        original,
                        100.0,
                        CompressionStrategy::TemplateBased,
                        0,
                    ),
                    documents: documents.to_vec(),
                    below_threshold: true,
                })
            }
        }
    }

    /// Compress independent groups concurrently, at most `workers` at a time.
    /// Output order matches input order.
    pub async fn compress_groups(
        &self,
        groups: Vec<Vec<Document>>,
        target_ratio: f64,
        allowed: &[CompressionStrategy],
    ) -> Result<Vec<CompressionOutcome>> {
        let outcomes: Vec<Result<CompressionOutcome>> = futures::stream::iter(groups)
            .map(|group| async move { self.compress(&group, target_ratio, allowed).await })
            .buffered(self.workers)
            .collect()
            .await;
        outcomes.into_iter().collect()
    }

    fn total_tokens(&self, documents: &[Document]) -> u64 {
        documents
            .iter()
            .map(|d| self.estimator.estimate(&d.content).max(1))
            .sum()
    }

    async fn attempt(
        &self,
        documents: &[Document],
        target_ratio: f64,
        strategy: CompressionStrategy,
    ) -> Result<CompressionOutcome> {
        let started = Instant::now();
        let mut compressed_docs = Vec::with_capacity(documents.len());
        let (mut original_total, mut compressed_total) = (0u64, 0u64);
        let mut weighted_quality = 0.0;

        for doc in documents {
            let original_tokens = self.estimator.estimate(&doc.content).max(1);
            let target_tokens = (original_tokens as f64 * target_ratio).floor() as u64;
            let compressed = self.apply(strategy, &doc.content, target_ratio, target_tokens).await?;

            let structural = score_quality(&doc.content, &compressed.text);
            let quality = match compressed.summarizer_quality {
                Some(reported) => structural.min(reported),
                None => structural,
            };
            let tokens = self.estimator.estimate(&compressed.text).max(1);

            original_total += original_tokens;
            compressed_total += tokens;
            weighted_quality += quality * original_tokens as f64;

            let mut out = doc.clone();
            out.content = Arc::from(compressed.text);
            out.estimated_tokens = tokens;
            compressed_docs.push(out);
        }

        let quality = if original_total == 0 {
            100.0
        } else {
            weighted_quality / original_total as f64
        };

        Ok(CompressionOutcome {
            result: CompressionResult::new(
                original_total,
                compressed_total,
                quality,
                strategy,
                started.elapsed().as_millis() as u64,
            ),
            documents: compressed_docs,
            below_threshold: false,
        })
    }

    async fn apply(
        &self,
        strategy: CompressionStrategy,
        content: &str,
        ratio: f64,
        target_tokens: u64,
    ) -> Result<Compressed> {
        let estimator = self.estimator.as_ref();
        let summarizer = self.summarizer.as_ref();
        Ok(match strategy {
            CompressionStrategy::TemplateBased => {
                Compressed::plain(strategies::template_based(content))
            }
            CompressionStrategy::KeywordExtraction => Compressed::plain(
                strategies::keyword_extraction(content, estimator, target_tokens),
            ),
            CompressionStrategy::SemanticCompression => {
                strategies::semantic_compression(content, summarizer, ratio).await?
            }
            CompressionStrategy::HierarchicalSummarization => {
                strategies::hierarchical_summarization(content, summarizer, ratio).await?
            }
            CompressionStrategy::HybridCompression => Compressed::plain(
                strategies::hybrid_compression(content, estimator, target_tokens),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CharRatioEstimator, ExtractiveSummarizer, TokenEstimator};
    use crate::types::DocumentType;

    fn engine() -> CompressionEngine {
        CompressionEngine::new(
            Arc::new(CharRatioEstimator::default()),
            Arc::new(ExtractiveSummarizer),
        )
    }

    fn sectioned_doc(id: &str, sections: usize) -> Document {
        let content: String = (0..sections)
            .map(|s| {
                format!(
                    "# Section {s}\nMilestone {s} depends on procurement approval. \
                     The vendor delivers hardware in phase {s}. Testing follows delivery.\n\
                     Additional narrative about stakeholders and meetings for section {s}.\n\n"
                )
            })
            .collect();
        Document::new(id, DocumentType::Schedule, content)
    }

    #[tokio::test]
    async fn test_template_wins_on_structured_content() {
        let docs = vec![sectioned_doc("a", 6)];
        let outcome = engine()
            .compress(&docs, 0.5, &CompressionStrategy::ORDERED)
            .await
            .unwrap();
        assert_eq!(outcome.result.strategy, CompressionStrategy::TemplateBased);
        assert!(outcome.result.meets_ratio(0.5));
        assert!(!outcome.below_threshold);
        assert!(outcome.documents[0].content.contains("# Section 5"));
    }

    #[tokio::test]
    async fn test_below_threshold_fallback() {
        let docs = vec![sectioned_doc("a", 6)];
        let strict = engine().with_quality_threshold(100.0);
        let outcome = strict
            .compress(&docs, 0.15, &CompressionStrategy::ORDERED)
            .await
            .unwrap();
        assert!(outcome.below_threshold);
        assert!(outcome.result.meets_ratio(0.15));
    }

    #[tokio::test]
    async fn test_compressed_tokens_reestimated() {
        let docs = vec![sectioned_doc("a", 3), sectioned_doc("b", 2)];
        let outcome = engine()
            .compress(&docs, 0.3, &[CompressionStrategy::KeywordExtraction])
            .await
            .unwrap();
        let est = CharRatioEstimator::default();
        for doc in &outcome.documents {
            assert_eq!(doc.estimated_tokens, est.estimate(&doc.content).max(1));
        }
        assert_eq!(
            outcome.result.compressed_tokens,
            outcome.documents.iter().map(|d| d.estimated_tokens).sum::<u64>()
        );
    }

    #[tokio::test]
    async fn test_keyword_compression_monotonic_in_ratio() {
        // Uniform lines keep estimates additive
        let content: String = (0..40)
            .map(|i| format!("item {:02} budget schedule risk scope.\n", i))
            .collect();
        let docs = vec![Document::new("u", DocumentType::Other, content)];
        let mut previous = 0;
        for ratio in [0.1, 0.2, 0.3, 0.5, 0.8, 1.0] {
            let outcome = engine()
                .compress(&docs, ratio, &[CompressionStrategy::KeywordExtraction])
                .await
                .unwrap();
            assert!(outcome.result.compressed_tokens >= previous);
            previous = outcome.result.compressed_tokens;
        }
    }

    #[tokio::test]
    async fn test_compress_groups_preserves_order() {
        let groups = vec![
            vec![sectioned_doc("a", 2)],
            vec![sectioned_doc("b", 4)],
            vec![sectioned_doc("c", 1)],
        ];
        let outcomes = engine()
            .with_workers(2)
            .compress_groups(groups, 0.5, &CompressionStrategy::ORDERED)
            .await
            .unwrap();
        let ids: Vec<_> = outcomes.iter().map(|o| o.documents[0].id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_no_allowed_strategy_returns_input() {
        let docs = vec![sectioned_doc("a", 1)];
        let outcome = engine().compress(&docs, 0.5, &[]).await.unwrap();
        assert!(outcome.below_threshold);
        assert_eq!(outcome.result.compression_ratio, 1.0);
    }
}
