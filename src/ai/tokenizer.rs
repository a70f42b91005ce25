//! Token Counting and Budget Management
//!
//! Provides deterministic token estimation for context budgeting.
//!
//! ## Strategy
//! - Estimate token counts before anything is sent to an LLM
//! - Use fixed, documented conversion ratios (never learned) so tests can assert exact values
//! - Allow swapping the estimator per provider without touching the orchestrator

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::constants::tokens as token_constants;
use crate::types::{Document, Result, WeaveError, truncate_at_boundary};

/// Pluggable token estimation strategy
pub trait TokenEstimator: Send + Sync {
    /// Estimate token count for a string
    fn estimate(&self, text: &str) -> u64;

    /// Estimator name for logging
    fn name(&self) -> &str;
}

pub type SharedEstimator = Arc<dyn TokenEstimator>;

/// Character-ratio estimation: `ceil(chars / chars_per_token)`.
///
/// The default ratio is 4 characters per token, so 2,000 characters estimate
/// to exactly 500 tokens.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: f32,
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: token_constants::CHARS_PER_TOKEN,
        }
    }
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: f32) -> Self {
        Self {
            chars_per_token: chars_per_token.max(0.1),
        }
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> u64 {
        let chars = text.chars().count() as f64;
        (chars / self.chars_per_token as f64).ceil() as u64
    }

    fn name(&self) -> &str {
        "char-ratio"
    }
}

/// Word-ratio estimation: `ceil(words * tokens_per_word)`
#[derive(Debug, Clone, Copy)]
pub struct WordRatioEstimator {
    tokens_per_word: f32,
}

impl Default for WordRatioEstimator {
    fn default() -> Self {
        Self {
            tokens_per_word: token_constants::TOKENS_PER_WORD,
        }
    }
}

impl WordRatioEstimator {
    pub fn new(tokens_per_word: f32) -> Self {
        Self {
            tokens_per_word: tokens_per_word.max(0.1),
        }
    }
}

impl TokenEstimator for WordRatioEstimator {
    fn estimate(&self, text: &str) -> u64 {
        let words = text.split_whitespace().count() as f64;
        (words * self.tokens_per_word as f64).ceil() as u64
    }

    fn name(&self) -> &str {
        "word-ratio"
    }
}

/// Estimator kinds selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    #[default]
    CharRatio,
    WordRatio,
}

impl EstimatorKind {
    pub fn build(&self) -> SharedEstimator {
        match self {
            Self::CharRatio => Arc::new(CharRatioEstimator::default()),
            Self::WordRatio => Arc::new(WordRatioEstimator::default()),
        }
    }
}

/// Estimators keyed by provider name, with a default for everything else
#[derive(Clone)]
pub struct EstimatorSet {
    default: SharedEstimator,
    per_provider: HashMap<String, SharedEstimator>,
}

impl Default for EstimatorSet {
    fn default() -> Self {
        Self::new(Arc::new(CharRatioEstimator::default()))
    }
}

impl EstimatorSet {
    pub fn new(default: SharedEstimator) -> Self {
        Self {
            default,
            per_provider: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>, estimator: SharedEstimator) -> Self {
        self.per_provider.insert(provider.into(), estimator);
        self
    }

    pub fn default_estimator(&self) -> &SharedEstimator {
        &self.default
    }

    pub fn for_provider(&self, provider: &str) -> &SharedEstimator {
        self.per_provider.get(provider).unwrap_or(&self.default)
    }
}

/// Cut `content` so that it estimates to at most `max_tokens`.
///
/// Cuts happen on paragraph or line boundaries where possible. The result is
/// always a prefix of `content`, so a smaller limit never yields more text.
pub fn fit_to_tokens<'a>(estimator: &dyn TokenEstimator, content: &'a str, max_tokens: u64) -> &'a str {
    if estimator.estimate(content) <= max_tokens {
        return content;
    }
    if max_tokens == 0 {
        return "";
    }

    // Binary search the longest byte prefix whose boundary-cut version fits
    let (mut lo, mut hi) = (0usize, content.len());
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if estimator.estimate(truncate_at_boundary(content, mid)) <= max_tokens {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    truncate_at_boundary(content, lo)
}

/// Split `content` into consecutive chunks of at most `chunk_tokens` each.
///
/// Concatenating the chunks reproduces the content minus the boundary
/// whitespace dropped at each cut.
pub fn split_into_chunks(estimator: &dyn TokenEstimator, content: &str, chunk_tokens: u64) -> Vec<String> {
    let chunk_tokens = chunk_tokens.max(1);
    let mut chunks = Vec::new();
    let mut rest = content;

    while !rest.trim().is_empty() {
        let mut piece = fit_to_tokens(estimator, rest, chunk_tokens);
        if piece.is_empty() {
            // No boundary fits; take the largest raw prefix that does
            let mut end = rest.len();
            while end > 0 && (!rest.is_char_boundary(end) || estimator.estimate(&rest[..end]) > chunk_tokens) {
                end -= 1;
            }
            if end == 0 {
                end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
            }
            piece = &rest[..end];
        }
        chunks.push(piece.to_string());
        rest = rest[piece.len()..].trim_start_matches(['\n', '\r']);
    }

    chunks
}

/// Running token budget for incremental inclusion
pub struct TokenBudget {
    /// Maximum tokens
    max_tokens: u64,
    /// Current token usage
    current_tokens: u64,
}

impl TokenBudget {
    pub fn new(max_tokens: u64) -> Self {
        Self {
            max_tokens,
            current_tokens: 0,
        }
    }

    /// Try to reserve `tokens`.
    /// Returns true if they fit, false if they would exceed the budget
    pub fn try_add(&mut self, tokens: u64) -> bool {
        if self.current_tokens + tokens <= self.max_tokens {
            self.current_tokens += tokens;
            true
        } else {
            debug!(
                "Cannot add {} tokens, would exceed budget: {}/{}",
                tokens,
                self.current_tokens + tokens,
                self.max_tokens
            );
            false
        }
    }

    pub fn current(&self) -> u64 {
        self.current_tokens
    }

    pub fn remaining(&self) -> u64 {
        self.max_tokens.saturating_sub(self.current_tokens)
    }
}

/// Estimate every document concurrently with at most `workers` in flight.
///
/// Estimates are floored at 1 token. Output order matches input order.
/// Returns `WeaveError::Cancelled` once `cancel` fires; work already in
/// flight is discarded.
pub async fn estimate_corpus(
    documents: Vec<Document>,
    estimator: SharedEstimator,
    workers: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Document>> {
    let total = documents.len();
    let mut stream = futures::stream::iter(documents)
        .map(|mut doc| {
            let estimator = Arc::clone(&estimator);
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(WeaveError::Cancelled);
                }
                let content = Arc::clone(&doc.content);
                let tokens =
                    tokio::task::spawn_blocking(move || estimator.estimate(&content)).await?;
                doc.estimated_tokens = tokens.max(1);
                Ok(doc)
            }
        })
        .buffered(workers.max(1));

    let mut estimated = Vec::with_capacity(total);
    while let Some(result) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(WeaveError::Cancelled);
        }
        estimated.push(result?);
    }

    debug!(
        documents = total,
        tokens = estimated.iter().map(|d| d.estimated_tokens).sum::<u64>(),
        "Corpus estimated"
    );
    Ok(estimated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentType;

    #[test]
    fn test_char_ratio_counting() {
        let counter = CharRatioEstimator::default();
        assert_eq!(counter.estimate("hello"), 2); // 5 chars = 2 tokens
        assert_eq!(counter.estimate("hi"), 1);
        assert_eq!(counter.estimate(""), 0);
        assert_eq!(counter.estimate(&"a".repeat(2000)), 500);
    }

    #[test]
    fn test_word_ratio_counting() {
        let counter = WordRatioEstimator::default();
        assert_eq!(counter.estimate("one two three"), 4); // 3 * 1.3 = 3.9
        assert_eq!(counter.estimate("   "), 0);
    }

    #[test]
    fn test_estimator_set_per_provider() {
        let set = EstimatorSet::default()
            .with_provider("ollama", Arc::new(WordRatioEstimator::default()));
        assert_eq!(set.for_provider("ollama").name(), "word-ratio");
        assert_eq!(set.for_provider("openai").name(), "char-ratio");
    }

    #[test]
    fn test_fit_to_tokens_is_prefix_and_fits() {
        let est = CharRatioEstimator::default();
        let content = "# Title\n\nFirst paragraph of text.\n\nSecond paragraph of text.";
        let cut = fit_to_tokens(&est, content, 8);
        assert!(content.starts_with(cut));
        assert!(est.estimate(cut) <= 8);
        assert_eq!(fit_to_tokens(&est, content, 1000), content);
        assert_eq!(fit_to_tokens(&est, content, 0), "");
    }

    #[test]
    fn test_fit_to_tokens_monotonic() {
        let est = CharRatioEstimator::default();
        let content = "line one here\nline two here\nline three here\nline four here";
        let mut previous = 0;
        for limit in 1..20 {
            let len = fit_to_tokens(&est, content, limit).len();
            assert!(len >= previous);
            previous = len;
        }
    }

    #[test]
    fn test_split_into_chunks_covers_content() {
        let est = CharRatioEstimator::default();
        let content = (0..20)
            .map(|i| format!("Paragraph {i} with some words."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = split_into_chunks(&est, &content, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(est.estimate(chunk) <= 20);
        }
        let rejoined: String = chunks.concat();
        let stripped: String = content.chars().filter(|c| *c != '\n').collect();
        assert_eq!(rejoined.replace('\n', ""), stripped);
    }

    #[test]
    fn test_split_unbroken_text() {
        let est = CharRatioEstimator::default();
        let chunks = split_into_chunks(&est, &"x".repeat(100), 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| est.estimate(c) <= 10));
    }

    #[test]
    fn test_token_budget() {
        let mut budget = TokenBudget::new(100);
        assert!(budget.try_add(40));
        assert!(budget.try_add(60));
        assert!(!budget.try_add(1));
        assert_eq!(budget.remaining(), 0);
        assert_eq!(budget.current(), 100);
    }

    #[tokio::test]
    async fn test_estimate_corpus_preserves_order() {
        let docs = vec![
            Document::new("a", DocumentType::Schedule, "a".repeat(40)),
            Document::new("b", DocumentType::Schedule, ""),
            Document::new("c", DocumentType::Schedule, "c".repeat(8)),
        ];
        let estimator: SharedEstimator = Arc::new(CharRatioEstimator::default());
        let out = estimate_corpus(docs, estimator, 2, &CancellationToken::new())
            .await
            .unwrap();
        let ids: Vec<_> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(out[0].estimated_tokens, 10);
        assert_eq!(out[1].estimated_tokens, 1); // floored
        assert_eq!(out[2].estimated_tokens, 2);
    }

    #[tokio::test]
    async fn test_estimate_corpus_cancelled() {
        let docs = vec![Document::new("a", DocumentType::Other, "text")];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let estimator: SharedEstimator = Arc::new(CharRatioEstimator::default());
        let err = estimate_corpus(docs, estimator, 1, &cancel).await.unwrap_err();
        assert!(matches!(err, WeaveError::Cancelled));
    }
}
