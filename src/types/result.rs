//! Request-scoped result records.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::options::CompressionStrategy;

/// Fallback loading strategy, in attempt order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoadStrategy {
    FullLoad,
    Prioritized,
    Chunked,
    Summarized,
    Failed,
}

impl LoadStrategy {
    /// The state attempted after this one, `None` for the terminal state
    pub fn next(&self) -> Option<LoadStrategy> {
        match self {
            Self::FullLoad => Some(Self::Prioritized),
            Self::Prioritized => Some(Self::Chunked),
            Self::Chunked => Some(Self::Summarized),
            Self::Summarized => Some(Self::Failed),
            Self::Failed => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullLoad => "FullLoad",
            Self::Prioritized => "Prioritized",
            Self::Chunked => "Chunked",
            Self::Summarized => "Summarized",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of compressing a document set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionResult {
    pub original_tokens: u64,
    pub compressed_tokens: u64,
    /// compressed / original (1.0 means no reduction)
    pub compression_ratio: f64,
    /// Structural preservation score (0-100)
    pub quality_score: f64,
    pub strategy: CompressionStrategy,
    pub processing_time_ms: u64,
}

impl CompressionResult {
    pub fn new(
        original_tokens: u64,
        compressed_tokens: u64,
        quality_score: f64,
        strategy: CompressionStrategy,
        processing_time_ms: u64,
    ) -> Self {
        let compression_ratio = if original_tokens == 0 {
            1.0
        } else {
            compressed_tokens as f64 / original_tokens as f64
        };
        Self {
            original_tokens,
            compressed_tokens,
            compression_ratio,
            quality_score,
            strategy,
            processing_time_ms,
        }
    }

    /// Whether the result reaches the requested ratio
    pub fn meets_ratio(&self, target_ratio: f64) -> bool {
        self.compressed_tokens as f64 <= (self.original_tokens as f64 * target_ratio).ceil()
    }
}

/// Metadata describing one context load
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub success: bool,
    pub strategy: LoadStrategy,
    pub target_document_type: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub token_budget: u64,
    pub documents_loaded: usize,
    pub total_documents: usize,
    pub clusters_loaded: usize,
    pub total_clusters: usize,
    pub total_tokens_used: u64,
    /// Percentage of the token budget used, always within [0, 100]
    pub context_window_utilization: f64,
    /// Documents only partly included by chunking
    pub partially_included: Vec<String>,
    pub compression_results: Vec<CompressionResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
    pub loading_time_ms: u64,
}

impl LoadResult {
    pub fn summary(&self) -> String {
        format!(
            "{} via {}: {}/{} documents, {} tokens ({:.1}% of {})",
            if self.success { "Loaded" } else { "Failed" },
            self.strategy,
            self.documents_loaded,
            self.total_documents,
            self.total_tokens_used,
            self.context_window_utilization,
            self.token_budget
        )
    }
}

/// Utilization percentage of `used` against `budget`, clamped to [0, 100]
pub fn utilization_pct(used: u64, budget: u64) -> f64 {
    if budget == 0 {
        return 0.0;
    }
    (used as f64 / budget as f64 * 100.0).clamp(0.0, 100.0)
}
