//! Request options and strategy selectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::validation::DEFAULT_MAX_UTILIZATION_PCT;
use crate::types::{Result, ValidationError};

/// Clustering strategy for large corpora
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringStrategy {
    /// Group by document category
    Category,
    /// Quantile buckets by relevance score
    Relevance,
    /// Recency bands by last modification
    Temporal,
    /// Category partition merged by aggregate relevance
    #[default]
    Hierarchical,
}

impl fmt::Display for ClusteringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => write!(f, "category"),
            Self::Relevance => write!(f, "relevance"),
            Self::Temporal => write!(f, "temporal"),
            Self::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

impl FromStr for ClusteringStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "relevance" => Ok(Self::Relevance),
            "temporal" => Ok(Self::Temporal),
            "hierarchical" => Ok(Self::Hierarchical),
            _ => Err(format!(
                "Unknown clustering strategy: {}. Valid values: category, relevance, temporal, hierarchical",
                s
            )),
        }
    }
}

/// Compression strategies, declared from least to most lossy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionStrategy {
    TemplateBased,
    KeywordExtraction,
    SemanticCompression,
    HierarchicalSummarization,
    HybridCompression,
}

impl CompressionStrategy {
    /// Attempt order, least lossy first
    pub const ORDERED: [CompressionStrategy; 5] = [
        Self::TemplateBased,
        Self::KeywordExtraction,
        Self::SemanticCompression,
        Self::HierarchicalSummarization,
        Self::HybridCompression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemplateBased => "template-based",
            Self::KeywordExtraction => "keyword-extraction",
            Self::SemanticCompression => "semantic-compression",
            Self::HierarchicalSummarization => "hierarchical-summarization",
            Self::HybridCompression => "hybrid-compression",
        }
    }
}

impl fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('_', "-");
        Self::ORDERED
            .iter()
            .find(|c| c.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("Unknown compression strategy: {}", s))
    }
}

/// How strongly provider selection favors cheaper models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostSensitivity {
    /// Cheapest qualifying profile
    #[default]
    High,
    /// Qualifying profile with the most headroom
    Low,
}

impl FromStr for CostSensitivity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            _ => Err(format!("Unknown cost sensitivity: {}. Valid values: high, low", s)),
        }
    }
}

/// Expected complexity of the document being generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentComplexity {
    Simple,
    #[default]
    Moderate,
    Complex,
}

impl DocumentComplexity {
    /// Multiplier applied to estimated tokens during validation
    pub fn factor(&self) -> f64 {
        use crate::constants::validation::complexity;
        match self {
            Self::Simple => complexity::SIMPLE,
            Self::Moderate => complexity::MODERATE,
            Self::Complex => complexity::COMPLEX,
        }
    }
}

impl FromStr for DocumentComplexity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "moderate" => Ok(Self::Moderate),
            "complex" => Ok(Self::Complex),
            _ => Err(format!(
                "Unknown complexity: {}. Valid values: simple, moderate, complex",
                s
            )),
        }
    }
}

/// Options for a single context load request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Share of the provider context window usable for input (0-100)
    pub max_utilization_percentage: f64,
    /// Rank by weighted score instead of corpus order
    pub enable_intelligent_prioritization: bool,
    /// Allow the summarized fallback
    pub enable_content_summarization: bool,
    /// Allow the chunked fallback
    pub enable_chunking: bool,
    /// Never drop critical documents (or their dependencies)
    pub preserve_critical_context: bool,
    pub include_stakeholders: bool,
    pub include_compliance_data: bool,
    pub max_documents: Option<usize>,
    pub max_tokens: Option<u64>,
    pub clustering_strategy: Option<ClusteringStrategy>,
    pub cost_sensitivity: CostSensitivity,
    pub complexity: DocumentComplexity,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_utilization_percentage: DEFAULT_MAX_UTILIZATION_PCT,
            enable_intelligent_prioritization: true,
            enable_content_summarization: true,
            enable_chunking: true,
            preserve_critical_context: true,
            include_stakeholders: true,
            include_compliance_data: true,
            max_documents: None,
            max_tokens: None,
            clustering_strategy: None,
            cost_sensitivity: CostSensitivity::default(),
            complexity: DocumentComplexity::default(),
        }
    }
}

impl LoadOptions {
    /// Options with every fallback disabled
    pub fn strict() -> Self {
        Self {
            enable_intelligent_prioritization: false,
            enable_content_summarization: false,
            enable_chunking: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.max_utilization_percentage)
            || self.max_utilization_percentage.is_nan()
        {
            return Err(ValidationError::range(
                "max_utilization_percentage",
                format!(
                    "must be between 0 and 100, got {}",
                    self.max_utilization_percentage
                ),
            )
            .into());
        }
        if self.max_utilization_percentage == 0.0 {
            return Err(ValidationError::range(
                "max_utilization_percentage",
                "must be greater than 0",
            )
            .into());
        }
        if self.max_documents == Some(0) {
            return Err(
                ValidationError::range("max_documents", "must be greater than 0").into(),
            );
        }
        if self.max_tokens == Some(0) {
            return Err(ValidationError::range("max_tokens", "must be greater than 0").into());
        }
        Ok(())
    }
}
