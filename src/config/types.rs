//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/contextweave/) and project (.contextweave/) level configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ai::{EstimatorKind, EstimatorSet, ProviderProfile, ProviderRegistry, builtin_profiles};
use crate::constants::{clustering, compression, storage, tokens, validation};
use crate::context::{EngineSettings, RankingWeights};
use crate::types::{
    ClusteringStrategy, CostSensitivity, DocumentComplexity, LoadOptions, Result, WeaveError,
};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Pipeline tuning
    pub engine: EngineConfig,

    /// Ranker score weights
    pub ranking: RankingWeights,

    pub compression: CompressionConfig,

    /// Provider budget defaults for load requests
    pub validation: ValidationConfig,

    /// Fallback and filter defaults for load requests
    pub defaults: DefaultsConfig,

    pub storage: StorageConfig,

    /// Provider capability table; replaces the built-in table when set
    pub providers: Vec<ProviderProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            engine: EngineConfig::default(),
            ranking: RankingWeights::default(),
            compression: CompressionConfig::default(),
            validation: ValidationConfig::default(),
            defaults: DefaultsConfig::default(),
            storage: StorageConfig::default(),
            providers: builtin_profiles(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `WeaveError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.engine.page_size == 0 {
            return Err(WeaveError::Config(
                "engine.page_size must be greater than 0".to_string(),
            ));
        }
        if self.engine.estimation_workers == 0 || self.engine.compression_workers == 0 {
            return Err(WeaveError::Config(
                "engine worker counts must be greater than 0".to_string(),
            ));
        }
        if self.engine.max_clusters == 0 {
            return Err(WeaveError::Config(
                "engine.max_clusters must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.compression.quality_threshold) {
            return Err(WeaveError::Config(format!(
                "compression.quality_threshold must be between 0 and 100, got {}",
                self.compression.quality_threshold
            )));
        }
        self.ranking.validate()?;
        self.load_options().validate()?;
        self.registry()?;
        Ok(())
    }

    /// Default request options from the `validation` and `defaults` sections
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            max_utilization_percentage: self.validation.max_utilization_percentage,
            enable_intelligent_prioritization: self.defaults.enable_intelligent_prioritization,
            enable_content_summarization: self.defaults.enable_content_summarization,
            enable_chunking: self.defaults.enable_chunking,
            preserve_critical_context: self.defaults.preserve_critical_context,
            include_stakeholders: self.defaults.include_stakeholders,
            include_compliance_data: self.defaults.include_compliance_data,
            max_documents: self.defaults.max_documents,
            max_tokens: self.validation.max_tokens,
            clustering_strategy: self.defaults.clustering_strategy,
            cost_sensitivity: self.validation.cost_sensitivity,
            complexity: self.validation.complexity,
        }
    }

    pub fn registry(&self) -> Result<ProviderRegistry> {
        ProviderRegistry::new(self.providers.clone())
    }

    pub fn estimators(&self) -> EstimatorSet {
        self.engine
            .provider_estimators
            .iter()
            .fold(EstimatorSet::new(self.engine.estimator.build()), |set, (provider, kind)| {
                set.with_provider(provider.clone(), kind.build())
            })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            page_size: self.engine.page_size,
            estimation_workers: self.engine.estimation_workers,
            compression_workers: self.engine.compression_workers,
            quality_threshold: self.compression.quality_threshold,
            max_clusters: self.engine.max_clusters,
            large_scale_threshold: self.engine.large_scale_threshold,
            ranking: self.ranking,
        }
    }

    /// Registry as a shared handle
    pub fn shared_registry(&self) -> Result<Arc<ProviderRegistry>> {
        self.registry().map(Arc::new)
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Documents fetched per store page
    pub page_size: usize,

    /// Concurrent token estimation workers
    pub estimation_workers: usize,

    /// Clusters compressed concurrently
    pub compression_workers: usize,

    pub max_clusters: usize,

    /// Corpus size above which documents are always clustered
    pub large_scale_threshold: usize,

    /// Default token estimator
    pub estimator: EstimatorKind,

    /// Per-provider estimator overrides, keyed by provider name
    pub provider_estimators: BTreeMap<String, EstimatorKind>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: storage::DEFAULT_PAGE_SIZE,
            estimation_workers: tokens::ESTIMATION_WORKERS,
            compression_workers: compression::COMPRESSION_WORKERS,
            max_clusters: clustering::DEFAULT_MAX_CLUSTERS,
            large_scale_threshold: clustering::LARGE_SCALE_THRESHOLD,
            estimator: EstimatorKind::default(),
            provider_estimators: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Compression Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Minimum structural quality (0-100) before a warning is recorded
    pub quality_threshold: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            quality_threshold: compression::DEFAULT_QUALITY_THRESHOLD,
        }
    }
}

// =============================================================================
// Validation Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Share of the context window usable for input (0-100)
    pub max_utilization_percentage: f64,

    /// Hard cap on input tokens regardless of provider
    pub max_tokens: Option<u64>,

    pub cost_sensitivity: CostSensitivity,

    pub complexity: DocumentComplexity,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_utilization_percentage: validation::DEFAULT_MAX_UTILIZATION_PCT,
            max_tokens: None,
            cost_sensitivity: CostSensitivity::default(),
            complexity: DocumentComplexity::default(),
        }
    }
}

// =============================================================================
// Load Defaults
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub enable_intelligent_prioritization: bool,
    pub enable_content_summarization: bool,
    pub enable_chunking: bool,
    pub preserve_critical_context: bool,
    pub include_stakeholders: bool,
    pub include_compliance_data: bool,
    pub max_documents: Option<usize>,
    pub clustering_strategy: Option<ClusteringStrategy>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let options = LoadOptions::default();
        Self {
            enable_intelligent_prioritization: options.enable_intelligent_prioritization,
            enable_content_summarization: options.enable_content_summarization,
            enable_chunking: options.enable_chunking,
            preserve_critical_context: options.preserve_critical_context,
            include_stakeholders: options.include_stakeholders,
            include_compliance_data: options.include_compliance_data,
            max_documents: options.max_documents,
            clustering_strategy: options.clustering_strategy,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite document database (relative paths resolve from the working directory)
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(storage::DEFAULT_DATABASE_PATH),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert!(config.validate().is_ok());
        assert_eq!(config.providers.len(), builtin_profiles().len());
    }

    #[test]
    fn test_load_options_mirror_sections() {
        let mut config = Config::default();
        config.validation.max_utilization_percentage = 60.0;
        config.validation.max_tokens = Some(4_000);
        config.defaults.enable_chunking = false;
        config.defaults.clustering_strategy = Some(ClusteringStrategy::Temporal);

        let options = config.load_options();
        assert_eq!(options.max_utilization_percentage, 60.0);
        assert_eq!(options.max_tokens, Some(4_000));
        assert!(!options.enable_chunking);
        assert_eq!(options.clustering_strategy, Some(ClusteringStrategy::Temporal));
    }

    #[test]
    fn test_duplicate_providers_rejected() {
        let mut config = Config::default();
        let first = config.providers[0].clone();
        config.providers.push(first);
        assert!(matches!(config.validate(), Err(WeaveError::Config(_))));
    }

    #[test]
    fn test_bad_ranges_rejected() {
        let mut config = Config::default();
        config.compression.quality_threshold = 120.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.validation.max_utilization_percentage = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ranking.relevance = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_estimators() {
        let mut config = Config::default();
        config
            .engine
            .provider_estimators
            .insert("ollama".to_string(), EstimatorKind::WordRatio);
        let set = config.estimators();
        assert_eq!(set.for_provider("ollama").name(), "word-ratio");
        assert_eq!(set.for_provider("openai").name(), "char-ratio");
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.providers, Config::default().providers);
        assert_eq!(parsed.engine.page_size, storage::DEFAULT_PAGE_SIZE);
    }
}
