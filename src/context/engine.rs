//! Context Loading Pipeline
//!
//! One request, start to finish:
//!
//! ```text
//! options -> paged listing -> estimation -> provider validation -> ranking
//!   -> dependency closure -> clustering -> maxDocuments cap -> fallback
//!   orchestration -> LoadResult
//! ```
//!
//! The engine owns no mutable state; everything it needs is injected once and
//! shared across requests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::ai::{
    ContextWindowValidator, EstimatorSet, ExtractiveSummarizer, ProviderRegistry,
    SharedSummarizer, ValidationReport, estimate_corpus,
};
use crate::constants::{clustering, compression, storage, tokens};
use crate::storage::{DocumentFilter, SharedDocumentStore, list_all};
use crate::types::{
    Document, DocumentType, IssueKind, LoadOptions, LoadResult, LoadStrategy, ProjectId, Result,
    WeaveError,
};

use super::assembler::{AssembledContext, ContextAssembler, LoadSummary};
use super::clustering::{Cluster, ClusteringEngine, cluster_index};
use super::compression::CompressionEngine;
use super::fallback::FallbackOrchestrator;
use super::ranker::{DocumentRanker, RankingWeights, dependency_closure_ids, enforce_dependency_closure};

/// Tuning shared by every request
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub page_size: usize,
    pub estimation_workers: usize,
    pub compression_workers: usize,
    pub quality_threshold: f64,
    pub max_clusters: usize,
    /// Corpora larger than this are clustered even without a requested strategy
    pub large_scale_threshold: usize,
    pub ranking: RankingWeights,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: storage::DEFAULT_PAGE_SIZE,
            estimation_workers: tokens::ESTIMATION_WORKERS,
            compression_workers: compression::COMPRESSION_WORKERS,
            quality_threshold: compression::DEFAULT_QUALITY_THRESHOLD,
            max_clusters: clustering::DEFAULT_MAX_CLUSTERS,
            large_scale_threshold: clustering::LARGE_SCALE_THRESHOLD,
            ranking: RankingWeights::default(),
        }
    }
}

/// Payload plus the metadata describing it
#[derive(Debug, Clone)]
pub struct LoadedContext {
    pub payload: String,
    pub result: LoadResult,
    /// Clusters built for this request, empty when not clustered
    pub clusters: Vec<Cluster>,
    pub validation: ValidationReport,
}

pub struct ContextEngine {
    store: SharedDocumentStore,
    registry: Arc<ProviderRegistry>,
    estimators: EstimatorSet,
    summarizer: SharedSummarizer,
    settings: EngineSettings,
}

/// Outcome of applying the document cap
struct Capped {
    documents: Vec<Document>,
    warnings: Vec<String>,
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(WeaveError::Cancelled);
    }
    Ok(())
}

impl ContextEngine {
    pub fn new(store: SharedDocumentStore, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            store,
            registry,
            estimators: EstimatorSet::default(),
            summarizer: Arc::new(ExtractiveSummarizer),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_estimators(mut self, estimators: EstimatorSet) -> Self {
        self.estimators = estimators;
        self
    }

    pub fn with_summarizer(mut self, summarizer: SharedSummarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn load_context(
        &self,
        project: &ProjectId,
        target: DocumentType,
        options: &LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<LoadedContext> {
        self.load_context_at(project, target, options, cancel, Utc::now())
            .await
    }

    /// `load_context` with an explicit clock for recency scoring
    #[instrument(
        skip_all,
        fields(project = %project, target = %target, request_id = %uuid::Uuid::new_v4())
    )]
    pub async fn load_context_at(
        &self,
        project: &ProjectId,
        target: DocumentType,
        options: &LoadOptions,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<LoadedContext> {
        let started = Instant::now();
        options.validate()?;
        self.settings.ranking.validate()?;
        if self.registry.is_empty() {
            return Err(WeaveError::ProviderUnavailable(
                "provider registry is empty".to_string(),
            ));
        }

        let filter = DocumentFilter::from_options(options);
        let documents = list_all(
            self.store.as_ref(),
            project,
            &filter,
            self.settings.page_size,
            cancel,
        )
        .await?;
        let total_documents = documents.len();

        let default_estimator = Arc::clone(self.estimators.default_estimator());
        let mut documents = estimate_corpus(
            documents,
            Arc::clone(&default_estimator),
            self.settings.estimation_workers,
            cancel,
        )
        .await?;
        let corpus_tokens: u64 = documents.iter().map(|d| d.estimated_tokens).sum();

        let validator = ContextWindowValidator::new(Arc::clone(&self.registry));
        let (report, selection) =
            validator.validate(target, corpus_tokens, options.complexity, options)?;
        let budget = report.token_budget;

        // Providers with their own tokenizer get their own estimates
        let estimator = Arc::clone(self.estimators.for_provider(&selection.profile.provider));
        if !Arc::ptr_eq(&estimator, &default_estimator) {
            debug!(estimator = estimator.name(), "Re-estimating with provider estimator");
            documents = estimate_corpus(
                documents,
                Arc::clone(&estimator),
                self.settings.estimation_workers,
                cancel,
            )
            .await?;
        }
        check_cancelled(cancel)?;

        let mut summary = LoadSummary {
            target,
            provider: Some(report.provider.clone()),
            model: Some(report.model.clone()),
            token_budget: budget,
            total_documents,
            total_clusters: 0,
            cluster_of: HashMap::new(),
            strategy: LoadStrategy::FullLoad,
            partially_included: Vec::new(),
            compression_results: Vec::new(),
            warnings: report.warnings.clone(),
            errors: Vec::new(),
            recommendations: report.recommendations.clone(),
            started,
        };
        let assembler = ContextAssembler::new(Arc::clone(&estimator));

        if documents.is_empty() {
            info!("No documents available");
            summary
                .warnings
                .push(format!("No documents available for project {}", project));
            let empty = AssembledContext::default();
            let result = assembler.finalize(Some(&empty), summary);
            return Ok(LoadedContext {
                payload: empty.payload,
                result,
                clusters: Vec::new(),
                validation: report,
            });
        }

        let ranked = if options.enable_intelligent_prioritization {
            DocumentRanker::new(self.settings.ranking).rank(documents, now)
        } else {
            documents
        };

        let closure = enforce_dependency_closure(ranked);
        if !closure.violations.is_empty() {
            if options.preserve_critical_context {
                warn!(
                    violations = closure.violations.len(),
                    "Dependency closure violated with critical preservation on"
                );
                summary.strategy = LoadStrategy::Failed;
                summary.errors.extend(
                    closure
                        .violations
                        .iter()
                        .map(|v| IssueKind::DependencyClosureViolation.tag(v)),
                );
                summary.errors.push(IssueKind::Validation.tag(format!(
                    "{} document(s) have unavailable dependencies",
                    closure.violations.len()
                )));
                summary.recommendations.push(
                    "Add the missing dependencies to the project or disable preserve_critical_context"
                        .to_string(),
                );
                let result = assembler.finalize(None, summary);
                return Ok(LoadedContext {
                    payload: String::new(),
                    result,
                    clusters: Vec::new(),
                    validation: report,
                });
            }
            summary.warnings.extend(
                closure
                    .violations
                    .iter()
                    .map(|v| IssueKind::DependencyClosureViolation.tag(v)),
            );
        }
        let documents = closure.documents;

        let clusters = match options.clustering_strategy {
            Some(strategy) => Some(strategy),
            None if documents.len() > self.settings.large_scale_threshold => {
                Some(Default::default())
            }
            None => None,
        }
        .map(|strategy| {
            ClusteringEngine::new(self.settings.max_clusters)
                .with_weights(self.settings.ranking)
                .cluster(&documents, strategy, now)
        })
        .unwrap_or_default();
        summary.total_clusters = clusters.len();

        let documents = match options.max_documents {
            Some(max) if documents.len() > max => {
                let capped = cap_documents(documents, &clusters, max, options.preserve_critical_context);
                summary.warnings.extend(capped.warnings);
                capped.documents
            }
            _ => documents,
        };

        let kept: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        summary.cluster_of = cluster_index(&clusters)
            .into_iter()
            .filter(|(id, _)| kept.contains(id))
            .map(|(id, ci)| (id.to_string(), ci))
            .collect();
        check_cancelled(cancel)?;

        let compression = CompressionEngine::new(Arc::clone(&estimator), Arc::clone(&self.summarizer))
            .with_quality_threshold(self.settings.quality_threshold)
            .with_workers(self.settings.compression_workers);
        let orchestrator = FallbackOrchestrator::new(&assembler, &compression, Arc::clone(&estimator));
        let outcome = orchestrator
            .run(&documents, budget, options, &summary.cluster_of)
            .await?;

        summary.strategy = outcome.strategy;
        summary.partially_included = outcome.partially_included;
        summary.compression_results = outcome.compression_results;
        if outcome.strategy == LoadStrategy::Failed {
            summary
                .errors
                .extend(report.errors.iter().map(|e| IssueKind::Validation.tag(e)));
        } else {
            // The fallback absorbed the shortfall; keep it visible
            summary.warnings.extend(report.errors.iter().cloned());
        }
        summary.warnings.extend(outcome.warnings);
        summary.errors.extend(outcome.errors);

        let result = assembler.finalize(outcome.assembled.as_ref(), summary);
        info!(
            strategy = %result.strategy,
            loaded = result.documents_loaded,
            tokens = result.total_tokens_used,
            budget,
            "Context load finished"
        );

        Ok(LoadedContext {
            payload: outcome.assembled.map(|ctx| ctx.payload).unwrap_or_default(),
            result,
            clusters,
            validation: report,
        })
    }
}

/// Keep at most `max` documents.
///
/// Candidates are taken cluster by cluster (or in ranker order when not
/// clustered), critical ones ahead of the rest; each comes with its missing
/// dependencies and is skipped if the whole unit does not fit. Preserved
/// critical units may exceed the cap. Output keeps the input order.
fn cap_documents(
    documents: Vec<Document>,
    clusters: &[Cluster],
    max: usize,
    preserve_critical: bool,
) -> Capped {
    let position: HashMap<&str, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.as_str(), i))
        .collect();

    let order: Vec<usize> = if clusters.is_empty() {
        (0..documents.len()).collect()
    } else {
        clusters
            .iter()
            .flat_map(|c| c.document_ids.iter())
            .filter_map(|id| position.get(id.as_str()).copied())
            .collect()
    };
    let (critical, rest): (Vec<usize>, Vec<usize>) =
        order.into_iter().partition(|&i| documents[i].is_critical());

    let mut taken: HashSet<usize> = HashSet::new();
    let mut pulled = 0usize;
    let unit_of = |i: usize, taken: &HashSet<usize>| -> Vec<usize> {
        let mut unit: Vec<usize> =
            dependency_closure_ids(&documents, [documents[i].id.as_str()])
                .into_iter()
                .filter_map(|id| position.get(id).copied())
                .filter(|j| !taken.contains(j))
                .collect();
        unit.sort_unstable();
        unit
    };

    if preserve_critical {
        for &i in &critical {
            let unit = unit_of(i, &taken);
            pulled += unit.len().saturating_sub(1);
            taken.extend(unit);
        }
    }
    let critical_taken = taken.len();

    for &i in critical.iter().chain(&rest) {
        if taken.contains(&i) {
            continue;
        }
        let unit = unit_of(i, &taken);
        if taken.len() + unit.len() > max {
            continue;
        }
        pulled += unit.len().saturating_sub(1);
        taken.extend(unit);
    }

    let mut warnings = Vec::new();
    if critical_taken > max {
        warnings.push(format!(
            "maxDocuments {} exceeded: {} critical document(s) and their dependencies are preserved",
            max, critical_taken
        ));
    }
    let dropped = documents.len() - taken.len();
    if dropped > 0 {
        warnings.push(format!(
            "maxDocuments {}: kept {} of {} document(s)",
            max,
            taken.len(),
            documents.len()
        ));
    }
    if pulled > 0 {
        warnings.push(format!(
            "maxDocuments {}: pulled in {} dependency document(s)",
            max, pulled
        ));
    }
    debug!(max, kept = taken.len(), dropped, pulled, "Document cap applied");

    let documents = documents
        .into_iter()
        .enumerate()
        .filter(|(i, _)| taken.contains(i))
        .map(|(_, d)| d)
        .collect();
    Capped {
        documents,
        warnings,
    }
}
