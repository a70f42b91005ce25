//! Fallback Strategy Orchestrator
//!
//! Linear state machine over increasingly lossy loading strategies:
//!
//! ```text
//! FullLoad -> Prioritized -> Chunked -> Summarized -> Failed
//! ```
//!
//! Each state is attempted at most once and never revisited. A state
//! succeeds only when the assembled payload fits the budget and, with
//! critical preservation on, every critical document is represented.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ai::{SharedEstimator, TokenBudget, split_into_chunks};
use crate::constants::compression::SUMMARY_TARGET_RATIOS;
use crate::constants::fallback::CHUNKS_PER_BUDGET;
use crate::types::{
    CompressionResult, CompressionStrategy, Document, IssueKind, LoadOptions, LoadStrategy, Result,
};

use super::assembler::{AssembledContext, ContextAssembler, ContextSection, SectionPart};
use super::compression::CompressionEngine;
use super::ranker::dependency_closure_ids;

/// Ids listed in a single warning before the rest are summarized
const MAX_LISTED_IDS: usize = 10;

/// What the orchestrator produced
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub strategy: LoadStrategy,
    /// `None` when every state failed
    pub assembled: Option<AssembledContext>,
    pub partially_included: Vec<String>,
    pub compression_results: Vec<CompressionResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl FallbackOutcome {
    pub fn success(&self) -> bool {
        self.strategy != LoadStrategy::Failed
    }
}

pub struct FallbackOrchestrator<'a> {
    assembler: &'a ContextAssembler,
    compression: &'a CompressionEngine,
    estimator: SharedEstimator,
}

/// Mutable per-run state
struct Run<'o> {
    options: &'o LoadOptions,
    budget: u64,
    protected: HashSet<String>,
    critical: Vec<String>,
    warnings: Vec<String>,
}

impl Run<'_> {
    fn critical_represented(&self, ctx: &AssembledContext) -> bool {
        if !self.options.preserve_critical_context {
            return true;
        }
        let present: HashSet<&str> = ctx.document_ids.iter().map(String::as_str).collect();
        self.critical.iter().all(|id| present.contains(id.as_str()))
    }

    fn accepts(&self, ctx: &AssembledContext) -> bool {
        ctx.section_count > 0 && ctx.total_tokens <= self.budget && self.critical_represented(ctx)
    }
}

fn list_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let ids: Vec<&str> = ids.into_iter().collect();
    if ids.len() <= MAX_LISTED_IDS {
        ids.join(", ")
    } else {
        format!(
            "{} and {} more",
            ids[..MAX_LISTED_IDS].join(", "),
            ids.len() - MAX_LISTED_IDS
        )
    }
}

impl<'a> FallbackOrchestrator<'a> {
    pub fn new(
        assembler: &'a ContextAssembler,
        compression: &'a CompressionEngine,
        estimator: SharedEstimator,
    ) -> Self {
        Self {
            assembler,
            compression,
            estimator,
        }
    }

    /// Run the state machine over `documents` (ranker order, dependencies
    /// first). `cluster_of` groups documents for concurrent compression.
    pub async fn run(
        &self,
        documents: &[Document],
        budget: u64,
        options: &LoadOptions,
        cluster_of: &HashMap<String, usize>,
    ) -> Result<FallbackOutcome> {
        let critical: Vec<String> = if options.preserve_critical_context {
            documents
                .iter()
                .filter(|d| d.is_critical())
                .map(|d| d.id.clone())
                .collect()
        } else {
            Vec::new()
        };
        let protected: HashSet<String> =
            dependency_closure_ids(documents, critical.iter().map(String::as_str))
                .into_iter()
                .map(str::to_string)
                .collect();

        let mut run = Run {
            options,
            budget,
            protected,
            critical,
            warnings: Vec::new(),
        };

        let mut state = LoadStrategy::FullLoad;
        let mut remaining: Vec<Document> = documents.to_vec();
        loop {
            debug!(state = %state, documents = remaining.len(), budget, "Attempting load strategy");
            let attempt = match state {
                LoadStrategy::FullLoad => self.full_load(&run, &remaining),
                LoadStrategy::Prioritized => {
                    let (attempt, reduced) = self.prioritized(&mut run, &remaining);
                    remaining = reduced;
                    attempt
                }
                LoadStrategy::Chunked if options.enable_chunking => self.chunked(&mut run, &remaining),
                LoadStrategy::Summarized if options.enable_content_summarization => {
                    self.summarized(&mut run, &remaining, cluster_of).await?
                }
                LoadStrategy::Chunked | LoadStrategy::Summarized => {
                    debug!(state = %state, "Strategy disabled, skipping");
                    None
                }
                LoadStrategy::Failed => {
                    return Ok(self.failed(run, documents));
                }
            };

            if let Some((assembled, partially_included, compression_results)) = attempt {
                info!(
                    strategy = %state,
                    documents = assembled.document_ids.len(),
                    tokens = assembled.total_tokens,
                    budget,
                    "Context assembled"
                );
                return Ok(FallbackOutcome {
                    strategy: state,
                    assembled: Some(assembled),
                    partially_included,
                    compression_results,
                    warnings: run.warnings,
                    errors: Vec::new(),
                });
            }

            match state.next() {
                Some(next) => state = next,
                None => return Ok(self.failed(run, documents)),
            }
        }
    }

    fn sections(&self, run: &Run<'_>, documents: &[Document]) -> Vec<ContextSection> {
        documents
            .iter()
            .enumerate()
            .map(|(rank, d)| ContextSection::full(d, rank, run.protected.contains(&d.id)))
            .collect()
    }

    fn full_load(&self, run: &Run<'_>, documents: &[Document]) -> Option<Attempt> {
        let ctx = self.assembler.assemble(self.sections(run, documents));
        run.accepts(&ctx).then(|| (ctx, Vec::new(), Vec::new()))
    }

    /// Drop unprotected documents from the bottom of the ranking, each with
    /// the documents that depend on it, critical documents last. Returns the
    /// attempt and the reduced set either way.
    fn prioritized(&self, run: &mut Run<'_>, documents: &[Document]) -> (Option<Attempt>, Vec<Document>) {
        let steps = drop_sequence(documents, &run.protected);

        let reduce = |k: usize| -> Vec<Document> {
            let dropped: HashSet<usize> = steps[..k].iter().flatten().copied().collect();
            documents
                .iter()
                .enumerate()
                .filter(|(i, _)| !dropped.contains(i))
                .map(|(_, d)| d.clone())
                .collect()
        };

        // Payloads shrink along the sequence, so the first fitting step is
        // found by binary search
        let fits = |k: usize| -> Option<AssembledContext> {
            let ctx = self.assembler.assemble(self.sections(run, &reduce(k)));
            run.accepts(&ctx).then_some(ctx)
        };
        let found = if fits(steps.len()).is_none() {
            None
        } else {
            let (mut lo, mut hi) = (0usize, steps.len());
            while lo < hi {
                let mid = (lo + hi) / 2;
                if fits(mid).is_some() {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            Some(lo)
        };

        let used = found.unwrap_or(steps.len());
        let attempt = found.and_then(&fits).map(|ctx| (ctx, Vec::new(), Vec::new()));
        let reduced = reduce(used);

        if used > 0 {
            let dropped: Vec<&str> = steps[..used]
                .iter()
                .flatten()
                .map(|&i| documents[i].id.as_str())
                .collect();
            warn!(dropped = dropped.len(), "Dropped lower-ranked documents");
            run.warnings.push(format!(
                "Prioritized: dropped {} lower-ranked document(s): {}",
                dropped.len(),
                list_ids(dropped)
            ));
        }
        (attempt, reduced)
    }

    /// Split documents into `budget / 4` token chunks and take chunks in
    /// payload order while they fit
    fn chunked(&self, run: &mut Run<'_>, documents: &[Document]) -> Option<Attempt> {
        let chunk_tokens = (run.budget / CHUNKS_PER_BUDGET).max(1);
        let mut sections = Vec::new();
        let mut chunk_totals: HashMap<String, usize> = HashMap::new();
        for (rank, doc) in documents.iter().enumerate() {
            let chunks = split_into_chunks(self.estimator.as_ref(), &doc.content, chunk_tokens);
            let total = chunks.len().max(1);
            chunk_totals.insert(doc.id.clone(), total);
            let protected = run.protected.contains(&doc.id);
            if chunks.is_empty() {
                sections.push(ContextSection::full(doc, rank, protected));
                continue;
            }
            for (index, chunk) in chunks.into_iter().enumerate() {
                sections.push(ContextSection::with_part(
                    doc,
                    rank,
                    protected,
                    SectionPart::Chunk { index, total },
                    Arc::from(chunk),
                ));
            }
        }
        ContextAssembler::order(&mut sections);

        let mut included = Vec::new();
        let mut spent = TokenBudget::new(run.budget);
        for section in sections {
            if !spent.try_add(self.assembler.section_tokens(&section)) {
                break;
            }
            included.push(section);
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for section in &included {
            *counts.entry(section.document_id.clone()).or_insert(0) += 1;
        }
        let partially_included: Vec<String> = documents
            .iter()
            .filter(|d| {
                let got = counts.get(&d.id).copied().unwrap_or(0);
                got > 0 && got < chunk_totals.get(&d.id).copied().unwrap_or(1)
            })
            .map(|d| d.id.clone())
            .collect();
        let excluded: Vec<&str> = documents
            .iter()
            .filter(|d| !counts.contains_key(&d.id))
            .map(|d| d.id.as_str())
            .collect();

        let ctx = self.assembler.assemble(included);
        if !run.accepts(&ctx) {
            debug!(chunk_tokens, spent = spent.current(), "Chunked load rejected");
            return None;
        }

        if !partially_included.is_empty() {
            run.warnings.push(format!(
                "Chunked: {} document(s) only partially included: {}",
                partially_included.len(),
                list_ids(partially_included.iter().map(String::as_str))
            ));
        }
        if !excluded.is_empty() {
            run.warnings.push(format!(
                "Chunked: {} document(s) did not fit: {}",
                excluded.len(),
                list_ids(excluded)
            ));
        }
        Some((ctx, partially_included, Vec::new()))
    }

    /// Compress the remaining set at decreasing target ratios until it fits
    async fn summarized(
        &self,
        run: &mut Run<'_>,
        documents: &[Document],
        cluster_of: &HashMap<String, usize>,
    ) -> Result<Option<Attempt>> {
        let groups = group_by_cluster(documents, cluster_of);
        let mut last_results = Vec::new();

        for ratio in SUMMARY_TARGET_RATIOS {
            let outcomes = self
                .compression
                .compress_groups(groups.clone(), ratio, &CompressionStrategy::ORDERED)
                .await?;

            let mut compressed: HashMap<String, (Document, CompressionStrategy)> = HashMap::new();
            let mut below = Vec::new();
            last_results.clear();
            for outcome in outcomes {
                if outcome.below_threshold {
                    below.push(outcome.result.clone());
                }
                for doc in outcome.documents {
                    compressed.insert(doc.id.clone(), (doc, outcome.result.strategy));
                }
                last_results.push(outcome.result);
            }

            let sections: Vec<ContextSection> = documents
                .iter()
                .enumerate()
                .filter_map(|(rank, d)| {
                    compressed.get(&d.id).map(|(c, strategy)| {
                        ContextSection::with_part(
                            c,
                            rank,
                            run.protected.contains(&d.id),
                            SectionPart::Compressed(*strategy),
                            Arc::clone(&c.content),
                        )
                    })
                })
                .collect();
            let ctx = self.assembler.assemble(sections);
            debug!(ratio, tokens = ctx.total_tokens, budget = run.budget, "Summarized attempt");

            if run.accepts(&ctx) {
                for result in &below {
                    run.warnings.push(IssueKind::CompressionQualityBelowThreshold.tag(format!(
                        "{} reached quality {:.1}, below threshold {:.1}",
                        result.strategy,
                        result.quality_score,
                        self.compression.quality_threshold()
                    )));
                }
                let original: u64 = last_results.iter().map(|r| r.original_tokens).sum();
                let after: u64 = last_results.iter().map(|r| r.compressed_tokens).sum();
                run.warnings.push(format!(
                    "Summarized: {} document(s) compressed at target ratio {:.2} ({} -> {} tokens)",
                    documents.len(),
                    ratio,
                    original,
                    after
                ));
                return Ok(Some((ctx, Vec::new(), last_results)));
            }
        }
        Ok(None)
    }

    fn failed(&self, run: Run<'_>, documents: &[Document]) -> FallbackOutcome {
        let required: u64 = documents.iter().map(|d| d.estimated_tokens).sum();
        let message = IssueKind::Validation.tag(format!(
            "No loading strategy fits {} document(s) ({} estimated tokens) into a budget of {} tokens",
            documents.len(),
            required,
            run.budget
        ));
        warn!(budget = run.budget, required, "All loading strategies failed");
        FallbackOutcome {
            strategy: LoadStrategy::Failed,
            assembled: None,
            partially_included: Vec::new(),
            compression_results: Vec::new(),
            warnings: run.warnings,
            errors: vec![message],
        }
    }
}

type Attempt = (AssembledContext, Vec<String>, Vec<CompressionResult>);

/// Ordered drop steps: each removes the lowest-ranked unprotected document
/// still present plus every present document that depends on it. Steps that
/// take a critical document come only after every other step is used up.
/// Stops when only protected documents remain, or a single document when
/// none are protected.
fn drop_sequence(documents: &[Document], protected: &HashSet<String>) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.as_str(), i))
        .collect();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, d) in documents.iter().enumerate() {
        for dep in &d.dependencies {
            if let Some(&j) = index.get(dep.as_str()) {
                dependents.entry(j).or_default().push(i);
            }
        }
    }

    let droppable = |j: usize, present: &[bool]| present[j] && !protected.contains(&documents[j].id);
    let unit_of = |i: usize, present: &[bool]| -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut stack = vec![i];
        while let Some(j) = stack.pop() {
            if !droppable(j, present) || !seen.insert(j) {
                continue;
            }
            if let Some(ds) = dependents.get(&j) {
                stack.extend(ds.iter().copied());
            }
        }
        let mut unit: Vec<usize> = seen.into_iter().collect();
        unit.sort_unstable();
        unit
    };

    let mut present = vec![true; documents.len()];
    let mut remaining = documents.len();
    let mut steps = Vec::new();
    let floor = usize::from(protected.is_empty());

    while remaining > floor {
        // Plain drops first, then non-critical roots that carry critical
        // dependents, then critical documents themselves
        let mut carrying = None;
        let mut critical = None;
        let mut next = None;
        for i in (0..documents.len()).rev().filter(|&i| droppable(i, &present)) {
            if documents[i].is_critical() {
                if critical.is_none() {
                    critical = Some(i);
                }
                continue;
            }
            let unit = unit_of(i, &present);
            if unit.iter().any(|&j| documents[j].is_critical()) {
                if carrying.is_none() {
                    carrying = Some(unit);
                }
                continue;
            }
            next = Some(unit);
            break;
        }
        let Some(step) = next
            .or(carrying)
            .or_else(|| critical.map(|i| unit_of(i, &present)))
        else {
            break;
        };
        // Keep at least one document
        if step.len() >= remaining {
            break;
        }
        for &j in &step {
            present[j] = false;
        }
        remaining -= step.len();
        steps.push(step);
    }
    steps
}

fn group_by_cluster(
    documents: &[Document],
    cluster_of: &HashMap<String, usize>,
) -> Vec<Vec<Document>> {
    let mut groups: Vec<(usize, Vec<Document>)> = Vec::new();
    let mut slot: HashMap<usize, usize> = HashMap::new();
    for doc in documents {
        let key = cluster_of.get(&doc.id).copied().unwrap_or(usize::MAX);
        let at = *slot.entry(key).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[at].1.push(doc.clone());
    }
    groups.into_iter().map(|(_, g)| g).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CharRatioEstimator, ExtractiveSummarizer};
    use crate::types::{DocumentType, Priority};
    use proptest::prelude::*;

    fn estimator() -> SharedEstimator {
        Arc::new(CharRatioEstimator::default())
    }

    fn doc(id: &str, tokens: usize, priority: Priority) -> Document {
        let sentence = "Project scope and schedule detail. ";
        let body = sentence.repeat(tokens * 4 / sentence.len() + 1);
        let content: String = body.chars().take(tokens * 4).collect();
        Document::new(id, DocumentType::Other, content)
            .with_priority(priority)
            .with_estimated_tokens(tokens as u64)
    }

    async fn run(docs: &[Document], budget: u64, options: &LoadOptions) -> FallbackOutcome {
        let assembler = ContextAssembler::new(estimator());
        let compression = CompressionEngine::new(estimator(), Arc::new(ExtractiveSummarizer));
        FallbackOrchestrator::new(&assembler, &compression, estimator())
            .run(docs, budget, options, &HashMap::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_load_when_it_fits() {
        let docs = vec![doc("a", 100, Priority::Medium), doc("b", 100, Priority::Medium)];
        let outcome = run(&docs, 1_000, &LoadOptions::default()).await;
        assert_eq!(outcome.strategy, LoadStrategy::FullLoad);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.assembled.unwrap().document_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_prioritized_drops_lowest_ranked_keeps_critical() {
        let docs = vec![
            doc("high", 300, Priority::High),
            doc("mid", 300, Priority::Medium),
            doc("crit", 300, Priority::Critical),
        ];
        let outcome = run(&docs, 700, &LoadOptions::default()).await;
        assert_eq!(outcome.strategy, LoadStrategy::Prioritized);
        let ids = outcome.assembled.unwrap().document_ids;
        assert_eq!(ids, vec!["crit", "high"]);
        assert!(outcome.warnings[0].contains("mid"));
    }

    #[tokio::test]
    async fn test_dependents_dropped_with_dependency() {
        let docs = vec![
            doc("a", 300, Priority::High),
            doc("b", 300, Priority::Medium).with_dependencies(["c"]),
            doc("c", 300, Priority::Low),
        ];
        let outcome = run(&docs, 700, &LoadOptions::strict()).await;
        assert_eq!(outcome.strategy, LoadStrategy::Prioritized);
        assert_eq!(outcome.assembled.unwrap().document_ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_chunked_records_partial_documents() {
        let docs = vec![doc("big", 2_000, Priority::Critical)];
        let options = LoadOptions {
            enable_content_summarization: false,
            ..Default::default()
        };
        let outcome = run(&docs, 1_000, &options).await;
        assert_eq!(outcome.strategy, LoadStrategy::Chunked);
        assert_eq!(outcome.partially_included, vec!["big"]);
        let ctx = outcome.assembled.unwrap();
        assert!(ctx.total_tokens <= 1_000);
        assert!(ctx.payload.contains("part=\"chunk 1/"));
    }

    #[tokio::test]
    async fn test_summarized_when_chunking_disabled() {
        let docs = vec![doc("a", 1_000, Priority::Critical)];
        let options = LoadOptions {
            enable_chunking: false,
            ..Default::default()
        };
        let outcome = run(&docs, 700, &options).await;
        assert_eq!(outcome.strategy, LoadStrategy::Summarized);
        assert!(!outcome.compression_results.is_empty());
        assert!(outcome.assembled.unwrap().total_tokens <= 700);
    }

    #[tokio::test]
    async fn test_failed_when_nothing_fits() {
        let docs = vec![doc("a", 5_000, Priority::Medium), doc("b", 5_000, Priority::Medium)];
        let outcome = run(&docs, 1_000, &LoadOptions::strict()).await;
        assert_eq!(outcome.strategy, LoadStrategy::Failed);
        assert!(!outcome.success());
        assert!(outcome.errors[0].starts_with("[VALIDATION]"));
        assert!(outcome.assembled.is_none());
    }

    #[test]
    fn test_drop_sequence_floor() {
        let docs = vec![
            doc("a", 1, Priority::Low),
            doc("b", 1, Priority::Low),
            doc("c", 1, Priority::Low),
        ];
        let steps = drop_sequence(&docs, &HashSet::new());
        assert_eq!(steps, vec![vec![2], vec![1]]);

        let protected: HashSet<String> = ["a".to_string()].into_iter().collect();
        let steps = drop_sequence(&docs, &protected);
        assert_eq!(steps, vec![vec![2], vec![1]]);
    }

    #[test]
    fn test_drop_sequence_critical_last() {
        let docs = vec![
            doc("med", 1, Priority::Medium),
            doc("low", 1, Priority::Low),
            doc("crit", 1, Priority::Critical),
            doc("dep", 1, Priority::Low),
            doc("needs", 1, Priority::Critical).with_dependencies(["dep"]),
        ];
        let steps = drop_sequence(&docs, &HashSet::new());
        // dep takes a critical dependent with it, so it goes after the plain drops
        assert_eq!(steps, vec![vec![1], vec![0], vec![3, 4]]);
    }

    #[tokio::test]
    async fn test_critical_survives_without_preservation() {
        let docs = vec![doc("med", 1_000, Priority::Medium), doc("crit", 1_000, Priority::Critical)];
        let options = LoadOptions {
            preserve_critical_context: false,
            enable_chunking: false,
            enable_content_summarization: false,
            ..Default::default()
        };
        let outcome = run(&docs, 1_500, &options).await;
        assert_eq!(outcome.strategy, LoadStrategy::Prioritized);
        assert_eq!(outcome.assembled.unwrap().document_ids, vec!["crit"]);
        assert!(outcome.warnings[0].contains("med"));
    }

    fn priority(p: u8) -> Priority {
        match p {
            0 => Priority::Critical,
            1 => Priority::High,
            2 => Priority::Medium,
            _ => Priority::Low,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_outcome_fits_and_critical_goes_last(
            specs in prop::collection::vec((1usize..400, 0u8..4), 1..12),
            budget in 50u64..3_000,
            preserve in any::<bool>(),
            chunking in any::<bool>(),
            summarization in any::<bool>(),
        ) {
            let docs: Vec<Document> = specs
                .iter()
                .enumerate()
                .map(|(i, (tokens, p))| doc(&format!("d{i}"), *tokens, priority(*p)))
                .collect();
            let options = LoadOptions {
                preserve_critical_context: preserve,
                enable_chunking: chunking,
                enable_content_summarization: summarization,
                ..Default::default()
            };
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let outcome = rt.block_on(run(&docs, budget, &options));

            prop_assert_eq!(outcome.success(), outcome.assembled.is_some());
            if let Some(ctx) = &outcome.assembled {
                prop_assert!(ctx.total_tokens <= budget);
                let present: HashSet<&str> = ctx.document_ids.iter().map(String::as_str).collect();
                let critical_missing = docs
                    .iter()
                    .any(|d| d.is_critical() && !present.contains(d.id.as_str()));
                if preserve {
                    prop_assert!(!critical_missing);
                } else if critical_missing {
                    let non_critical_dropped = docs.iter().all(|d| {
                        !matches!(d.priority, Priority::Medium | Priority::Low)
                            || !present.contains(d.id.as_str())
                    });
                    prop_assert!(non_critical_dropped);
                }
            }
        }
    }
}
