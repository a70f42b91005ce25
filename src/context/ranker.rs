//! Document Priority Ranker
//!
//! Weighted scoring of candidate documents plus dependency closure:
//! - score = relevance, quality, priority weight and recency, each 0-100
//! - stable descending sort, so equal scores keep corpus order
//! - dependencies are placed ahead of the documents that need them

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::ranking as ranking_constants;
use crate::types::{Document, Result, ValidationError};

/// Score weights, expected to sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub relevance: f64,
    pub quality: f64,
    pub priority: f64,
    pub recency: f64,
    /// Days over which recency decays linearly to zero
    pub recency_horizon_days: u32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: ranking_constants::RELEVANCE_WEIGHT,
            quality: ranking_constants::QUALITY_WEIGHT,
            priority: ranking_constants::PRIORITY_WEIGHT,
            recency: ranking_constants::RECENCY_WEIGHT,
            recency_horizon_days: ranking_constants::RECENCY_HORIZON_DAYS,
        }
    }
}

impl RankingWeights {
    pub fn validate(&self) -> Result<()> {
        let weights = [self.relevance, self.quality, self.priority, self.recency];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ValidationError::range("ranking", "weights must be non-negative").into());
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 0.01 {
            return Err(
                ValidationError::range("ranking", format!("weights must sum to 1.0, got {sum:.2}"))
                    .into(),
            );
        }
        if self.recency_horizon_days == 0 {
            return Err(ValidationError::range(
                "ranking.recency_horizon_days",
                "must be greater than 0",
            )
            .into());
        }
        Ok(())
    }
}

pub struct DocumentRanker {
    weights: RankingWeights,
}

impl Default for DocumentRanker {
    fn default() -> Self {
        Self::new(RankingWeights::default())
    }
}

impl DocumentRanker {
    pub fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }

    /// Recency component: 100 for today, falling linearly to 0 at the horizon
    pub fn recency(&self, doc: &Document, now: DateTime<Utc>) -> f64 {
        let age_days = (now - doc.last_modified).num_days().max(0) as f64;
        let horizon = self.weights.recency_horizon_days.max(1) as f64;
        (1.0 - age_days / horizon).max(0.0) * 100.0
    }

    /// Weighted score in [0, 100]
    pub fn score(&self, doc: &Document, now: DateTime<Utc>) -> f64 {
        let w = &self.weights;
        w.relevance * doc.relevance_score
            + w.quality * doc.quality_score
            + w.priority * doc.priority.weight()
            + w.recency * self.recency(doc, now)
    }

    /// Sort by descending score. Ties keep input order, so ranking a ranked
    /// list is a no-op.
    pub fn rank(&self, documents: Vec<Document>, now: DateTime<Utc>) -> Vec<Document> {
        let mut scored: Vec<(f64, Document)> = documents
            .into_iter()
            .map(|d| (self.score(&d, now), d))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, d)| d).collect()
    }
}

/// A document excluded because a dependency is unavailable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyViolation {
    pub document: String,
    pub missing: String,
}

impl std::fmt::Display for DependencyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Document '{}' excluded: dependency '{}' is not available",
            self.document, self.missing
        )
    }
}

pub struct ClosureOutcome {
    /// Documents with every dependency present, dependencies first
    pub documents: Vec<Document>,
    pub violations: Vec<DependencyViolation>,
}

/// Remove documents whose dependencies (transitively) are absent and reorder
/// the rest so each dependency precedes its dependents. Otherwise the input
/// order is kept. Dependency cycles are tolerated; members keep input order.
pub fn enforce_dependency_closure(documents: Vec<Document>) -> ClosureOutcome {
    let index: HashMap<&str, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.as_str(), i))
        .collect();

    // Resolve availability to a fixpoint so exclusions propagate to dependents
    let mut missing: HashMap<usize, String> = HashMap::new();
    loop {
        let mut changed = false;
        for (i, doc) in documents.iter().enumerate() {
            if missing.contains_key(&i) {
                continue;
            }
            let absent = doc.dependencies.iter().find(|dep| match index.get(dep.as_str()) {
                Some(j) => missing.contains_key(j),
                None => true,
            });
            if let Some(dep) = absent {
                missing.insert(i, dep.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut order = Vec::with_capacity(documents.len());
    let mut placed = HashSet::new();
    let mut visiting = HashSet::new();
    for i in 0..documents.len() {
        place(i, &documents, &index, &missing, &mut placed, &mut visiting, &mut order);
    }

    let violations: Vec<DependencyViolation> = documents
        .iter()
        .enumerate()
        .filter_map(|(i, d)| {
            missing.get(&i).map(|dep| DependencyViolation {
                document: d.id.clone(),
                missing: dep.clone(),
            })
        })
        .collect();
    for v in &violations {
        warn!(document = %v.document, missing = %v.missing, "Dependency closure violation");
    }

    let mut slots: Vec<Option<Document>> = documents.into_iter().map(Some).collect();
    let documents: Vec<Document> = order.into_iter().filter_map(|i| slots[i].take()).collect();
    debug!(
        kept = documents.len(),
        excluded = violations.len(),
        "Dependency closure enforced"
    );

    ClosureOutcome {
        documents,
        violations,
    }
}

fn place(
    i: usize,
    documents: &[Document],
    index: &HashMap<&str, usize>,
    missing: &HashMap<usize, String>,
    placed: &mut HashSet<usize>,
    visiting: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) {
    if missing.contains_key(&i) || placed.contains(&i) || !visiting.insert(i) {
        return;
    }
    for dep in &documents[i].dependencies {
        if let Some(&j) = index.get(dep.as_str()) {
            place(j, documents, index, missing, placed, visiting, order);
        }
    }
    visiting.remove(&i);
    placed.insert(i);
    order.push(i);
}

/// Ids of `seeds` plus every dependency reachable from them within `documents`
pub fn dependency_closure_ids<'a>(
    documents: &'a [Document],
    seeds: impl IntoIterator<Item = &'a str>,
) -> HashSet<&'a str> {
    let by_id: HashMap<&str, &Document> = documents.iter().map(|d| (d.id.as_str(), d)).collect();
    let mut closure = HashSet::new();
    let mut stack: Vec<&str> = seeds.into_iter().collect();
    while let Some(id) = stack.pop() {
        if !closure.insert(id) {
            continue;
        }
        if let Some(doc) = by_id.get(id) {
            stack.extend(doc.dependencies.iter().map(String::as_str));
        }
    }
    closure.retain(|id| by_id.contains_key(id));
    closure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentType, Priority};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn doc(id: &str, relevance: f64, priority: Priority) -> Document {
        Document::new(id, DocumentType::Other, "x")
            .with_scores(relevance, 50.0)
            .with_priority(priority)
            .with_last_modified(now())
    }

    #[test]
    fn test_score_formula() {
        let ranker = DocumentRanker::default();
        let d = Document::new("a", DocumentType::Schedule, "x")
            .with_scores(80.0, 60.0)
            .with_priority(Priority::High)
            .with_last_modified(now());
        // 0.35*80 + 0.25*60 + 0.25*75 + 0.15*100
        assert!((ranker.score(&d, now()) - 76.75).abs() < 1e-9);
    }

    #[test]
    fn test_recency_decays_linearly() {
        let ranker = DocumentRanker::default();
        let half = doc("a", 0.0, Priority::Low).with_last_modified(now() - Duration::days(182));
        assert!((ranker.recency(&half, now()) - 50.13698630136986).abs() < 1e-6);
        let old = doc("b", 0.0, Priority::Low).with_last_modified(now() - Duration::days(900));
        assert_eq!(ranker.recency(&old, now()), 0.0);
    }

    #[test]
    fn test_rank_is_stable() {
        let ranker = DocumentRanker::default();
        let docs = vec![
            doc("a", 50.0, Priority::Medium),
            doc("b", 90.0, Priority::Medium),
            doc("c", 50.0, Priority::Medium),
        ];
        let ranked = ranker.rank(docs, now());
        let ids: Vec<_> = ranked.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_closure_orders_dependencies_first() {
        let docs = vec![
            doc("wbs", 90.0, Priority::High).with_dependencies(["charter"]),
            doc("schedule", 80.0, Priority::Medium).with_dependencies(["wbs"]),
            doc("charter", 10.0, Priority::Critical),
        ];
        let outcome = enforce_dependency_closure(docs);
        let ids: Vec<_> = outcome.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["charter", "wbs", "schedule"]);
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn test_closure_excludes_transitively() {
        let docs = vec![
            doc("a", 50.0, Priority::Medium).with_dependencies(["ghost"]),
            doc("b", 50.0, Priority::Medium).with_dependencies(["a"]),
            doc("c", 50.0, Priority::Medium),
        ];
        let outcome = enforce_dependency_closure(docs);
        let ids: Vec<_> = outcome.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
        assert_eq!(
            outcome.violations,
            vec![
                DependencyViolation {
                    document: "a".into(),
                    missing: "ghost".into()
                },
                DependencyViolation {
                    document: "b".into(),
                    missing: "a".into()
                },
            ]
        );
    }

    #[test]
    fn test_closure_tolerates_cycles() {
        let docs = vec![
            doc("a", 50.0, Priority::Medium).with_dependencies(["b"]),
            doc("b", 50.0, Priority::Medium).with_dependencies(["a"]),
        ];
        let outcome = enforce_dependency_closure(docs);
        assert_eq!(outcome.documents.len(), 2);
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn test_dependency_closure_ids() {
        let docs = vec![
            doc("a", 50.0, Priority::Critical).with_dependencies(["b"]),
            doc("b", 50.0, Priority::Low).with_dependencies(["c"]),
            doc("c", 50.0, Priority::Low),
            doc("d", 50.0, Priority::Low),
        ];
        let ids = dependency_closure_ids(&docs, ["a"]);
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains("d"));
    }

    proptest! {
        #[test]
        fn prop_rank_idempotent(
            scores in prop::collection::vec((0.0f64..100.0, 0.0f64..100.0, 0u8..4, 0i64..800), 0..40)
        ) {
            let ranker = DocumentRanker::default();
            let priorities = [Priority::Low, Priority::Medium, Priority::High, Priority::Critical];
            let docs: Vec<Document> = scores
                .iter()
                .enumerate()
                .map(|(i, (r, q, p, age))| {
                    Document::new(format!("d{i}"), DocumentType::Other, "x")
                        .with_scores(*r, *q)
                        .with_priority(priorities[*p as usize])
                        .with_last_modified(now() - Duration::days(*age))
                })
                .collect();
            let once = ranker.rank(docs, now());
            let once_ids: Vec<String> = once.iter().map(|d| d.id.clone()).collect();
            let twice = ranker.rank(once, now());
            let twice_ids: Vec<String> = twice.iter().map(|d| d.id.clone()).collect();
            prop_assert_eq!(once_ids, twice_ids);
            for pair in twice.windows(2) {
                prop_assert!(ranker.score(&pair[0], now()) >= ranker.score(&pair[1], now()));
            }
        }
    }
}
