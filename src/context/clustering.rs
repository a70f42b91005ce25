//! Clustering Engine
//!
//! Partitions a ranked corpus into at most `max_clusters` groups. Every
//! strategy produces an exact partition of the input ids; oversized
//! partitions are reduced by merging the two clusters with the lowest
//! aggregate relevance until the limit holds. Hierarchical clusters keep
//! their members in weighted-score order, merged runs included.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::constants::clustering::{DEFAULT_MAX_CLUSTERS, TEMPORAL_BANDS_DAYS};
use crate::types::{ClusteringStrategy, Document};

use super::ranker::{DocumentRanker, RankingWeights};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub label: String,
    pub strategy_used: ClusteringStrategy,
    /// Member ids in ranker order
    pub document_ids: Vec<String>,
    pub aggregate_tokens: u64,
    /// Mean relevance of the members
    pub aggregate_relevance: f64,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.document_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document_ids.is_empty()
    }
}

/// Working group of input positions
struct Group {
    label: String,
    members: Vec<usize>,
    relevance_sum: f64,
}

impl Group {
    fn new(label: impl Into<String>, members: Vec<usize>, docs: &[Document]) -> Self {
        let relevance_sum = members.iter().map(|&i| docs[i].relevance_score).sum();
        Self {
            label: label.into(),
            members,
            relevance_sum,
        }
    }

    fn mean_relevance(&self) -> f64 {
        if self.members.is_empty() {
            0.0
        } else {
            self.relevance_sum / self.members.len() as f64
        }
    }
}

pub struct ClusteringEngine {
    max_clusters: usize,
    ranker: DocumentRanker,
}

impl Default for ClusteringEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CLUSTERS)
    }
}

impl ClusteringEngine {
    pub fn new(max_clusters: usize) -> Self {
        Self {
            max_clusters: max_clusters.max(1),
            ranker: DocumentRanker::default(),
        }
    }

    /// Weights used to order members of hierarchical clusters
    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.ranker = DocumentRanker::new(weights);
        self
    }

    pub fn max_clusters(&self) -> usize {
        self.max_clusters
    }

    /// Cluster `documents` (expected in ranker order) with `strategy`.
    ///
    /// Clusters come back sorted by aggregate relevance, highest first.
    pub fn cluster(
        &self,
        documents: &[Document],
        strategy: ClusteringStrategy,
        now: DateTime<Utc>,
    ) -> Vec<Cluster> {
        if documents.is_empty() {
            return Vec::new();
        }

        let groups = match strategy {
            ClusteringStrategy::Category => by_category(documents),
            ClusteringStrategy::Hierarchical => {
                let scores: Vec<f64> = documents
                    .iter()
                    .map(|d| self.ranker.score(d, now))
                    .collect();
                let mut groups = by_category(documents);
                for group in &mut groups {
                    group
                        .members
                        .sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
                }
                groups
            }
            ClusteringStrategy::Relevance => by_relevance(documents, self.max_clusters),
            ClusteringStrategy::Temporal => by_age(documents, now),
        };
        let initial = groups.len();
        let keep_runs = strategy == ClusteringStrategy::Hierarchical;
        let mut groups = merge_down(groups, self.max_clusters, keep_runs);

        // Stable: equal relevance keeps first-member order
        groups.sort_by(|a, b| {
            b.mean_relevance()
                .total_cmp(&a.mean_relevance())
                .then_with(|| a.members[0].cmp(&b.members[0]))
        });

        let clusters: Vec<Cluster> = groups
            .into_iter()
            .enumerate()
            .map(|(idx, g)| Cluster {
                id: format!("{}-{}", strategy, idx),
                aggregate_relevance: g.mean_relevance(),
                aggregate_tokens: g.members.iter().map(|&i| documents[i].estimated_tokens).sum(),
                document_ids: g.members.iter().map(|&i| documents[i].id.clone()).collect(),
                label: g.label,
                strategy_used: strategy,
            })
            .collect();

        debug!(
            strategy = %strategy,
            documents = documents.len(),
            initial_groups = initial,
            clusters = clusters.len(),
            "Corpus clustered"
        );
        clusters
    }
}

fn by_category(docs: &[Document]) -> Vec<Group> {
    let mut buckets: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, d) in docs.iter().enumerate() {
        buckets.entry(d.category.as_str()).or_default().push(i);
    }
    buckets
        .into_iter()
        .map(|(label, members)| Group::new(label, members, docs))
        .collect()
}

/// Quantile buckets: members sorted by relevance, cut into `k` near-equal runs
fn by_relevance(docs: &[Document], max_clusters: usize) -> Vec<Group> {
    let mut order: Vec<usize> = (0..docs.len()).collect();
    order.sort_by(|&a, &b| docs[b].relevance_score.total_cmp(&docs[a].relevance_score));

    let k = max_clusters.min(docs.len()).max(1);
    let (base, extra) = (docs.len() / k, docs.len() % k);
    let mut groups = Vec::with_capacity(k);
    let mut start = 0;
    for q in 0..k {
        let size = base + usize::from(q < extra);
        let mut members = order[start..start + size].to_vec();
        members.sort_unstable();
        groups.push(Group::new(format!("q{}", q + 1), members, docs));
        start += size;
    }
    groups
}

fn by_age(docs: &[Document], now: DateTime<Utc>) -> Vec<Group> {
    let labels = ["week", "month", "quarter", "year", "older"];
    let mut bands: Vec<Vec<usize>> = vec![Vec::new(); labels.len()];
    for (i, d) in docs.iter().enumerate() {
        let age = (now - d.last_modified).num_days().max(0);
        let band = TEMPORAL_BANDS_DAYS
            .iter()
            .position(|&limit| age <= limit)
            .unwrap_or(TEMPORAL_BANDS_DAYS.len());
        bands[band].push(i);
    }
    bands
        .into_iter()
        .zip(labels)
        .filter(|(members, _)| !members.is_empty())
        .map(|(members, label)| Group::new(label, members, docs))
        .collect()
}

/// Merge the two lowest-relevance groups until at most `max` remain.
/// With `keep_runs` the absorbed members are appended as a run instead of
/// being interleaved back into input order.
fn merge_down(mut groups: Vec<Group>, max: usize, keep_runs: bool) -> Vec<Group> {
    while groups.len() > max {
        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by(|&a, &b| {
            groups[a]
                .mean_relevance()
                .total_cmp(&groups[b].mean_relevance())
                .then_with(|| a.cmp(&b))
        });
        let (keep, absorb) = (order[0].min(order[1]), order[0].max(order[1]));
        let absorbed = groups.remove(absorb);
        let target = &mut groups[keep];
        target.members.extend(absorbed.members);
        if !keep_runs {
            target.members.sort_unstable();
        }
        target.relevance_sum += absorbed.relevance_sum;
        target.label = format!("{}+{}", target.label, absorbed.label);
    }
    groups
}

/// Map from document id to the index of its cluster
pub fn cluster_index(clusters: &[Cluster]) -> HashMap<&str, usize> {
    clusters
        .iter()
        .enumerate()
        .flat_map(|(ci, c)| c.document_ids.iter().map(move |id| (id.as_str(), ci)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentType, Priority};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn doc(id: &str, category: &str, relevance: f64, age_days: i64) -> Document {
        Document::new(id, DocumentType::Other, "x")
            .with_category(category)
            .with_scores(relevance, 50.0)
            .with_last_modified(now() - Duration::days(age_days))
            .with_estimated_tokens(10)
    }

    fn assert_partition(docs: &[Document], clusters: &[Cluster]) {
        let mut seen = HashSet::new();
        for c in clusters {
            for id in &c.document_ids {
                assert!(seen.insert(id.clone()), "duplicate {id}");
            }
        }
        assert_eq!(seen.len(), docs.len());
    }

    #[test]
    fn test_category_clusters() {
        let docs = vec![
            doc("a", "risk", 90.0, 1),
            doc("b", "cost", 20.0, 1),
            doc("c", "risk", 70.0, 1),
        ];
        let clusters = ClusteringEngine::new(10).cluster(&docs, ClusteringStrategy::Category, now());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].label, "risk");
        assert_eq!(clusters[0].document_ids, vec!["a", "c"]);
        assert_eq!(clusters[0].aggregate_relevance, 80.0);
        assert_eq!(clusters[0].aggregate_tokens, 20);
        assert_eq!(clusters[0].id, "category-0");
        assert_partition(&docs, &clusters);
    }

    #[test]
    fn test_merge_lowest_relevance() {
        let docs = vec![
            doc("a", "risk", 90.0, 1),
            doc("b", "cost", 20.0, 1),
            doc("c", "scope", 30.0, 1),
        ];
        let clusters =
            ClusteringEngine::new(2).cluster(&docs, ClusteringStrategy::Hierarchical, now());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].document_ids, vec!["a"]);
        assert_eq!(clusters[1].document_ids, vec!["b", "c"]);
        assert_eq!(clusters[1].label, "cost+scope");
    }

    #[test]
    fn test_hierarchical_orders_members_by_score() {
        let docs = vec![
            doc("lo", "risk", 0.0, 400)
                .with_scores(0.0, 0.0)
                .with_priority(Priority::Low),
            doc("hi", "risk", 100.0, 400)
                .with_scores(100.0, 100.0)
                .with_priority(Priority::Critical),
        ];
        let engine = ClusteringEngine::new(10);
        let hierarchical = engine.cluster(&docs, ClusteringStrategy::Hierarchical, now());
        let category = engine.cluster(&docs, ClusteringStrategy::Category, now());
        assert_eq!(hierarchical[0].document_ids, vec!["hi", "lo"]);
        assert_eq!(category[0].document_ids, vec!["lo", "hi"]);
    }

    #[test]
    fn test_hierarchical_merge_keeps_ranked_runs() {
        let docs = vec![
            doc("risk-lo", "risk", 10.0, 1),
            doc("cost", "cost", 5.0, 1),
            doc("risk-hi", "risk", 30.0, 1),
            doc("scope", "scope", 90.0, 1),
        ];
        // Only relevance counts, so the score order is plain relevance order
        let weights = RankingWeights {
            relevance: 1.0,
            quality: 0.0,
            priority: 0.0,
            recency: 0.0,
            ..Default::default()
        };
        let clusters = ClusteringEngine::new(2)
            .with_weights(weights)
            .cluster(&docs, ClusteringStrategy::Hierarchical, now());
        assert_eq!(clusters[0].document_ids, vec!["scope"]);
        // BTreeMap order puts cost ahead of risk; the risk run stays ranked
        assert_eq!(clusters[1].document_ids, vec!["cost", "risk-hi", "risk-lo"]);
        assert_eq!(clusters[1].label, "cost+risk");
    }

    #[test]
    fn test_relevance_quantiles() {
        let docs: Vec<Document> = (0..10)
            .map(|i| doc(&format!("d{i}"), "x", i as f64 * 10.0, 1))
            .collect();
        let clusters = ClusteringEngine::new(3).cluster(&docs, ClusteringStrategy::Relevance, now());
        assert_eq!(clusters.len(), 3);
        // 10 documents in 3 quantiles: sizes 4, 3, 3
        assert_eq!(clusters[0].document_ids, vec!["d6", "d7", "d8", "d9"]);
        assert_eq!(clusters[2].len(), 3);
        assert_partition(&docs, &clusters);
    }

    #[test]
    fn test_temporal_bands() {
        let docs = vec![
            doc("fresh", "x", 50.0, 3),
            doc("month", "x", 50.0, 20),
            doc("ancient", "x", 50.0, 1000),
        ];
        let clusters = ClusteringEngine::new(10).cluster(&docs, ClusteringStrategy::Temporal, now());
        let labels: Vec<_> = clusters.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["week", "month", "older"]);
    }

    #[test]
    fn test_empty_corpus() {
        let clusters = ClusteringEngine::default().cluster(&[], ClusteringStrategy::Category, now());
        assert!(clusters.is_empty());
    }

    proptest! {
        #[test]
        fn prop_every_strategy_partitions(
            specs in prop::collection::vec((0usize..6, 0.0f64..100.0, 0i64..800), 0..80),
            max_clusters in 1usize..10,
        ) {
            let docs: Vec<Document> = specs
                .iter()
                .enumerate()
                .map(|(i, (cat, rel, age))| doc(&format!("d{i}"), &format!("c{cat}"), *rel, *age))
                .collect();
            let engine = ClusteringEngine::new(max_clusters);
            for strategy in [
                ClusteringStrategy::Category,
                ClusteringStrategy::Relevance,
                ClusteringStrategy::Temporal,
                ClusteringStrategy::Hierarchical,
            ] {
                let clusters = engine.cluster(&docs, strategy, now());
                prop_assert!(clusters.len() <= max_clusters);
                let mut seen = HashSet::new();
                for c in &clusters {
                    prop_assert!(!c.is_empty());
                    for id in &c.document_ids {
                        prop_assert!(seen.insert(id.clone()));
                    }
                }
                prop_assert_eq!(seen.len(), docs.len());
                for pair in clusters.windows(2) {
                    prop_assert!(pair[0].aggregate_relevance >= pair[1].aggregate_relevance);
                }
            }
        }
    }
}
