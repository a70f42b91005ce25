//! Deterministic mock corpus for demos and scale tests.
//!
//! The same seed always yields the same documents. Dependencies only point
//! at planning documents generated earlier, so every generated corpus is
//! dependency-closed and survives the stakeholder/compliance filters.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::types::{Document, DocumentType, Priority};

const PLANNING: &str = "planning";

/// Category and the document types generated for it
const CATEGORIES: &[(&str, &[DocumentType])] = &[
    (
        PLANNING,
        &[
            DocumentType::ScopeStatement,
            DocumentType::WorkBreakdownStructure,
            DocumentType::Requirements,
        ],
    ),
    ("schedule", &[DocumentType::Schedule, DocumentType::StatusReport]),
    ("cost", &[DocumentType::CostBaseline, DocumentType::ProcurementPlan]),
    ("quality", &[DocumentType::QualityPlan, DocumentType::LessonsLearned]),
    ("risk", &[DocumentType::RiskRegister]),
    (
        "stakeholders",
        &[DocumentType::StakeholderRegister, DocumentType::CommunicationsPlan],
    ),
    ("compliance", &[DocumentType::ComplianceRecord]),
];

const SUBJECTS: &[&str] = &[
    "The vendor",
    "The steering committee",
    "Procurement",
    "The integration team",
    "Quality assurance",
    "The project sponsor",
    "Site operations",
];
const VERBS: &[&str] = &[
    "approves",
    "reviews",
    "delivers",
    "escalates",
    "baselines",
    "tracks",
    "validates",
];
const OBJECTS: &[&str] = &[
    "the hardware milestone",
    "the budget reserve",
    "the acceptance criteria",
    "the change request",
    "the training plan",
    "the risk response",
    "the migration window",
];
const PHASES: &[&str] = &["initiation", "planning", "execution", "monitoring", "closure"];

/// Dependencies are drawn from this many of the earliest planning documents
const DEPENDENCY_POOL: usize = 5;

#[derive(Debug, Clone)]
pub struct MockCorpus {
    seed: u64,
    critical_ratio: f64,
    dependency_ratio: f64,
}

impl Default for MockCorpus {
    fn default() -> Self {
        Self {
            seed: 42,
            critical_ratio: 0.05,
            dependency_ratio: 0.3,
        }
    }
}

impl MockCorpus {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    pub fn with_critical_ratio(mut self, ratio: f64) -> Self {
        self.critical_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_dependency_ratio(mut self, ratio: f64) -> Self {
        self.dependency_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Generate `count` documents. The first is always a critical project
    /// charter with id `charter`.
    pub fn generate(&self, count: usize, now: DateTime<Utc>) -> Vec<Document> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut documents = Vec::with_capacity(count);
        let mut planning_ids: Vec<String> = Vec::new();

        if count == 0 {
            return documents;
        }

        let charter = Document::new("charter", DocumentType::ProjectCharter, content(&mut rng, "Project Charter"))
            .with_category(PLANNING)
            .with_priority(Priority::Critical)
            .with_scores(95.0, 90.0)
            .with_last_modified(now - Duration::days(30));
        planning_ids.push(charter.id.clone());
        documents.push(charter);

        for i in 1..count {
            let (category, types) = CATEGORIES[rng.random_range(0..CATEGORIES.len())];
            let doc_type = *types.choose(&mut rng).unwrap_or(&DocumentType::Other);
            let id = format!("{}-{:04}", doc_type, i);

            let priority = if rng.random_bool(self.critical_ratio) {
                Priority::Critical
            } else {
                match rng.random_range(0..3) {
                    0 => Priority::High,
                    1 => Priority::Medium,
                    _ => Priority::Low,
                }
            };

            let dependencies: Vec<String> =
                if category != PLANNING && rng.random_bool(self.dependency_ratio) {
                    let pool = &planning_ids[..planning_ids.len().min(DEPENDENCY_POOL)];
                    let wanted = rng.random_range(1..=2).min(pool.len());
                    pool.choose_multiple(&mut rng, wanted).cloned().collect()
                } else {
                    Vec::new()
                };

            let title = format!("{} {}", title_case(doc_type.as_str()), i);
            let doc = Document::new(id, doc_type, content(&mut rng, &title))
                .with_category(category)
                .with_priority(priority)
                .with_scores(rng.random_range(20.0..100.0), rng.random_range(40.0..100.0))
                .with_last_modified(now - Duration::days(rng.random_range(0..730)))
                .with_dependencies(dependencies);

            if category == PLANNING {
                planning_ids.push(doc.id.clone());
            }
            documents.push(doc);
        }
        documents
    }
}

fn title_case(slug: &str) -> String {
    slug.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn sentence(rng: &mut StdRng) -> String {
    let pick = |rng: &mut StdRng, words: &[&str]| -> String {
        words.choose(rng).copied().unwrap_or_default().to_string()
    };
    format!(
        "{} {} {} during {}.",
        pick(rng, SUBJECTS),
        pick(rng, VERBS),
        pick(rng, OBJECTS),
        pick(rng, PHASES)
    )
}

fn content(rng: &mut StdRng, title: &str) -> String {
    let mut out = format!("# {}\n\n", title);
    for section in 0..rng.random_range(2..5) {
        out.push_str(&format!("## Section {}\n", section + 1));
        let sentences: Vec<String> = (0..rng.random_range(2..5)).map(|_| sentence(rng)).collect();
        out.push_str(&sentences.join(" "));
        if rng.random_bool(0.2) {
            out.push_str(" See [[charter]].");
        }
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_same_seed_same_corpus() {
        let a = MockCorpus::new(7).generate(50, now());
        let b = MockCorpus::new(7).generate(50, now());
        let ids_a: Vec<_> = a.iter().map(|d| (&d.id, &d.content)).collect();
        let ids_b: Vec<_> = b.iter().map(|d| (&d.id, &d.content)).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_corpus_is_dependency_closed() {
        let docs = MockCorpus::default().generate(500, now());
        assert_eq!(docs.len(), 500);
        let ids: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), 500);

        let planning: HashSet<&str> = docs
            .iter()
            .filter(|d| d.category == PLANNING)
            .map(|d| d.id.as_str())
            .collect();
        for doc in &docs {
            for dep in &doc.dependencies {
                assert!(planning.contains(dep.as_str()), "{} -> {}", doc.id, dep);
            }
        }
    }

    #[test]
    fn test_charter_first_and_critical() {
        let docs = MockCorpus::default().generate(3, now());
        assert_eq!(docs[0].id, "charter");
        assert!(docs[0].is_critical());
        assert!(docs[0].content.starts_with("# Project Charter"));
        assert!(MockCorpus::default().generate(0, now()).is_empty());
    }

    #[test]
    fn test_ratios_respected() {
        let none = MockCorpus::new(1)
            .with_critical_ratio(0.0)
            .with_dependency_ratio(0.0)
            .generate(100, now());
        assert_eq!(none.iter().filter(|d| d.is_critical()).count(), 1);
        assert!(none.iter().all(|d| d.dependencies.is_empty()));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("risk-register"), "Risk Register");
    }
}
