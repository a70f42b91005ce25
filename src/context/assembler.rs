//! Context Assembler
//!
//! Orders the selected sections, wraps each in boundary markers and measures
//! the final payload. Reported token counts always come from the assembled
//! payload, never from pre-compression estimates.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::ai::SharedEstimator;
use crate::types::{
    CompressionResult, CompressionStrategy, Document, DocumentType, LoadResult, LoadStrategy,
    Priority, utilization_pct,
};

const SECTION_SEPARATOR: &str = "\n\n";

/// Which part of a document a section carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionPart {
    Full,
    Chunk { index: usize, total: usize },
    Compressed(CompressionStrategy),
}

impl fmt::Display for SectionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Chunk { index, total } => write!(f, "chunk {}/{}", index + 1, total),
            Self::Compressed(strategy) => write!(f, "compressed:{}", strategy),
        }
    }
}

/// One marked block of the payload
#[derive(Debug, Clone)]
pub struct ContextSection {
    pub document_id: String,
    pub doc_type: DocumentType,
    pub priority: Priority,
    pub part: SectionPart,
    pub text: Arc<str>,
    /// Placed ahead of everything else
    pub protected: bool,
    /// Position in ranker order
    pub rank: usize,
}

impl ContextSection {
    pub fn full(doc: &Document, rank: usize, protected: bool) -> Self {
        Self::with_part(doc, rank, protected, SectionPart::Full, Arc::clone(&doc.content))
    }

    pub fn with_part(
        doc: &Document,
        rank: usize,
        protected: bool,
        part: SectionPart,
        text: Arc<str>,
    ) -> Self {
        Self {
            document_id: doc.id.clone(),
            doc_type: doc.doc_type,
            priority: doc.priority,
            part,
            text,
            protected,
            rank,
        }
    }

    fn chunk_index(&self) -> usize {
        match self.part {
            SectionPart::Chunk { index, .. } => index,
            _ => 0,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "<<<DOCUMENT id=\"{}\" type=\"{}\" priority=\"{}\" part=\"{}\">>>\n{}\n<<<END DOCUMENT id=\"{}\">>>",
            self.document_id, self.doc_type, self.priority, self.part, self.text, self.document_id
        )
    }
}

/// Final payload and what it contains
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub payload: String,
    pub total_tokens: u64,
    /// Distinct document ids in payload order
    pub document_ids: Vec<String>,
    pub section_count: usize,
}

/// Request-level facts needed to build the `LoadResult`
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub target: DocumentType,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub token_budget: u64,
    pub total_documents: usize,
    pub total_clusters: usize,
    /// Document id to cluster index, empty when not clustered
    pub cluster_of: HashMap<String, usize>,
    pub strategy: LoadStrategy,
    pub partially_included: Vec<String>,
    pub compression_results: Vec<CompressionResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
    pub started: Instant,
}

pub struct ContextAssembler {
    estimator: SharedEstimator,
}

impl ContextAssembler {
    pub fn new(estimator: SharedEstimator) -> Self {
        Self { estimator }
    }

    /// Critical sections first, then protected dependencies, then ranker
    /// order, chunks in index order. Applies whether or not anything is
    /// protected.
    pub fn order(sections: &mut [ContextSection]) {
        sections.sort_by(|a, b| {
            let critical = |s: &ContextSection| s.priority.is_critical();
            critical(b)
                .cmp(&critical(a))
                .then_with(|| b.protected.cmp(&a.protected))
                .then_with(|| a.rank.cmp(&b.rank))
                .then_with(|| a.chunk_index().cmp(&b.chunk_index()))
        });
    }

    /// Upper bound on the tokens a section adds to a payload
    pub fn section_tokens(&self, section: &ContextSection) -> u64 {
        let mut rendered = section.render();
        rendered.push_str(SECTION_SEPARATOR);
        self.estimator.estimate(&rendered)
    }

    pub fn assemble(&self, mut sections: Vec<ContextSection>) -> AssembledContext {
        Self::order(&mut sections);

        let mut seen = HashSet::new();
        let mut document_ids = Vec::new();
        let mut blocks = Vec::with_capacity(sections.len());
        for section in &sections {
            if seen.insert(section.document_id.clone()) {
                document_ids.push(section.document_id.clone());
            }
            blocks.push(section.render());
        }

        let payload = blocks.join(SECTION_SEPARATOR);
        AssembledContext {
            total_tokens: self.estimator.estimate(&payload),
            payload,
            document_ids,
            section_count: sections.len(),
        }
    }

    /// Build the immutable result record for a finished request
    pub fn finalize(&self, assembled: Option<&AssembledContext>, summary: LoadSummary) -> LoadResult {
        let success = summary.strategy != LoadStrategy::Failed;
        let (documents_loaded, total_tokens_used, clusters_loaded) = match assembled {
            Some(ctx) if success => {
                let clusters: HashSet<usize> = ctx
                    .document_ids
                    .iter()
                    .filter_map(|id| summary.cluster_of.get(id).copied())
                    .collect();
                (ctx.document_ids.len(), ctx.total_tokens, clusters.len())
            }
            _ => (0, 0, 0),
        };

        LoadResult {
            success,
            strategy: summary.strategy,
            target_document_type: summary.target.to_string(),
            provider: summary.provider,
            model: summary.model,
            token_budget: summary.token_budget,
            documents_loaded,
            total_documents: summary.total_documents,
            clusters_loaded,
            total_clusters: summary.total_clusters,
            total_tokens_used,
            context_window_utilization: utilization_pct(total_tokens_used, summary.token_budget),
            partially_included: summary.partially_included,
            compression_results: summary.compression_results,
            warnings: summary.warnings,
            errors: summary.errors,
            recommendations: summary.recommendations,
            loading_time_ms: summary.started.elapsed().as_millis() as u64,
        }
    }
}
