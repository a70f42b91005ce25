//! Context selection, compression and assembly.

pub mod assembler;
pub mod clustering;
pub mod compression;
pub mod engine;
pub mod fallback;
pub mod ranker;

pub use assembler::{AssembledContext, ContextAssembler, ContextSection, LoadSummary, SectionPart};
pub use clustering::{Cluster, ClusteringEngine, cluster_index};
pub use compression::{CompressionEngine, CompressionOutcome, QualityBreakdown, breakdown, score_quality};
pub use engine::{ContextEngine, EngineSettings, LoadedContext};
pub use fallback::{FallbackOrchestrator, FallbackOutcome};
pub use ranker::{
    ClosureOutcome, DependencyViolation, DocumentRanker, RankingWeights, dependency_closure_ids,
    enforce_dependency_closure,
};
