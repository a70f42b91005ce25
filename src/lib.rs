//! ContextWeave - Context Budgeting for LLM-Generated Project Documents
//!
//! Decides what goes into a model's context window when the candidate document
//! corpus is larger than any provider's budget.
//!
//! ## Core Features
//!
//! - **Provider Selection**: capability table with utilization-based input budgets
//! - **Priority Ranking**: weighted relevance, quality, priority and recency with dependency closure
//! - **Clustering**: category, relevance, temporal and hierarchical grouping for large corpora
//! - **Compression**: lossless to lossy strategies with structural quality scoring
//! - **Fallback Chain**: FullLoad → Prioritized → Chunked → Summarized → Failed
//!
//! ## Quick Start
//!
//! ```ignore
//! use contextweave::{ContextEngine, InMemoryDocumentStore, ProviderRegistry};
//! use contextweave::types::{DocumentType, LoadOptions};
//!
//! let store = Arc::new(InMemoryDocumentStore::with_documents("apollo", documents));
//! let engine = ContextEngine::new(store, Arc::new(ProviderRegistry::builtin()));
//! let loaded = engine
//!     .load_context(&"apollo".into(), DocumentType::RiskRegister, &LoadOptions::default(), &cancel)
//!     .await?;
//! println!("{}", loaded.result.summary());
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: token estimation, provider registry, window validation, summarization
//! - [`context`]: ranking, clustering, compression, fallback and assembly
//! - [`storage`]: document store interface, SQLite persistence, mock corpus
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod context;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{IssueKind, Result, ResultExt, WeaveError};

// Storage
pub use storage::{
    Database, DocumentStore, InMemoryDocumentStore, MockCorpus, PoolConfig, SharedDatabase,
    SqliteDocumentStore,
};

// =============================================================================
// Engine Re-exports
// =============================================================================

pub use context::{ContextEngine, EngineSettings, LoadedContext};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    ContextWindowValidator, ExtractiveSummarizer, ProviderProfile, ProviderRegistry, Summarizer,
    ValidationReport,
};
