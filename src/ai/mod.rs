//! Provider-Facing Layer
//!
//! Token estimation, the provider capability registry, context window
//! validation and the summarizer abstraction.

pub mod registry;
pub mod summarizer;
pub mod tokenizer;
pub mod validator;

pub use registry::{ProviderProfile, ProviderRegistry, ProviderSelection, builtin_profiles};
pub use summarizer::{ExtractiveSummarizer, SharedSummarizer, Summarizer, Summary};
pub use tokenizer::{
    CharRatioEstimator, EstimatorKind, EstimatorSet, SharedEstimator, TokenBudget,
    TokenEstimator, WordRatioEstimator, estimate_corpus, fit_to_tokens, split_into_chunks,
};
pub use validator::{ContextWindowValidator, ValidationReport};
