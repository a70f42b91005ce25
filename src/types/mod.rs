pub mod document;
pub mod error;
pub mod options;
pub mod result;
pub mod utils;

pub use document::{Document, DocumentType, Priority};
pub use error::{IssueKind, Result, ResultExt, ValidationError, ValidationErrorKind, WeaveError};
pub use options::{
    ClusteringStrategy, CompressionStrategy, CostSensitivity, DocumentComplexity, LoadOptions,
};
pub use result::{CompressionResult, LoadResult, LoadStrategy, utilization_pct};
pub use utils::{
    is_heading, log_filter_warn, split_sentences, term_frequencies, top_terms,
    truncate_at_boundary,
};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for project IDs
///
/// Prevents accidental mixing of project IDs with document IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
