//! Unified Error Type System
//!
//! Centralized error types for the context engine.
//!
//! ## Error Taxonomy
//!
//! - **ContextValidation**: no provider or strategy can fit the budget (terminal)
//! - **ProviderUnavailable**: the registry has no usable profile (configuration error)
//! - **CompressionQualityBelowThreshold**: non-fatal, recorded as a warning
//! - **DependencyClosure**: a required dependency could not be included
//!
//! Recoverable issues never become `Err`; they are collected as warnings on the
//! `LoadResult`. Only configuration, storage, and cancellation failures are returned
//! as hard errors.

use thiserror::Error;

// =============================================================================
// Issue Kinds
// =============================================================================

/// Classification of problems reported by a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// No provider/strategy can fit the budget
    Validation,
    /// Registry has no usable profile
    ProviderUnavailable,
    /// Compression could not reach the quality threshold
    CompressionQualityBelowThreshold,
    /// A document's dependency could not be included
    DependencyClosureViolation,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::ProviderUnavailable => write!(f, "PROVIDER_UNAVAILABLE"),
            Self::CompressionQualityBelowThreshold => write!(f, "COMPRESSION_QUALITY"),
            Self::DependencyClosureViolation => write!(f, "DEPENDENCY_CLOSURE"),
        }
    }
}

impl IssueKind {
    /// Whether this kind ends the request with `success = false`
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation | Self::ProviderUnavailable)
    }

    /// Format a message tagged with this kind
    pub fn tag(&self, message: impl std::fmt::Display) -> String {
        format!("[{}] {}", self, message)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Structured validation error for request options and configuration values
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// What validation failed
    pub kind: ValidationErrorKind,
    /// Field that failed validation
    pub field: Option<String>,
    /// Detailed message
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "Validation failed for '{}': {}", field, self.message)
        } else {
            write!(f, "Validation failed: {}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Value out of range for a named field
    pub fn range(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationErrorKind::Range, message).with_field(field)
    }
}

/// Validation error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Required field missing
    MissingField,
    /// Invalid format
    Format,
    /// Value out of range
    Range,
    /// Consistency check failed
    Consistency,
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum WeaveError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Configuration & Request Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(ValidationError),

    #[error("No usable provider: {0}")]
    ProviderUnavailable(String),

    // -------------------------------------------------------------------------
    // Context Errors
    // -------------------------------------------------------------------------
    /// No provider or loading strategy can fit the request
    #[error("Context does not fit: requires {required} tokens, budget is {budget}")]
    ContextValidation { required: u64, budget: u64 },

    #[error("Document '{document}' requires missing dependency '{dependency}'")]
    DependencyClosure { document: String, dependency: String },

    #[error("Summarizer error: {0}")]
    Summarizer(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl From<ValidationError> for WeaveError {
    fn from(err: ValidationError) -> Self {
        WeaveError::Validation(err)
    }
}

impl From<r2d2::Error> for WeaveError {
    fn from(err: r2d2::Error) -> Self {
        WeaveError::Storage(format!("Connection pool error: {}", err))
    }
}

impl From<tokio::task::JoinError> for WeaveError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            WeaveError::Cancelled
        } else {
            WeaveError::Storage(format!("Worker task failed: {}", err))
        }
    }
}

pub type Result<T> = std::result::Result<T, WeaveError>;

impl WeaveError {
    /// Taxonomy kind for errors that map onto load-result issues
    pub fn issue_kind(&self) -> Option<IssueKind> {
        match self {
            Self::ContextValidation { .. } => Some(IssueKind::Validation),
            Self::ProviderUnavailable(_) => Some(IssueKind::ProviderUnavailable),
            Self::DependencyClosure { .. } => Some(IssueKind::DependencyClosureViolation),
            _ => None,
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| WeaveError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| WeaveError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
