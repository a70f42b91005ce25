//! Document model consumed by the context engine.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ranking::priority as weights;

/// PMBOK document type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    ProjectCharter,
    ScopeStatement,
    WorkBreakdownStructure,
    Schedule,
    CostBaseline,
    QualityPlan,
    RiskRegister,
    StakeholderRegister,
    CommunicationsPlan,
    ProcurementPlan,
    Requirements,
    LessonsLearned,
    ComplianceRecord,
    StatusReport,
    #[default]
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 15] = [
        Self::ProjectCharter,
        Self::ScopeStatement,
        Self::WorkBreakdownStructure,
        Self::Schedule,
        Self::CostBaseline,
        Self::QualityPlan,
        Self::RiskRegister,
        Self::StakeholderRegister,
        Self::CommunicationsPlan,
        Self::ProcurementPlan,
        Self::Requirements,
        Self::LessonsLearned,
        Self::ComplianceRecord,
        Self::StatusReport,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCharter => "project-charter",
            Self::ScopeStatement => "scope-statement",
            Self::WorkBreakdownStructure => "work-breakdown-structure",
            Self::Schedule => "schedule",
            Self::CostBaseline => "cost-baseline",
            Self::QualityPlan => "quality-plan",
            Self::RiskRegister => "risk-register",
            Self::StakeholderRegister => "stakeholder-register",
            Self::CommunicationsPlan => "communications-plan",
            Self::ProcurementPlan => "procurement-plan",
            Self::Requirements => "requirements",
            Self::LessonsLearned => "lessons-learned",
            Self::ComplianceRecord => "compliance-record",
            Self::StatusReport => "status-report",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        // "charter" is the common short form
        if normalized == "charter" {
            return Ok(Self::ProjectCharter);
        }
        Self::ALL
            .iter()
            .find(|t| t.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("Unknown document type: {}", s))
    }
}

/// Explicit priority tag
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Score contribution used by the ranker
    pub fn weight(&self) -> f64 {
        match self {
            Self::Critical => weights::CRITICAL,
            Self::High => weights::HIGH,
            Self::Medium => weights::MEDIUM,
            Self::Low => weights::LOW,
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!(
                "Unknown priority: {}. Valid values: critical, high, medium, low",
                s
            )),
        }
    }
}

/// A candidate source document.
///
/// `content` is shared with the store that produced it; cloning a `Document`
/// never copies the text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub category: String,
    pub content: Arc<str>,
    #[serde(default)]
    pub estimated_tokens: u64,
    pub quality_score: f64,
    pub priority: Priority,
    pub relevance_score: f64,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, doc_type: DocumentType, content: impl Into<Arc<str>>) -> Self {
        Self {
            id: id.into(),
            doc_type,
            category: "general".to_string(),
            content: content.into(),
            estimated_tokens: 0,
            quality_score: 50.0,
            priority: Priority::Medium,
            relevance_score: 50.0,
            last_modified: Utc::now(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_scores(mut self, relevance: f64, quality: f64) -> Self {
        self.relevance_score = relevance.clamp(0.0, 100.0);
        self.quality_score = quality.clamp(0.0, 100.0);
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    pub fn is_critical(&self) -> bool {
        self.priority.is_critical()
    }
}
