//! Context Window Validator
//!
//! Pre-flight check of a load request against the provider registry: picks
//! a provider, applies the complexity factor and reports utilization.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::constants::validation::WARNING_UTILIZATION_PCT;
use crate::types::{DocumentComplexity, DocumentType, LoadOptions, Result, WeaveError};

use super::registry::{ProviderRegistry, ProviderSelection};

/// Outcome of validating a request against the chosen provider
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub target_document_type: DocumentType,
    pub provider: String,
    pub model: String,
    pub context_window: u64,
    /// Input token budget for this request
    pub token_budget: u64,
    /// Estimate multiplied by the complexity factor
    pub required_tokens: u64,
    /// required / budget, not clamped (values above 100 describe the shortfall)
    pub utilization_percentage: f64,
    pub forced_fallback: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    pub fn shortfall(&self) -> u64 {
        self.required_tokens.saturating_sub(self.token_budget)
    }
}

/// Validates requests against a shared registry
pub struct ContextWindowValidator {
    registry: Arc<ProviderRegistry>,
}

impl ContextWindowValidator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Validate `estimated_tokens` for `target` under `options`.
    ///
    /// Returns `ProviderUnavailable` only when the registry is empty; an
    /// oversize request yields `Ok` with `is_valid = false`.
    pub fn validate(
        &self,
        target: DocumentType,
        estimated_tokens: u64,
        complexity: DocumentComplexity,
        options: &LoadOptions,
    ) -> Result<(ValidationReport, ProviderSelection)> {
        let required_tokens = (estimated_tokens as f64 * complexity.factor()).ceil() as u64;

        let selection = self
            .registry
            .select_optimal_provider(
                required_tokens,
                options.max_utilization_percentage,
                options.cost_sensitivity,
            )
            .ok_or_else(|| {
                WeaveError::ProviderUnavailable("provider registry is empty".to_string())
            })?;

        let profile = &selection.profile;
        let token_budget =
            profile.input_budget(options.max_utilization_percentage, options.max_tokens);
        let utilization_percentage = if token_budget == 0 {
            if required_tokens == 0 { 0.0 } else { f64::MAX }
        } else {
            required_tokens as f64 / token_budget as f64 * 100.0
        };

        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let mut recommendations = Vec::new();

        if selection.forced_fallback {
            warnings.push(format!(
                "No provider fits {} tokens at {:.0}% utilization; using largest window {}",
                required_tokens,
                options.max_utilization_percentage,
                profile.label()
            ));
        }

        let is_valid = required_tokens <= token_budget;
        if !is_valid {
            errors.push(format!(
                "Context for {} requires {} tokens but {} allows {} (short by {})",
                target,
                required_tokens,
                profile.label(),
                token_budget,
                required_tokens - token_budget
            ));
            recommendations = self.recommendations(&selection, required_tokens, options);
            warn!(
                target = %target,
                required_tokens,
                token_budget,
                "Context exceeds provider budget"
            );
        } else if utilization_percentage >= WARNING_UTILIZATION_PCT {
            warnings.push(format!(
                "Context uses {:.1}% of the {} token budget",
                utilization_percentage, token_budget
            ));
        }

        debug!(
            target = %target,
            provider = %profile.label(),
            required_tokens,
            token_budget,
            is_valid,
            "Context window validated"
        );

        let report = ValidationReport {
            is_valid,
            target_document_type: target,
            provider: profile.provider.clone(),
            model: profile.model.clone(),
            context_window: profile.context_window,
            token_budget,
            required_tokens,
            utilization_percentage,
            forced_fallback: selection.forced_fallback,
            warnings,
            errors,
            recommendations,
        };
        Ok((report, selection))
    }

    fn recommendations(
        &self,
        selection: &ProviderSelection,
        required_tokens: u64,
        options: &LoadOptions,
    ) -> Vec<String> {
        let mut recs = Vec::new();
        if !options.enable_chunking {
            recs.push("Enable chunking to split oversized documents".to_string());
        }
        if !options.enable_content_summarization {
            recs.push("Enable content summarization to compress the corpus".to_string());
        }
        let larger = self.registry.profiles().iter().find(|p| {
            p.context_window > selection.profile.context_window
                && p.input_budget(options.max_utilization_percentage, options.max_tokens)
                    >= required_tokens
        });
        match larger {
            Some(p) => recs.push(format!("Switch provider to {}", p.label())),
            None if options.max_tokens.is_some() => {
                recs.push("Raise or remove the max_tokens limit".to_string())
            }
            None => {}
        }
        match options.max_documents {
            Some(n) if n > 1 => recs.push(format!("Lower max_documents below {}", n)),
            Some(_) => {}
            None => recs.push("Set max_documents to limit the corpus".to_string()),
        }
        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::registry::ProviderProfile;

    fn validator(window: u64) -> ContextWindowValidator {
        let registry =
            ProviderRegistry::new(vec![ProviderProfile::new("p", "m", window, window, 1_000, 0.001)])
                .unwrap();
        ContextWindowValidator::new(Arc::new(registry))
    }

    #[test]
    fn test_clean_validation() {
        let (report, _) = validator(10_000)
            .validate(
                DocumentType::ProjectCharter,
                4_000,
                DocumentComplexity::Simple,
                &LoadOptions::default(),
            )
            .unwrap();
        assert!(report.is_valid);
        assert_eq!(report.token_budget, 8_000);
        assert_eq!(report.utilization_percentage, 50.0);
        assert!(report.warnings.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_warning_band() {
        let (report, _) = validator(10_000)
            .validate(
                DocumentType::Schedule,
                7_000,
                DocumentComplexity::Simple,
                &LoadOptions::default(),
            )
            .unwrap();
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_complexity_factor_causes_failure() {
        // 7,500 fits as simple, but 7,500 * 1.25 = 9,375 exceeds 8,000
        let (report, _) = validator(10_000)
            .validate(
                DocumentType::RiskRegister,
                7_500,
                DocumentComplexity::Complex,
                &LoadOptions::strict(),
            )
            .unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.required_tokens, 9_375);
        assert_eq!(report.shortfall(), 1_375);
        assert!(report.errors[0].contains("short by 1375"));
        assert!(report.forced_fallback);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("chunking")));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("summarization")));
    }

    #[test]
    fn test_empty_registry_is_provider_unavailable() {
        let v = ContextWindowValidator::new(Arc::new(ProviderRegistry::new(Vec::new()).unwrap()));
        let err = v
            .validate(
                DocumentType::Other,
                1,
                DocumentComplexity::Simple,
                &LoadOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, WeaveError::ProviderUnavailable(_)));
    }
}
