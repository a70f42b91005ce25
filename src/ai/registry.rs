//! Provider Capability Registry
//!
//! Read-only table of provider/model context limits and costs, built once at
//! startup (from configuration or built-in defaults) and shared by `Arc`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{CostSensitivity, Result, ValidationError, WeaveError};

/// Context limits and pricing for one provider model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub provider: String,
    pub model: String,
    pub context_window: u64,
    pub max_input_tokens: u64,
    pub max_output_tokens: u64,
    /// USD per 1K input tokens
    pub cost_per_1k_tokens: f64,
}

impl ProviderProfile {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        context_window: u64,
        max_input_tokens: u64,
        max_output_tokens: u64,
        cost_per_1k_tokens: f64,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            context_window,
            max_input_tokens,
            max_output_tokens,
            cost_per_1k_tokens,
        }
    }

    /// Input token budget at the given utilization percentage.
    ///
    /// `min(context_window * pct / 100, max_input_tokens, max_tokens)`
    pub fn input_budget(&self, max_utilization_pct: f64, max_tokens: Option<u64>) -> u64 {
        let pct = max_utilization_pct.clamp(0.0, 100.0);
        let windowed = (self.context_window as f64 * pct / 100.0).floor() as u64;
        let capped = windowed.min(self.max_input_tokens);
        match max_tokens {
            Some(limit) => capped.min(limit),
            None => capped,
        }
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

/// Result of provider selection
#[derive(Debug, Clone)]
pub struct ProviderSelection {
    pub profile: ProviderProfile,
    /// Capacity of the profile at the requested utilization
    pub capacity: u64,
    /// True when no profile qualified and the largest window was chosen anyway
    pub forced_fallback: bool,
}

/// Immutable provider capability table
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    profiles: Vec<ProviderProfile>,
}

impl ProviderRegistry {
    /// Build a registry, rejecting zero windows and duplicate provider/model pairs.
    /// An empty registry is allowed here; selection reports it.
    pub fn new(profiles: Vec<ProviderProfile>) -> Result<Self> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            if profile.context_window == 0 || profile.max_input_tokens == 0 {
                return Err(ValidationError::range(
                    format!("providers.{}", profile.label()),
                    "context_window and max_input_tokens must be greater than 0",
                )
                .into());
            }
            if !profile.cost_per_1k_tokens.is_finite() || profile.cost_per_1k_tokens < 0.0 {
                return Err(ValidationError::range(
                    format!("providers.{}", profile.label()),
                    "cost_per_1k_tokens must be a non-negative number",
                )
                .into());
            }
            if !seen.insert((profile.provider.as_str(), profile.model.as_str())) {
                return Err(WeaveError::Config(format!(
                    "Duplicate provider profile: {}",
                    profile.label()
                )));
            }
        }
        debug!(profiles = profiles.len(), "Provider registry initialized");
        Ok(Self { profiles })
    }

    /// Registry with the built-in provider table
    pub fn builtin() -> Self {
        Self {
            profiles: builtin_profiles(),
        }
    }

    pub fn profiles(&self) -> &[ProviderProfile] {
        &self.profiles
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, provider: &str, model: &str) -> Option<&ProviderProfile> {
        self.profiles
            .iter()
            .find(|p| p.provider == provider && p.model == model)
    }

    /// Profile with the largest context window (first in registry order on ties)
    pub fn largest(&self) -> Option<&ProviderProfile> {
        self.profiles.iter().fold(None, |best: Option<&ProviderProfile>, p| match best {
            Some(b) if b.context_window >= p.context_window => Some(b),
            _ => Some(p),
        })
    }

    /// Choose the provider for `estimated_tokens` at `max_utilization_pct`.
    ///
    /// A profile qualifies when its input budget covers the estimate. High cost
    /// sensitivity picks the cheapest qualifying profile (ties: larger window,
    /// then registry order); low picks the largest qualifying window. With no
    /// qualifying profile the largest window is returned as a forced fallback.
    /// `None` only for an empty registry.
    pub fn select_optimal_provider(
        &self,
        estimated_tokens: u64,
        max_utilization_pct: f64,
        sensitivity: CostSensitivity,
    ) -> Option<ProviderSelection> {
        let qualifying: Vec<&ProviderProfile> = self
            .profiles
            .iter()
            .filter(|p| p.input_budget(max_utilization_pct, None) >= estimated_tokens)
            .collect();

        let chosen = match sensitivity {
            CostSensitivity::High => qualifying.iter().copied().fold(None, |best, p| match best {
                None => Some(p),
                Some(b) => {
                    let cheaper = p.cost_per_1k_tokens < b.cost_per_1k_tokens;
                    let tie_larger = p.cost_per_1k_tokens == b.cost_per_1k_tokens
                        && p.context_window > b.context_window;
                    if cheaper || tie_larger { Some(p) } else { Some(b) }
                }
            }),
            CostSensitivity::Low => qualifying.iter().copied().fold(None, |best: Option<&ProviderProfile>, p| match best {
                Some(b) if b.context_window >= p.context_window => Some(b),
                _ => Some(p),
            }),
        };

        let (profile, forced_fallback) = match chosen {
            Some(p) => (p, false),
            None => (self.largest()?, true),
        };

        debug!(
            provider = %profile.label(),
            estimated_tokens,
            forced_fallback,
            "Provider selected"
        );

        Some(ProviderSelection {
            capacity: profile.input_budget(max_utilization_pct, None),
            profile: profile.clone(),
            forced_fallback,
        })
    }
}

/// Built-in provider table used when configuration declares none
pub fn builtin_profiles() -> Vec<ProviderProfile> {
    vec![
        ProviderProfile::new("ollama", "llama3.1:8b", 8_192, 8_192, 2_048, 0.0),
        ProviderProfile::new("openai", "gpt-4o-mini", 128_000, 128_000, 16_384, 0.00015),
        ProviderProfile::new("openai", "gpt-4o", 128_000, 128_000, 16_384, 0.0025),
        ProviderProfile::new("anthropic", "claude-sonnet", 200_000, 200_000, 64_000, 0.003),
        ProviderProfile::new("google", "gemini-1.5-pro", 2_000_000, 2_000_000, 8_192, 0.00125),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(vec![
            ProviderProfile::new("small", "s", 10_000, 10_000, 1_000, 0.001),
            ProviderProfile::new("medium", "m", 100_000, 100_000, 4_000, 0.002),
            ProviderProfile::new("large", "l", 1_000_000, 1_000_000, 8_000, 0.004),
            ProviderProfile::new("medium-cheap", "mc", 50_000, 50_000, 4_000, 0.002),
        ])
        .unwrap()
    }

    #[test]
    fn test_input_budget() {
        let p = ProviderProfile::new("x", "y", 10_000, 6_000, 1_000, 0.0);
        assert_eq!(p.input_budget(80.0, None), 6_000);
        assert_eq!(p.input_budget(50.0, None), 5_000);
        assert_eq!(p.input_budget(80.0, Some(2_000)), 2_000);
    }

    #[test]
    fn test_high_sensitivity_picks_cheapest_qualifying() {
        let sel = registry()
            .select_optimal_provider(5_000, 80.0, CostSensitivity::High)
            .unwrap();
        assert_eq!(sel.profile.provider, "small");
        assert!(!sel.forced_fallback);

        // small no longer qualifies; medium and medium-cheap tie on cost, larger window wins
        let sel = registry()
            .select_optimal_provider(20_000, 80.0, CostSensitivity::High)
            .unwrap();
        assert_eq!(sel.profile.provider, "medium");
    }

    #[test]
    fn test_low_sensitivity_picks_largest() {
        let sel = registry()
            .select_optimal_provider(5_000, 80.0, CostSensitivity::Low)
            .unwrap();
        assert_eq!(sel.profile.provider, "large");
    }

    #[test]
    fn test_forced_fallback_when_nothing_qualifies() {
        let sel = registry()
            .select_optimal_provider(5_000_000, 80.0, CostSensitivity::High)
            .unwrap();
        assert_eq!(sel.profile.provider, "large");
        assert!(sel.forced_fallback);
        assert_eq!(sel.capacity, 800_000);
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        let empty = ProviderRegistry::new(Vec::new()).unwrap();
        assert!(empty
            .select_optimal_provider(1, 80.0, CostSensitivity::High)
            .is_none());
    }

    #[test]
    fn test_duplicate_and_zero_profiles_rejected() {
        let dup = ProviderRegistry::new(vec![
            ProviderProfile::new("a", "b", 1_000, 1_000, 100, 0.0),
            ProviderProfile::new("a", "b", 2_000, 2_000, 100, 0.0),
        ]);
        assert!(matches!(dup, Err(WeaveError::Config(_))));

        let zero = ProviderRegistry::new(vec![ProviderProfile::new("a", "b", 0, 0, 0, 0.0)]);
        assert!(matches!(zero, Err(WeaveError::Validation(_))));
    }

    #[test]
    fn test_builtin_registry_is_valid() {
        let builtin = ProviderRegistry::builtin();
        assert!(ProviderRegistry::new(builtin.profiles().to_vec()).is_ok());
        assert_eq!(builtin.largest().unwrap().provider, "google");
    }
}
