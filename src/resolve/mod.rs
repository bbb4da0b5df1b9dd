//! Capability-gated parameter resolution.
//!
//! Pure functions from (assistant settings, model, provider) to the
//! concrete sampling parameters of one call. Unsupported parameters are
//! omitted, never defaulted to zero; mutually exclusive combinations are
//! settled by an explicit versioned precedence table. Never fails.

use std::time::Duration;

use crate::models::{ModelDescriptor, ModelFamily, ProviderDescriptor};
use crate::types::{AssistantSettings, ReasoningEffort, SamplingParams};

/// Version of the mutual-exclusivity precedence table.
pub const PRECEDENCE_TABLE_VERSION: u32 = 1;

/// Caller default when neither settings nor a capability tier decide.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fixed duration for models in the extended-timeout capability tier.
/// Overrides the caller default.
pub const EXTENDED_TIMEOUT: Duration = Duration::from_secs(600);

/// Floor applied when combined-budget accounting would drive the output
/// budget to zero or below.
pub const MAX_TOKENS_FLOOR: u32 = 1;

/// Resolution output: gated sampling parameters plus the request timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub sampling: SamplingParams,
    pub timeout: Duration,
    /// False when the (family, reasoning) pair had no precedence row and
    /// only plain capability gating was applied.
    pub covered: bool,
}

/// How a precedence row settles a mutually exclusive combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrecedenceAction {
    /// Nothing to settle for this pair.
    NoOverride,
    /// The family rejects an explicit temperature.
    OmitTemperature,
    /// The family rejects explicit temperature and nucleus cutoff.
    OmitSampling,
    /// When both are set, nucleus cutoff wins and temperature is omitted.
    TopPWinsOverTemperature,
}

struct PrecedenceRule {
    family: ModelFamily,
    reasoning_active: bool,
    action: PrecedenceAction,
}

/// Versioned lookup table for mutually exclusive sampling parameters.
/// Pairs not listed here resolve uncovered and are flagged, never guessed.
const PRECEDENCE_RULES: &[PrecedenceRule] = &[
    PrecedenceRule {
        family: ModelFamily::OpenAiReasoning,
        reasoning_active: true,
        action: PrecedenceAction::OmitSampling,
    },
    PrecedenceRule {
        family: ModelFamily::OpenAiReasoning,
        reasoning_active: false,
        action: PrecedenceAction::OmitSampling,
    },
    PrecedenceRule {
        family: ModelFamily::DeepseekReasoner,
        reasoning_active: true,
        action: PrecedenceAction::OmitSampling,
    },
    PrecedenceRule {
        family: ModelFamily::DeepseekReasoner,
        reasoning_active: false,
        action: PrecedenceAction::OmitTemperature,
    },
    PrecedenceRule {
        family: ModelFamily::Anthropic,
        reasoning_active: true,
        action: PrecedenceAction::TopPWinsOverTemperature,
    },
    PrecedenceRule {
        family: ModelFamily::Anthropic,
        reasoning_active: false,
        action: PrecedenceAction::NoOverride,
    },
    PrecedenceRule {
        family: ModelFamily::OpenAi,
        reasoning_active: false,
        action: PrecedenceAction::NoOverride,
    },
    PrecedenceRule {
        family: ModelFamily::Google,
        reasoning_active: true,
        action: PrecedenceAction::NoOverride,
    },
    PrecedenceRule {
        family: ModelFamily::Google,
        reasoning_active: false,
        action: PrecedenceAction::NoOverride,
    },
    PrecedenceRule {
        family: ModelFamily::Qwen,
        reasoning_active: true,
        action: PrecedenceAction::NoOverride,
    },
    PrecedenceRule {
        family: ModelFamily::Qwen,
        reasoning_active: false,
        action: PrecedenceAction::NoOverride,
    },
];

fn precedence_lookup(family: ModelFamily, reasoning_active: bool) -> Option<PrecedenceAction> {
    PRECEDENCE_RULES
        .iter()
        .find(|rule| rule.family == family && rule.reasoning_active == reasoning_active)
        .map(|rule| rule.action)
}

/// Fixed reasoning budget per effort tier, capped by the configured max.
pub fn reasoning_budget(effort: ReasoningEffort, configured_max: u32) -> u32 {
    let tier = match effort {
        ReasoningEffort::None => 0,
        ReasoningEffort::Low => 1_024,
        ReasoningEffort::Medium => 8_192,
        ReasoningEffort::High => 24_576,
    };
    tier.min(configured_max)
}

/// Resolve concrete sampling parameters for one call.
pub fn resolve(
    settings: &AssistantSettings,
    model: &ModelDescriptor,
    provider: &ProviderDescriptor,
) -> ResolvedParams {
    let caps = &model.capabilities;

    let mut temperature = settings.temperature.filter(|_| caps.supports_temperature);
    let mut top_p = settings.top_p.filter(|_| caps.supports_top_p);

    let effort = settings.reasoning_effort;
    let reasoning_active =
        caps.supports_reasoning && effort.is_some_and(ReasoningEffort::is_active);

    let covered = match precedence_lookup(model.family, reasoning_active) {
        Some(PrecedenceAction::NoOverride) => true,
        Some(PrecedenceAction::OmitTemperature) => {
            temperature = None;
            true
        }
        Some(PrecedenceAction::OmitSampling) => {
            temperature = None;
            top_p = None;
            true
        }
        Some(PrecedenceAction::TopPWinsOverTemperature) => {
            if top_p.is_some() {
                temperature = None;
            }
            true
        }
        None => {
            tracing::warn!(
                model_id = %model.id,
                provider_id = %provider.id,
                family = %model.family,
                reasoning_active,
                table_version = PRECEDENCE_TABLE_VERSION,
                "no precedence rule for family; applying capability gating only"
            );
            false
        }
    };

    let configured_max = settings.max_tokens.or(caps.max_output_tokens);

    let budget = match effort {
        Some(effort) if reasoning_active => {
            Some(reasoning_budget(effort, configured_max.unwrap_or(u32::MAX)))
        }
        _ => None,
    };

    let mut max_tokens_clamped = false;
    let max_tokens = match (configured_max, budget) {
        (Some(max), Some(budget)) if caps.combined_token_budget => {
            let remaining = max.saturating_sub(budget);
            if remaining < MAX_TOKENS_FLOOR {
                max_tokens_clamped = true;
                Some(MAX_TOKENS_FLOOR)
            } else {
                Some(remaining)
            }
        }
        (max, _) => max,
    };

    let timeout = if caps.extended_timeout {
        EXTENDED_TIMEOUT
    } else {
        settings.timeout.unwrap_or(DEFAULT_TIMEOUT)
    };

    ResolvedParams {
        sampling: SamplingParams {
            temperature,
            top_p,
            max_tokens,
            reasoning_budget: budget,
            max_tokens_clamped,
        },
        timeout,
        covered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelCapabilities;

    fn provider() -> ProviderDescriptor {
        ProviderDescriptor::new("openai", "OpenAI")
    }

    fn reasoning_model() -> ModelDescriptor {
        ModelDescriptor::new(
            "o4-mini",
            ModelFamily::OpenAiReasoning,
            ModelCapabilities {
                supports_temperature: false,
                supports_top_p: false,
                max_output_tokens: Some(100_000),
                ..ModelCapabilities::reasoning(200_000)
            },
        )
    }

    #[test]
    fn unsupported_top_p_is_always_omitted() {
        let model = ModelDescriptor::new(
            "basic",
            ModelFamily::OpenAi,
            ModelCapabilities {
                supports_top_p: false,
                ..ModelCapabilities::full(8_192)
            },
        );
        let settings = AssistantSettings {
            top_p: Some(0.9),
            ..Default::default()
        };
        let resolved = resolve(&settings, &model, &provider());
        assert_eq!(resolved.sampling.top_p, None);
    }

    #[test]
    fn reasoning_incompatible_family_omits_temperature() {
        let settings = AssistantSettings {
            temperature: Some(0.7),
            reasoning_effort: Some(ReasoningEffort::High),
            max_tokens: Some(64_000),
            ..Default::default()
        };
        let resolved = resolve(&settings, &reasoning_model(), &provider());
        assert_eq!(resolved.sampling.temperature, None);
        assert_eq!(resolved.sampling.top_p, None);
    }

    #[test]
    fn combined_budget_subtracts_reasoning_budget() {
        let settings = AssistantSettings {
            reasoning_effort: Some(ReasoningEffort::Medium),
            max_tokens: Some(32_768),
            ..Default::default()
        };
        let resolved = resolve(&settings, &reasoning_model(), &provider());
        assert_eq!(resolved.sampling.reasoning_budget, Some(8_192));
        assert_eq!(resolved.sampling.max_tokens, Some(32_768 - 8_192));
        assert!(!resolved.sampling.max_tokens_clamped);
    }

    #[test]
    fn max_tokens_clamps_to_floor_and_flags() {
        let settings = AssistantSettings {
            reasoning_effort: Some(ReasoningEffort::High),
            max_tokens: Some(1_000),
            ..Default::default()
        };
        let resolved = resolve(&settings, &reasoning_model(), &provider());
        assert_eq!(resolved.sampling.max_tokens, Some(MAX_TOKENS_FLOOR));
        assert!(resolved.sampling.max_tokens_clamped);
    }

    #[test]
    fn top_p_wins_over_temperature_when_both_set() {
        let model = ModelDescriptor::new(
            "claude",
            ModelFamily::Anthropic,
            ModelCapabilities::reasoning(200_000),
        );
        let settings = AssistantSettings {
            temperature: Some(0.7),
            top_p: Some(0.95),
            reasoning_effort: Some(ReasoningEffort::Low),
            ..Default::default()
        };
        let resolved = resolve(&settings, &model, &provider());
        assert_eq!(resolved.sampling.temperature, None);
        assert_eq!(resolved.sampling.top_p, Some(0.95));
    }

    #[test]
    fn temperature_survives_without_top_p_conflict() {
        let model = ModelDescriptor::new(
            "claude",
            ModelFamily::Anthropic,
            ModelCapabilities::reasoning(200_000),
        );
        let settings = AssistantSettings {
            temperature: Some(0.7),
            reasoning_effort: Some(ReasoningEffort::Low),
            ..Default::default()
        };
        let resolved = resolve(&settings, &model, &provider());
        assert_eq!(resolved.sampling.temperature, Some(0.7));
    }

    #[test]
    fn uncovered_family_is_flagged_not_guessed() {
        let model = ModelDescriptor::new(
            "mystery",
            ModelFamily::Other,
            ModelCapabilities::full(8_192),
        );
        let settings = AssistantSettings {
            temperature: Some(0.5),
            ..Default::default()
        };
        let resolved = resolve(&settings, &model, &provider());
        assert!(!resolved.covered);
        assert_eq!(resolved.sampling.temperature, Some(0.5));
    }

    #[test]
    fn extended_tier_overrides_caller_timeout() {
        let settings = AssistantSettings {
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let resolved = resolve(&settings, &reasoning_model(), &provider());
        assert_eq!(resolved.timeout, EXTENDED_TIMEOUT);
    }

    #[test]
    fn caller_timeout_applies_without_tier() {
        let model = ModelDescriptor::new("basic", ModelFamily::OpenAi, ModelCapabilities::full(8_192));
        let settings = AssistantSettings {
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let resolved = resolve(&settings, &model, &provider());
        assert_eq!(resolved.timeout, Duration::from_secs(30));
    }
}
