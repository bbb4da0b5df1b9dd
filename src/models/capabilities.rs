//! Model capabilities descriptor.

use serde::{Deserialize, Serialize};

/// Capability predicates the resolver and quirk stages query.
///
/// Backends silently reject or ignore parameters depending on model
/// family; these flags are the only source of truth the core consults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCapabilities {
    pub supports_temperature: bool,
    pub supports_top_p: bool,
    pub supports_tools: bool,
    pub supports_streaming: bool,
    pub supports_reasoning: bool,
    /// Output and reasoning tokens draw from one combined budget.
    pub combined_token_budget: bool,
    /// Reasoning tier that forces the fixed extended request timeout.
    pub extended_timeout: bool,
    /// Reasoning is toggled by a textual marker on the user prompt.
    pub think_mode_in_prompt: bool,
    /// Backend validates provenance signatures on reasoning and
    /// tool-call parts replayed across turns.
    pub requires_provenance_signature: bool,
    pub context_length: usize,
    pub max_output_tokens: Option<u32>,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            supports_temperature: true,
            supports_top_p: true,
            supports_tools: false,
            supports_streaming: true,
            supports_reasoning: false,
            combined_token_budget: false,
            extended_timeout: false,
            think_mode_in_prompt: false,
            requires_provenance_signature: false,
            context_length: 4096,
            max_output_tokens: None,
        }
    }
}

impl ModelCapabilities {
    /// Full-featured non-reasoning model.
    pub fn full(context_length: usize) -> Self {
        Self {
            supports_tools: true,
            context_length,
            ..Self::default()
        }
    }

    /// Reasoning model with combined-budget accounting and the extended
    /// timeout tier.
    pub fn reasoning(context_length: usize) -> Self {
        Self {
            supports_tools: true,
            supports_reasoning: true,
            combined_token_budget: true,
            extended_timeout: true,
            context_length,
            ..Self::default()
        }
    }
}
