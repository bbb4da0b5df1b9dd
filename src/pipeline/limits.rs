//! Recursive tool-step bounds.

use crate::types::AssistantSettings;

/// Steps allowed per turn when the caller does not say otherwise.
pub const DEFAULT_MAX_TOOL_STEPS: u32 = 12;

/// Hard ceiling; caller overrides are clamped, never trusted past it.
pub const MAX_TOOL_STEPS_CEILING: u32 = 64;

/// Bound on recursive tool invocation within one logical turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStepPolicy {
    pub max_steps: u32,
}

impl Default for ToolStepPolicy {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_TOOL_STEPS,
        }
    }
}

impl ToolStepPolicy {
    /// A policy clamped into `1..=MAX_TOOL_STEPS_CEILING`.
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps: max_steps.clamp(1, MAX_TOOL_STEPS_CEILING),
        }
    }

    /// This policy with any per-assistant override applied.
    pub fn for_settings(&self, settings: &AssistantSettings) -> Self {
        match settings.max_tool_steps {
            Some(max) => Self::new(max),
            None => *self,
        }
    }
}
