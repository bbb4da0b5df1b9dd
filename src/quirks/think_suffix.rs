//! Prompt-marker reasoning toggle.
//!
//! Some families toggle reasoning with a textual marker on the user
//! prompt instead of a request parameter.

use crate::pipeline::CallContext;
use crate::types::{ContentPart, RequestDescriptor};

use super::Quirk;

/// Marker that enables reasoning for prompt-toggled models.
pub const THINK_MARKER: &str = "/think";

/// Marker that disables reasoning for prompt-toggled models.
pub const NO_THINK_MARKER: &str = "/no_think";

/// Appends the reasoning marker to the most recent user turn when the
/// model toggles reasoning in the prompt. Skips turns that already end
/// with either marker, so reapplication never stacks markers.
pub struct ThinkSuffix;

impl Quirk for ThinkSuffix {
    fn name(&self) -> &'static str {
        "think_suffix"
    }

    fn apply(
        &self,
        ctx: &CallContext,
        request: &mut RequestDescriptor,
    ) -> Result<bool, String> {
        if !ctx.capabilities.think_mode_in_prompt {
            return Ok(false);
        }
        let Some(effort) = ctx.reasoning_effort else {
            return Ok(false);
        };
        let marker = if effort.is_active() {
            THINK_MARKER
        } else {
            NO_THINK_MARKER
        };
        let Some(turn) = request.last_user_turn_mut() else {
            return Ok(false);
        };
        let Some(part) = turn.parts.iter_mut().rev().find_map(|part| match part {
            ContentPart::Text(p) => Some(p),
            _ => None,
        }) else {
            return Ok(false);
        };
        let trimmed = part.text.trim_end();
        if trimmed.ends_with(THINK_MARKER) || trimmed.ends_with(NO_THINK_MARKER) {
            return Ok(false);
        }
        part.text = format!("{trimmed} {marker}");
        Ok(true)
    }
}
