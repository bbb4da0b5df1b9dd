//! Resolved, backend-agnostic request descriptors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cancel::TurnId;
use crate::tools::{ToolChoice, ToolDefinition};

use super::message::Turn;

/// Concrete sampling parameters after capability gating.
///
/// Absence means "use the backend default", never zero.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_budget: Option<u32>,
    /// Set when combined-budget accounting clamped `max_tokens` to the floor.
    #[serde(default)]
    pub max_tokens_clamped: bool,
}

/// One resolved call to a backend. Created fresh per call attempt; the
/// cancellation token and turn id persist across every attempt of a turn.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub turn_id: TurnId,
    pub model_id: String,
    pub provider_id: String,
    pub turns: Vec<Turn>,
    pub params: SamplingParams,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub cancel: CancellationToken,
    pub timeout: Duration,
}

impl RequestDescriptor {
    /// The most recent user turn, if any.
    pub fn last_user_turn_mut(&mut self) -> Option<&mut Turn> {
        self.turns
            .iter_mut()
            .rev()
            .find(|turn| turn.role == super::message::Role::User)
    }
}
