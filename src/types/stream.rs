//! Canonical stream events.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ErrorRecord;

use super::message::{ToolCallPart, ToolResultPart};
use super::usage::Usage;

/// One event in the canonical ordered sequence every consumer observes.
///
/// Start/delta/end triples are scoped by a stable `id`; a delta or end
/// never precedes its start, and every start is closed by exactly one end
/// unless the stream terminates via `finish` or `error` first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        text: String,
    },
    ReasoningEnd {
        id: String,
    },
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        text: String,
    },
    TextEnd {
        id: String,
    },
    ToolCallStart {
        id: String,
        name: String,
    },
    ToolCall(ToolCallPart),
    ToolResult(ToolResultPart),
    Finish {
        reason: FinishReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    Error {
        record: ErrorRecord,
    },
}

impl StreamEvent {
    /// The scope id for start/delta/end events.
    pub fn scope_id(&self) -> Option<&str> {
        match self {
            Self::ReasoningStart { id }
            | Self::ReasoningDelta { id, .. }
            | Self::ReasoningEnd { id }
            | Self::TextStart { id }
            | Self::TextDelta { id, .. }
            | Self::TextEnd { id }
            | Self::ToolCallStart { id, .. } => Some(id),
            Self::ToolCall(tc) => Some(&tc.id),
            _ => None,
        }
    }

    /// Whether this event terminates the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }

    /// Whether this is a text start/delta/end event.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::TextStart { .. } | Self::TextDelta { .. } | Self::TextEnd { .. }
        )
    }
}

/// Why a turn finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    /// User-initiated stop. A distinct terminal state, never an error.
    Canceled,
    Error,
}
