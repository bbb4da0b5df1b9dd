//! Tool declarations and the invocation collaborator seam.
//!
//! Tool-call parts are ordered by this core, never executed; execution
//! belongs to a [`ToolHandler`] collaborator supplied by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ToolCallPart;

/// Tool declaration sent to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Tool-use mode requested for a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Tool {
        name: String,
    },
}

/// Failure reported by a tool collaborator. Surfaced to the model as an
/// error-flagged tool result, never raised out of the pipeline.
#[derive(Debug, Error)]
#[error("tool '{tool_name}' failed: {message}")]
pub struct ToolError {
    pub tool_name: String,
    pub message: String,
}

/// Collaborator that executes tool calls between recursive steps.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute one tool call and return its JSON result.
    async fn handle(&self, call: &ToolCallPart) -> Result<serde_json::Value, ToolError>;
}
