//! Conversation turns and typed content parts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, provider-keyed metadata carried on a content part.
///
/// The core never interprets the values; they ferry continuity tokens
/// (for example provenance signatures) between turns.
pub type ProviderAnnotations = BTreeMap<String, serde_json::Value>;

/// A role-tagged message composed of ordered typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    /// Create a system turn.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![ContentPart::text(text)],
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::text(text)],
            timestamp: Some(Utc::now()),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![ContentPart::text(text)],
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a tool-result turn.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        result: serde_json::Value,
        is_error: bool,
    ) -> Self {
        Self {
            role: Role::Tool,
            parts: vec![ContentPart::ToolResult(ToolResultPart {
                tool_call_id: tool_call_id.into(),
                result,
                is_error,
            })],
            timestamp: Some(Utc::now()),
        }
    }

    /// Concatenated text content of this turn.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(p) => Some(p.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls carried by this turn, in order.
    pub fn tool_calls(&self) -> Vec<&ToolCallPart> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    /// Whether any part of this turn is a reasoning part.
    pub fn has_reasoning(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, ContentPart::Reasoning(_)))
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single typed part of a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text(TextPart),
    Reasoning(ReasoningPart),
    ToolCall(ToolCallPart),
    ToolResult(ToolResultPart),
}

impl ContentPart {
    /// A plain text part with no annotations.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart {
            text: text.into(),
            annotations: ProviderAnnotations::new(),
        })
    }

    /// A reasoning part with no annotations.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning(ReasoningPart {
            text: text.into(),
            annotations: ProviderAnnotations::new(),
        })
    }
}

/// User-visible text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: ProviderAnnotations,
}

/// Internal deliberation, distinct from user-visible text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: ProviderAnnotations,
}

/// A request to invoke an external capability. Never executed by this core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallPart {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: ProviderAnnotations,
}

/// The result of a tool invocation, supplied by a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultPart {
    pub tool_call_id: String,
    pub result: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_concatenates_text_parts_only() {
        let turn = Turn {
            role: Role::Assistant,
            parts: vec![
                ContentPart::reasoning("thinking"),
                ContentPart::text("hello "),
                ContentPart::text("world"),
            ],
            timestamp: None,
        };
        assert_eq!(turn.text(), "hello world");
    }

    #[test]
    fn has_reasoning_detects_reasoning_parts() {
        let mut turn = Turn::assistant("hi");
        assert!(!turn.has_reasoning());
        turn.parts.push(ContentPart::reasoning("hmm"));
        assert!(turn.has_reasoning());
    }

    #[test]
    fn content_part_serializes_tagged() {
        let part = ContentPart::text("hi");
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
    }
}
