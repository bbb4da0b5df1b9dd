//! Assistant-facing generation settings.

use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Settings configured on an assistant, before capability gating.
///
/// Every field is optional; the resolver decides what actually reaches
/// the backend for a given model and provider.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default)]
pub struct AssistantSettings {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Caller default request timeout; capability tiers may override it.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration_ms")]
    pub timeout: Option<Duration>,
    /// Abort a streaming call when no event arrives for this long.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration_ms")]
    pub idle_timeout: Option<Duration>,
    pub max_tool_steps: Option<u32>,
}

mod opt_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

/// Reasoning effort level for reasoning-capable models.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Whether this effort level actually engages reasoning.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_empty() {
        let settings = AssistantSettings::builder().build();
        assert!(settings.temperature.is_none());
        assert!(settings.reasoning_effort.is_none());
    }

    #[test]
    fn effort_none_is_inactive() {
        assert!(!ReasoningEffort::None.is_active());
        assert!(ReasoningEffort::Medium.is_active());
    }

    #[test]
    fn timeout_round_trips_as_millis() {
        let settings = AssistantSettings {
            timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["timeout"], 2000);
        let back: AssistantSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back.timeout, Some(Duration::from_secs(2)));
    }
}
