//! Model and provider descriptors.

pub mod capabilities;

pub use capabilities::ModelCapabilities;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Model family, the key of the sampling-parameter precedence table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelFamily {
    // snake_case would split these into "open_ai"; the wire name is "openai".
    #[serde(rename = "openai")]
    #[strum(serialize = "openai")]
    OpenAi,
    #[serde(rename = "openai_reasoning")]
    #[strum(serialize = "openai_reasoning")]
    OpenAiReasoning,
    Anthropic,
    Google,
    DeepseekReasoner,
    Qwen,
    Other,
}

/// Read-only descriptor of one model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    pub id: String,
    pub family: ModelFamily,
    pub capabilities: ModelCapabilities,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, family: ModelFamily, capabilities: ModelCapabilities) -> Self {
        Self {
            id: id.into(),
            family,
            capabilities,
        }
    }
}

/// Read-only descriptor of one provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderDescriptor {
    pub id: String,
    pub name: String,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_parses_snake_case() {
        let family: ModelFamily = "openai_reasoning".parse().unwrap();
        assert_eq!(family, ModelFamily::OpenAiReasoning);
        assert_eq!(family.to_string(), "openai_reasoning");
        assert_eq!("openai".parse::<ModelFamily>().unwrap(), ModelFamily::OpenAi);
        assert_eq!(ModelFamily::OpenAi.to_string(), "openai");
        assert_eq!(
            "deepseek_reasoner".parse::<ModelFamily>().unwrap(),
            ModelFamily::DeepseekReasoner
        );
    }

    #[test]
    fn family_serde_names_match_display() {
        assert_eq!(
            serde_json::to_value(ModelFamily::OpenAi).unwrap(),
            serde_json::json!("openai")
        );
        assert_eq!(
            serde_json::to_value(ModelFamily::OpenAiReasoning).unwrap(),
            serde_json::json!("openai_reasoning")
        );
        let family: ModelFamily = serde_json::from_value(serde_json::json!("openai")).unwrap();
        assert_eq!(family, ModelFamily::OpenAi);
    }
}
