//! Backend failure classification.
//!
//! Every failure passes through [`classify`] before it reaches a caller.
//! Provider-specific code rules run first; the generic status mapping is
//! the fallback.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::backend::BackendError;

use super::TurnpikeError;

/// Uniform failure taxonomy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    RateLimit,
    QuotaExhausted,
    InsufficientBalance,
    BadRequest,
    UpstreamUnavailable,
    StreamInterrupted,
    Unknown,
}

/// A classified failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    /// Whether the caller may continue the conversation after this failure.
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_code: Option<String>,
}

/// What the pipeline does with a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Convert the record into a terminal `error` stream event and let the
    /// pipeline complete normally.
    #[default]
    Degrade,
    /// Re-raise a typed error carrying the record.
    Raise,
}

struct ProviderRule {
    provider: &'static str,
    needle: &'static str,
    kind: ErrorKind,
}

/// Provider-specific overrides, checked against the error code and
/// message before the generic status mapping.
const PROVIDER_RULES: &[ProviderRule] = &[
    ProviderRule {
        provider: "openai",
        needle: "insufficient_quota",
        kind: ErrorKind::QuotaExhausted,
    },
    ProviderRule {
        provider: "openai",
        needle: "invalid_api_key",
        kind: ErrorKind::Auth,
    },
    ProviderRule {
        provider: "anthropic",
        needle: "credit balance",
        kind: ErrorKind::InsufficientBalance,
    },
    ProviderRule {
        provider: "deepseek",
        needle: "insufficient balance",
        kind: ErrorKind::InsufficientBalance,
    },
    ProviderRule {
        provider: "google",
        needle: "resource_exhausted",
        kind: ErrorKind::QuotaExhausted,
    },
    ProviderRule {
        provider: "openrouter",
        needle: "quota",
        kind: ErrorKind::QuotaExhausted,
    },
];

/// Classify any pipeline failure into an [`ErrorRecord`].
///
/// Cancellation never reaches this function; the pipeline handles it as a
/// distinct terminal state.
pub fn classify(provider_id: &str, err: &TurnpikeError) -> ErrorRecord {
    match err {
        TurnpikeError::Backend(backend) => classify_backend(provider_id, backend),
        TurnpikeError::Classified { record } => record.clone(),
        TurnpikeError::Timeout(ms) => record(
            ErrorKind::UpstreamUnavailable,
            format!("request timed out after {ms}ms"),
            None,
            None,
        ),
        TurnpikeError::Quirk { stage, message } => record(
            ErrorKind::Unknown,
            format!("quirk stage '{stage}' failed: {message}"),
            None,
            None,
        ),
        other => record(ErrorKind::Unknown, other.to_string(), None, None),
    }
}

/// Classify a raw backend failure.
pub fn classify_backend(provider_id: &str, err: &BackendError) -> ErrorRecord {
    match err {
        BackendError::Api {
            status,
            code,
            message,
        } => {
            let haystack = format!(
                "{} {}",
                code.as_deref().unwrap_or_default(),
                message
            )
            .to_lowercase();
            for rule in PROVIDER_RULES {
                if rule.provider == provider_id && haystack.contains(rule.needle) {
                    return record(rule.kind, message.clone(), Some(*status), code.clone());
                }
            }
            let kind = match status {
                401 | 403 => ErrorKind::Auth,
                402 => ErrorKind::InsufficientBalance,
                429 => ErrorKind::RateLimit,
                400 | 422 => ErrorKind::BadRequest,
                500..=599 => ErrorKind::UpstreamUnavailable,
                _ => ErrorKind::Unknown,
            };
            record(kind, message.clone(), Some(*status), code.clone())
        }
        BackendError::Transport(message) => record(
            ErrorKind::UpstreamUnavailable,
            message.clone(),
            None,
            None,
        ),
        BackendError::Interrupted(message) => record(
            ErrorKind::StreamInterrupted,
            message.clone(),
            None,
            None,
        ),
    }
}

fn record(
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    provider_code: Option<String>,
) -> ErrorRecord {
    let retryable = matches!(
        kind,
        ErrorKind::RateLimit | ErrorKind::UpstreamUnavailable | ErrorKind::StreamInterrupted
    );
    ErrorRecord {
        kind,
        message,
        retryable,
        status,
        provider_code,
    }
}
