//! The backend call contract.
//!
//! A backend SDK call is one opaque async operation; this core never
//! implements a transport protocol. Given a resolved descriptor a backend
//! returns either a single terminal response or a live raw event stream.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::types::{FinishReason, RequestDescriptor, StreamEvent, Turn, Usage};

/// Raw event stream as produced by a backend, before normalization.
pub type EventStream = BoxStream<'static, std::result::Result<StreamEvent, BackendError>>;

/// What a backend call produced.
pub enum BackendReply {
    Complete(BackendResponse),
    Stream(EventStream),
}

/// Terminal response from a non-streaming call.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// The assistant turn, with reasoning/text/tool-call parts in order.
    pub turn: Turn,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

/// Raw failure surfaced by a backend. Always passes through the
/// classifier before a caller sees it.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("backend api error (status {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("backend transport error: {0}")]
    Transport(String),

    #[error("stream interrupted: {0}")]
    Interrupted(String),
}

impl BackendError {
    /// Create an API error without a provider code.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Create an API error with a provider-specific code.
    pub fn api_with_code(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// Core trait implemented by every backend adapter.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Provider id this backend serves (e.g. "openai").
    fn provider_id(&self) -> &str;

    /// Execute one resolved call.
    async fn invoke(&self, request: &RequestDescriptor) -> std::result::Result<BackendReply, BackendError>;
}
