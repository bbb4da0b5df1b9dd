//! Convenience re-exports for typical callers.

pub use crate::backend::{Backend, BackendError, BackendReply, BackendResponse, EventStream};
pub use crate::cancel::{CancellationCoordinator, StopHandle, TurnId};
pub use crate::error::{ErrorKind, ErrorPolicy, ErrorRecord, Result, TurnpikeError};
pub use crate::models::{ModelCapabilities, ModelDescriptor, ModelFamily, ProviderDescriptor};
pub use crate::pipeline::{
    Pipeline, PipelineOptions, PipelineState, ToolStepPolicy, TurnCompletion, TurnRequest,
};
pub use crate::quirks::{ContinuityTokens, Quirk, ThinkSuffix};
pub use crate::resolve::{resolve, ResolvedParams};
pub use crate::stream::{CanonicalStream, CollectedTurn, StreamTransform};
pub use crate::tools::{ToolChoice, ToolDefinition, ToolError, ToolHandler};
pub use crate::types::{
    AssistantSettings, ContentPart, FinishReason, ReasoningEffort, Role, StreamEvent, Turn, Usage,
};
