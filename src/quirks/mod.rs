//! Model-specific request mutations.
//!
//! Some model families need the request reshaped before the backend sees
//! it. Each quirk is capability-gated, idempotent, and ignorant of the
//! others; the pipeline runs them as ordinary stages.

pub mod continuity;
pub mod think_suffix;

pub use continuity::ContinuityTokens;
pub use think_suffix::ThinkSuffix;

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::BackendReply;
use crate::error::{Result, TurnpikeError};
use crate::pipeline::{CallContext, Next, Stage};
use crate::types::RequestDescriptor;

/// One capability-gated request mutation.
///
/// `apply` returns whether the quirk actually changed the request; a
/// gated-off or already-applied quirk reports `Ok(false)`.
pub trait Quirk: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        ctx: &CallContext,
        request: &mut RequestDescriptor,
    ) -> std::result::Result<bool, String>;
}

/// Adapts a [`Quirk`] to the stage chain.
pub struct QuirkStage<Q> {
    quirk: Q,
}

impl<Q: Quirk> QuirkStage<Q> {
    pub fn new(quirk: Q) -> Self {
        Self { quirk }
    }
}

/// Convenience: wrap a quirk as a chain-ready stage.
pub fn stage<Q: Quirk + 'static>(quirk: Q) -> Arc<dyn Stage> {
    Arc::new(QuirkStage::new(quirk))
}

#[async_trait]
impl<Q: Quirk> Stage for QuirkStage<Q> {
    fn name(&self) -> &'static str {
        self.quirk.name()
    }

    async fn call(
        &self,
        ctx: &mut CallContext,
        request: &mut RequestDescriptor,
        next: Next<'_>,
    ) -> Result<BackendReply> {
        match self.quirk.apply(ctx, request) {
            Ok(true) => {
                tracing::debug!(
                    turn_id = %ctx.turn_id,
                    model_id = %ctx.model_id,
                    provider_id = %ctx.provider_id,
                    stage = self.quirk.name(),
                    "quirk applied"
                );
            }
            Ok(false) => {}
            Err(message) => {
                return Err(TurnpikeError::Quirk {
                    stage: self.quirk.name(),
                    message,
                });
            }
        }
        next.run(ctx, request).await
    }
}
