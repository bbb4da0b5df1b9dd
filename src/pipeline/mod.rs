//! The request pipeline.
//!
//! An explicit chain of stages runs before every backend call:
//! cancellation binding first, then any model-quirk stages, terminating
//! in the backend invocation itself. Each stage may rewrite the request,
//! short-circuit, or pass along; the chain is a plain slice walk, so the
//! traversal order is readable at the call site.

pub mod limits;

pub use limits::{ToolStepPolicy, DEFAULT_MAX_TOOL_STEPS, MAX_TOOL_STEPS_CEILING};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use strum::Display;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendReply, EventStream};
use crate::cancel::{CancellationCoordinator, ReleaseGuard, StopHandle, TurnId};
use crate::error::classify::{classify, classify_backend};
use crate::error::{ErrorPolicy, Result, TurnpikeError};
use crate::models::{ModelCapabilities, ModelDescriptor, ProviderDescriptor};
use crate::resolve::{resolve, ResolvedParams};
use crate::stream::{events_from_response, CanonicalStream, Normalizer, TurnAccumulator};
use crate::tools::{ToolChoice, ToolDefinition, ToolHandler};
use crate::types::{
    AssistantSettings, FinishReason, ReasoningEffort, RequestDescriptor, StreamEvent,
    ToolCallPart, ToolResultPart, Turn, Usage,
};

/// Lifecycle of one backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineState {
    Initializing,
    /// Cancellation resolved for this turn, token bound to the request.
    Attached,
    Executing,
    Streaming,
    Finished,
    Aborted,
    Failed,
}

/// Position of a call within a turn's recursive tool loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolStepState {
    /// Zero-based step index within the turn.
    pub depth: u32,
    /// True for every step after the first; continuation steps reuse the
    /// turn's cancellation token instead of minting one.
    pub continuation: bool,
}

/// Mutable per-call context threaded through the stage chain.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub turn_id: TurnId,
    pub model_id: String,
    pub provider_id: String,
    pub capabilities: ModelCapabilities,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub state: PipelineState,
    pub step: ToolStepState,
    pub idle_timeout: Option<Duration>,
}

/// One stage in the pre-call chain.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect or rewrite the request, then delegate to `next`.
    async fn call(
        &self,
        ctx: &mut CallContext,
        request: &mut RequestDescriptor,
        next: Next<'_>,
    ) -> Result<BackendReply>;
}

/// The remainder of the stage chain, ending at the backend.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    backend: &'a dyn Backend,
}

impl Next<'_> {
    pub async fn run(
        self,
        ctx: &mut CallContext,
        request: &mut RequestDescriptor,
    ) -> Result<BackendReply> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .call(
                        ctx,
                        request,
                        Next {
                            stages: rest,
                            backend: self.backend,
                        },
                    )
                    .await
            }
            None => invoke_backend(self.backend, ctx, request).await,
        }
    }
}

/// First stage of every chain: binds the turn's cancellation token.
struct CancelStage {
    coordinator: Arc<CancellationCoordinator>,
}

#[async_trait]
impl Stage for CancelStage {
    fn name(&self) -> &'static str {
        "cancellation"
    }

    async fn call(
        &self,
        ctx: &mut CallContext,
        request: &mut RequestDescriptor,
        next: Next<'_>,
    ) -> Result<BackendReply> {
        if !ctx.step.continuation {
            // First step of the turn mints (or re-fetches) the token;
            // continuation steps arrive with it already bound.
            request.cancel = self.coordinator.attach(ctx.turn_id);
        }
        ctx.state = PipelineState::Attached;
        next.run(ctx, request).await
    }
}

/// Terminal chain segment: the backend call itself, raced against the
/// turn's token and the request timeout.
async fn invoke_backend(
    backend: &dyn Backend,
    ctx: &mut CallContext,
    request: &mut RequestDescriptor,
) -> Result<BackendReply> {
    ctx.state = PipelineState::Executing;
    let token = request.cancel.clone();
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => {
            return Err(TurnpikeError::Canceled);
        }
        outcome = tokio::time::timeout(request.timeout, backend.invoke(request)) => outcome,
    };
    match outcome {
        Ok(Ok(BackendReply::Complete(response))) => {
            ctx.state = PipelineState::Finished;
            Ok(BackendReply::Complete(response))
        }
        Ok(Ok(BackendReply::Stream(inner))) => {
            ctx.state = PipelineState::Streaming;
            Ok(BackendReply::Stream(guard_stream(
                inner,
                token,
                ctx.idle_timeout,
            )))
        }
        Ok(Err(err)) => Err(TurnpikeError::Backend(err)),
        Err(_) => Err(TurnpikeError::Timeout(request.timeout.as_millis() as u64)),
    }
}

enum GuardStep {
    Canceled,
    Idle,
    Item(Option<std::result::Result<StreamEvent, crate::backend::BackendError>>),
}

/// Wrap a live backend stream so the turn's token and the idle timeout
/// keep working after the call handed back. Cancellation surfaces as a
/// `finish` event with the canceled reason, never as an error.
fn guard_stream(
    inner: EventStream,
    token: CancellationToken,
    idle_timeout: Option<Duration>,
) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut inner = std::pin::pin!(inner);
        loop {
            let step = tokio::select! {
                biased;
                _ = token.cancelled() => GuardStep::Canceled,
                step = async {
                    match idle_timeout {
                        Some(limit) => match tokio::time::timeout(limit, inner.next()).await {
                            Ok(item) => GuardStep::Item(item),
                            Err(_) => GuardStep::Idle,
                        },
                        None => GuardStep::Item(inner.next().await),
                    }
                } => step,
            };
            match step {
                GuardStep::Canceled => {
                    yield Ok(StreamEvent::Finish {
                        reason: FinishReason::Canceled,
                        usage: None,
                    });
                    break;
                }
                GuardStep::Idle => {
                    yield Err(crate::backend::BackendError::Interrupted(
                        "stream idle timeout".into(),
                    ));
                    break;
                }
                GuardStep::Item(None) => break,
                GuardStep::Item(Some(Ok(event))) => {
                    let terminal = event.is_terminal();
                    yield Ok(event);
                    if terminal {
                        break;
                    }
                }
                GuardStep::Item(Some(Err(err))) => {
                    yield Err(err);
                    break;
                }
            }
        }
    })
}

/// One logical user turn handed to the pipeline.
#[derive(Clone)]
pub struct TurnRequest {
    pub turn_id: TurnId,
    pub assistant: AssistantSettings,
    pub model: ModelDescriptor,
    pub provider: ProviderDescriptor,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub handler: Option<Arc<dyn ToolHandler>>,
}

impl TurnRequest {
    pub fn new(model: ModelDescriptor, provider: ProviderDescriptor, turns: Vec<Turn>) -> Self {
        Self {
            turn_id: TurnId::new(),
            assistant: AssistantSettings::default(),
            model,
            provider,
            turns,
            tools: Vec::new(),
            tool_choice: ToolChoice::default(),
            handler: None,
        }
    }

    pub fn with_settings(mut self, assistant: AssistantSettings) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn with_tools(
        mut self,
        tools: Vec<ToolDefinition>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        self.tools = tools;
        self.handler = Some(handler);
        self
    }
}

/// What a completed turn produced, across every tool step.
#[derive(Debug, Clone)]
pub struct TurnCompletion {
    pub turn_id: TurnId,
    /// The final assistant turn.
    pub turn: Turn,
    pub text: String,
    /// Usage merged across all steps of the turn.
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
    /// How many backend calls the turn took.
    pub steps: u32,
}

/// Pipeline-level knobs that are not per-assistant.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub error_policy: ErrorPolicy,
    /// Fallback idle timeout when the assistant settings carry none.
    pub idle_timeout: Option<Duration>,
}

/// The request pipeline: stage chain, tool loop and stream assembly
/// around one backend.
#[derive(Clone)]
pub struct Pipeline {
    backend: Arc<dyn Backend>,
    coordinator: Arc<CancellationCoordinator>,
    stages: Vec<Arc<dyn Stage>>,
    policy: ToolStepPolicy,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            coordinator: Arc::new(CancellationCoordinator::new()),
            stages: Vec::new(),
            policy: ToolStepPolicy::default(),
            options: PipelineOptions::default(),
        }
    }

    /// Append a stage after cancellation binding. Stages run in the
    /// order they were added.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_policy(mut self, policy: ToolStepPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn coordinator(&self) -> Arc<CancellationCoordinator> {
        self.coordinator.clone()
    }

    /// Handle that cancels the given turn from outside the pipeline.
    pub fn stop_handle(&self, turn_id: TurnId) -> StopHandle {
        StopHandle::new(self.coordinator.clone(), turn_id)
    }

    fn descriptor(
        &self,
        request: &TurnRequest,
        resolved: &ResolvedParams,
        turns: Vec<Turn>,
        token: Option<CancellationToken>,
    ) -> RequestDescriptor {
        RequestDescriptor {
            turn_id: request.turn_id,
            model_id: request.model.id.clone(),
            provider_id: request.provider.id.clone(),
            turns,
            params: resolved.sampling.clone(),
            tools: request.tools.clone(),
            tool_choice: request.tool_choice.clone(),
            cancel: token.unwrap_or_default(),
            timeout: resolved.timeout,
        }
    }

    fn call_context(&self, request: &TurnRequest, step: ToolStepState) -> CallContext {
        CallContext {
            turn_id: request.turn_id,
            model_id: request.model.id.clone(),
            provider_id: request.provider.id.clone(),
            capabilities: request.model.capabilities.clone(),
            reasoning_effort: request.assistant.reasoning_effort,
            state: PipelineState::Initializing,
            step,
            idle_timeout: request.assistant.idle_timeout.or(self.options.idle_timeout),
        }
    }

    /// Run one backend call through the stage chain, classifying every
    /// failure except cancellation.
    async fn run_step(
        &self,
        ctx: &mut CallContext,
        request: &mut RequestDescriptor,
    ) -> Result<BackendReply> {
        let mut stages: Vec<Arc<dyn Stage>> = Vec::with_capacity(self.stages.len() + 1);
        stages.push(Arc::new(CancelStage {
            coordinator: self.coordinator.clone(),
        }));
        stages.extend(self.stages.iter().cloned());
        let chain = Next {
            stages: &stages,
            backend: self.backend.as_ref(),
        };
        match chain.run(ctx, request).await {
            Ok(reply) => Ok(reply),
            Err(TurnpikeError::Canceled) => {
                ctx.state = PipelineState::Aborted;
                tracing::debug!(turn_id = %ctx.turn_id, "turn canceled before backend reply");
                Err(TurnpikeError::Canceled)
            }
            Err(err) => {
                ctx.state = PipelineState::Failed;
                let record = classify(&request.provider_id, &err);
                tracing::warn!(
                    turn_id = %ctx.turn_id,
                    model_id = %ctx.model_id,
                    provider_id = %ctx.provider_id,
                    kind = %record.kind,
                    retryable = record.retryable,
                    "call failed"
                );
                Err(TurnpikeError::Classified { record })
            }
        }
    }

    /// Run a turn to completion, executing tool calls between steps.
    ///
    /// Cancellation before a backend reply surfaces as
    /// [`TurnpikeError::Canceled`]; cancellation mid-stream completes the
    /// turn with the canceled finish reason.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnCompletion> {
        let _guard = ReleaseGuard::new(self.coordinator.clone(), request.turn_id);
        let policy = self.policy.for_settings(&request.assistant);
        let mut transcript = request.turns.clone();
        let mut usage = Usage::default();
        let mut step = ToolStepState::default();
        let mut turn_token: Option<CancellationToken> = None;

        loop {
            let resolved = resolve(&request.assistant, &request.model, &request.provider);
            let mut descriptor =
                self.descriptor(&request, &resolved, transcript.clone(), turn_token.clone());
            let mut ctx = self.call_context(&request, step);
            let reply = self.run_step(&mut ctx, &mut descriptor).await?;
            turn_token = Some(descriptor.cancel.clone());

            let acc = fold_reply(&request.provider.id, reply).await?;
            usage.merge(acc.usage());
            let finish_reason = acc.finish_reason();
            let turn = acc.into_turn();
            let calls: Vec<ToolCallPart> = turn.tool_calls().into_iter().cloned().collect();
            transcript.push(turn.clone());

            let steps = step.depth + 1;
            let canceled = finish_reason == Some(FinishReason::Canceled);
            let handler = match &request.handler {
                Some(handler) if !calls.is_empty() && !canceled => handler.clone(),
                _ => {
                    return Ok(TurnCompletion {
                        turn_id: request.turn_id,
                        text: turn.text(),
                        turn,
                        usage,
                        finish_reason,
                        steps,
                    });
                }
            };
            if steps >= policy.max_steps {
                return Err(TurnpikeError::ToolStepLimit(policy.max_steps));
            }
            for call in &calls {
                let (result, is_error) = match handler.handle(call).await {
                    Ok(value) => (value, false),
                    Err(err) => (serde_json::json!({ "error": err.to_string() }), true),
                };
                tracing::debug!(
                    turn_id = %request.turn_id,
                    tool = %call.name,
                    is_error,
                    "tool call handled"
                );
                transcript.push(Turn::tool_result(call.id.clone(), result, is_error));
            }
            step = ToolStepState {
                depth: step.depth + 1,
                continuation: true,
            };
        }
    }

    /// Run a turn as one canonical event stream.
    ///
    /// All tool steps share the stream; intermediate finish events are
    /// absorbed and a single terminal finish carries the merged usage.
    /// Failures follow the configured [`ErrorPolicy`].
    pub fn stream_turn(&self, request: TurnRequest) -> CanonicalStream {
        let pipeline = self.clone();
        let stop = self.stop_handle(request.turn_id);
        let raw = Arc::new(Mutex::new(Vec::new()));
        let raw_tap = raw.clone();
        let policy = self.policy.for_settings(&request.assistant);

        let events = Box::pin(async_stream::stream! {
            let _guard = ReleaseGuard::new(pipeline.coordinator.clone(), request.turn_id);
            let mut transcript = request.turns.clone();
            let mut usage = Usage::default();
            let mut step = ToolStepState::default();
            let mut turn_token: Option<CancellationToken> = None;

            loop {
                let resolved = resolve(&request.assistant, &request.model, &request.provider);
                let mut descriptor = pipeline.descriptor(
                    &request,
                    &resolved,
                    transcript.clone(),
                    turn_token.clone(),
                );
                let mut ctx = pipeline.call_context(&request, step);
                let reply = match pipeline.run_step(&mut ctx, &mut descriptor).await {
                    Ok(reply) => reply,
                    Err(TurnpikeError::Canceled) => {
                        yield Ok(StreamEvent::Finish {
                            reason: FinishReason::Canceled,
                            usage: Some(usage.clone()),
                        });
                        return;
                    }
                    Err(err) => {
                        match pipeline.options.error_policy {
                            ErrorPolicy::Degrade => {
                                let record = err
                                    .record()
                                    .cloned()
                                    .unwrap_or_else(|| classify(&request.provider.id, &err));
                                yield Ok(StreamEvent::Error { record });
                            }
                            ErrorPolicy::Raise => yield Err(err),
                        }
                        return;
                    }
                };
                turn_token = Some(descriptor.cancel.clone());

                let mut normalizer = Normalizer::new();
                let mut acc = TurnAccumulator::new();
                match reply {
                    BackendReply::Stream(mut inner) => {
                        let mut failed = false;
                        while let Some(item) = inner.next().await {
                            match item {
                                Ok(raw_event) => {
                                    raw_tap
                                        .lock()
                                        .expect("raw event buffer lock poisoned")
                                        .push(raw_event.clone());
                                    for event in normalizer.push(raw_event) {
                                        acc.observe(&event);
                                        if !event.is_terminal() {
                                            yield Ok(event);
                                        }
                                    }
                                }
                                Err(raw_err) => {
                                    for event in normalizer.finish() {
                                        acc.observe(&event);
                                        yield Ok(event);
                                    }
                                    let record =
                                        classify_backend(&request.provider.id, &raw_err);
                                    tracing::warn!(
                                        turn_id = %request.turn_id,
                                        provider_id = %request.provider.id,
                                        kind = %record.kind,
                                        "stream failed"
                                    );
                                    match pipeline.options.error_policy {
                                        ErrorPolicy::Degrade => {
                                            yield Ok(StreamEvent::Error { record });
                                        }
                                        ErrorPolicy::Raise => {
                                            yield Err(TurnpikeError::Classified { record });
                                        }
                                    }
                                    failed = true;
                                    break;
                                }
                            }
                        }
                        if failed {
                            return;
                        }
                        for event in normalizer.finish() {
                            acc.observe(&event);
                            if !event.is_terminal() {
                                yield Ok(event);
                            }
                        }
                    }
                    BackendReply::Complete(response) => {
                        for event in events_from_response(&response) {
                            raw_tap
                                .lock()
                                .expect("raw event buffer lock poisoned")
                                .push(event.clone());
                            acc.observe(&event);
                            if !event.is_terminal() {
                                yield Ok(event);
                            }
                        }
                    }
                }

                usage.merge(acc.usage());
                let finish_reason = acc.finish_reason();
                let turn = acc.into_turn();
                let calls: Vec<ToolCallPart> =
                    turn.tool_calls().into_iter().cloned().collect();
                transcript.push(turn);

                if finish_reason == Some(FinishReason::Canceled) {
                    yield Ok(StreamEvent::Finish {
                        reason: FinishReason::Canceled,
                        usage: Some(usage.clone()),
                    });
                    return;
                }
                if calls.is_empty() || request.handler.is_none() {
                    yield Ok(StreamEvent::Finish {
                        reason: finish_reason.unwrap_or(FinishReason::Stop),
                        usage: Some(usage.clone()),
                    });
                    return;
                }
                if step.depth + 1 >= policy.max_steps {
                    let err = TurnpikeError::ToolStepLimit(policy.max_steps);
                    match pipeline.options.error_policy {
                        ErrorPolicy::Degrade => {
                            let record = classify(&request.provider.id, &err);
                            yield Ok(StreamEvent::Error { record });
                        }
                        ErrorPolicy::Raise => yield Err(err),
                    }
                    return;
                }
                let Some(handler) = request.handler.clone() else {
                    return;
                };
                for call in &calls {
                    let part = match handler.handle(call).await {
                        Ok(value) => ToolResultPart {
                            tool_call_id: call.id.clone(),
                            result: value,
                            is_error: false,
                        },
                        Err(err) => ToolResultPart {
                            tool_call_id: call.id.clone(),
                            result: serde_json::json!({ "error": err.to_string() }),
                            is_error: true,
                        },
                    };
                    transcript.push(Turn::tool_result(
                        part.tool_call_id.clone(),
                        part.result.clone(),
                        part.is_error,
                    ));
                    yield Ok(StreamEvent::ToolResult(part));
                }
                step = ToolStepState {
                    depth: step.depth + 1,
                    continuation: true,
                };
            }
        });

        CanonicalStream::new(events, raw, stop)
    }
}

/// Drain one reply into an accumulator, normalizing streamed events.
async fn fold_reply(provider_id: &str, reply: BackendReply) -> Result<TurnAccumulator> {
    let mut acc = TurnAccumulator::new();
    match reply {
        BackendReply::Complete(response) => {
            for event in events_from_response(&response) {
                acc.observe(&event);
            }
        }
        BackendReply::Stream(mut inner) => {
            let mut normalizer = Normalizer::new();
            while let Some(item) = inner.next().await {
                match item {
                    Ok(event) => {
                        for out in normalizer.push(event) {
                            acc.observe(&out);
                        }
                    }
                    Err(err) => {
                        return Err(TurnpikeError::Classified {
                            record: classify_backend(provider_id, &err),
                        });
                    }
                }
            }
            for out in normalizer.finish() {
                acc.observe(&out);
            }
        }
    }
    Ok(acc)
}
