//! Canonical stream surface.
//!
//! Everything a consumer sees after normalization: the canonical event
//! stream for one turn, pluggable stream transforms, and the accumulator
//! that folds events back into a completed assistant turn.

pub mod normalize;

pub use normalize::{normalize_stream, Normalizer};

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::backend::{BackendError, BackendResponse, EventStream};
use crate::cancel::StopHandle;
use crate::error::{ErrorRecord, Result};
use crate::types::{
    ContentPart, FinishReason, Role, StreamEvent, ToolCallPart, Turn, Usage,
};

/// Canonical per-turn event sequence after normalization.
pub type CanonicalEvents = BoxStream<'static, Result<StreamEvent>>;

/// Build a raw backend stream from a fixed event script.
pub fn event_stream(events: Vec<std::result::Result<StreamEvent, BackendError>>) -> EventStream {
    Box::pin(tokio_stream::iter(events))
}

/// Expand a terminal response into the equivalent canonical event
/// sequence, so non-streaming backends feed the same consumer surface.
pub fn events_from_response(response: &BackendResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for (index, part) in response.turn.parts.iter().enumerate() {
        match part {
            ContentPart::Reasoning(p) => {
                let id = format!("r{index}");
                events.push(StreamEvent::ReasoningStart { id: id.clone() });
                events.push(StreamEvent::ReasoningDelta {
                    id: id.clone(),
                    text: p.text.clone(),
                });
                events.push(StreamEvent::ReasoningEnd { id });
            }
            ContentPart::Text(p) => {
                let id = format!("t{index}");
                events.push(StreamEvent::TextStart { id: id.clone() });
                events.push(StreamEvent::TextDelta {
                    id: id.clone(),
                    text: p.text.clone(),
                });
                events.push(StreamEvent::TextEnd { id });
            }
            ContentPart::ToolCall(tc) => {
                events.push(StreamEvent::ToolCallStart {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                });
                events.push(StreamEvent::ToolCall(tc.clone()));
            }
            ContentPart::ToolResult(_) => {}
        }
    }
    events.push(StreamEvent::Finish {
        reason: response.finish_reason.unwrap_or(FinishReason::Stop),
        usage: Some(response.usage.clone()),
    });
    events
}

/// Folds canonical events back into a completed assistant turn.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    reasoning: String,
    text: String,
    tool_calls: Vec<ToolCallPart>,
    usage: Usage,
    finish: Option<FinishReason>,
    error: Option<ErrorRecord>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::ReasoningDelta { text, .. } => self.reasoning.push_str(text),
            StreamEvent::TextDelta { text, .. } => self.text.push_str(text),
            StreamEvent::ToolCall(call) => {
                // A later event for the same call id replaces the earlier one.
                match self.tool_calls.iter_mut().find(|c| c.id == call.id) {
                    Some(existing) => *existing = call.clone(),
                    None => self.tool_calls.push(call.clone()),
                }
            }
            StreamEvent::Finish { reason, usage } => {
                self.finish = Some(*reason);
                if let Some(usage) = usage {
                    self.usage.merge(usage);
                }
            }
            StreamEvent::Error { record } => {
                self.error = Some(record.clone());
                self.finish.get_or_insert(FinishReason::Error);
            }
            _ => {}
        }
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        self.error.as_ref()
    }

    /// The accumulated assistant turn: reasoning first, then tool calls,
    /// then text, mirroring canonical event order.
    pub fn into_turn(self) -> Turn {
        let mut parts = Vec::new();
        if !self.reasoning.is_empty() {
            parts.push(ContentPart::reasoning(self.reasoning));
        }
        parts.extend(self.tool_calls.into_iter().map(ContentPart::ToolCall));
        if !self.text.is_empty() {
            parts.push(ContentPart::text(self.text));
        }
        Turn {
            role: Role::Assistant,
            parts,
            timestamp: Some(chrono::Utc::now()),
        }
    }

    /// Consume the accumulator into a collected result.
    pub fn into_collected(self) -> CollectedTurn {
        let text = self.text.clone();
        let reasoning = self.reasoning.clone();
        let usage = self.usage.clone();
        let finish_reason = self.finish;
        let error = self.error.clone();
        CollectedTurn {
            text,
            reasoning,
            usage,
            finish_reason,
            error,
            turn: self.into_turn(),
        }
    }
}

/// Everything a turn's stream produced, folded together.
#[derive(Debug, Clone)]
pub struct CollectedTurn {
    pub turn: Turn,
    pub text: String,
    pub reasoning: String,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
    pub error: Option<ErrorRecord>,
}

/// Rewrites a canonical event stream. Transforms compose left to right
/// and see events only after normalization.
pub trait StreamTransform: Send + Sync {
    fn transform(&self, stream: CanonicalEvents) -> CanonicalEvents;
}

/// Applies a text mapping to every text delta, leaving reasoning and
/// tool events untouched.
pub struct MapTextTransform {
    mapper: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl MapTextTransform {
    pub fn new(mapper: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            mapper: Arc::new(mapper),
        }
    }
}

impl StreamTransform for MapTextTransform {
    fn transform(&self, stream: CanonicalEvents) -> CanonicalEvents {
        let mapper = self.mapper.clone();
        stream
            .map(move |item| {
                item.map(|event| match event {
                    StreamEvent::TextDelta { id, text } => StreamEvent::TextDelta {
                        text: mapper(&text),
                        id,
                    },
                    other => other,
                })
            })
            .boxed()
    }
}

/// The canonical stream for one turn: normalized events plus the stop
/// handle and the raw diagnostic buffer.
pub struct CanonicalStream {
    events: CanonicalEvents,
    raw: Arc<Mutex<Vec<StreamEvent>>>,
    stop: StopHandle,
}

impl CanonicalStream {
    pub(crate) fn new(
        events: CanonicalEvents,
        raw: Arc<Mutex<Vec<StreamEvent>>>,
        stop: StopHandle,
    ) -> Self {
        Self { events, raw, stop }
    }

    /// Handle that cancels this turn from outside the consumer loop.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Snapshot of the raw backend events observed so far, before
    /// normalization. Diagnostic only.
    pub fn raw_events(&self) -> Vec<StreamEvent> {
        self.raw
            .lock()
            .expect("raw event buffer lock poisoned")
            .clone()
    }

    /// Apply a transform to the remaining events.
    pub fn with_transform(mut self, transform: &dyn StreamTransform) -> Self {
        self.events = transform.transform(self.events);
        self
    }

    /// Drain the stream and fold it into a completed turn.
    pub async fn collect_turn(mut self) -> Result<CollectedTurn> {
        let mut acc = TurnAccumulator::new();
        while let Some(item) = self.events.next().await {
            acc.observe(&item?);
        }
        Ok(acc.into_collected())
    }
}

impl Stream for CanonicalStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl From<CanonicalStream> for CanonicalEvents {
    fn from(stream: CanonicalStream) -> Self {
        stream.events
    }
}
