//! Canonical event ordering.
//!
//! Backends emit reasoning, text and tool-call events in backend-specific
//! order. The normalizer is a deterministic state machine that releases
//! events so that the full reasoning sequence for a turn precedes any
//! text that depended on buffering, with tool calls in between. It delays
//! emission only until its gating condition holds, never blocking.

use futures::StreamExt;

use crate::backend::EventStream;
use crate::types::StreamEvent;

/// Per-turn ordering state machine.
///
/// Text start/delta/end events are buffered (FIFO, their scope ids
/// intact) until the turn's reasoning has closed, or until the turn
/// terminates without reasoning, so the full reasoning sequence precedes
/// any text that arrived around it. Reasoning events pass through
/// immediately. A `ReasoningEnd` is synthesized before the first
/// tool-call or flushed text event when reasoning was opened but never
/// explicitly closed.
#[derive(Debug, Default)]
pub struct Normalizer {
    open_reasoning: Option<String>,
    gate_open: bool,
    buffer: Vec<StreamEvent>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event; returns the events released by it, in order.
    pub fn push(&mut self, event: StreamEvent) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        match event {
            StreamEvent::ReasoningStart { id } => {
                self.open_reasoning = Some(id.clone());
                self.gate_open = false;
                out.push(StreamEvent::ReasoningStart { id });
            }
            StreamEvent::ReasoningDelta { id, text } => {
                out.push(StreamEvent::ReasoningDelta { id, text });
            }
            StreamEvent::ReasoningEnd { id } => {
                if self.open_reasoning.as_deref() == Some(id.as_str()) {
                    self.open_reasoning = None;
                }
                out.push(StreamEvent::ReasoningEnd { id });
                self.open_gate(&mut out);
            }
            ev @ (StreamEvent::TextStart { .. }
            | StreamEvent::TextDelta { .. }
            | StreamEvent::TextEnd { .. }) => {
                if self.gate_open {
                    out.push(ev);
                } else {
                    self.buffer.push(ev);
                }
            }
            ev @ (StreamEvent::ToolCallStart { .. }
            | StreamEvent::ToolCall(_)
            | StreamEvent::ToolResult(_)) => {
                if let Some(id) = self.open_reasoning.take() {
                    out.push(StreamEvent::ReasoningEnd { id });
                    out.push(ev);
                    self.open_gate(&mut out);
                } else {
                    out.push(ev);
                }
            }
            ev @ (StreamEvent::Finish { .. } | StreamEvent::Error { .. }) => {
                if let Some(id) = self.open_reasoning.take() {
                    out.push(StreamEvent::ReasoningEnd { id });
                }
                self.drain(&mut out);
                out.push(ev);
            }
        }
        out
    }

    /// Flush remaining state for a stream that ended without a terminal
    /// event.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if let Some(id) = self.open_reasoning.take() {
            out.push(StreamEvent::ReasoningEnd { id });
        }
        self.drain(&mut out);
        out
    }

    fn open_gate(&mut self, out: &mut Vec<StreamEvent>) {
        self.gate_open = true;
        self.drain(out);
    }

    fn drain(&mut self, out: &mut Vec<StreamEvent>) {
        out.append(&mut self.buffer);
    }
}

/// Wrap a raw backend stream with the ordering state machine.
pub fn normalize_stream(stream: EventStream) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut normalizer = Normalizer::new();
        let mut inner = std::pin::pin!(stream);
        while let Some(item) = inner.next().await {
            match item {
                Ok(event) => {
                    for out in normalizer.push(event) {
                        yield Ok(out);
                    }
                }
                Err(err) => {
                    for out in normalizer.finish() {
                        yield Ok(out);
                    }
                    yield Err(err);
                    return;
                }
            }
        }
        for out in normalizer.finish() {
            yield Ok(out);
        }
    })
}
