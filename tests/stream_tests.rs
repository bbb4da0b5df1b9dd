//! Canonical stream surface tests: ordering, transforms, collection.

mod common;

use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;

use common::{basic_model, turn_request, usage, MockBackend, Scripted};
use turnpike::pipeline::Pipeline;
use turnpike::stream::MapTextTransform;
use turnpike::types::{FinishReason, StreamEvent};

fn reasoning_then_text_script() -> Vec<Result<StreamEvent, turnpike::backend::BackendError>> {
    vec![
        Ok(StreamEvent::ReasoningStart { id: "r1".into() }),
        Ok(StreamEvent::TextStart { id: "t1".into() }),
        Ok(StreamEvent::TextDelta {
            id: "t1".into(),
            text: "the answer".into(),
        }),
        Ok(StreamEvent::ReasoningDelta {
            id: "r1".into(),
            text: "working it out".into(),
        }),
        Ok(StreamEvent::ReasoningEnd { id: "r1".into() }),
        Ok(StreamEvent::TextEnd { id: "t1".into() }),
        Ok(StreamEvent::Finish {
            reason: FinishReason::Stop,
            usage: Some(usage(10, 20)),
        }),
    ]
}

fn kinds(events: &[StreamEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            StreamEvent::ReasoningStart { .. } => "reasoning_start",
            StreamEvent::ReasoningDelta { .. } => "reasoning_delta",
            StreamEvent::ReasoningEnd { .. } => "reasoning_end",
            StreamEvent::TextStart { .. } => "text_start",
            StreamEvent::TextDelta { .. } => "text_delta",
            StreamEvent::TextEnd { .. } => "text_end",
            StreamEvent::ToolCallStart { .. } => "tool_call_start",
            StreamEvent::ToolCall(_) => "tool_call",
            StreamEvent::ToolResult(_) => "tool_result",
            StreamEvent::Finish { .. } => "finish",
            StreamEvent::Error { .. } => "error",
        })
        .collect()
}

#[tokio::test]
async fn interleaved_stream_reorders_reasoning_before_text() {
    let backend = Arc::new(MockBackend::new("openai"));
    backend.queue(Scripted::Stream(reasoning_then_text_script()));
    let pipeline = Pipeline::new(backend);

    let events: Vec<StreamEvent> = pipeline
        .stream_turn(turn_request(basic_model()))
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(
        kinds(&events),
        vec![
            "reasoning_start",
            "reasoning_delta",
            "reasoning_end",
            "text_start",
            "text_delta",
            "text_end",
            "finish",
        ]
    );
}

#[tokio::test]
async fn raw_buffer_keeps_backend_order() {
    let backend = Arc::new(MockBackend::new("openai"));
    backend.queue(Scripted::Stream(reasoning_then_text_script()));
    let pipeline = Pipeline::new(backend);

    let mut stream = pipeline.stream_turn(turn_request(basic_model()));
    let mut seen = Vec::new();
    while let Some(item) = stream.next().await {
        seen.push(item.unwrap());
    }

    let raw = stream.raw_events();
    // The raw tap preserves the backend's interleaving; the canonical
    // output does not.
    assert_eq!(kinds(&raw)[..3], ["reasoning_start", "text_start", "text_delta"]);
    assert_eq!(kinds(&seen)[..3], ["reasoning_start", "reasoning_delta", "reasoning_end"]);
}

#[tokio::test]
async fn collect_folds_the_stream_into_a_turn() {
    let backend = Arc::new(MockBackend::new("openai"));
    backend.queue(Scripted::Stream(reasoning_then_text_script()));
    let pipeline = Pipeline::new(backend);

    let collected = pipeline
        .stream_turn(turn_request(basic_model()))
        .collect_turn()
        .await
        .unwrap();

    assert_eq!(collected.text, "the answer");
    assert_eq!(collected.reasoning, "working it out");
    assert_eq!(collected.finish_reason, Some(FinishReason::Stop));
    assert_eq!(collected.usage.total_tokens, 30);
    assert!(collected.turn.has_reasoning());
}

#[tokio::test]
async fn map_text_transform_rewrites_deltas_only() {
    let backend = Arc::new(MockBackend::new("openai"));
    backend.queue(Scripted::Stream(reasoning_then_text_script()));
    let pipeline = Pipeline::new(backend);

    let transform = MapTextTransform::new(str::to_uppercase);
    let collected = pipeline
        .stream_turn(turn_request(basic_model()))
        .with_transform(&transform)
        .collect_turn()
        .await
        .unwrap();

    assert_eq!(collected.text, "THE ANSWER");
    assert_eq!(collected.reasoning, "working it out");
}

#[tokio::test]
async fn streamed_tool_steps_share_one_canonical_stream() {
    let backend = Arc::new(MockBackend::new("openai"));
    backend.queue(Scripted::Stream(vec![
        Ok(StreamEvent::ToolCallStart {
            id: "c1".into(),
            name: "search".into(),
        }),
        Ok(StreamEvent::ToolCall(turnpike::types::ToolCallPart {
            id: "c1".into(),
            name: "search".into(),
            arguments: serde_json::json!({ "q": "rust" }),
            annotations: Default::default(),
        })),
        Ok(StreamEvent::Finish {
            reason: FinishReason::ToolCalls,
            usage: Some(usage(10, 5)),
        }),
    ]));
    backend.queue(Scripted::Stream(vec![
        Ok(StreamEvent::TextStart { id: "t1".into() }),
        Ok(StreamEvent::TextDelta {
            id: "t1".into(),
            text: "found it".into(),
        }),
        Ok(StreamEvent::TextEnd { id: "t1".into() }),
        Ok(StreamEvent::Finish {
            reason: FinishReason::Stop,
            usage: Some(usage(10, 20)),
        }),
    ]));
    let pipeline = Pipeline::new(backend);

    let request = turn_request(basic_model())
        .with_tools(vec![common::search_tool()], common::tooling_handler());
    let events: Vec<StreamEvent> = pipeline
        .stream_turn(request)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(
        kinds(&events),
        vec![
            "tool_call_start",
            "tool_call",
            "tool_result",
            "text_start",
            "text_delta",
            "text_end",
            "finish",
        ]
    );
    // One terminal finish carrying usage merged across both steps.
    match events.last().unwrap() {
        StreamEvent::Finish { reason, usage } => {
            assert_eq!(*reason, FinishReason::Stop);
            assert_eq!(usage.as_ref().unwrap().total_tokens, 45);
        }
        other => panic!("expected finish, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_failure_flushes_buffered_events_first() {
    let backend = Arc::new(MockBackend::new("openai"));
    backend.queue(Scripted::Stream(vec![
        Ok(StreamEvent::ReasoningStart { id: "r1".into() }),
        Ok(StreamEvent::TextStart { id: "t1".into() }),
        Ok(StreamEvent::TextDelta {
            id: "t1".into(),
            text: "partial".into(),
        }),
        Err(turnpike::backend::BackendError::Interrupted(
            "connection reset".into(),
        )),
    ]));
    let pipeline = Pipeline::new(backend);

    let events: Vec<StreamEvent> = pipeline
        .stream_turn(turn_request(basic_model()))
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(
        kinds(&events),
        vec![
            "reasoning_start",
            "reasoning_end",
            "text_start",
            "text_delta",
            "error",
        ]
    );
}
