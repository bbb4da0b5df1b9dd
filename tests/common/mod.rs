//! Shared test helpers and mock backend.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use turnpike::backend::{Backend, BackendError, BackendReply, BackendResponse};
use turnpike::models::{ModelCapabilities, ModelDescriptor, ModelFamily, ProviderDescriptor};
use turnpike::pipeline::TurnRequest;
use turnpike::types::*;

/// One scripted backend reply.
pub enum Scripted {
    Complete(BackendResponse),
    Stream(Vec<Result<StreamEvent, BackendError>>),
    /// Emits the given events, then hangs until canceled or timed out.
    HangingStream(Vec<StreamEvent>),
    Fail(BackendError),
}

/// A mock backend that returns canned replies and records every request
/// it receives.
pub struct MockBackend {
    provider_id: String,
    replies: Mutex<Vec<Scripted>>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl MockBackend {
    pub fn new(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            replies: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a terminal text response.
    pub fn queue_text(&self, text: &str) {
        self.queue(Scripted::Complete(BackendResponse {
            turn: Turn::assistant(text),
            usage: usage(10, 20),
            finish_reason: Some(FinishReason::Stop),
        }));
    }

    /// Queue a terminal response carrying one tool call.
    pub fn queue_tool_call(&self, id: &str, name: &str, args: serde_json::Value) {
        self.queue(Scripted::Complete(BackendResponse {
            turn: Turn {
                role: Role::Assistant,
                parts: vec![ContentPart::ToolCall(ToolCallPart {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: args,
                    annotations: Default::default(),
                })],
                timestamp: None,
            },
            usage: usage(10, 5),
            finish_reason: Some(FinishReason::ToolCalls),
        }));
    }

    pub fn queue(&self, reply: Scripted) {
        self.replies.lock().unwrap().push(reply);
    }

    /// Requests observed so far, in call order.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn invoke(&self, request: &RequestDescriptor) -> Result<BackendReply, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = {
            let mut replies = self.replies.lock().unwrap();
            assert!(!replies.is_empty(), "mock backend ran out of replies");
            replies.remove(0)
        };
        match scripted {
            Scripted::Complete(response) => Ok(BackendReply::Complete(response)),
            Scripted::Stream(events) => Ok(BackendReply::Stream(turnpike::stream::event_stream(
                events,
            ))),
            Scripted::HangingStream(events) => {
                Ok(BackendReply::Stream(Box::pin(async_stream::stream! {
                    for event in events {
                        yield Ok(event);
                    }
                    futures::future::pending::<()>().await;
                })))
            }
            Scripted::Fail(err) => Err(err),
        }
    }
}

/// A tool handler that answers every call with a fixed JSON value.
pub struct EchoTools {
    pub result: serde_json::Value,
}

#[async_trait]
impl turnpike::tools::ToolHandler for EchoTools {
    async fn handle(
        &self,
        call: &ToolCallPart,
    ) -> Result<serde_json::Value, turnpike::tools::ToolError> {
        Ok(serde_json::json!({ "tool": call.name, "result": self.result }))
    }
}

pub fn usage(input: u32, output: u32) -> Usage {
    Usage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: input + output,
        reasoning_tokens: None,
    }
}

pub fn openai_provider() -> ProviderDescriptor {
    ProviderDescriptor::new("openai", "OpenAI")
}

pub fn basic_model() -> ModelDescriptor {
    ModelDescriptor::new("gpt-4.1", ModelFamily::OpenAi, ModelCapabilities::full(128_000))
}

pub fn turn_request(backend_model: ModelDescriptor) -> TurnRequest {
    TurnRequest::new(backend_model, openai_provider(), vec![Turn::user("hi")])
}

pub fn search_tool() -> turnpike::tools::ToolDefinition {
    turnpike::tools::ToolDefinition {
        name: "search".into(),
        description: "Search the web".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": { "q": { "type": "string" } }
        }),
    }
}

pub fn tooling_handler() -> Arc<dyn turnpike::tools::ToolHandler> {
    Arc::new(EchoTools {
        result: serde_json::json!("ok"),
    })
}
