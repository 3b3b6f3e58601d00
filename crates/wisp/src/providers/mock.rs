use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::providers::base::{MessageComplete, Provider, StreamEvent};

/// What the agent asked the mock for on one call
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub messages: Vec<Value>,
    pub tools: Option<Vec<Value>>,
    pub stream: bool,
}

/// A mock provider that replays pre-configured event sequences for testing
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Vec<StreamEvent>>>>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
    closes: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a new mock provider, one event sequence per expected call
    pub fn new(responses: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared view of every request received, usable after the provider is moved
    pub fn requests(&self) -> Arc<Mutex<Vec<MockRequest>>> {
        Arc::clone(&self.requests)
    }

    pub fn closes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

/// Terminal event for a plain text answer
pub fn text_response(text: &str) -> Vec<StreamEvent> {
    vec![StreamEvent::MessageComplete(MessageComplete {
        content: Some(text.to_string()),
        finish_reason: Some("stop".to_string()),
        ..Default::default()
    })]
}

/// Terminal event requesting the given tool calls
pub fn tool_call_response(calls: Vec<crate::models::tool::ToolCall>) -> Vec<StreamEvent> {
    vec![StreamEvent::MessageComplete(MessageComplete {
        content: None,
        finish_reason: Some("tool_calls".to_string()),
        usage: None,
        tool_calls: calls,
    })]
}

#[async_trait]
impl Provider for MockProvider {
    fn chat_completion(
        &self,
        messages: Vec<Value>,
        tools: Option<Vec<Value>>,
        stream: bool,
    ) -> BoxStream<'_, StreamEvent> {
        self.requests.lock().unwrap().push(MockRequest {
            messages,
            tools,
            stream,
        });
        let events = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| text_response(""));
        stream::iter(events).boxed()
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
