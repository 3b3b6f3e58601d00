use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;

use super::base::{Provider, StreamEvent};
use super::configs::OpenAiProviderConfig;
use super::retry::{with_retry, RetryConfig};
use super::utils::{
    openai_error, openai_response_to_completion, parse_sse_line, tools_to_openai_spec, SseLine,
    StreamAccumulator,
};
use crate::errors::{ProviderError, ProviderResult};

/// Chat completion client for openai compatible endpoints.
///
/// The underlying http client is created on first use and dropped by `close`.
pub struct OpenAiProvider {
    client: Mutex<Option<Client>>,
    config: OpenAiProviderConfig,
    retry: RetryConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Self {
        Self {
            client: Mutex::new(None),
            config,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self::new(OpenAiProviderConfig::from_env()?))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &OpenAiProviderConfig {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    async fn get_client(&self) -> ProviderResult<Client> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        *guard = Some(client.clone());
        Ok(client)
    }

    fn build_payload(
        &self,
        messages: Vec<Value>,
        tools: Option<Vec<Value>>,
        stream: bool,
    ) -> ProviderResult<Value> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": stream,
        });

        if let Some(tools) = tools.filter(|tools| !tools.is_empty()) {
            payload["tools"] = json!(tools_to_openai_spec(&tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }
        if stream {
            payload["stream_options"] = json!({"include_usage": true});
        }

        Ok(payload)
    }

    async fn post(&self, payload: &Value, attempt: u32) -> ProviderResult<Response> {
        let client = self.get_client().await?;
        tracing::debug!(
            attempt,
            model = %self.config.model,
            "Sending chat completion request"
        );

        let response = client
            .post(self.config.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|value| value.get("error").cloned());
                match error {
                    Some(error) if status != StatusCode::TOO_MANY_REQUESTS => {
                        match openai_error(&error) {
                            err @ ProviderError::ContextLengthExceeded(_) => Err(err),
                            _ => Err(ProviderError::from_status(status, &body)),
                        }
                    }
                    _ => Err(ProviderError::from_status(status, &body)),
                }
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn chat_completion(
        &self,
        messages: Vec<Value>,
        tools: Option<Vec<Value>>,
        stream: bool,
    ) -> BoxStream<'_, StreamEvent> {
        Box::pin(async_stream::stream! {
            let payload = match self.build_payload(messages, tools, stream) {
                Ok(payload) => payload,
                Err(e) => {
                    yield StreamEvent::error(e.to_string());
                    return;
                }
            };

            let retried = with_retry(&self.retry, |attempt| self.post(&payload, attempt)).await;
            let response = match retried {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "Chat completion failed");
                    yield StreamEvent::error(e.to_string());
                    return;
                }
            };

            if !stream {
                let completion = match response.json::<Value>().await {
                    Ok(body) => openai_response_to_completion(&body),
                    Err(e) => Err(ProviderError::from(e)),
                };
                match completion {
                    Ok(complete) => yield StreamEvent::MessageComplete(complete),
                    Err(e) => yield StreamEvent::error(e.to_string()),
                }
                return;
            }

            let mut accumulator = StreamAccumulator::default();
            let mut bytes = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut done = false;

            while !done {
                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        yield StreamEvent::error(ProviderError::from(e).to_string());
                        return;
                    }
                    None => {
                        // flush a trailing line that had no newline
                        buffer.push(b'\n');
                        done = true;
                    }
                }

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    match parse_sse_line(&String::from_utf8_lossy(&line)) {
                        SseLine::Data(chunk) => {
                            if let Some(error) = chunk.get("error") {
                                yield StreamEvent::error(openai_error(error).to_string());
                                return;
                            }
                            if let Some(text) = accumulator.apply_chunk(&chunk) {
                                yield StreamEvent::text_delta(text);
                            }
                        }
                        SseLine::Done => {
                            done = true;
                            buffer.clear();
                        }
                        SseLine::Skip => {}
                    }
                }
            }

            yield StreamEvent::MessageComplete(accumulator.finish());
        })
    }

    async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            tracing::debug!("Closed chat completion client");
        }
    }
}
