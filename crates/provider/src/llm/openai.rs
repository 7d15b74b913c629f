// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenAI-compatible chat-completions adaptor.
//!
//! Streams SSE deltas for `generate_message` and issues one schema-
//! constrained call for `generate_object`. Only the delta surface is
//! assumed; any chat-completions server works.

use super::delta::{FinishSignal, UpstreamDelta};
use super::{ChatMessage, ChatRole, LlmRequest};
use futures_util::StreamExt;
use life_core::{Fault, Schema};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Connection settings for one upstream config.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    /// Base URL up to (not including) `/chat/completions`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
}

/// One OpenAI-compatible upstream.
#[derive(Debug)]
pub struct OpenAiLlm {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiLlm {
    pub fn new(config: OpenAiConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    pub fn name(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, messages: &[ChatMessage], stream: bool) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                        ChatRole::Tool => "tool",
                    },
                    "content": m.content,
                })
            })
            .collect();
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(t) = self.config.temperature {
            body["temperature"] = json!(t);
        }
        body
    }

    async fn post(&self, body: Value) -> Result<reqwest::Response, Fault> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Fault::upstream("chat completions request failed").with_cause(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Fault::upstream(format!("upstream returned {}", status))
                .with_cause(detail.chars().take(300).collect::<String>()));
        }
        Ok(response)
    }

    /// Open the SSE stream; deltas arrive on the returned channel.
    pub(crate) async fn open_stream(
        &self,
        request: &LlmRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<UpstreamDelta>, Fault> {
        let mut body = self.request_body(&request.messages, true);
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request.tools.iter().map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    })
                }).collect(),
            );
        }

        let response = self.post(body).await?;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            loop {
                let bytes = tokio::select! {
                    bytes = stream.next() => bytes,
                    // Cancellation drops the HTTP stream, aborting upstream.
                    _ = cancel.cancelled() => break,
                };
                match bytes {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(event) = next_sse_event(&mut buffer) {
                            match sse_data(&event) {
                                SseData::Done => return,
                                SseData::Payload(payload) => {
                                    for delta in parse_chunk(&payload) {
                                        if tx.send(delta).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                SseData::Skip => {}
                            }
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "sse stream broke");
                        let _ = tx.send(UpstreamDelta::Error(e.to_string())).await;
                        break;
                    }
                    None => break,
                }
            }
        });

        Ok(rx)
    }

    /// Non-streaming completion constrained by a JSON schema.
    ///
    /// Returns the raw message content; empty or missing content is the
    /// caller's `Upstream` case.
    pub(crate) async fn complete_constrained(
        &self,
        messages: &[ChatMessage],
        schema: &Schema,
    ) -> Result<String, Fault> {
        let mut body = self.request_body(messages, false);
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": { "name": "result", "schema": schema.document() },
        });

        let response = self.post(body).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| Fault::upstream("unreadable completion body").with_cause(e))?;

        Ok(value["choices"][0]["message"]["content"].as_str().unwrap_or_default().to_string())
    }
}

/// Cut the next `\n\n`-terminated SSE event out of `buffer`.
fn next_sse_event(buffer: &mut String) -> Option<String> {
    let pos = buffer.find("\n\n")?;
    let event = buffer[..pos].to_string();
    buffer.drain(..pos + 2);
    Some(event)
}

enum SseData {
    Payload(Value),
    Done,
    Skip,
}

/// Extract the `data:` payload of one SSE event.
fn sse_data(event: &str) -> SseData {
    for line in event.lines() {
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else { continue };
        let data = data.trim();
        if data == "[DONE]" {
            return SseData::Done;
        }
        match serde_json::from_str(data) {
            Ok(value) => return SseData::Payload(value),
            Err(_) => return SseData::Skip,
        }
    }
    SseData::Skip
}

/// Translate one chat-completions chunk into upstream deltas.
fn parse_chunk(payload: &Value) -> Vec<UpstreamDelta> {
    let mut out = Vec::new();
    let Some(choice) = payload["choices"].get(0) else {
        return out;
    };

    let delta = &choice["delta"];
    if let Some(text) = delta["content"].as_str() {
        if !text.is_empty() {
            out.push(UpstreamDelta::Text(text.to_string()));
        }
    }
    if let Some(text) = delta["reasoning_content"].as_str() {
        if !text.is_empty() {
            out.push(UpstreamDelta::Reasoning(text.to_string()));
        }
    }
    if let Some(calls) = delta["tool_calls"].as_array() {
        for call in calls {
            out.push(UpstreamDelta::ToolCall {
                index: call["index"].as_u64().unwrap_or(0) as usize,
                id: call["id"].as_str().map(str::to_string),
                name: call["function"]["name"].as_str().map(str::to_string),
                arguments: call["function"]["arguments"].as_str().unwrap_or_default().to_string(),
            });
        }
    }
    if let Some(reason) = choice["finish_reason"].as_str() {
        out.push(UpstreamDelta::Finish(match reason {
            "stop" => FinishSignal::Stop,
            "tool_calls" => FinishSignal::ToolCalls,
            _ => FinishSignal::Other,
        }));
    }
    out
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod tests;
