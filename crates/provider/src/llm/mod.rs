// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM generation: request vocabulary, the provider variant enum, and the
//! delta-to-chunk translation shared by every adaptor.

pub mod delta;
pub mod openai;

pub use delta::{FinishSignal, UpstreamDelta};
pub use openai::{OpenAiConfig, OpenAiLlm};

use crate::chunk::LlmChunk;
use crate::job::Job;
use life_core::{Fault, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool arguments.
    pub parameters: Value,
}

/// One streaming generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LlmRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

/// The concrete LLM providers.
///
/// A small variant enum instead of a trait object: the retry wrapper and
/// the worker only need this fixed capability set.
#[derive(Debug)]
pub enum LlmProvider {
    OpenAiCompatible(OpenAiLlm),
    #[cfg(any(test, feature = "test-support"))]
    Scripted(crate::scripted::ScriptedLlm),
}

impl LlmProvider {
    /// Provider name used in error messages.
    pub fn name(&self) -> &str {
        match self {
            Self::OpenAiCompatible(p) => p.name(),
            #[cfg(any(test, feature = "test-support"))]
            Self::Scripted(p) => p.name(),
        }
    }

    /// Open the upstream delta stream.
    ///
    /// Establishment errors (connect, auth, HTTP status) surface here so
    /// the retry wrapper can re-attempt; once `Ok`, failures arrive as
    /// [`UpstreamDelta::Error`] events on the stream.
    pub(crate) async fn open_stream(
        &self,
        request: &LlmRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<UpstreamDelta>, Fault> {
        match self {
            Self::OpenAiCompatible(p) => p.open_stream(request, cancel).await,
            #[cfg(any(test, feature = "test-support"))]
            Self::Scripted(p) => p.open_stream(request, cancel).await,
        }
    }

    /// Start a streaming generation.
    ///
    /// Returns the [`Job`] before any upstream byte arrives: the request is
    /// issued from a background reader. If the stream cannot be
    /// established, the job yields one `Error` chunk and then `End`.
    pub fn generate_message(self: &std::sync::Arc<Self>, request: LlmRequest) -> Job<LlmChunk> {
        let (sender, job) = Job::channel();
        let cancel = sender.cancelled();
        let provider = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            match provider.open_stream(&request, cancel.clone()).await {
                Ok(deltas) => delta::pump(deltas, &sender, cancel).await,
                Err(fault) => {
                    sender.send(LlmChunk::Error { message: fault.to_string() });
                    sender.end();
                }
            }
        });
        job
    }

    /// One non-streaming call constrained by `schema`.
    pub async fn generate_object(
        &self,
        messages: &[ChatMessage],
        schema: &Schema,
    ) -> Result<Value, Fault> {
        let content = match self {
            Self::OpenAiCompatible(p) => p.complete_constrained(messages, schema).await?,
            #[cfg(any(test, feature = "test-support"))]
            Self::Scripted(p) => p.complete_constrained(messages, schema).await?,
        };

        if content.trim().is_empty() {
            return Err(Fault::upstream(format!(
                "Invalid response format from {}",
                self.name()
            )));
        }
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| Fault::validation("Failed to parse response as JSON").with_cause(e))?;
        schema
            .validate(&value)
            .map_err(|e| Fault::validation("Schema validation failed").with_cause(e))?;
        Ok(value)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
