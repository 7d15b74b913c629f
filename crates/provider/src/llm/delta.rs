// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translation of upstream streaming deltas into job chunks.
//!
//! Adaptor-independent and pure enough to test with scripted deltas. Tool
//! call fragments accumulate per upstream index; the `tools` chunk is
//! emitted only when the model signals tool calls finished.

use crate::chunk::{LlmChunk, ToolCall};
use crate::job::JobSender;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Why the upstream stream finished one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishSignal {
    /// Natural end of generation
    Stop,
    /// The model finished emitting tool calls
    ToolCalls,
    /// Anything else (length, content filter, ...)
    Other,
}

/// One upstream streaming event, normalized across adaptors.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamDelta {
    Text(String),
    Reasoning(String),
    /// A tool-call fragment. `id`/`name` arrive on the first fragment of an
    /// index; `arguments` fragments concatenate.
    ToolCall { index: usize, id: Option<String>, name: Option<String>, arguments: String },
    Finish(FinishSignal),
    /// Upstream error; non-terminal
    Error(String),
}

#[derive(Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Drain `deltas` into `sender` until the stream ends or `cancel` fires.
///
/// Dropping the receiver aborts the upstream reader; the job's terminal
/// `End` is enforced by the sender either way.
pub async fn pump(
    mut deltas: mpsc::Receiver<UpstreamDelta>,
    sender: &JobSender<LlmChunk>,
    cancel: CancellationToken,
) {
    let mut calls: IndexMap<usize, PartialCall> = IndexMap::new();

    loop {
        let delta = tokio::select! {
            delta = deltas.recv() => delta,
            _ = cancel.cancelled() => {
                // Dropping `deltas` tears down the upstream request.
                return;
            }
        };

        match delta {
            Some(UpstreamDelta::Text(text)) => sender.send(LlmChunk::Content { text }),
            Some(UpstreamDelta::Reasoning(text)) => sender.send(LlmChunk::Reasoning { text }),
            Some(UpstreamDelta::ToolCall { index, id, name, arguments }) => {
                let call = calls.entry(index).or_default();
                if let Some(id) = id {
                    call.id = id;
                }
                if let Some(name) = name {
                    call.name = name;
                }
                call.arguments.push_str(&arguments);
            }
            Some(UpstreamDelta::Finish(FinishSignal::ToolCalls)) => {
                let tools = assemble(&mut calls, sender);
                if !tools.is_empty() {
                    sender.send(LlmChunk::Tools { tools });
                }
            }
            Some(UpstreamDelta::Finish(_)) => {}
            Some(UpstreamDelta::Error(message)) => sender.send(LlmChunk::Error { message }),
            None => {
                sender.end();
                return;
            }
        }
    }
}

/// Build the finished tool calls, parsing accumulated argument JSON.
fn assemble(
    calls: &mut IndexMap<usize, PartialCall>,
    sender: &JobSender<LlmChunk>,
) -> Vec<ToolCall> {
    let mut tools = Vec::with_capacity(calls.len());
    for (_, call) in calls.drain(..) {
        let input = if call.arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str(&call.arguments) {
                Ok(value) => value,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "dropping tool call with bad arguments");
                    sender.send(LlmChunk::Error {
                        message: format!("unparseable arguments for tool {:?}", call.name),
                    });
                    continue;
                }
            }
        };
        tools.push(ToolCall { id: call.id, name: call.name, input });
    }
    tools
}

#[cfg(test)]
#[path = "delta_tests.rs"]
mod tests;
