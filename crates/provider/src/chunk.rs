// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunk vocabularies for the two provider kinds.

use crate::job::Chunk;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments. An empty upstream argument string becomes `{}`.
    pub input: Value,
}

/// Chunks produced by an LLM generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmChunk {
    /// Assistant text delta
    Content { text: String },
    /// Reasoning/thinking delta
    Reasoning { text: String },
    /// All tool calls of one turn, emitted once the model finished them
    Tools { tools: Vec<ToolCall> },
    /// Upstream failure; non-terminal unless followed by `End`
    Error { message: String },
    /// Terminal chunk; at most one per job
    End,
}

impl Chunk for LlmChunk {
    fn end() -> Self {
        Self::End
    }

    fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Chunks produced by an STT transcription job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SttChunk {
    /// A transcription delta with non-empty text
    Content { text: String },
    /// Upstream failure; non-terminal unless followed by `End`
    Error { message: String },
    /// Terminal chunk; at most one per job
    End,
}

impl Chunk for SttChunk {
    fn end() -> Self {
        Self::End
    }

    fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
