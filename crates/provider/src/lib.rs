// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! life-provider: the uniform job abstraction over LLM and STT providers.
//!
//! A [`Job`] is a cancellable handle on an in-flight provider operation:
//! a lazy, finite, single-consumer chunk stream plus an idempotent cancel
//! signal. Concrete providers are variants of [`llm::LlmProvider`] /
//! [`stt::SttProvider`]; the retry/fallback wrapper works the same for all
//! of them.

pub mod chunk;
pub mod job;
pub mod llm;
pub mod retry;
pub mod stt;

#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

pub use chunk::{LlmChunk, SttChunk, ToolCall};
pub use job::{Chunk, Job, JobSender};
pub use llm::{ChatMessage, ChatRole, LlmProvider, LlmRequest, ToolSpec};
pub use retry::{LlmChain, MAX_ATTEMPTS_PER_CONFIG};
pub use stt::{SttJob, SttProvider, SttVoice};

#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ScriptedLlm, ScriptedStt};
