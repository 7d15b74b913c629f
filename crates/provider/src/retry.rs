// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry and fallback across an ordered provider chain.
//!
//! Up to three attempts per config, then advance to the next; exhausting
//! every config returns the last error. The policy is identical for the
//! streaming and the object entry points; for streams it covers
//! establishment only, a live stream is never re-attempted mid-flight.

use crate::chunk::LlmChunk;
use crate::job::Job;
use crate::llm::{delta, ChatMessage, LlmProvider, LlmRequest};
use life_core::{Fault, Schema};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Upstream attempts per config before advancing to the next one.
pub const MAX_ATTEMPTS_PER_CONFIG: usize = 3;

/// A primary provider config plus ordered fallbacks.
#[derive(Debug)]
pub struct LlmChain {
    configs: Vec<Arc<LlmProvider>>,
}

impl LlmChain {
    pub fn new(primary: LlmProvider, fallbacks: impl IntoIterator<Item = LlmProvider>) -> Self {
        let mut configs = vec![Arc::new(primary)];
        configs.extend(fallbacks.into_iter().map(Arc::new));
        Self { configs }
    }

    /// Streaming generation with establishment retries.
    ///
    /// Returns the job immediately; if every config exhausts its attempts,
    /// the job yields the last error and ends.
    pub fn generate_message(self: &Arc<Self>, request: LlmRequest) -> Job<LlmChunk> {
        let (sender, job) = Job::channel();
        let cancel = sender.cancelled();
        let chain = Arc::clone(self);

        tokio::spawn(async move {
            let mut last: Option<Fault> = None;
            for provider in &chain.configs {
                for attempt in 1..=MAX_ATTEMPTS_PER_CONFIG {
                    if cancel.is_cancelled() {
                        return;
                    }
                    match provider.open_stream(&request, cancel.clone()).await {
                        Ok(deltas) => {
                            delta::pump(deltas, &sender, cancel).await;
                            return;
                        }
                        Err(fault) => {
                            warn!(
                                provider = provider.name(),
                                attempt,
                                error = %fault,
                                "llm stream establishment failed"
                            );
                            last = Some(fault);
                        }
                    }
                }
            }
            if let Some(fault) = last {
                sender.send(LlmChunk::Error { message: fault.to_string() });
            }
            sender.end();
        });
        job
    }

    /// Constrained object generation with the same retry policy.
    pub async fn generate_object(
        &self,
        messages: &[ChatMessage],
        schema: &Schema,
    ) -> Result<Value, Fault> {
        let mut last: Option<Fault> = None;
        for provider in &self.configs {
            for attempt in 1..=MAX_ATTEMPTS_PER_CONFIG {
                match provider.generate_object(messages, schema).await {
                    Ok(value) => return Ok(value),
                    Err(fault) => {
                        warn!(
                            provider = provider.name(),
                            attempt,
                            error = %fault,
                            "llm object generation failed"
                        );
                        last = Some(fault);
                    }
                }
            }
        }
        Err(last.unwrap_or_else(|| Fault::validation("empty provider chain")))
    }

    #[cfg(test)]
    pub(crate) fn configs_for_test(&self) -> &[Arc<LlmProvider>] {
        &self.configs
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
