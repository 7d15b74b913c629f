// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted providers for tests.
//!
//! [`ScriptedLlm`] replays a fixed delta script and counts upstream
//! invocations; [`ScriptedStt`] answers each pushed voice frame with the
//! next scripted transcript.

use crate::chunk::SttChunk;
use crate::job::JobSender;
use crate::llm::{LlmRequest, UpstreamDelta};
use life_core::Fault;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An LLM upstream that replays a scripted delta sequence.
#[derive(Debug)]
pub struct ScriptedLlm {
    label: String,
    script: Vec<UpstreamDelta>,
    /// How many `open_stream` calls fail before one succeeds.
    failing_opens: AtomicUsize,
    opens: AtomicUsize,
    object_calls: AtomicUsize,
    object_response: Mutex<Result<String, Fault>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<UpstreamDelta>) -> Self {
        Self {
            label: "scripted".to_string(),
            script,
            failing_opens: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            object_calls: AtomicUsize::new(0),
            object_response: Mutex::new(Ok("{}".to_string())),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Fail the first `n` stream establishments with an `Upstream` fault.
    pub fn with_failing_opens(self, n: usize) -> Self {
        self.failing_opens.store(n, Ordering::Relaxed);
        self
    }

    /// Fix the raw content returned by constrained completions.
    pub fn with_object_response(self, response: Result<String, Fault>) -> Self {
        *self.object_response.lock() = response;
        self
    }

    pub fn name(&self) -> &str {
        &self.label
    }

    /// Total `open_stream` invocations (for fallback-bound assertions).
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    /// Total constrained-completion invocations.
    pub fn object_call_count(&self) -> usize {
        self.object_calls.load(Ordering::Relaxed)
    }

    pub(crate) async fn open_stream(
        &self,
        _request: &LlmRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<UpstreamDelta>, Fault> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        let remaining = self.failing_opens.load(Ordering::Relaxed);
        if remaining > 0 {
            self.failing_opens.store(remaining - 1, Ordering::Relaxed);
            return Err(Fault::upstream("scripted connect failure"));
        }

        let (tx, rx) = mpsc::channel(16);
        let script = self.script.clone();
        tokio::spawn(async move {
            for delta in script {
                tokio::select! {
                    sent = tx.send(delta) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                    _ = cancel.cancelled() => return,
                }
            }
        });
        Ok(rx)
    }

    pub(crate) async fn complete_constrained(
        &self,
        _messages: &[crate::llm::ChatMessage],
        _schema: &life_core::Schema,
    ) -> Result<String, Fault> {
        self.object_calls.fetch_add(1, Ordering::Relaxed);
        self.object_response.lock().clone()
    }
}

/// An STT upstream that answers each voice frame with the next transcript.
#[derive(Debug)]
pub struct ScriptedStt {
    replies: Arc<Mutex<VecDeque<String>>>,
}

impl ScriptedStt {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
        }
    }

    pub(crate) fn run(
        &self,
        sender: JobSender<SttChunk>,
        mut voice_rx: mpsc::UnboundedReceiver<Vec<i16>>,
    ) {
        let replies = Arc::clone(&self.replies);
        tokio::spawn(async move {
            let cancel = sender.cancelled();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    samples = voice_rx.recv() => match samples {
                        Some(_) => {
                            let next = replies.lock().pop_front();
                            // Empty transcripts are dropped, like a real
                            // upstream's empty alternatives.
                            if let Some(text) = next.filter(|t| !t.is_empty()) {
                                sender.send(SttChunk::Content { text });
                            }
                        }
                        None => break,
                    },
                }
            }
            sender.end();
        });
    }
}
