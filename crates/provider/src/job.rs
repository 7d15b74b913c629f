// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The provider-agnostic job: a cancellable producer plus a lazy, finite,
//! single-consumer chunk stream.
//!
//! Terminality is enforced here, not in the adaptors: at most one `End` is
//! ever emitted and it is the last chunk; after `cancel` nothing passes
//! except that single `End`.

use life_core::JobId;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A chunk type with a distinguished terminal variant.
pub trait Chunk: Send + 'static {
    fn end() -> Self;
    fn is_end(&self) -> bool;
}

struct Gate<C> {
    tx: mpsc::UnboundedSender<C>,
    ended: bool,
}

struct Shared<C> {
    gate: Mutex<Gate<C>>,
    cancel: CancellationToken,
}

impl<C: Chunk> Shared<C> {
    /// Emit the terminal chunk once; later calls are no-ops.
    fn end(&self) {
        let mut gate = self.gate.lock();
        if !gate.ended {
            gate.ended = true;
            let _ = gate.tx.send(C::end());
        }
    }

    fn send(&self, chunk: C) {
        if chunk.is_end() {
            return self.end();
        }
        let mut gate = self.gate.lock();
        // Chunks after cancel or end are dropped, holding the gate lock so
        // a racing end() cannot slip a chunk in behind the terminal one.
        if gate.ended || self.cancel.is_cancelled() {
            return;
        }
        let _ = gate.tx.send(chunk);
    }
}

/// Producer half, held by the adaptor's background reader.
pub struct JobSender<C: Chunk> {
    shared: Arc<Shared<C>>,
}

impl<C: Chunk> JobSender<C> {
    /// Send one chunk. Silently dropped after cancel or end.
    pub fn send(&self, chunk: C) {
        self.shared.send(chunk);
    }

    /// Emit the terminal chunk. Idempotent.
    pub fn end(&self) {
        self.shared.end();
    }

    /// Observe the consumer's cancel signal.
    pub fn cancelled(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl<C: Chunk> Drop for JobSender<C> {
    fn drop(&mut self) {
        // A producer that dies without finishing still terminates the
        // stream; consumers never hang on an abandoned job.
        self.shared.end();
    }
}

/// Consumer half: the job handle given to callers.
pub struct Job<C> {
    pub id: JobId,
    shared: Arc<Shared<C>>,
    rx: mpsc::UnboundedReceiver<C>,
    done: bool,
}

impl<C: Chunk> Job<C> {
    /// Create a linked producer/consumer pair.
    pub fn channel() -> (JobSender<C>, Job<C>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            gate: Mutex::new(Gate { tx, ended: false }),
            cancel: CancellationToken::new(),
        });
        let sender = JobSender { shared: Arc::clone(&shared) };
        (sender, Job { id: JobId::new(), shared, rx, done: false })
    }

    /// Signal cancellation and force the terminal chunk. Idempotent.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
        self.shared.end();
    }

    /// The job's cancel signal, for observers that outlive this handle.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Next chunk; `None` after the terminal chunk was consumed.
    ///
    /// The stream is lazy and not restartable: chunks are observed once.
    pub async fn next_chunk(&mut self) -> Option<C> {
        if self.done {
            return None;
        }
        let chunk = self.rx.recv().await?;
        if chunk.is_end() {
            self.done = true;
        }
        Some(chunk)
    }

    /// Drain the stream to completion (including the terminal chunk).
    pub async fn collect(mut self) -> Vec<C> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            out.push(chunk);
        }
        out
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
