// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Speech-to-text: the live transcription job and its providers.

pub mod ws;

pub use ws::{WsStt, WsSttConfig};

use crate::chunk::SttChunk;
use crate::job::Job;
use tokio::sync::mpsc;

/// A live transcription job.
///
/// Wraps the plain [`Job`] with the voice-input half: `push_voice` is
/// fire-and-forget and silently drops frames once the job is cancelled.
pub struct SttJob {
    job: Job<SttChunk>,
    voice: mpsc::UnboundedSender<Vec<i16>>,
}

impl SttJob {
    pub fn new(job: Job<SttChunk>, voice: mpsc::UnboundedSender<Vec<i16>>) -> Self {
        Self { job, voice }
    }

    pub fn id(&self) -> life_core::JobId {
        self.job.id
    }

    /// Forward one frame of 16 kHz mono s16le samples. Fire-and-forget.
    pub fn push_voice(&self, samples: &[i16]) {
        if self.job.is_cancelled() {
            return;
        }
        let _ = self.voice.send(samples.to_vec());
    }

    /// A cloneable voice-input handle, for feeding audio from another task
    /// while this handle consumes the chunk stream.
    pub fn voice_handle(&self) -> SttVoice {
        SttVoice { voice: self.voice.clone(), cancel: self.job.cancel_token() }
    }

    /// Close the live channel. Idempotent.
    pub fn cancel(&self) {
        self.job.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.job.is_cancelled()
    }

    pub async fn next_chunk(&mut self) -> Option<SttChunk> {
        self.job.next_chunk().await
    }

    pub async fn collect(self) -> Vec<SttChunk> {
        self.job.collect().await
    }
}

/// Cloneable voice-input half of an [`SttJob`].
///
/// Same fire-and-forget semantics as `push_voice`: frames pushed after
/// cancel are dropped silently.
#[derive(Clone)]
pub struct SttVoice {
    voice: mpsc::UnboundedSender<Vec<i16>>,
    cancel: tokio_util::sync::CancellationToken,
}

impl SttVoice {
    pub fn push_voice(&self, samples: &[i16]) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.voice.send(samples.to_vec());
    }
}

/// The concrete STT providers.
#[derive(Debug)]
pub enum SttProvider {
    WebSocket(WsStt),
    #[cfg(any(test, feature = "test-support"))]
    Scripted(crate::scripted::ScriptedStt),
}

impl SttProvider {
    /// Open a live transcription channel.
    ///
    /// Non-blocking: connection establishment happens in the background;
    /// failures surface as an `Error` chunk followed by `End`.
    pub fn generate(&self) -> SttJob {
        let (sender, job) = Job::channel();
        let (voice_tx, voice_rx) = mpsc::unbounded_channel();
        match self {
            Self::WebSocket(p) => p.run(sender, voice_rx),
            #[cfg(any(test, feature = "test-support"))]
            Self::Scripted(p) => p.run(sender, voice_rx),
        }
        SttJob::new(job, voice_tx)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
