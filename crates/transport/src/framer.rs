// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound audio framing.
//!
//! TTS providers emit chunks of arbitrary size; the transport wants frames
//! of exactly 160 samples (10 ms at 16 kHz). Whole frames are cut as input
//! arrives; a trailing residue shorter than a frame is held for 150 ms and
//! flushed as one short frame if nothing else shows up. The 150 ms grace
//! matches typical inter-chunk latency of streaming TTS.

use crate::capability::AudioFrame;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Samples per emitted frame: 10 ms at 16 kHz.
pub const SAMPLES_PER_FRAME: usize = 160;

/// How long a trailing partial frame waits before it is flushed.
pub const FLUSH_DEBOUNCE: Duration = Duration::from_millis(150);

/// The synchronous framing core: a buffer that cuts 160-sample frames.
///
/// Emitted frames concatenate bit-identically to the input, in order.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<i16>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append samples and cut every whole frame now available.
    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioFrame> {
        self.buf.extend_from_slice(samples);
        let whole = self.buf.len() / SAMPLES_PER_FRAME;
        let mut frames = Vec::with_capacity(whole);
        for chunk in self.buf.chunks_exact(SAMPLES_PER_FRAME).take(whole) {
            frames.push(AudioFrame { samples: chunk.to_vec() });
        }
        self.buf.drain(..whole * SAMPLES_PER_FRAME);
        frames
    }

    /// Take the trailing partial frame, if any, clearing the buffer.
    pub fn take_residue(&mut self) -> Option<AudioFrame> {
        if self.buf.is_empty() {
            None
        } else {
            Some(AudioFrame { samples: std::mem::take(&mut self.buf) })
        }
    }

    /// Samples currently buffered (always < [`SAMPLES_PER_FRAME`] after `push`).
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Async shell around [`FrameBuffer`] that owns the trailing-flush timer.
///
/// `push` never blocks; frames appear on the output channel. A fresh
/// submission cancels a pending flush. `close` flushes the residue
/// immediately and ends the output stream.
pub struct Framer {
    tx: mpsc::UnboundedSender<Vec<i16>>,
    task: tokio::task::JoinHandle<()>,
}

impl Framer {
    /// Spawn the framing task; returns the handle and the frame stream.
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<AudioFrame>) {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<i16>>();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(rx, out_tx));
        (Self { tx, task }, out_rx)
    }

    /// Submit an arbitrary-length PCM chunk. Fire-and-forget.
    pub fn push(&self, samples: Vec<i16>) {
        // Receiver only disappears after close(); late pushes are dropped.
        let _ = self.tx.send(samples);
    }

    /// Flush the residue and end the frame stream.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Vec<i16>>,
    out: mpsc::UnboundedSender<AudioFrame>,
) {
    let mut buf = FrameBuffer::new();
    let mut flush_at: Option<Instant> = None;

    loop {
        let input = match flush_at {
            None => rx.recv().await,
            Some(deadline) => tokio::select! {
                input = rx.recv() => input,
                _ = tokio::time::sleep_until(deadline) => {
                    if let Some(frame) = buf.take_residue() {
                        let _ = out.send(frame);
                    }
                    flush_at = None;
                    continue;
                }
            },
        };

        match input {
            Some(samples) => {
                for frame in buf.push(&samples) {
                    let _ = out.send(frame);
                }
                // Any new input resets the debounce window.
                flush_at = (buf.pending() > 0).then(|| Instant::now() + FLUSH_DEBOUNCE);
            }
            None => {
                if let Some(frame) = buf.take_residue() {
                    let _ = out.send(frame);
                }
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "framer_tests.rs"]
mod tests;
