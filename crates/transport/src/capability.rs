// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The capability surface a realtime-transport provider must implement.
//!
//! The audio contract is 16 kHz, mono, signed 16-bit PCM. Text topics are
//! independent FIFO channels: order is preserved within a topic between a
//! given pair of peers, nothing is promised across topics.

use async_trait::async_trait;
use life_core::Fault;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Audio sample rate all participants agree on.
pub const SAMPLE_RATE: u32 = 16_000;

/// Topic reserved for the RPC layer. Agent code must not touch it.
pub const RPC_TOPIC: &str = "rpc";

/// Reject agent-level use of the reserved RPC topic.
pub fn ensure_public_topic(topic: &str) -> Result<(), Fault> {
    if topic == RPC_TOPIC {
        Err(Fault::validation(format!("topic {:?} is reserved", RPC_TOPIC)))
    } else {
        Ok(())
    }
}

/// One frame of 16 kHz mono s16le audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Frame duration at the contract sample rate.
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / SAMPLE_RATE as u64
    }
}

/// Connection events a session emits.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// Audio received from the remote participant.
    Audio(AudioFrame),
    Error(String),
}

/// Writer half of an outbound text stream on one topic.
#[async_trait]
pub trait TextStreamWriter: Send {
    async fn write(&mut self, chunk: &str) -> Result<(), Fault>;
    async fn close(self: Box<Self>) -> Result<(), Fault>;
}

impl std::fmt::Debug for dyn TextStreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn TextStreamWriter")
    }
}

/// Reader half of an inbound text stream. Chunks arrive in write order.
pub struct TextStreamReader {
    rx: mpsc::UnboundedReceiver<String>,
}

impl TextStreamReader {
    pub fn new(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self { rx }
    }

    /// Next chunk, or `None` once the writer closed.
    pub async fn next_chunk(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Drain the remaining stream into one string.
    pub async fn read_to_end(mut self) -> String {
        let mut out = String::new();
        while let Some(chunk) = self.next_chunk().await {
            out.push_str(&chunk);
        }
        out
    }
}

/// An inbound text stream plus the peer that opened it.
pub struct IncomingText {
    pub peer: String,
    pub reader: TextStreamReader,
}

/// Invoked once per inbound stream on a registered topic.
pub type TextStreamHandler = Arc<dyn Fn(IncomingText) + Send + Sync>;

/// One participant's connection to the realtime transport.
#[async_trait]
pub trait TransportSession: Send + Sync + 'static {
    async fn join_room(&self, room: &str, token: &str) -> Result<(), Fault>;

    async fn leave_room(&self) -> Result<(), Fault>;

    /// Open an outbound text stream on `topic` to the room's other peers.
    async fn send_stream_text(&self, topic: &str) -> Result<Box<dyn TextStreamWriter>, Fault>;

    /// Install the handler invoked for each inbound stream on `topic`.
    /// Registering a topic twice replaces the prior handler.
    fn register_text_handler(&self, topic: &str, handler: TextStreamHandler);

    /// Capture local microphone audio. Server-side workers have none;
    /// implementations there return `NotImplemented`.
    async fn enable_microphone(&self) -> Result<(), Fault>;

    /// Start the outbound audio track.
    async fn play_audio(&self) -> Result<(), Fault>;

    /// Publish one chunk of 16 kHz mono s16le samples.
    async fn stream_audio_chunk(&self, pcm: &[i16]) -> Result<(), Fault>;

    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent>;
}

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;
