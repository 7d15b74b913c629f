// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! life-transport: the realtime-transport capability surface.
//!
//! Providers are external; this crate specifies what one must offer (rooms,
//! topic-scoped text streams, 16 kHz mono PCM audio, connection events) plus
//! the audio framer every worker runs in front of `stream_audio_chunk` and
//! the token source that admits participants to rooms.

pub mod capability;
pub mod framer;
pub mod token;

#[cfg(any(test, feature = "test-support"))]
pub mod local;

pub use capability::{
    ensure_public_topic, AudioFrame, IncomingText, TextStreamHandler, TextStreamReader,
    TextStreamWriter, TransportEvent, TransportSession, RPC_TOPIC,
};
pub use framer::{FrameBuffer, Framer, FLUSH_DEBOUNCE, SAMPLES_PER_FRAME};
pub use token::{EnvTokenSource, TokenSource};

#[cfg(any(test, feature = "test-support"))]
pub use local::{LocalHub, LocalSession};
