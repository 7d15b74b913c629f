// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory transport for tests.
//!
//! A [`LocalHub`] links sessions that join the same room name. Text topics
//! are FIFO per (topic, sender); audio chunks fan out as events to every
//! other peer. The microphone is absent, like in any server-side worker.

use crate::capability::{
    AudioFrame, IncomingText, TextStreamHandler, TextStreamReader, TextStreamWriter,
    TransportEvent, TransportSession,
};
use async_trait::async_trait;
use life_core::Fault;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Links [`LocalSession`]s by room name.
#[derive(Default)]
pub struct LocalHub {
    rooms: Mutex<HashMap<String, Arc<Room>>>,
}

#[derive(Default)]
struct Room {
    peers: Mutex<Vec<Arc<PeerState>>>,
}

struct PeerState {
    identity: String,
    handlers: Mutex<HashMap<String, TextStreamHandler>>,
    events: broadcast::Sender<TransportEvent>,
}

impl LocalHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a session for `identity`, not yet joined to any room.
    pub fn session(self: &Arc<Self>, identity: impl Into<String>) -> LocalSession {
        let (events, _) = broadcast::channel(256);
        LocalSession {
            hub: Arc::clone(self),
            peer: Arc::new(PeerState {
                identity: identity.into(),
                handlers: Mutex::new(HashMap::new()),
                events,
            }),
            joined: Mutex::new(None),
        }
    }

    fn room(&self, name: &str) -> Arc<Room> {
        Arc::clone(self.rooms.lock().entry(name.to_string()).or_default())
    }
}

/// One in-memory participant.
pub struct LocalSession {
    hub: Arc<LocalHub>,
    peer: Arc<PeerState>,
    joined: Mutex<Option<Arc<Room>>>,
}

impl LocalSession {
    fn joined_room(&self) -> Result<Arc<Room>, Fault> {
        self.joined
            .lock()
            .clone()
            .ok_or_else(|| Fault::conflict("session has not joined a room"))
    }

    /// Other peers currently in the room.
    fn others(&self) -> Result<Vec<Arc<PeerState>>, Fault> {
        let room = self.joined_room()?;
        let peers = room.peers.lock();
        Ok(peers
            .iter()
            .filter(|p| !Arc::ptr_eq(p, &self.peer))
            .cloned()
            .collect())
    }
}

struct LocalWriter {
    targets: Vec<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl TextStreamWriter for LocalWriter {
    async fn write(&mut self, chunk: &str) -> Result<(), Fault> {
        for tx in &self.targets {
            let _ = tx.send(chunk.to_string());
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), Fault> {
        Ok(())
    }
}

#[async_trait]
impl TransportSession for LocalSession {
    async fn join_room(&self, room: &str, token: &str) -> Result<(), Fault> {
        if token.is_empty() {
            return Err(Fault::forbidden("room token rejected"));
        }
        let room = self.hub.room(room);
        room.peers.lock().push(Arc::clone(&self.peer));
        *self.joined.lock() = Some(room);
        let _ = self.peer.events.send(TransportEvent::Connected);
        Ok(())
    }

    async fn leave_room(&self) -> Result<(), Fault> {
        if let Some(room) = self.joined.lock().take() {
            room.peers.lock().retain(|p| !Arc::ptr_eq(p, &self.peer));
            let _ = self.peer.events.send(TransportEvent::Disconnected);
        }
        Ok(())
    }

    async fn send_stream_text(&self, topic: &str) -> Result<Box<dyn TextStreamWriter>, Fault> {
        let mut targets = Vec::new();
        for other in self.others()? {
            let handler = other.handlers.lock().get(topic).cloned();
            if let Some(handler) = handler {
                let (tx, rx) = mpsc::unbounded_channel();
                targets.push(tx);
                handler(IncomingText {
                    peer: self.peer.identity.clone(),
                    reader: TextStreamReader::new(rx),
                });
            }
        }
        Ok(Box::new(LocalWriter { targets }))
    }

    fn register_text_handler(&self, topic: &str, handler: TextStreamHandler) {
        self.peer.handlers.lock().insert(topic.to_string(), handler);
    }

    async fn enable_microphone(&self) -> Result<(), Fault> {
        Err(Fault::not_implemented("enable_microphone is unavailable in a server worker"))
    }

    async fn play_audio(&self) -> Result<(), Fault> {
        self.joined_room().map(|_| ())
    }

    async fn stream_audio_chunk(&self, pcm: &[i16]) -> Result<(), Fault> {
        let frame = AudioFrame { samples: pcm.to_vec() };
        for other in self.others()? {
            let _ = other.events.send(TransportEvent::Audio(frame.clone()));
        }
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.peer.events.subscribe()
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
