// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent host: one agent instance wired to its room.
//!
//! The host owns the transport session, the outbound audio framer, the
//! room-facing RPC peer, the plugin runtimes, and the provider handles.
//! The conversational behavior itself lives a layer above; the host is the
//! plumbing it runs on.

use crate::plugins::PluginRuntime;
use async_trait::async_trait;
use life_core::{AgentDefinition, CanonicalValue, Fault, RoomGrant};
use life_provider::{
    ChatMessage, LlmChain, LlmChunk, LlmRequest, SttChunk, SttProvider, SttVoice,
};
use life_rpc::{Procedure, RpcConfig, RpcPeer};
use life_transport::{
    ensure_public_topic, Framer, TextStreamWriter, TransportEvent, TransportSession,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Topic the agent streams its text replies on.
pub const RESPONSES_TOPIC: &str = "responses";

/// Produces the transport session a worker joins its room with.
///
/// Concrete realtime providers are external; the binary selects one at
/// startup and tests inject an in-memory hub.
#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn TransportSession>, Fault>;
}

/// One agent instance, wired and ready to serve a room.
pub struct AgentHost {
    definition: AgentDefinition,
    session: Arc<dyn TransportSession>,
    rpc: Arc<RpcPeer>,
    plugins: Vec<Arc<PluginRuntime>>,
    llm: Option<Arc<LlmChain>>,
    stt: Option<Arc<SttProvider>>,
    framer: Mutex<Option<Framer>>,
    /// Drains framer output into the transport; joined on stop so the
    /// trailing flush reaches the room.
    audio_pump: Mutex<Option<JoinHandle<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl AgentHost {
    pub fn new(
        definition: AgentDefinition,
        session: Arc<dyn TransportSession>,
        restored_contexts: &BTreeMap<String, Value>,
        llm: Option<Arc<LlmChain>>,
        stt: Option<Arc<SttProvider>>,
    ) -> Arc<Self> {
        let plugins = definition
            .plugins
            .iter()
            .map(|descriptor| {
                Arc::new(PluginRuntime::new(
                    descriptor.clone(),
                    restored_contexts.get(&descriptor.name).cloned(),
                ))
            })
            .collect();

        // The room peer is untrusted: internals never leak through faults.
        let rpc = RpcPeer::new(
            Arc::clone(&session),
            RpcConfig { obfuscate_errors: true, ..RpcConfig::default() },
        );

        let host = Arc::new(Self {
            definition,
            session,
            rpc,
            plugins,
            llm,
            stt,
            framer: Mutex::new(None),
            audio_pump: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        });
        host.register_builtin_procedures();
        host
    }

    fn register_builtin_procedures(self: &Arc<Self>) {
        let name = self.definition.name.clone();
        self.rpc.register(Procedure::new(
            "agent.describe",
            Arc::new(move |_| {
                let name = name.clone();
                Box::pin(async move {
                    Ok(CanonicalValue::Map(
                        [("name".to_string(), CanonicalValue::Text(name))].into_iter().collect(),
                    ))
                })
            }),
        ));
    }

    /// Bring the pipeline up, then join the room.
    ///
    /// On any failure everything already started is rolled back.
    pub async fn start(&self, room: &RoomGrant) -> Result<(), Fault> {
        if let Err(fault) = self.start_inner(room).await {
            self.stop().await;
            return Err(fault);
        }
        Ok(())
    }

    async fn start_inner(&self, room: &RoomGrant) -> Result<(), Fault> {
        // Outbound audio: framer output feeds the transport in 10 ms frames.
        let (framer, mut frames) = Framer::spawn();
        *self.framer.lock() = Some(framer);
        let session = Arc::clone(&self.session);
        *self.audio_pump.lock() = Some(tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if let Err(e) = session.stream_audio_chunk(&frame.samples).await {
                    warn!(error = %e, "dropping outbound audio frame");
                }
            }
        }));

        // Inbound audio and the conversation loop, when STT is configured.
        if let Some(stt) = &self.stt {
            let mut job = stt.generate();
            let voice = job.voice_handle();
            self.spawn_audio_feed(voice);

            let llm = self.llm.clone();
            let session = Arc::clone(&self.session);
            let shutdown = self.shutdown.clone();
            self.spawn(async move {
                loop {
                    let chunk = tokio::select! {
                        chunk = job.next_chunk() => chunk,
                        _ = shutdown.cancelled() => {
                            job.cancel();
                            return;
                        }
                    };
                    match chunk {
                        Some(SttChunk::Content { text }) => {
                            respond(&session, llm.as_ref(), text).await;
                        }
                        Some(SttChunk::Error { message }) => {
                            warn!(error = %message, "transcription error");
                        }
                        Some(SttChunk::End) | None => return,
                    }
                }
            });
        }

        self.session.join_room(&room.name, &room.token).await?;
        self.session.play_audio().await?;
        Ok(())
    }

    fn spawn_audio_feed(&self, voice: SttVoice) {
        let mut events = self.session.subscribe_events();
        let shutdown = self.shutdown.clone();
        self.spawn(async move {
            loop {
                let event = tokio::select! {
                    event = events.recv() => event,
                    _ = shutdown.cancelled() => return,
                };
                match event {
                    Ok(TransportEvent::Audio(frame)) => voice.push_voice(&frame.samples),
                    Ok(TransportEvent::Disconnected) => return,
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(missed = n, "audio feed lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }

    fn spawn(&self, fut: impl std::future::Future<Output = ()> + Send + 'static) {
        self.tasks.lock().push(tokio::spawn(fut));
    }

    /// Tear everything down. Safe to call on a partially started host.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        // Flush the trailing audio residue before leaving the room.
        let framer = self.framer.lock().take();
        if let Some(framer) = framer {
            framer.close().await;
        }
        let pump = self.audio_pump.lock().take();
        if let Some(pump) = pump {
            // The pump ends once the framer's output channel drains.
            let _ = tokio::time::timeout(std::time::Duration::from_secs(1), pump).await;
        }
        if let Err(e) = self.session.leave_room().await {
            debug!(error = %e, "leave_room during shutdown");
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Submit outbound PCM (any length); the framer cuts it into frames.
    pub fn push_audio(&self, samples: Vec<i16>) {
        if let Some(framer) = self.framer.lock().as_ref() {
            framer.push(samples);
        }
    }

    /// Open an outbound text stream on a public topic.
    ///
    /// The `rpc` topic belongs to the RPC layer and is refused here.
    pub async fn open_text_stream(&self, topic: &str) -> Result<Box<dyn TextStreamWriter>, Fault> {
        ensure_public_topic(topic)?;
        self.session.send_stream_text(topic).await
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    pub fn plugins(&self) -> &[Arc<PluginRuntime>] {
        &self.plugins
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<PluginRuntime>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    /// The room-facing RPC peer, for registering agent procedures.
    pub fn rpc(&self) -> &Arc<RpcPeer> {
        &self.rpc
    }

    pub fn session(&self) -> &Arc<dyn TransportSession> {
        &self.session
    }
}

/// Answer one transcribed utterance: stream the LLM reply to the room.
async fn respond(session: &Arc<dyn TransportSession>, llm: Option<&Arc<LlmChain>>, text: String) {
    let Some(llm) = llm else {
        debug!("no llm configured; dropping utterance");
        return;
    };

    let request = LlmRequest { messages: vec![ChatMessage::user(text)], tools: vec![] };
    let mut job = llm.generate_message(request);

    let mut writer = match session.send_stream_text(RESPONSES_TOPIC).await {
        Ok(writer) => writer,
        Err(e) => {
            warn!(error = %e, "cannot open response stream");
            job.cancel();
            return;
        }
    };
    while let Some(chunk) = job.next_chunk().await {
        match chunk {
            LlmChunk::Content { text } => {
                if let Err(e) = writer.write(&text).await {
                    warn!(error = %e, "response stream broke");
                    job.cancel();
                    break;
                }
            }
            LlmChunk::Error { message } => warn!(error = %message, "llm error mid-reply"),
            LlmChunk::Reasoning { .. } | LlmChunk::Tools { .. } => {}
            LlmChunk::End => break,
        }
    }
    if let Err(e) = writer.close().await {
        debug!(error = %e, "response stream close");
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
