// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket STT adaptor.
//!
//! Voice frames go out as binary s16le; transcription events come back as
//! JSON text. A keep-alive ping goes out once per second while the channel
//! is open. Cancel closes the socket.

use crate::chunk::SttChunk;
use crate::job::JobSender;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Interval of the keep-alive ping.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Connection settings for the live channel.
#[derive(Debug, Clone, PartialEq)]
pub struct WsSttConfig {
    /// Full websocket URL, including any query parameters.
    pub url: String,
    pub api_key: String,
}

/// One WebSocket STT upstream.
#[derive(Debug)]
pub struct WsStt {
    config: WsSttConfig,
}

impl WsStt {
    pub fn new(config: WsSttConfig) -> Self {
        Self { config }
    }

    /// Drive one live channel until the job is cancelled or the upstream
    /// hangs up.
    pub(crate) fn run(
        &self,
        sender: JobSender<SttChunk>,
        mut voice_rx: mpsc::UnboundedReceiver<Vec<i16>>,
    ) {
        let config = self.config.clone();
        tokio::spawn(async move {
            let cancel = sender.cancelled();

            let request = match client_request(&config) {
                Ok(request) => request,
                Err(message) => {
                    sender.send(SttChunk::Error { message });
                    sender.end();
                    return;
                }
            };
            let (ws, _) = match tokio_tungstenite::connect_async(request).await {
                Ok(ok) => ok,
                Err(e) => {
                    sender.send(SttChunk::Error { message: e.to_string() });
                    sender.end();
                    return;
                }
            };
            let (mut ws_tx, mut ws_rx) = ws.split();
            let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
            keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    samples = voice_rx.recv() => match samples {
                        Some(samples) => {
                            let bytes: Vec<u8> =
                                samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                            if let Err(e) = ws_tx.send(Message::Binary(bytes.into())).await {
                                warn!(error = %e, "stt voice send failed");
                                sender.send(SttChunk::Error { message: e.to_string() });
                                break;
                            }
                        }
                        // The job handle is gone; nothing left to transcribe.
                        None => break,
                    },
                    message = ws_rx.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(transcript) = extract_transcript(text.as_str()) {
                                sender.send(SttChunk::Content { text: transcript });
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(error = %e, "stt socket error");
                            sender.send(SttChunk::Error { message: e.to_string() });
                            break;
                        }
                    },
                    _ = keepalive.tick() => {
                        if let Err(e) = ws_tx.send(Message::Ping(Vec::new().into())).await {
                            debug!(error = %e, "stt keep-alive failed");
                            break;
                        }
                    }
                }
            }
            sender.end();
        });
    }
}

fn client_request(
    config: &WsSttConfig,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, String> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let mut request =
        config.url.as_str().into_client_request().map_err(|e| e.to_string())?;
    let auth = format!("Bearer {}", config.api_key)
        .parse()
        .map_err(|_| "invalid api key header".to_string())?;
    request.headers_mut().insert("Authorization", auth);
    Ok(request)
}

/// Pull the transcript out of one upstream event.
///
/// Accepts both flat (`{"alternatives": [...]}`) and channel-nested
/// event shapes; empty transcripts and events without alternatives are
/// dropped.
fn extract_transcript(text: &str) -> Option<String> {
    let event: Value = serde_json::from_str(text).ok()?;
    let alternatives = event
        .get("alternatives")
        .or_else(|| event.get("channel").and_then(|c| c.get("alternatives")))?
        .as_array()?;
    let transcript = alternatives.first()?.get("transcript")?.as_str()?;
    if transcript.is_empty() {
        None
    } else {
        Some(transcript.to_string())
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
