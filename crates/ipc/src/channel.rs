// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-duplex control channel over a byte stream pair.
//!
//! Both peers issue requests and serve the other side's requests at the
//! same time. Correlation is by frame id; a response for an id nobody is
//! waiting on is dropped. The channel applies no timeout of its own;
//! deadlines belong to call sites (health ping 3 s, graceful stop 10 s).

use crate::wire::{read_frame, write_frame, WireError};
use life_core::Fault;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Serves the peer's requests. The payload is the serialized command enum
/// of whichever direction this side listens to.
pub type ControlHandler = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, Fault>> + Send>> + Send + Sync,
>;

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    id: u64,
    #[serde(flatten)]
    payload: FramePayload,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
enum FramePayload {
    Request { body: Value },
    Response { result: Result<Value, Fault> },
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, Fault>>>>>;

/// One end of the parent-child control protocol.
pub struct ControlChannel {
    writer_tx: mpsc::UnboundedSender<Frame>,
    pending: Pending,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl ControlChannel {
    /// Spawn reader and writer tasks over the byte stream pair.
    ///
    /// `handler` answers the peer's requests; each request runs in its own
    /// task so a slow handler never blocks the read loop.
    pub fn spawn<R, W>(reader: R, writer: W, handler: ControlHandler) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel::<Frame>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        tokio::spawn(write_loop(writer, writer_rx, shutdown.clone()));
        tokio::spawn(read_loop(
            reader,
            handler,
            writer_tx.clone(),
            Arc::clone(&pending),
            shutdown.clone(),
        ));

        Self { writer_tx, pending, next_id: AtomicU64::new(1), shutdown }
    }

    /// Issue one request and await the correlated response.
    ///
    /// No internal timeout; wrap in `tokio::time::timeout` at the call site.
    pub async fn call<C: Serialize>(&self, command: &C) -> Result<Value, Fault> {
        let body = serde_json::to_value(command)
            .map_err(|e| Fault::validation("unserializable control command").with_cause(e))?;

        if self.shutdown.is_cancelled() {
            return Err(channel_closed());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let frame = Frame { id, payload: FramePayload::Request { body } };
        let send_failed = self.writer_tx.send(frame).is_err();

        // Re-check after enqueueing: a shutdown racing this call may have
        // drained `pending` before our insert, in which case nobody would
        // ever resolve the waiter.
        if (send_failed || self.shutdown.is_cancelled())
            && self.pending.lock().remove(&id).is_some()
        {
            return Err(channel_closed());
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(channel_closed()),
        }
    }

    /// Resolves when the peer hangs up or `close` is called.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Tear the channel down. In-flight calls resolve with a closed fault.
    pub fn close(&self) {
        self.shutdown.cancel();
        fail_pending(&self.pending);
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn channel_closed() -> Fault {
    Fault::unknown("control channel closed")
}

fn fail_pending(pending: &Pending) {
    let waiters: Vec<_> = pending.lock().drain().collect();
    for (_, tx) in waiters {
        let _ = tx.send(Err(channel_closed()));
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut writer_rx: mpsc::UnboundedReceiver<Frame>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = writer_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };
        if let Err(e) = write_frame(&mut writer, &frame).await {
            warn!(error = %e, "control channel write failed");
            break;
        }
    }
    shutdown.cancel();
}

async fn read_loop<R>(
    mut reader: R,
    handler: ControlHandler,
    writer_tx: mpsc::UnboundedSender<Frame>,
    pending: Pending,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let frame: Frame = tokio::select! {
            frame = read_frame(&mut reader) => match frame {
                Ok(frame) => frame,
                Err(WireError::ConnectionClosed) => break,
                Err(e) => {
                    warn!(error = %e, "control channel read failed");
                    break;
                }
            },
            _ = shutdown.cancelled() => break,
        };

        match frame.payload {
            FramePayload::Request { body } => {
                let handler = Arc::clone(&handler);
                let writer_tx = writer_tx.clone();
                let id = frame.id;
                tokio::spawn(async move {
                    // A panicking handler must still produce a response.
                    let work = tokio::spawn(handler(body));
                    let result = match work.await {
                        Ok(result) => result,
                        Err(e) => Err(Fault::unknown("control handler aborted").with_cause(e)),
                    };
                    let _ = writer_tx.send(Frame { id, payload: FramePayload::Response { result } });
                });
            }
            FramePayload::Response { result } => {
                match pending.lock().remove(&frame.id) {
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    // Late or duplicate response: nobody is waiting.
                    None => debug!(id = frame.id, "dropping unmatched control response"),
                }
            }
        }
    }
    shutdown.cancel();
    fail_pending(&pending);
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
