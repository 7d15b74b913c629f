// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The RPC peer: procedure registry, caller state table, error policy.

use crate::message::{RpcMessage, RpcOutcome};
use life_core::{CanonicalValue, Fault, Schema};
use life_transport::{TransportSession, RPC_TOPIC};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Default per-call deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Peer-wide configuration.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Replace non-public faults with a bare `Unknown` before responding.
    /// Off between supervisor and worker (both trusted); on toward room
    /// peers.
    pub obfuscate_errors: bool,
    pub default_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { obfuscate_errors: false, default_timeout: DEFAULT_CALL_TIMEOUT }
    }
}

/// A procedure handler. Receives the decoded canonical input.
pub type RpcHandlerFn = Arc<
    dyn Fn(
            Option<CanonicalValue>,
        ) -> Pin<Box<dyn Future<Output = Result<CanonicalValue, Fault>> + Send>>
        + Send
        + Sync,
>;

/// A registered procedure with optional schemas.
#[derive(Clone)]
pub struct Procedure {
    pub name: String,
    pub input_schema: Option<Schema>,
    pub output_schema: Option<Schema>,
    pub handler: RpcHandlerFn,
}

impl Procedure {
    pub fn new(name: impl Into<String>, handler: RpcHandlerFn) -> Self {
        Self { name: name.into(), input_schema: None, output_schema: None, handler }
    }

    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Options for one call.
pub struct CallOptions {
    pub name: String,
    pub input: Option<CanonicalValue>,
    pub input_schema: Option<Schema>,
    pub output_schema: Option<Schema>,
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            input_schema: None,
            output_schema: None,
            timeout: None,
        }
    }

    pub fn with_input(mut self, input: CanonicalValue) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

type Waiter = oneshot::Sender<RpcOutcome>;

/// One end of the RPC layer, installed on the `rpc` topic of a session.
pub struct RpcPeer {
    session: Arc<dyn TransportSession>,
    config: RpcConfig,
    procedures: Arc<Mutex<HashMap<String, Procedure>>>,
    pending: Arc<Mutex<HashMap<u64, Waiter>>>,
    next_id: AtomicU64,
    /// Serializes outbound messages: a request is issued only after its
    /// predecessor has been accepted by the writer.
    send_lock: tokio::sync::Mutex<()>,
}

impl RpcPeer {
    /// Install a peer on `session`'s reserved topic.
    pub fn new(session: Arc<dyn TransportSession>, config: RpcConfig) -> Arc<Self> {
        let peer = Arc::new(Self {
            session,
            config,
            procedures: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            send_lock: tokio::sync::Mutex::new(()),
        });

        let weak = Arc::downgrade(&peer);
        peer.session.register_text_handler(
            RPC_TOPIC,
            Arc::new(move |incoming| {
                let Some(peer) = weak.upgrade() else { return };
                tokio::spawn(async move {
                    let text = incoming.reader.read_to_end().await;
                    peer.dispatch(&text).await;
                });
            }),
        );
        peer
    }

    /// Install a procedure. Duplicate names replace the prior handler.
    pub fn register(&self, procedure: Procedure) {
        let mut procedures = self.procedures.lock();
        if procedures.insert(procedure.name.clone(), procedure.clone()).is_some() {
            debug!(name = %procedure.name, "replaced rpc procedure");
        }
    }

    /// Call a procedure on the room peer.
    pub async fn call(&self, opts: CallOptions) -> Result<Option<CanonicalValue>, Fault> {
        // Canonical encoding fails at the send site, never silently.
        let input = match &opts.input {
            Some(value) => Some(value.encode()?),
            None => None,
        };
        if let (Some(schema), Some(encoded)) = (&opts.input_schema, &input) {
            schema.validate(encoded)?;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let message = RpcMessage::Request { id, name: opts.name.clone(), input };
        if let Err(fault) = self.send(&message).await {
            self.pending.lock().remove(&id);
            return Err(fault);
        }

        let timeout = opts.timeout.unwrap_or(self.config.default_timeout);
        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(Fault::unknown("rpc peer went away")),
            Err(_) => {
                self.pending.lock().remove(&id);
                return Err(Fault::timeout(format!(
                    "rpc call {:?} timed out after {:?}",
                    opts.name, timeout
                )));
            }
        };

        // The server-side result passes through unchanged unless the
        // caller asked for output validation.
        let value = outcome.into_result()?;
        if let (Some(schema), Some(encoded)) = (&opts.output_schema, &value) {
            schema.validate(encoded)?;
        }
        value.as_ref().map(CanonicalValue::decode).transpose()
    }

    async fn dispatch(self: &Arc<Self>, text: &str) {
        let message: RpcMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping malformed rpc message");
                return;
            }
        };

        match message {
            RpcMessage::Request { id, name, input } => {
                let result = self.serve(&name, input).await;
                let outcome = RpcOutcome::from(match result {
                    Err(fault) if self.config.obfuscate_errors => Err(fault.obfuscated()),
                    other => other,
                });
                if let Err(e) = self.send(&RpcMessage::Response { id, result: outcome }).await {
                    warn!(id, error = %e, "failed to send rpc response");
                }
            }
            RpcMessage::Response { id, result } => {
                // At-most-once resolution: an unknown or already-resolved
                // id is discarded.
                match self.pending.lock().remove(&id) {
                    Some(waiter) => {
                        let _ = waiter.send(result);
                    }
                    None => debug!(id, "dropping late rpc response"),
                }
            }
        }
    }

    async fn serve(&self, name: &str, input: Option<Value>) -> Result<Option<Value>, Fault> {
        let procedure = self
            .procedures
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Fault::not_found(format!("unknown procedure {:?}", name)).public())?;

        if let (Some(schema), Some(encoded)) = (&procedure.input_schema, &input) {
            schema.validate(encoded).map_err(Fault::public)?;
        }

        let decoded = input
            .as_ref()
            .map(CanonicalValue::decode)
            .transpose()
            .map_err(Fault::public)?;

        // Handlers run in their own task; an aborted handler maps to
        // Unknown instead of tearing down the dispatch loop.
        let work = tokio::spawn((procedure.handler)(decoded));
        let output = match work.await {
            Ok(result) => result?,
            Err(e) => return Err(Fault::unknown("rpc handler aborted").with_cause(e)),
        };

        Ok(Some(output.encode()?))
    }

    async fn send(&self, message: &RpcMessage) -> Result<(), Fault> {
        let text = serde_json::to_string(message)
            .map_err(|e| Fault::validation("unserializable rpc message").with_cause(e))?;

        let _guard = self.send_lock.lock().await;
        let mut writer = self.session.send_stream_text(RPC_TOPIC).await?;
        writer.write(&text).await?;
        writer.close().await
    }
}

#[cfg(test)]
#[path = "peer_tests.rs"]
mod tests;
