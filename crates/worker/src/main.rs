// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! life-worker entry point.
//!
//! Spawned by the supervisor with the control protocol on stdio. Logs go
//! to stderr, where the parent collects them. Exit code 0 after a clean
//! stop; 1 on an uncaught error, after a best-effort 1 s telemetry flush.

use async_trait::async_trait;
use life_core::Fault;
use life_ipc::ControlChannel;
use life_transport::TransportSession;
use life_worker::{
    TelemetryQueue, TransportConnector, WorkerDeps, WorkerRuntime, ENV_BUILD_DIR,
};
use std::sync::Arc;
use tracing::{error, info};

/// Env var selecting the realtime-transport provider.
const ENV_TRANSPORT_PROVIDER: &str = "LIFE_TRANSPORT_PROVIDER";

/// Resolves the compiled-in transport provider named by the environment.
///
/// Realtime providers are external integrations; a build that bundles one
/// registers it here. A name this build does not carry fails at join time
/// with `NotImplemented`, which the supervisor surfaces verbatim.
struct EnvConnector {
    provider: String,
}

#[async_trait]
impl TransportConnector for EnvConnector {
    async fn connect(&self) -> Result<Arc<dyn TransportSession>, Fault> {
        Err(Fault::not_implemented(format!(
            "transport provider {:?} is not compiled into this build",
            self.provider
        )))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(run().await);
}

async fn run() -> i32 {
    let build_dir = match std::env::var(ENV_BUILD_DIR) {
        Ok(dir) if !dir.is_empty() => dir.into(),
        _ => {
            error!("missing environment variable {}", ENV_BUILD_DIR);
            return 1;
        }
    };
    let connector = Arc::new(EnvConnector {
        provider: std::env::var(ENV_TRANSPORT_PROVIDER).unwrap_or_else(|_| "none".to_string()),
    });

    let runtime = WorkerRuntime::new(WorkerDeps { build_dir, connector, providers: None });
    let channel = Arc::new(ControlChannel::spawn(
        tokio::io::stdin(),
        tokio::io::stdout(),
        runtime.handler(),
    ));
    runtime.attach_supervisor(Arc::clone(&channel));

    info!("worker ready for control commands");

    // The supervisor owns our lifetime: it closes the channel after the
    // stop response (or force-kills us). Exiting only on hangup keeps the
    // stop response from racing process exit.
    channel.closed().await;
    if runtime.was_stopped() {
        0
    } else {
        // Parent hung up without a stop: flush and report the crash path.
        flush(runtime.telemetry()).await;
        error!("control channel closed without a stop; exiting");
        1
    }
}

async fn flush(telemetry: Option<&TelemetryQueue>) {
    if let Some(telemetry) = telemetry {
        telemetry.flush(life_worker::telemetry::EXIT_FLUSH_BUDGET).await;
    }
}
