// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! lifed: the supervisor daemon.
//!
//! Exit code 0 on a clean stop, non-zero on a fatal error.

use fs2::FileExt;
use life_server::env::Config;
use life_server::{
    BuildIndex, LifeServer, LogExporter, ProcessLauncher, ReloadWatcher, ServerDeps, TelemetryHub,
};
use life_transport::EnvTokenSource;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(fault) => {
            eprintln!("lifed: {}", fault);
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&config.state_dir) {
        eprintln!("lifed: cannot create state dir {}: {}", config.state_dir.display(), e);
        std::process::exit(1);
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().unwrap_or(&config.state_dir),
        config.log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("lifed.log")),
    );
    let (log_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(log_writer)
        .with_ansi(false)
        .init();

    match run(config).await {
        Ok(()) => std::process::exit(0),
        Err(fault) => {
            error!(error = %fault, "fatal");
            eprintln!("lifed: {}", fault);
            std::process::exit(1);
        }
    }
}

async fn run(config: Config) -> Result<(), life_core::Fault> {
    // One supervisor per state dir.
    let mut lock_file = File::create(&config.lock_path)
        .map_err(|e| life_core::Fault::unknown("cannot create lock file").with_cause(e))?;
    lock_file.try_lock_exclusive().map_err(|e| {
        life_core::Fault::conflict("another lifed is already running for this state dir")
            .with_cause(e)
    })?;
    let _ = writeln!(lock_file, "{}", std::process::id());

    let build = BuildIndex::load(&config.build_dir)?;
    let server = LifeServer::new(ServerDeps {
        build,
        launcher: Arc::new(ProcessLauncher::from_env()?),
        tokens: Arc::new(EnvTokenSource::from_env()?),
        telemetry: TelemetryHub::new(Arc::new(LogExporter)),
    });
    let _watcher = ReloadWatcher::spawn(Arc::clone(&server))?;

    info!(
        build_dir = %config.build_dir.display(),
        agents = server.available().len(),
        "lifed ready"
    );

    shutdown_signal().await;
    info!("shutting down; stopping all workers");
    server.stop_all().await;

    if let Err(e) = std::fs::remove_file(&config.lock_path) {
        error!(error = %e, "failed to remove pid file");
    }
    info!("shutdown complete");
    Ok(())
}

/// SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(term) => term,
            Err(_) => {
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
