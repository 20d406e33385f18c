// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! swd: the Stringwork coordinator daemon.

use std::process::ExitCode;
use std::sync::Arc;
use sw_daemon::listener::Listener;
use sw_daemon::{startup, Config};
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("swd: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.state_dir) {
        eprintln!("swd: cannot create state dir: {e}");
        return ExitCode::FAILURE;
    }
    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().unwrap_or(&config.state_dir),
        config.log_path.file_name().unwrap_or_else(|| "daemon.log".as_ref()),
    );
    let (log_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(log_writer)
        .with_ansi(false)
        .init();

    let result = match startup(config) {
        Ok(result) => result,
        Err(e) => {
            error!("startup failed: {e}");
            eprintln!("swd: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut daemon = result.daemon;
    info!(version = sw_daemon::env::PROTOCOL_VERSION, "stringwork daemon ready");
    println!("READY");

    let shutdown = Arc::new(Notify::new());
    let listener = Listener::new(
        result.listener,
        Arc::clone(&daemon.ctx),
        Arc::clone(&daemon.notifier),
        Arc::clone(&shutdown),
    );
    let listener_task = tokio::spawn(listener.run());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            shutdown.notify_waiters();
        }
        () = shutdown.notified() => {}
    }

    daemon.shutdown();
    listener_task.abort();
    ExitCode::SUCCESS
}
