// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional file store daemon (txfd)
//!
//! Serves a directory over TCP. Clients append to files through
//! transactions that are logged durably before they touch the target.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use txf_daemon::lifecycle::{self, Config, LifecycleError, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "txfd", version, about = "Transactional file store daemon")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "TXF_ADDR", default_value = "0.0.0.0")]
    addr: String,

    /// Port to listen on
    #[arg(long, env = "TXF_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory to serve
    #[arg(long, env = "TXF_DIR", default_value = ".")]
    dir: PathBuf,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "TXF_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Close connections idle for this many milliseconds between requests
    #[arg(long, env = "TXF_READ_TIMEOUT_MS", default_value_t = 30_000)]
    read_timeout_ms: u64,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            addr: args.addr,
            port: args.port,
            dir: args.dir,
            log_file: args.log_file,
            read_timeout: Duration::from_millis(args.read_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from(Args::parse());

    let _log_guard = setup_logging(&config)?;

    info!("Starting txfd for directory: {}", config.dir.display());

    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Daemon ready, listening on {}", daemon.local_addr()?);

    tokio::select! {
        () = daemon.server.run() => {}

        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }

        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
    }

    daemon.shutdown();
    info!("Daemon stopped");
    Ok(())
}

fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_path) = &config.log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    // Create log directory if needed
    let parent = match log_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    let file_name = log_path.file_name().ok_or_else(|| {
        LifecycleError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("log file path has no file name: {}", log_path.display()),
        ))
    })?;

    let file_appender = tracing_appender::rolling::never(&parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(Some(guard))
}
