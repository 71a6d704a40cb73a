// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, recovery, shutdown.

use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};
use txf_engine::{Engine, EngineError, RecoveryReport};

use crate::server::Server;

/// Lock file held for as long as a daemon serves a directory
pub const LOCK_FILE: &str = ".txfd.lock";

pub const DEFAULT_PORT: u16 = 7896;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to listen on
    pub addr: String,
    pub port: u16,
    /// Directory whose files are served
    pub dir: PathBuf,
    /// Log to this file instead of stderr
    pub log_file: Option<PathBuf>,
    /// How long a connection may sit idle between requests
    pub read_timeout: Duration,
}

impl Config {
    /// Defaults for serving `dir`
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            dir: dir.into(),
            log_file: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }
}

/// A started daemon
pub struct Daemon {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub server: Server,
    /// What recovery found at startup
    pub recovery: RecoveryReport,
}

impl Daemon {
    pub fn local_addr(&self) -> Result<SocketAddr, LifecycleError> {
        Ok(self.server.local_addr()?)
    }

    /// Shutdown the daemon gracefully
    ///
    /// Transactions still open stay on disk and are recovered at the next
    /// start.
    pub fn shutdown(self) {
        info!("Shutting down daemon...");

        let live = self.server.engine().live_transactions().len();
        if live > 0 {
            info!(live, "leaving open transactions for recovery");
        }

        let lock_path = self.config.lock_path();
        if lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&lock_path) {
                warn!("Failed to remove lock file: {}", e);
            }
        }

        // Lock is released when self.lock_file is dropped
        info!("Daemon shutdown complete");
    }
}

/// Start a daemon: lock the directory, recover, then bind
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    let dir = config
        .dir
        .canonicalize()
        .map_err(|e| LifecycleError::DirNotFound(config.dir.clone(), e))?;
    let config = Config {
        dir,
        ..config.clone()
    };

    let lock_file = acquire_lock(&config.lock_path())?;

    let (engine, recovery) = Engine::open(&config.dir).await?;
    if recovery != RecoveryReport::default() {
        info!(?recovery, "recovered transactions");
    }

    let bind = format!("{}:{}", config.addr, config.port);
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|e| LifecycleError::BindFailed(bind.clone(), e))?;

    info!(
        dir = %config.dir.display(),
        addr = %listener.local_addr()?,
        "daemon started"
    );

    let server = Server::new(listener, Arc::new(engine), config.read_timeout);
    Ok(Daemon {
        config,
        lock_file,
        server,
        recovery,
    })
}

fn acquire_lock(path: &Path) -> Result<File, LifecycleError> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    Ok(file)
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Directory not found at {0}: {1}")]
    DirNotFound(PathBuf, std::io::Error),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("Recovery failed: {0}")]
    Recovery(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
