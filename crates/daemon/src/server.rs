// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP server and connection handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};
use txf_engine::Engine;

use crate::protocol::{self, ProtocolError};

/// Accepts connections and serves each on its own task
pub struct Server {
    listener: TcpListener,
    engine: Arc<Engine>,
    idle_timeout: Duration,
}

impl Server {
    pub fn new(listener: TcpListener, engine: Arc<Engine>, idle_timeout: Duration) -> Self {
        Self {
            listener,
            engine,
            idle_timeout,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Accept connections until the task is cancelled
    pub async fn run(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    let engine = Arc::clone(&self.engine);
                    let idle = self.idle_timeout;
                    tokio::spawn(async move {
                        match handle_connection(engine, stream, idle).await {
                            Ok(()) => debug!(%peer, "client disconnected"),
                            Err(ServerError::Timeout) => debug!(%peer, "idle connection closed"),
                            Err(e) => warn!(%peer, error = %e, "connection closed with error"),
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Serve requests from one client until it disconnects
pub async fn handle_connection(
    engine: Arc<Engine>,
    stream: TcpStream,
    idle_timeout: Duration,
) -> Result<(), ServerError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let request = match protocol::read_request(&mut reader, idle_timeout).await {
            Ok(req) => req,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(ProtocolError::Timeout) => return Err(ServerError::Timeout),
            Err(e) => {
                if let Some(response) = e.response() {
                    debug!(error = %e, "rejecting malformed request");
                    protocol::write_response(&mut writer, &response).await?;
                }
                return Err(ServerError::Protocol(e));
            }
        };

        let method = request.method();
        debug!(%method, "received request");

        for response in engine.handle(request).await {
            protocol::write_response(&mut writer, &response).await?;
        }
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request timeout")]
    Timeout,
}
