//! Shared harness for behavioral specs
//!
//! `Store` owns a scratch directory and runs a daemon over it on a loopback
//! port. `Client` speaks the wire protocol to it.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use similar_asserts::assert_eq;
pub use txf_core::{ErrorCode, Request, Response, Status, TxnId};
use txf_daemon::{encode_request, read_response, startup, Config};

/// A served directory
pub struct Store {
    dir: tempfile::TempDir,
    running: Option<Running>,
}

struct Running {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl Store {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            running: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Put a file in the directory
    pub fn file(&self, name: &str, contents: &[u8]) -> &Self {
        std::fs::write(self.path().join(name), contents).unwrap();
        self
    }

    pub fn read(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.path().join(name)).unwrap()
    }

    pub fn read_str(&self, name: &str) -> String {
        String::from_utf8(self.read(name)).unwrap()
    }

    pub fn has(&self, name: &str) -> bool {
        self.path().join(name).exists()
    }

    /// Names in the directory that belong to transactions
    pub fn log_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".log_") || name.starts_with(".commit_"))
            .collect();
        names.sort();
        names
    }

    /// Start (or restart) the daemon
    pub async fn start(&mut self) -> &mut Self {
        let config = Config {
            addr: "127.0.0.1".to_string(),
            port: 0,
            read_timeout: Duration::from_secs(10),
            ..Config::for_dir(PathBuf::from(self.path()))
        };
        let daemon = startup(&config).await.unwrap();
        let addr = daemon.local_addr().unwrap();
        let handle = tokio::spawn(async move { daemon.server.run().await });
        self.running = Some(Running { addr, handle });
        self
    }

    /// Kill the daemon without any shutdown work
    pub async fn crash(&mut self) -> &mut Self {
        if let Some(running) = self.running.take() {
            running.handle.abort();
            let _ = running.handle.await;
        }
        self
    }

    pub async fn client(&self) -> Client {
        let addr = self
            .running
            .as_ref()
            .map(|r| r.addr)
            .expect("daemon not started");
        Client::connect(addr).await
    }
}

/// A protocol client on one connection
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    pub async fn recv(&mut self) -> Response {
        read_response(&mut self.reader).await.unwrap()
    }

    /// Whether the server has closed the connection
    pub async fn is_closed(&mut self) -> bool {
        read_response(&mut self.reader).await.is_err()
    }

    pub async fn call(&mut self, request: Request) -> Response {
        self.send_raw(&encode_request(&request)).await;
        self.recv().await
    }

    pub async fn begin(&mut self, filename: &str) -> TxnId {
        let response = self
            .call(Request::NewTxn {
                filename: filename.to_string(),
            })
            .await;
        assert_eq!(response.status, Status::Ack);
        TxnId(response.txn as u64)
    }

    pub async fn write(&mut self, txn: TxnId, seq: u64, data: &str) -> Response {
        self.call(Request::Write {
            txn,
            seq,
            data: data.as_bytes().to_vec(),
        })
        .await
    }

    pub async fn commit(&mut self, txn: TxnId, total: u64) -> Response {
        self.call(Request::Commit { txn, total }).await
    }

    pub async fn abort(&mut self, txn: TxnId) -> Response {
        self.call(Request::Abort { txn }).await
    }

    pub async fn read(&mut self, filename: &str) -> Response {
        self.call(Request::Read {
            filename: filename.to_string(),
        })
        .await
    }
}

/// Assertions on a response
pub trait ResponseExt {
    fn passes(&self) -> &Self;
    fn fails_with(&self, code: ErrorCode) -> &Self;
    fn reason_is(&self, reason: &str) -> &Self;
}

impl ResponseExt for Response {
    fn passes(&self) -> &Self {
        assert!(!self.is_error(), "expected success, got {:?}", self);
        self
    }

    fn fails_with(&self, code: ErrorCode) -> &Self {
        assert_eq!(self.status, Status::Error);
        assert_eq!(self.code, Some(code));
        self
    }

    fn reason_is(&self, reason: &str) -> &Self {
        assert_eq!(String::from_utf8_lossy(&self.reason), reason);
        self
    }
}
