// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the daemon
//!
//! Requests are a header line `<METHOD> <txnId> <seq> <len>`, then:
//! - `NEW_TXN` / `READ`: a blank line and the filename line
//! - `WRITE`: a blank line, exactly `len` payload bytes, and a line terminator
//!
//! Lines end in `\r\n` or `\n`. Blank lines between requests are skipped,
//! which also swallows the terminator after a `WRITE` payload.
//!
//! Responses are `<METHOD> <txnId> <seq> <code> <reasonLen> <reason>\r\n\r\n`.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use txf_core::{ErrorCode, HeaderError, Method, Request, RequestHeader, Response, Status};

/// Longest header or filename line accepted, without its terminator
pub const MAX_LINE_LEN: usize = 4096;

/// Largest `WRITE` payload accepted
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("connection closed mid-request")]
    UnexpectedEof,

    #[error("timed out waiting for a request")]
    Timeout,

    #[error("bad request header: {0}")]
    Header(#[from] HeaderError),

    #[error("malformed request: {reason}")]
    Malformed { txn: i64, seq: u64, reason: String },

    #[error("malformed response: {0}")]
    BadResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    fn malformed(header: &RequestHeader, reason: impl Into<String>) -> Self {
        ProtocolError::Malformed {
            txn: header.txn,
            seq: header.seq,
            reason: reason.into(),
        }
    }

    /// The `ERROR 202` to send before closing, for errors the client caused
    pub fn response(&self) -> Option<Response> {
        match self {
            ProtocolError::Header(e) => {
                Some(Response::error(-1, 0, ErrorCode::Malformed, e.to_string()))
            }
            ProtocolError::Malformed { txn, seq, reason } => Some(Response::error(
                *txn,
                *seq,
                ErrorCode::Malformed,
                reason.clone(),
            )),
            _ => None,
        }
    }
}

/// Read one line without its terminator; `None` at end of stream
async fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LEN as u64 + 2)
        .read_until(b'\n', &mut line)
        .await?;
    if n == 0 {
        return Ok(None);
    }

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    if line.len() > MAX_LINE_LEN {
        return Err(ProtocolError::Header(HeaderError::InvalidField {
            field: "line",
            value: format!("{} bytes", line.len()),
        }));
    }
    Ok(Some(line))
}

async fn read_header<R>(reader: &mut R) -> Result<RequestHeader, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = read_line(reader)
            .await?
            .ok_or(ProtocolError::ConnectionClosed)?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let line = String::from_utf8_lossy(&line);
        return Ok(RequestHeader::parse(&line)?);
    }
}

/// Read the blank line then the filename line
///
/// A filename sent straight after the header is accepted too.
async fn read_filename<R>(reader: &mut R, header: &RequestHeader) -> Result<String, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = read_line(reader).await?.ok_or(ProtocolError::UnexpectedEof)?;
    if line.is_empty() {
        line = read_line(reader).await?.ok_or(ProtocolError::UnexpectedEof)?;
    }
    String::from_utf8(line).map_err(|_| ProtocolError::malformed(header, "filename is not UTF-8"))
}

async fn read_payload<R>(reader: &mut R, header: &RequestHeader) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    if header.len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::malformed(
            header,
            format!("content length {} exceeds {}", header.len, MAX_PAYLOAD_LEN),
        ));
    }

    let blank = read_line(reader).await?.ok_or(ProtocolError::UnexpectedEof)?;
    if !blank.is_empty() {
        return Err(ProtocolError::malformed(
            header,
            "expected a blank line before the payload",
        ));
    }

    let mut data = vec![0u8; header.len];
    reader.read_exact(&mut data).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ProtocolError::UnexpectedEof,
        _ => ProtocolError::Io(e),
    })?;
    Ok(data)
}

/// Read one request
///
/// `idle` bounds the wait for the header only; once a header arrives the
/// body is read without a deadline.
pub async fn read_request<R>(reader: &mut R, idle: Duration) -> Result<Request, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let header = tokio::time::timeout(idle, read_header(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;

    let request = match header.method {
        Method::NewTxn => Request::NewTxn {
            filename: read_filename(reader, &header).await?,
        },
        Method::Read => Request::Read {
            filename: read_filename(reader, &header).await?,
        },
        Method::Write => {
            let txn = header.txn_id()?;
            let data = read_payload(reader, &header).await?;
            Request::Write {
                txn,
                seq: header.seq,
                data,
            }
        }
        Method::Commit => Request::Commit {
            txn: header.txn_id()?,
            total: header.seq,
        },
        Method::Abort => Request::Abort {
            txn: header.txn_id()?,
        },
    };
    Ok(request)
}

/// Write one response and flush it
pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&response.encode()).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode a request as a client sends it
pub fn encode_request(request: &Request) -> Vec<u8> {
    let method = request.method();
    match request {
        Request::NewTxn { filename } | Request::Read { filename } => {
            format!("{} -1 0 0\r\n\r\n{}\r\n", method, filename).into_bytes()
        }
        Request::Write { txn, seq, data } => {
            let mut out = format!("{} {} {} {}\r\n\r\n", method, txn, seq, data.len()).into_bytes();
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
            out
        }
        Request::Commit { txn, total } => format!("{} {} {} 0\r\n", method, txn, total).into_bytes(),
        Request::Abort { txn } => format!("{} {} 0 0\r\n", method, txn).into_bytes(),
    }
}

/// Read one response, as a client does
pub async fn read_response<R>(reader: &mut R) -> Result<Response, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut fields = Vec::with_capacity(5);
    for i in 0..5 {
        let mut field = Vec::new();
        (&mut *reader)
            .take(MAX_LINE_LEN as u64)
            .read_until(b' ', &mut field)
            .await?;
        if field.is_empty() {
            return Err(if i == 0 {
                ProtocolError::ConnectionClosed
            } else {
                ProtocolError::UnexpectedEof
            });
        }
        if field.last() != Some(&b' ') {
            return Err(ProtocolError::BadResponse(
                String::from_utf8_lossy(&field).into_owned(),
            ));
        }
        field.pop();
        fields.push(String::from_utf8_lossy(&field).into_owned());
    }

    let bad = |what: &str| ProtocolError::BadResponse(format!("{}: {:?}", what, fields));
    let status = Status::parse(&fields[0]).ok_or_else(|| bad("status"))?;
    let txn = fields[1].parse().map_err(|_| bad("transaction id"))?;
    let seq = fields[2].parse().map_err(|_| bad("sequence number"))?;
    let code: u16 = fields[3].parse().map_err(|_| bad("code"))?;
    let reason_len: usize = fields[4].parse().map_err(|_| bad("reason length"))?;
    let code = match code {
        0 => None,
        n => Some(ErrorCode::from_u16(n).ok_or_else(|| bad("code"))?),
    };

    let mut reason = vec![0u8; reason_len];
    reader.read_exact(&mut reason).await?;
    let mut terminator = [0u8; 4];
    reader.read_exact(&mut terminator).await?;
    if &terminator != b"\r\n\r\n" {
        return Err(bad("terminator"));
    }

    Ok(Response {
        status,
        txn,
        seq,
        code,
        reason,
    })
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
