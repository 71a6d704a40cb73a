// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request and response records
//!
//! Request header: `<METHOD> <txnId> <seq> <len>`.
//! Response line: `<METHOD> <txnId> <seq> <code> <reasonLen> <reason>\r\n\r\n`.
//!
//! Reading bodies off a socket is the daemon's job; this module only covers
//! the pieces that are plain text.

use crate::id::TxnId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    NewTxn,
    Write,
    Read,
    Commit,
    Abort,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::NewTxn => "NEW_TXN",
            Method::Write => "WRITE",
            Method::Read => "READ",
            Method::Commit => "COMMIT",
            Method::Abort => "ABORT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW_TXN" => Ok(Method::NewTxn),
            "WRITE" => Ok(Method::Write),
            "READ" => Ok(Method::Read),
            "COMMIT" => Ok(Method::Commit),
            "ABORT" => Ok(Method::Abort),
            other => Err(HeaderError::UnknownMethod(other.to_string())),
        }
    }
}

/// Errors parsing a request header line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("empty request header")]
    Empty,
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("too many header fields")]
    TooManyFields,
}

/// Parsed request header
///
/// Missing trailing fields read as zero. The transaction id stays signed
/// because clients send `-1` with `NEW_TXN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub method: Method,
    pub txn: i64,
    pub seq: u64,
    pub len: usize,
}

impl RequestHeader {
    pub fn parse(line: &str) -> Result<Self, HeaderError> {
        let mut fields = line.split_whitespace();
        let method = fields.next().ok_or(HeaderError::Empty)?.parse()?;
        let txn = parse_field(fields.next(), "transaction id")?;
        let seq = parse_field(fields.next(), "sequence number")?;
        let len = parse_field(fields.next(), "content length")?;
        if fields.next().is_some() {
            return Err(HeaderError::TooManyFields);
        }
        Ok(Self {
            method,
            txn,
            seq,
            len,
        })
    }

    /// Transaction id for methods that address an existing transaction
    pub fn txn_id(&self) -> Result<TxnId, HeaderError> {
        u64::try_from(self.txn)
            .map(TxnId)
            .map_err(|_| HeaderError::InvalidField {
                field: "transaction id",
                value: self.txn.to_string(),
            })
    }
}

fn parse_field<T: FromStr + Default>(
    field: Option<&str>,
    name: &'static str,
) -> Result<T, HeaderError> {
    match field {
        None => Ok(T::default()),
        Some(value) => value.parse().map_err(|_| HeaderError::InvalidField {
            field: name,
            value: value.to_string(),
        }),
    }
}

/// A decoded client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    NewTxn { filename: String },
    Write { txn: TxnId, seq: u64, data: Vec<u8> },
    Read { filename: String },
    /// `total` is the number of fragments the commit covers
    Commit { txn: TxnId, total: u64 },
    Abort { txn: TxnId },
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Request::NewTxn { .. } => Method::NewTxn,
            Request::Write { .. } => Method::Write,
            Request::Read { .. } => Method::Read,
            Request::Commit { .. } => Method::Commit,
            Request::Abort { .. } => Method::Abort,
        }
    }
}

/// Error codes carried by `ERROR` responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnknownTransaction,
    Malformed,
    Io,
    NotFound,
    MissingSequence,
    AlreadyWritten,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            ErrorCode::UnknownTransaction => 201,
            ErrorCode::Malformed => 202,
            ErrorCode::Io => 205,
            ErrorCode::NotFound => 206,
            ErrorCode::MissingSequence => 207,
            ErrorCode::AlreadyWritten => 208,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            201 => Some(ErrorCode::UnknownTransaction),
            202 => Some(ErrorCode::Malformed),
            205 => Some(ErrorCode::Io),
            206 => Some(ErrorCode::NotFound),
            207 => Some(ErrorCode::MissingSequence),
            208 => Some(ErrorCode::AlreadyWritten),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Response line method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ack,
    Success,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ack => "ACK",
            Status::Success => "SUCCESS",
            Status::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACK" => Some(Status::Ack),
            "SUCCESS" => Some(Status::Success),
            "ERROR" => Some(Status::Error),
            _ => None,
        }
    }
}

/// A response record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub txn: i64,
    pub seq: u64,
    /// `None` renders as code 0
    pub code: Option<ErrorCode>,
    pub reason: Vec<u8>,
}

impl Response {
    pub fn ack(txn: TxnId, seq: u64) -> Self {
        Self::new(Status::Ack, txn_field(txn), seq)
    }

    pub fn success(txn: TxnId, seq: u64) -> Self {
        Self::new(Status::Success, txn_field(txn), seq)
    }

    /// A response with no error code and an empty reason
    pub fn new(status: Status, txn: i64, seq: u64) -> Self {
        Self {
            status,
            txn,
            seq,
            code: None,
            reason: Vec::new(),
        }
    }

    pub fn error(txn: i64, seq: u64, code: ErrorCode, reason: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Status::Error,
            txn,
            seq,
            code: Some(code),
            reason: reason.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<Vec<u8>>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Render to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let code = self.code.map_or(0, ErrorCode::as_u16);
        let head = format!(
            "{} {} {} {} {} ",
            self.status.as_str(),
            self.txn,
            self.seq,
            code,
            self.reason.len()
        );
        let mut out = Vec::with_capacity(head.len() + self.reason.len() + 4);
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(&self.reason);
        out.extend_from_slice(b"\r\n\r\n");
        out
    }
}

/// Transaction ids on the wire are signed; live ids always fit
pub fn txn_field(txn: TxnId) -> i64 {
    i64::try_from(txn.get()).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
