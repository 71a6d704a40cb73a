// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! txf-core: pure types for the transactional file store
//!
//! This crate provides:
//! - Transaction ids and the file names derived from them
//! - The transaction log format and its length-delimited scanner
//! - The commit-intent record
//! - Request/response records and error codes
//!
//! Nothing here performs I/O.

pub mod id;
pub mod intent;
pub mod log;
pub mod protocol;
pub mod txn;

pub use id::{is_valid_target_name, FileKind, TxnId, INTENT_PREFIX, LOG_PREFIX};
pub use intent::{CommitIntent, IntentError};
pub use log::{
    encode_marker, encode_record, encode_target, scan_log, CommitMarker, LogRecord, LogScan,
    ScanError,
};
pub use protocol::{
    txn_field, ErrorCode, HeaderError, Method, Request, RequestHeader, Response, Status,
};
pub use txn::{Transaction, TxnState};
