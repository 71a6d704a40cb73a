// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction log format
//!
//! A transaction log is plain bytes:
//!
//! ```text
//! <target filename>
//! <seq> <len>
//! <len bytes of payload>
//! <seq> <len>
//! <len bytes of payload>
//! commit <count> <base size>
//! ```
//!
//! Every record and the commit marker start with a newline, so a log is
//! always the filename line followed by appended chunks. Payloads are not
//! escaped; the length in each record header is the only thing that delimits
//! them. All readers (write verification, commit build, recovery) go through
//! [`scan_log`].

use std::collections::BTreeSet;
use thiserror::Error;

const MARKER_KEYWORD: &str = "commit ";

/// Errors that make a log unreadable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("log has no target filename line")]
    MissingTarget,
    #[error("target filename is not valid UTF-8")]
    InvalidTarget,
    #[error("malformed record header at byte {offset}: {line:?}")]
    BadHeader { offset: usize, line: String },
    #[error("malformed commit marker at byte {offset}: {line:?}")]
    BadMarker { offset: usize, line: String },
}

/// One fragment recorded in a log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord<'a> {
    pub seq: u64,
    pub payload: &'a [u8],
}

/// Commit marker appended once a commit has been fully built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitMarker {
    /// Number of fragments the commit covers
    pub count: u64,
    /// Size of the target file before the payload was appended
    pub base_size: u64,
}

/// Result of scanning a transaction log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogScan<'a> {
    /// Target filename from the first line
    pub target: &'a str,
    /// Complete records in file order
    pub records: Vec<LogRecord<'a>>,
    /// Last commit marker, if any
    pub marker: Option<CommitMarker>,
    /// Byte length of the log up to the end of the last complete item
    ///
    /// Smaller than the file when the tail holds a torn append.
    pub valid_len: usize,
}

impl<'a> LogScan<'a> {
    /// Whether a record for `seq` is present
    pub fn has_sequence(&self, seq: u64) -> bool {
        self.records.iter().any(|r| r.seq == seq)
    }

    /// Set of recorded sequence numbers
    pub fn sequences(&self) -> BTreeSet<u64> {
        self.records.iter().map(|r| r.seq).collect()
    }

    /// Whether the tail of the log is an incomplete append
    pub fn is_torn(&self, total_len: usize) -> bool {
        self.valid_len < total_len
    }
}

/// Scan a transaction log
///
/// Blank lines between records are skipped. A header or payload cut short
/// by the end of the buffer is treated as a torn append and ends the scan;
/// `valid_len` then marks where the intact part of the log stops.
pub fn scan_log(bytes: &[u8]) -> Result<LogScan<'_>, ScanError> {
    let first_end = find_newline(bytes, 0).unwrap_or(bytes.len());
    let target = std::str::from_utf8(&bytes[..first_end]).map_err(|_| ScanError::InvalidTarget)?;
    if target.is_empty() {
        return Err(ScanError::MissingTarget);
    }

    let mut records = Vec::new();
    let mut marker = None;
    let mut valid_len = first_end;
    let mut pos = first_end;

    while pos < bytes.len() {
        if bytes[pos] == b'\n' {
            pos += 1;
            continue;
        }

        let line_end = find_newline(bytes, pos);
        let at_tail = line_end.is_none();
        let line_end = line_end.unwrap_or(bytes.len());
        let line = String::from_utf8_lossy(&bytes[pos..line_end]);

        if let Some(rest) = line.strip_prefix(MARKER_KEYWORD) {
            match parse_marker(rest) {
                Some(m) => marker = Some(m),
                None if at_tail => break,
                None => {
                    return Err(ScanError::BadMarker {
                        offset: pos,
                        line: line.into_owned(),
                    })
                }
            }
            pos = line_end;
            valid_len = line_end;
            continue;
        }

        let (seq, len) = match parse_record_header(&line) {
            Some(header) => header,
            None if at_tail => break,
            None => {
                return Err(ScanError::BadHeader {
                    offset: pos,
                    line: line.into_owned(),
                })
            }
        };

        if at_tail {
            break;
        }
        let start = line_end + 1;
        let Some(end) = start.checked_add(len).filter(|&end| end <= bytes.len()) else {
            break;
        };

        records.push(LogRecord {
            seq,
            payload: &bytes[start..end],
        });
        pos = end;
        valid_len = end;
    }

    Ok(LogScan {
        target,
        records,
        marker,
        valid_len,
    })
}

/// Bytes that start a new log for `target`
pub fn encode_target(target: &str) -> Vec<u8> {
    target.as_bytes().to_vec()
}

/// Bytes appended to record one fragment
pub fn encode_record(seq: u64, payload: &[u8]) -> Vec<u8> {
    let header = format!("\n{} {}\n", seq, payload.len());
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Bytes appended to mark a commit as built and about to be applied
pub fn encode_marker(marker: CommitMarker) -> Vec<u8> {
    format!("\n{}{} {}", MARKER_KEYWORD, marker.count, marker.base_size).into_bytes()
}

fn find_newline(bytes: &[u8], from: usize) -> Option<usize> {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| from + i)
}

fn parse_record_header(line: &str) -> Option<(u64, usize)> {
    let mut parts = line.split(' ');
    let seq = parts.next()?.parse().ok()?;
    let len = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((seq, len))
}

fn parse_marker(rest: &str) -> Option<CommitMarker> {
    let mut parts = rest.split(' ');
    let count = parts.next()?.parse().ok()?;
    let base_size = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(CommitMarker { count, base_size })
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
