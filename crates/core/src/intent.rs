// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit-intent record
//!
//! Written to the commit-intent log before a commit is applied. One JSON line
//! carrying the requested fragment count and a CRC32 over it, so a torn or
//! damaged record reads as "no commit requested" instead of a bogus count.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A recorded commit request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIntent {
    /// Number of fragments the client asked to commit
    pub total: u64,
    /// Microseconds since Unix epoch
    pub requested_at_micros: u64,
    /// CRC32 of the fields above
    pub checksum: u32,
}

impl CommitIntent {
    pub fn new(total: u64) -> Self {
        let requested_at_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self::with_timestamp(total, requested_at_micros)
    }

    pub fn with_timestamp(total: u64, requested_at_micros: u64) -> Self {
        Self {
            total,
            requested_at_micros,
            checksum: Self::calculate_checksum(total, requested_at_micros),
        }
    }

    fn calculate_checksum(total: u64, requested_at_micros: u64) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&total.to_le_bytes());
        hasher.update(&requested_at_micros.to_le_bytes());
        hasher.finalize()
    }

    pub fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(self.total, self.requested_at_micros)
    }

    /// Serialize to one newline-terminated JSON line
    pub fn to_line(&self) -> Result<String, IntentError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self, IntentError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Read the intent out of a commit-intent log's contents
    ///
    /// Returns `None` for an empty log, and for a last line that does not
    /// parse or verify.
    pub fn from_log(contents: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(contents);
        let line = text.lines().rev().find(|l| !l.trim().is_empty())?;
        Self::from_line(line).ok().filter(Self::verify)
    }
}

#[cfg(test)]
#[path = "intent_tests.rs"]
mod tests;
