// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction identifiers and the on-disk names derived from them

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// File name prefix of a transaction log
pub const LOG_PREFIX: &str = ".log_";

/// File name prefix of a commit-intent log
pub const INTENT_PREFIX: &str = ".commit_";

/// Identifier of an open transaction
///
/// Unique among live transactions only; ids are reused once a transaction
/// is committed or aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl TxnId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Name of this transaction's log file
    pub fn log_file(self) -> String {
        format!("{}{}", LOG_PREFIX, self.0)
    }

    /// Name of this transaction's commit-intent log file
    pub fn intent_file(self) -> String {
        format!("{}{}", INTENT_PREFIX, self.0)
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TxnId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// What a file in the served directory is, judged by its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// Transaction log for the given id
    Log(TxnId),
    /// Commit-intent log for the given id
    Intent(TxnId),
    /// Anything else: a target file
    Target,
}

impl FileKind {
    pub fn classify(name: &str) -> Self {
        if let Some(id) = name.strip_prefix(LOG_PREFIX).and_then(parse_id) {
            return FileKind::Log(id);
        }
        if let Some(id) = name.strip_prefix(INTENT_PREFIX).and_then(parse_id) {
            return FileKind::Intent(id);
        }
        FileKind::Target
    }
}

// Digits only: "+1" or " 1" are not names this crate ever writes.
fn parse_id(digits: &str) -> Option<TxnId> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Check that a client-supplied name can be used as a target file
///
/// Target files live directly in the served directory, so names must not
/// escape it or collide with the engine's own logs.
pub fn is_valid_target_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0', '\n', '\r'])
        && !name.starts_with(LOG_PREFIX)
        && !name.starts_with(INTENT_PREFIX)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
