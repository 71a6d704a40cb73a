// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit builder
//!
//! Replays a transaction log into the ordered payload a commit applies.
//! Sequence numbers are 1-based: a commit of `n` fragments needs every
//! sequence in `1..=n`. Records beyond `n` belong to a later commit and are
//! left out.

use std::collections::BTreeMap;
use txf_core::{scan_log, ScanError};

/// Upper bound on how many missing sequence numbers one build reports
pub const MAX_REPORTED_MISSING: usize = 1024;

/// Whether a build covered every expected fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    Complete,
    /// Missing sequence numbers, ascending, at most [`MAX_REPORTED_MISSING`]
    Incomplete { missing: Vec<u64> },
}

/// A built commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub target: String,
    /// Concatenated fragments; empty unless the build is complete
    pub payload: Vec<u8>,
    pub status: BuildStatus,
}

impl Build {
    pub fn is_complete(&self) -> bool {
        self.status == BuildStatus::Complete
    }
}

/// Build the payload for a commit of `expected` fragments
pub fn build(log: &[u8], expected: u64) -> Result<Build, ScanError> {
    let scan = scan_log(log)?;
    let target = scan.target.to_string();

    if expected == 0 {
        return Ok(Build {
            target,
            payload: Vec::new(),
            status: BuildStatus::Complete,
        });
    }

    let mut slots = BTreeMap::new();
    for record in &scan.records {
        if record.seq == 0 || record.seq > expected {
            continue;
        }
        slots.entry(record.seq).or_insert(record.payload);
    }

    if slots.len() as u64 == expected {
        let payload = slots.values().flat_map(|p| p.iter().copied()).collect();
        return Ok(Build {
            target,
            payload,
            status: BuildStatus::Complete,
        });
    }

    let missing = (1..=expected)
        .filter(|seq| !slots.contains_key(seq))
        .take(MAX_REPORTED_MISSING)
        .collect();
    Ok(Build {
        target,
        payload: Vec::new(),
        status: BuildStatus::Incomplete { missing },
    })
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
