// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory transaction record

use crate::id::TxnId;
use std::collections::BTreeSet;
use std::fmt;

/// Transaction lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Accepting writes
    Open,
    /// A commit for `total` fragments was requested but has not completed
    CommitPending { total: u64 },
    /// Payload applied to the target file
    Committed,
    /// Discarded by the client or by recovery
    Aborted,
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnState::Open => write!(f, "open"),
            TxnState::CommitPending { total } => write!(f, "commit-pending({})", total),
            TxnState::Committed => write!(f, "committed"),
            TxnState::Aborted => write!(f, "aborted"),
        }
    }
}

/// A live transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TxnId,
    /// File the commit is applied to
    pub target: String,
    pub state: TxnState,
    /// Sequence numbers recorded in the log
    pub written: BTreeSet<u64>,
}

impl Transaction {
    pub fn new(id: TxnId, target: impl Into<String>) -> Self {
        Self {
            id,
            target: target.into(),
            state: TxnState::Open,
            written: BTreeSet::new(),
        }
    }

    /// Record a successfully logged fragment
    pub fn record_write(&mut self, seq: u64) {
        self.written.insert(seq);
    }

    /// Move to `CommitPending`, replacing any earlier requested count
    pub fn request_commit(&mut self, total: u64) {
        self.state = TxnState::CommitPending { total };
    }

    /// Move to a final state
    pub fn close(&mut self, end: TxnState) {
        self.state = end;
    }
}
